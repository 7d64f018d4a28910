// Code-based administration of transition rules
//
// Administrators (and definition files) refer to statuses, actions and
// ticket types by code. This layer turns codes into ids, delegates to the
// rule table, and populates rule listings with codes for display.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::{RuleDraft, RuleFilter, RuleId, RuleUpdate, RuleView, TransitionRule, TransitionTable};
use crate::catalog::{Action, Catalog, CatalogEntry, Code, Id, Status, TicketType};
use crate::error::{ReferenceProblem, Result, StoreError, TransitionError};
use crate::store::TransitionStore;

/// A rule described by codes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleSpec {
    pub from_status: String,
    pub action: String,
    pub ticket_type: String,
    pub to_status: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub is_default: bool,
}

/// Partial update described by codes
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RulePatch {
    pub from_status: Option<String>,
    pub action: Option<String>,
    pub ticket_type: Option<String>,
    pub to_status: Option<String>,
    pub description: Option<String>,
}

/// Listing filter by code
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuleQuery {
    pub ticket_type: Option<String>,
    pub from_status: Option<String>,
    #[serde(default)]
    pub active_only: bool,
}

pub struct RuleAdmin<S> {
    table: TransitionTable<S>,
    statuses: Catalog<Status, S>,
    actions: Catalog<Action, S>,
    ticket_types: Catalog<TicketType, S>,
}

impl<S> Clone for RuleAdmin<S> {
    fn clone(&self) -> Self {
        Self {
            table: self.table.clone(),
            statuses: self.statuses.clone(),
            actions: self.actions.clone(),
            ticket_types: self.ticket_types.clone(),
        }
    }
}

impl<S: TransitionStore> RuleAdmin<S> {
    pub fn new(
        table: TransitionTable<S>,
        statuses: Catalog<Status, S>,
        actions: Catalog<Action, S>,
        ticket_types: Catalog<TicketType, S>,
    ) -> Self {
        Self {
            table,
            statuses,
            actions,
            ticket_types,
        }
    }

    pub async fn add(&self, spec: &RuleSpec) -> Result<RuleId> {
        let draft = RuleDraft {
            from_status: resolve_code(&self.statuses, &spec.from_status).await?,
            action: resolve_code(&self.actions, &spec.action).await?,
            ticket_type: resolve_code(&self.ticket_types, &spec.ticket_type).await?,
            to_status: resolve_code(&self.statuses, &spec.to_status).await?,
            description: spec.description.clone(),
            is_default: spec.is_default,
        };
        self.table.add_rule(draft).await
    }

    pub async fn update(&self, id: RuleId, patch: &RulePatch) -> Result<RuleView> {
        let update = RuleUpdate {
            from_status: resolve_optional(&self.statuses, patch.from_status.as_deref()).await?,
            action: resolve_optional(&self.actions, patch.action.as_deref()).await?,
            ticket_type: resolve_optional(&self.ticket_types, patch.ticket_type.as_deref())
                .await?,
            to_status: resolve_optional(&self.statuses, patch.to_status.as_deref()).await?,
            description: patch.description.clone(),
        };
        let rule = self.table.update_rule(id, update).await?;
        self.view(&rule).await
    }

    pub async fn deactivate(&self, id: RuleId) -> Result<RuleView> {
        let rule = self.table.deactivate_rule(id).await?;
        self.view(&rule).await
    }

    pub async fn activate(&self, id: RuleId) -> Result<RuleView> {
        let rule = self.table.activate_rule(id).await?;
        self.view(&rule).await
    }

    pub async fn delete(&self, id: RuleId) -> Result<()> {
        self.table.delete_rule(id).await
    }

    /// Rules matching the query, ordered by ticket type, source status and action
    pub async fn list(&self, query: &RuleQuery) -> Result<Vec<RuleView>> {
        let filter = RuleFilter {
            ticket_type: resolve_optional(&self.ticket_types, query.ticket_type.as_deref())
                .await?,
            from_status: resolve_optional(&self.statuses, query.from_status.as_deref()).await?,
            action: None,
            active_only: query.active_only,
        };
        let rules = self.table.list_rules(&filter).await?;

        let names = CodeBook::load(self).await?;
        let mut views = rules
            .iter()
            .map(|rule| names.view(rule))
            .collect::<Result<Vec<_>>>()?;
        views.sort_by(|a, b| {
            (&a.ticket_type, &a.from_status, &a.action).cmp(&(&b.ticket_type, &b.from_status, &b.action))
        });
        Ok(views)
    }

    pub async fn view(&self, rule: &TransitionRule) -> Result<RuleView> {
        CodeBook::load(self).await?.view(rule)
    }
}

/// Id-to-code lookup over all three catalogs, loaded once per listing
struct CodeBook {
    statuses: HashMap<Id<Status>, Code>,
    actions: HashMap<Id<Action>, Code>,
    ticket_types: HashMap<Id<TicketType>, Code>,
}

impl CodeBook {
    async fn load<S: TransitionStore>(admin: &RuleAdmin<S>) -> Result<Self> {
        Ok(Self {
            statuses: code_map(&admin.statuses).await?,
            actions: code_map(&admin.actions).await?,
            ticket_types: code_map(&admin.ticket_types).await?,
        })
    }

    fn view(&self, rule: &TransitionRule) -> Result<RuleView> {
        Ok(RuleView {
            id: rule.id,
            from_status: lookup(&self.statuses, rule.from_status)?,
            action: lookup(&self.actions, rule.action)?,
            to_status: lookup(&self.statuses, rule.to_status)?,
            ticket_type: lookup(&self.ticket_types, rule.ticket_type)?,
            description: rule.description.clone(),
            is_active: rule.is_active,
            is_default: rule.is_default,
        })
    }
}

async fn code_map<E, S>(catalog: &Catalog<E, S>) -> Result<HashMap<Id<E>, Code>>
where
    E: CatalogEntry,
    S: TransitionStore + crate::store::CatalogRepository<E>,
{
    Ok(catalog
        .list(false)
        .await?
        .into_iter()
        .map(|entry| (entry.id(), entry.code().clone()))
        .collect())
}

fn lookup<E: CatalogEntry>(codes: &HashMap<Id<E>, Code>, id: Id<E>) -> Result<Code> {
    codes.get(&id).cloned().ok_or_else(|| {
        StoreError::Corrupt {
            reason: format!("rule references missing {} {}", E::KIND, id),
        }
        .into()
    })
}

async fn resolve_code<E, S>(catalog: &Catalog<E, S>, code: &str) -> Result<Id<E>>
where
    E: CatalogEntry,
    S: TransitionStore + crate::store::CatalogRepository<E>,
{
    let parsed = Code::parse(code)?;
    match catalog.find_by_code(&parsed).await? {
        Some(entry) => Ok(entry.id()),
        None => Err(TransitionError::UnknownReference {
            kind: E::KIND,
            reference: parsed.to_string(),
            reason: ReferenceProblem::Missing,
        }),
    }
}

async fn resolve_optional<E, S>(catalog: &Catalog<E, S>, code: Option<&str>) -> Result<Option<Id<E>>>
where
    E: CatalogEntry,
    S: TransitionStore + crate::store::CatalogRepository<E>,
{
    match code {
        Some(code) => Ok(Some(resolve_code(catalog, code).await?)),
        None => Ok(None),
    }
}
