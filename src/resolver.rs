// Transition resolver: decides the outcome of applying an action to a ticket
//
// Resolution only reads. Given the same codes and the same table contents it
// always produces the same result, which callers rely on for audit and for
// retrying a status change safely.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, Instrument};

use crate::audit::{AuditEvent, AuditSink};
use crate::catalog::{Action, Catalog, CatalogEntry, Code, Status, TicketType};
use crate::error::{ReferenceProblem, Result, StoreError, TransitionError};
use crate::observability::{engine_metrics, OperationTimer};
use crate::rules::{RuleFilter, RuleId, TransitionKey, TransitionTable};
use crate::store::{CatalogRepository, TransitionStore};
use crate::telemetry::{create_resolution_span, generate_correlation_id};

/// "Apply `action` to a ticket of `ticket_type` currently in `current_status`"
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionRequest {
    pub current_status: String,
    pub action: String,
    pub ticket_type: String,
}

impl TransitionRequest {
    pub fn new(
        current_status: impl Into<String>,
        action: impl Into<String>,
        ticket_type: impl Into<String>,
    ) -> Self {
        Self {
            current_status: current_status.into(),
            action: action.into(),
            ticket_type: ticket_type.into(),
        }
    }
}

/// A successful resolution; `description` is the rule's audit annotation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    pub from_status: Code,
    pub action: Code,
    pub ticket_type: Code,
    pub to_status: Code,
    pub description: String,
    pub rule_id: RuleId,
}

pub struct TransitionResolver<S> {
    statuses: Catalog<Status, S>,
    actions: Catalog<Action, S>,
    ticket_types: Catalog<TicketType, S>,
    table: TransitionTable<S>,
    audit: Arc<dyn AuditSink>,
}

impl<S> Clone for TransitionResolver<S> {
    fn clone(&self) -> Self {
        Self {
            statuses: self.statuses.clone(),
            actions: self.actions.clone(),
            ticket_types: self.ticket_types.clone(),
            table: self.table.clone(),
            audit: Arc::clone(&self.audit),
        }
    }
}

impl<S: TransitionStore> TransitionResolver<S> {
    pub fn new(
        statuses: Catalog<Status, S>,
        actions: Catalog<Action, S>,
        ticket_types: Catalog<TicketType, S>,
        table: TransitionTable<S>,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self {
            statuses,
            actions,
            ticket_types,
            table,
            audit,
        }
    }

    pub async fn resolve(&self, request: &TransitionRequest) -> Result<Resolution> {
        let correlation_id = generate_correlation_id();
        let span = create_resolution_span(
            &request.current_status,
            &request.action,
            &request.ticket_type,
            &correlation_id,
        );

        async {
            let timer = OperationTimer::new("resolve_transition");
            let outcome = self.evaluate(request).await;
            timer.finish();

            match &outcome {
                Ok(resolution) => {
                    engine_metrics().record_resolution();
                    self.audit.record(&AuditEvent::TransitionResolved {
                        status: resolution.from_status.clone(),
                        action: resolution.action.clone(),
                        ticket_type: resolution.ticket_type.clone(),
                        to_status: resolution.to_status.clone(),
                        rule_id: resolution.rule_id,
                        description: resolution.description.clone(),
                    });
                }
                Err(err) if err.is_infrastructure() => {
                    engine_metrics().record_storage_error();
                }
                Err(err) => {
                    engine_metrics().record_rejection();
                    self.audit.record(&AuditEvent::TransitionRejected {
                        status: request.current_status.clone(),
                        action: request.action.clone(),
                        ticket_type: request.ticket_type.clone(),
                        reason: err.code(),
                    });
                }
            }
            outcome
        }
        .instrument(span)
        .await
    }

    async fn evaluate(&self, request: &TransitionRequest) -> Result<Resolution> {
        // Terminal check comes first so the outcome does not depend on the
        // action, the ticket type or the rule table
        let status = existing(&self.statuses, &request.current_status).await?;
        if status.is_terminal {
            return Err(TransitionError::TerminalStatus {
                status: status.code.to_string(),
            });
        }

        let action = existing(&self.actions, &request.action).await?;
        let ticket_type = existing(&self.ticket_types, &request.ticket_type).await?;
        ensure_active(&status)?;
        ensure_active(&action)?;
        ensure_active(&ticket_type)?;

        let key = TransitionKey::new(status.id, action.id, ticket_type.id);
        let rule = self.table.find_rule(&key).await?.ok_or_else(|| {
            TransitionError::NoMatchingTransition {
                status: status.code.to_string(),
                action: action.code.to_string(),
                ticket_type: ticket_type.code.to_string(),
            }
        })?;

        if !rule.is_active {
            return Err(TransitionError::TransitionDisabled {
                rule_id: rule.id.to_string(),
                status: status.code.to_string(),
                action: action.code.to_string(),
            });
        }

        let target = self.statuses.find(rule.to_status).await?.ok_or_else(|| {
            TransitionError::from(StoreError::Corrupt {
                reason: format!("rule {} targets missing status {}", rule.id, rule.to_status),
            })
        })?;
        ensure_active(&target)?;

        debug!(rule.id = %rule.id, to_status = %target.code, "Matched transition rule");
        Ok(Resolution {
            from_status: status.code,
            action: action.code,
            ticket_type: ticket_type.code,
            to_status: target.code,
            description: rule.description,
            rule_id: rule.id,
        })
    }

    /// Actions that would resolve successfully right now, sorted by code
    pub async fn applicable_actions(&self, current_status: &str, ticket_type: &str) -> Result<Vec<Code>> {
        let status = existing(&self.statuses, current_status).await?;
        let ticket_type = existing(&self.ticket_types, ticket_type).await?;
        if status.is_terminal || !status.is_active || !ticket_type.is_active {
            return Ok(Vec::new());
        }

        let filter = RuleFilter::for_ticket_type(ticket_type.id)
            .from_status(status.id)
            .active_only();
        let rules = self.table.list_rules(&filter).await?;

        let actions: HashMap<_, _> = self
            .actions
            .list(true)
            .await?
            .into_iter()
            .map(|action| (action.id, action.code))
            .collect();
        let targets: HashSet<_> = self
            .statuses
            .list(true)
            .await?
            .into_iter()
            .map(|status| status.id)
            .collect();

        let mut codes: Vec<Code> = rules
            .iter()
            .filter(|rule| targets.contains(&rule.to_status))
            .filter_map(|rule| actions.get(&rule.action).cloned())
            .collect();
        codes.sort();
        codes.dedup();
        Ok(codes)
    }
}

async fn existing<E, S>(catalog: &Catalog<E, S>, code: &str) -> Result<E>
where
    E: CatalogEntry,
    S: TransitionStore + CatalogRepository<E>,
{
    let parsed = Code::parse(code)?;
    catalog
        .find_by_code(&parsed)
        .await?
        .ok_or_else(|| TransitionError::UnknownReference {
            kind: E::KIND,
            reference: parsed.to_string(),
            reason: ReferenceProblem::Missing,
        })
}

fn ensure_active<E: CatalogEntry>(entry: &E) -> Result<()> {
    if entry.is_active() {
        return Ok(());
    }
    Err(TransitionError::InactiveReference {
        kind: E::KIND,
        code: entry.code().to_string(),
    })
}
