use std::sync::Arc;
use tracing::{debug, info};

use super::{RuleCache, RuleDraft, RuleFilter, RuleId, RuleUpdate, TransitionKey, TransitionRule};
use crate::audit::{AuditEvent, AuditSink, ChangeKind};
use crate::catalog::{Action, CatalogEntry, Id, Protected, Status, TicketType};
use crate::error::{EntryKind, ReferenceProblem, Result, StoreError, TransitionError};
use crate::store::{CatalogRepository, TransitionStore};

/// The four catalog entries a rule points at, loaded and validated
struct ResolvedReferences {
    from_status: Status,
    action: Action,
    ticket_type: TicketType,
}

/// The transition rule table.
///
/// Every write validates references eagerly, enforces the triple uniqueness
/// (also relying on the store's own constraint for concurrent writers) and
/// invalidates the cache entries it touched before returning.
pub struct TransitionTable<S> {
    store: Arc<S>,
    cache: RuleCache,
    audit: Arc<dyn AuditSink>,
}

impl<S> Clone for TransitionTable<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            cache: self.cache.clone(),
            audit: Arc::clone(&self.audit),
        }
    }
}

impl<S: TransitionStore> TransitionTable<S> {
    pub fn new(store: Arc<S>, cache: RuleCache, audit: Arc<dyn AuditSink>) -> Self {
        Self {
            store,
            cache,
            audit,
        }
    }

    pub async fn add_rule(&self, draft: RuleDraft) -> Result<RuleId> {
        let rule = draft.into_rule();
        self.validate(&rule).await?;

        let key = rule.key();
        let id = rule.id;
        let insert = self.store.insert_rule(rule).await;
        self.cache.invalidate(&[key]).await;
        insert.map_err(|err| self.storage_conflict(err, &key))?;

        info!(rule.id = %id, "Transition rule added");
        self.record(id, ChangeKind::Created);
        Ok(id)
    }

    pub async fn update_rule(&self, id: RuleId, update: RuleUpdate) -> Result<TransitionRule> {
        let current = self.get_rule(id).await?;
        if update.is_empty() {
            return Ok(current);
        }

        let updated = update.apply_to(&current);
        self.validate(&updated).await?;

        let result = self.store.update_rule(updated.clone()).await;
        self.cache.invalidate(&[current.key(), updated.key()]).await;
        result.map_err(|err| self.storage_conflict(err, &updated.key()))?;

        info!(rule.id = %id, "Transition rule updated");
        self.record(id, ChangeKind::Updated);
        Ok(updated)
    }

    pub async fn deactivate_rule(&self, id: RuleId) -> Result<TransitionRule> {
        let mut rule = self.get_rule(id).await?;
        if rule.is_protected() {
            return Err(TransitionError::DefaultRuleProtected {
                rule_id: id.to_string(),
            });
        }
        if !rule.is_active {
            return Ok(rule);
        }

        rule.is_active = false;
        rule.updated_at = chrono::Utc::now();
        let result = self.store.update_rule(rule.clone()).await;
        self.cache.invalidate(&[rule.key()]).await;
        result?;

        info!(rule.id = %id, "Transition rule deactivated");
        self.record(id, ChangeKind::Deactivated);
        Ok(rule)
    }

    /// Re-enable a rule; its references are validated again since they may
    /// have been deactivated while the rule was off
    pub async fn activate_rule(&self, id: RuleId) -> Result<TransitionRule> {
        let mut rule = self.get_rule(id).await?;
        if rule.is_active {
            return Ok(rule);
        }
        self.validate(&rule).await?;

        rule.is_active = true;
        rule.updated_at = chrono::Utc::now();
        let result = self.store.update_rule(rule.clone()).await;
        self.cache.invalidate(&[rule.key()]).await;
        result?;

        info!(rule.id = %id, "Transition rule activated");
        self.record(id, ChangeKind::Activated);
        Ok(rule)
    }

    /// Hard removal; only non-default rules that have been deactivated first
    pub async fn delete_rule(&self, id: RuleId) -> Result<()> {
        let rule = self.get_rule(id).await?;
        if rule.is_protected() {
            return Err(TransitionError::DefaultRuleProtected {
                rule_id: id.to_string(),
            });
        }
        if rule.is_active {
            return Err(TransitionError::ActiveRuleDeletion {
                rule_id: id.to_string(),
            });
        }

        let result = self.store.remove_rule(id).await;
        self.cache.invalidate(&[rule.key()]).await;
        result?;

        info!(rule.id = %id, "Transition rule deleted");
        self.record(id, ChangeKind::Deleted);
        Ok(())
    }

    /// Single-row lookup by triple, served from the cache when enabled
    pub async fn find_rule(&self, key: &TransitionKey) -> Result<Option<TransitionRule>> {
        let store = Arc::clone(&self.store);
        let key = *key;
        let found = self
            .cache
            .get_or_load(key, || async move { store.find_rule(&key).await })
            .await?;
        Ok(found)
    }

    pub async fn get_rule(&self, id: RuleId) -> Result<TransitionRule> {
        self.store
            .get_rule(id)
            .await?
            .ok_or_else(|| TransitionError::NotFound {
                kind: EntryKind::Rule,
                key: id.to_string(),
            })
    }

    pub async fn list_rules(&self, filter: &RuleFilter) -> Result<Vec<TransitionRule>> {
        Ok(self.store.list_rules(filter).await?)
    }

    /// Forget every cached lookup; the next resolutions read the store
    pub async fn clear_cache(&self) {
        self.cache.invalidate_all().await;
    }

    async fn validate(&self, rule: &TransitionRule) -> Result<ResolvedReferences> {
        let from_status: Status = self.active_reference(rule.from_status).await?;
        let action: Action = self.active_reference(rule.action).await?;
        let ticket_type: TicketType = self.active_reference(rule.ticket_type).await?;
        let _to_status: Status = self.active_reference(rule.to_status).await?;

        if from_status.is_terminal {
            return Err(TransitionError::TerminalStatusHasNoOutgoingRule {
                status: from_status.code.to_string(),
            });
        }

        let references = ResolvedReferences {
            from_status,
            action,
            ticket_type,
        };

        // Reads the store directly: a cached negative lookup must not hide a
        // rule written by another process
        if let Some(existing) = self.store.find_rule(&rule.key()).await? {
            if existing.id != rule.id {
                debug!(existing = %existing.id, "Rule triple already taken");
                return Err(Self::duplicate(&references));
            }
        }
        Ok(references)
    }

    async fn active_reference<E>(&self, id: Id<E>) -> Result<E>
    where
        E: CatalogEntry,
        S: CatalogRepository<E>,
    {
        match CatalogRepository::<E>::get_by_id(&*self.store, id).await? {
            None => Err(TransitionError::UnknownReference {
                kind: E::KIND,
                reference: id.to_string(),
                reason: ReferenceProblem::Missing,
            }),
            Some(entry) if !entry.is_active() => Err(TransitionError::UnknownReference {
                kind: E::KIND,
                reference: entry.code().to_string(),
                reason: ReferenceProblem::Inactive,
            }),
            Some(entry) => Ok(entry),
        }
    }

    /// A unique violation from the store means another writer took the triple first
    fn storage_conflict(&self, err: StoreError, key: &TransitionKey) -> TransitionError {
        match err {
            StoreError::UniqueViolation { .. } => TransitionError::DuplicateTransition {
                from_status: key.from_status.to_string(),
                action: key.action.to_string(),
                ticket_type: key.ticket_type.to_string(),
            },
            other => other.into(),
        }
    }

    fn duplicate(references: &ResolvedReferences) -> TransitionError {
        TransitionError::DuplicateTransition {
            from_status: references.from_status.code.to_string(),
            action: references.action.code.to_string(),
            ticket_type: references.ticket_type.code.to_string(),
        }
    }

    fn record(&self, rule_id: RuleId, change: ChangeKind) {
        self.audit.record(&AuditEvent::RuleChanged { rule_id, change });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::TracingAuditSink;
    use crate::store::InMemoryStore;

    struct Fixture {
        store: Arc<InMemoryStore>,
        table: TransitionTable<InMemoryStore>,
        open: Id<Status>,
        closed: Id<Status>,
        close: Id<Action>,
        repair: Id<TicketType>,
    }

    async fn fixture() -> Fixture {
        let store = Arc::new(InMemoryStore::new());
        let open = Status::new("OPEN", "Open").unwrap();
        let closed = Status::new("CLOSED", "Closed").unwrap().terminal();
        let close = Action::new("CLOSE_ACTION", "Close").unwrap();
        let repair = TicketType::new("REPAIR", "Repair").unwrap();
        let ids = (open.id, closed.id, close.id, repair.id);
        store.insert(open).await.unwrap();
        store.insert(closed).await.unwrap();
        store.insert(close).await.unwrap();
        store.insert(repair).await.unwrap();

        let table = TransitionTable::new(
            Arc::clone(&store),
            RuleCache::disabled(),
            Arc::new(TracingAuditSink),
        );
        Fixture {
            store,
            table,
            open: ids.0,
            closed: ids.1,
            close: ids.2,
            repair: ids.3,
        }
    }

    fn draft(f: &Fixture, from: Id<Status>, to: Id<Status>) -> RuleDraft {
        RuleDraft {
            from_status: from,
            action: f.close,
            ticket_type: f.repair,
            to_status: to,
            description: "close it".to_string(),
            is_default: false,
        }
    }

    #[tokio::test]
    async fn test_add_and_find_rule() {
        let f = fixture().await;
        let id = f.table.add_rule(draft(&f, f.open, f.closed)).await.unwrap();

        let key = TransitionKey::new(f.open, f.close, f.repair);
        let found = f.table.find_rule(&key).await.unwrap().unwrap();
        assert_eq!(found.id, id);
        assert_eq!(found.to_status, f.closed);
    }

    #[tokio::test]
    async fn test_unknown_reference_rejected() {
        let f = fixture().await;
        let mut bad = draft(&f, f.open, f.closed);
        bad.action = Id::new();

        let err = f.table.add_rule(bad).await.unwrap_err();
        assert!(matches!(
            err,
            TransitionError::UnknownReference {
                kind: EntryKind::Action,
                reason: ReferenceProblem::Missing,
                ..
            }
        ));
        assert_eq!(f.store.rule_count().await, 0);
    }

    #[tokio::test]
    async fn test_inactive_reference_rejected() {
        let f = fixture().await;
        let mut repair: TicketType = f.store.get_by_id(f.repair).await.unwrap().unwrap();
        repair.is_active = false;
        f.store.update(repair).await.unwrap();

        let err = f.table.add_rule(draft(&f, f.open, f.closed)).await.unwrap_err();
        assert!(matches!(
            err,
            TransitionError::UnknownReference {
                kind: EntryKind::TicketType,
                reason: ReferenceProblem::Inactive,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_terminal_source_rejected() {
        let f = fixture().await;
        let err = f.table.add_rule(draft(&f, f.closed, f.open)).await.unwrap_err();
        assert!(matches!(
            err,
            TransitionError::TerminalStatusHasNoOutgoingRule { ref status } if status == "CLOSED"
        ));
    }

    #[tokio::test]
    async fn test_self_transition_allowed() {
        let f = fixture().await;
        let id = f.table.add_rule(draft(&f, f.open, f.open)).await.unwrap();
        assert!(f.table.get_rule(id).await.unwrap().is_self_transition());
    }

    #[tokio::test]
    async fn test_duplicate_includes_inactive_rules() {
        let f = fixture().await;
        let id = f.table.add_rule(draft(&f, f.open, f.closed)).await.unwrap();
        f.table.deactivate_rule(id).await.unwrap();

        let err = f.table.add_rule(draft(&f, f.open, f.open)).await.unwrap_err();
        assert!(matches!(err, TransitionError::DuplicateTransition { .. }));
    }

    #[tokio::test]
    async fn test_update_excludes_self_from_uniqueness() {
        let f = fixture().await;
        let id = f.table.add_rule(draft(&f, f.open, f.closed)).await.unwrap();

        let updated = f
            .table
            .update_rule(
                id,
                RuleUpdate {
                    description: Some("close for good".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.description, "close for good");
    }

    #[tokio::test]
    async fn test_update_onto_taken_triple_rejected() {
        let f = fixture().await;
        let reassign = Action::new("REASSIGN", "Reassign").unwrap();
        let reassign_id = reassign.id;
        f.store.insert(reassign).await.unwrap();

        f.table.add_rule(draft(&f, f.open, f.closed)).await.unwrap();
        let mut other = draft(&f, f.open, f.open);
        other.action = reassign_id;
        let other_id = f.table.add_rule(other).await.unwrap();

        let err = f
            .table
            .update_rule(
                other_id,
                RuleUpdate {
                    action: Some(f.close),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, TransitionError::DuplicateTransition { .. }));
        assert_eq!(f.table.get_rule(other_id).await.unwrap().action, reassign_id);
    }

    #[tokio::test]
    async fn test_default_rule_protected() {
        let f = fixture().await;
        let mut protected = draft(&f, f.open, f.closed);
        protected.is_default = true;
        let id = f.table.add_rule(protected).await.unwrap();

        assert!(matches!(
            f.table.deactivate_rule(id).await.unwrap_err(),
            TransitionError::DefaultRuleProtected { .. }
        ));
        assert!(matches!(
            f.table.delete_rule(id).await.unwrap_err(),
            TransitionError::DefaultRuleProtected { .. }
        ));
        assert!(f.table.get_rule(id).await.unwrap().is_active);
    }

    #[tokio::test]
    async fn test_delete_requires_deactivation() {
        let f = fixture().await;
        let id = f.table.add_rule(draft(&f, f.open, f.closed)).await.unwrap();

        assert!(matches!(
            f.table.delete_rule(id).await.unwrap_err(),
            TransitionError::ActiveRuleDeletion { .. }
        ));

        f.table.deactivate_rule(id).await.unwrap();
        f.table.delete_rule(id).await.unwrap();
        assert!(matches!(
            f.table.get_rule(id).await.unwrap_err(),
            TransitionError::NotFound { kind: EntryKind::Rule, .. }
        ));
    }

    #[tokio::test]
    async fn test_activate_revalidates_references() {
        let f = fixture().await;
        let id = f.table.add_rule(draft(&f, f.open, f.closed)).await.unwrap();
        f.table.deactivate_rule(id).await.unwrap();

        let mut close: Action = f.store.get_by_id(f.close).await.unwrap().unwrap();
        close.is_active = false;
        f.store.update(close.clone()).await.unwrap();

        assert!(matches!(
            f.table.activate_rule(id).await.unwrap_err(),
            TransitionError::UnknownReference { reason: ReferenceProblem::Inactive, .. }
        ));

        close.is_active = true;
        f.store.update(close).await.unwrap();
        assert!(f.table.activate_rule(id).await.unwrap().is_active);
    }

    #[tokio::test]
    async fn test_storage_failure_is_not_translated() {
        let f = fixture().await;
        f.store.set_unavailable(true);

        let err = f.table.add_rule(draft(&f, f.open, f.closed)).await.unwrap_err();
        assert!(matches!(err, TransitionError::Storage(StoreError::Unavailable { .. })));
    }
}
