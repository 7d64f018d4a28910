use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;
use tracing::debug;

use super::{code_constraint, CatalogRepository, RuleRepository, RULE_TRIPLE_CONSTRAINT};
use crate::catalog::{Action, CatalogEntry, Code, Id, Status, TicketType};
use crate::error::StoreError;
use crate::rules::{RuleFilter, RuleId, RuleReference, TransitionKey, TransitionRule};

#[derive(Debug, Default)]
struct MemoryState {
    statuses: HashMap<Id<Status>, Status>,
    actions: HashMap<Id<Action>, Action>,
    ticket_types: HashMap<Id<TicketType>, TicketType>,
    rules: HashMap<RuleId, TransitionRule>,
    rule_index: HashMap<TransitionKey, RuleId>,
}

/// Process-local store.
///
/// All reads and writes go through one `RwLock`, so the uniqueness checks
/// and the insert that follows them are a single atomic step.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    state: RwLock<MemoryState>,
    unavailable: AtomicBool,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call fail with `StoreError::Unavailable`
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<(), StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable {
                reason: "in-memory store marked unavailable".to_string(),
            });
        }
        Ok(())
    }

    pub async fn rule_count(&self) -> usize {
        self.state.read().await.rules.len()
    }
}

macro_rules! impl_memory_catalog {
    ($entry:ty, $field:ident) => {
        #[async_trait]
        impl CatalogRepository<$entry> for InMemoryStore {
            async fn get_by_id(&self, id: Id<$entry>) -> Result<Option<$entry>, StoreError> {
                self.check_available()?;
                let state = self.state.read().await;
                Ok(state.$field.get(&id).cloned())
            }

            async fn get_by_code(&self, code: &Code) -> Result<Option<$entry>, StoreError> {
                self.check_available()?;
                let state = self.state.read().await;
                Ok(state.$field.values().find(|entry| &entry.code == code).cloned())
            }

            async fn list(&self, active_only: bool) -> Result<Vec<$entry>, StoreError> {
                self.check_available()?;
                let state = self.state.read().await;
                let mut entries: Vec<$entry> = state
                    .$field
                    .values()
                    .filter(|entry| !active_only || entry.is_active)
                    .cloned()
                    .collect();
                entries.sort_by(|a, b| {
                    a.created_at
                        .cmp(&b.created_at)
                        .then_with(|| a.code.cmp(&b.code))
                });
                Ok(entries)
            }

            async fn insert(&self, entry: $entry) -> Result<(), StoreError> {
                self.check_available()?;
                let mut state = self.state.write().await;
                if state.$field.values().any(|existing| existing.code == entry.code) {
                    return Err(StoreError::UniqueViolation {
                        constraint: code_constraint::<$entry>(),
                    });
                }
                let kind = <$entry as CatalogEntry>::KIND;
                debug!(kind = %kind, code = %entry.code, "Inserting catalog entry");
                state.$field.insert(entry.id, entry);
                Ok(())
            }

            async fn update(&self, entry: $entry) -> Result<(), StoreError> {
                self.check_available()?;
                let mut state = self.state.write().await;
                if state
                    .$field
                    .values()
                    .any(|existing| existing.code == entry.code && existing.id != entry.id)
                {
                    return Err(StoreError::UniqueViolation {
                        constraint: code_constraint::<$entry>(),
                    });
                }
                state.$field.insert(entry.id, entry);
                Ok(())
            }

            async fn remove(&self, id: Id<$entry>) -> Result<bool, StoreError> {
                self.check_available()?;
                let mut state = self.state.write().await;
                Ok(state.$field.remove(&id).is_some())
            }
        }
    };
}

impl_memory_catalog!(Status, statuses);
impl_memory_catalog!(Action, actions);
impl_memory_catalog!(TicketType, ticket_types);

#[async_trait]
impl RuleRepository for InMemoryStore {
    async fn get_rule(&self, id: RuleId) -> Result<Option<TransitionRule>, StoreError> {
        self.check_available()?;
        let state = self.state.read().await;
        Ok(state.rules.get(&id).cloned())
    }

    async fn find_rule(&self, key: &TransitionKey) -> Result<Option<TransitionRule>, StoreError> {
        self.check_available()?;
        let state = self.state.read().await;
        Ok(state
            .rule_index
            .get(key)
            .and_then(|id| state.rules.get(id))
            .cloned())
    }

    async fn list_rules(&self, filter: &RuleFilter) -> Result<Vec<TransitionRule>, StoreError> {
        self.check_available()?;
        let state = self.state.read().await;
        let mut rules: Vec<TransitionRule> = state
            .rules
            .values()
            .filter(|rule| filter.matches(rule))
            .cloned()
            .collect();
        rules.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(rules)
    }

    async fn insert_rule(&self, rule: TransitionRule) -> Result<(), StoreError> {
        self.check_available()?;
        let mut state = self.state.write().await;
        let key = rule.key();
        if state.rule_index.contains_key(&key) {
            return Err(StoreError::UniqueViolation {
                constraint: RULE_TRIPLE_CONSTRAINT.to_string(),
            });
        }
        state.rule_index.insert(key, rule.id);
        state.rules.insert(rule.id, rule);
        Ok(())
    }

    async fn update_rule(&self, rule: TransitionRule) -> Result<(), StoreError> {
        self.check_available()?;
        let mut state = self.state.write().await;
        let key = rule.key();
        if let Some(owner) = state.rule_index.get(&key) {
            if *owner != rule.id {
                return Err(StoreError::UniqueViolation {
                    constraint: RULE_TRIPLE_CONSTRAINT.to_string(),
                });
            }
        }
        if let Some(previous) = state.rules.get(&rule.id).map(TransitionRule::key) {
            state.rule_index.remove(&previous);
        }
        state.rule_index.insert(key, rule.id);
        state.rules.insert(rule.id, rule);
        Ok(())
    }

    async fn remove_rule(&self, id: RuleId) -> Result<bool, StoreError> {
        self.check_available()?;
        let mut state = self.state.write().await;
        match state.rules.remove(&id) {
            Some(rule) => {
                state.rule_index.remove(&rule.key());
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn count_rules_referencing(&self, reference: RuleReference) -> Result<usize, StoreError> {
        self.check_available()?;
        let state = self.state.read().await;
        Ok(state
            .rules
            .values()
            .filter(|rule| reference.is_referenced_by(rule))
            .count())
    }
}
