use std::marker::PhantomData;
use std::sync::Arc;
use tracing::info;

use super::{CatalogEntry, Code, Id, Protected};
use crate::audit::{AuditEvent, AuditSink, ChangeKind};
use crate::error::{Result, StoreError, TransitionError};
use crate::store::{CatalogRepository, RuleRepository};

/// Administration and lookup for one catalog (statuses, actions or ticket types)
pub struct Catalog<E, S> {
    store: Arc<S>,
    audit: Arc<dyn AuditSink>,
    _entry: PhantomData<fn() -> E>,
}

impl<E, S> Clone for Catalog<E, S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            audit: Arc::clone(&self.audit),
            _entry: PhantomData,
        }
    }
}

impl<E, S> Catalog<E, S>
where
    E: CatalogEntry,
    S: CatalogRepository<E> + RuleRepository,
{
    pub fn new(store: Arc<S>, audit: Arc<dyn AuditSink>) -> Self {
        Self {
            store,
            audit,
            _entry: PhantomData,
        }
    }

    pub async fn list(&self, active_only: bool) -> Result<Vec<E>> {
        Ok(self.store.list(active_only).await?)
    }

    pub async fn find(&self, id: Id<E>) -> Result<Option<E>> {
        Ok(self.store.get_by_id(id).await?)
    }

    pub async fn get(&self, id: Id<E>) -> Result<E> {
        self.find(id).await?.ok_or_else(|| TransitionError::NotFound {
            kind: E::KIND,
            key: id.to_string(),
        })
    }

    pub async fn find_by_code(&self, code: &Code) -> Result<Option<E>> {
        Ok(self.store.get_by_code(code).await?)
    }

    /// Lookup by code; the code is normalised first, so case does not matter
    pub async fn get_by_code(&self, code: &str) -> Result<E> {
        let code = Code::parse(code)?;
        self.find_by_code(&code)
            .await?
            .ok_or_else(|| TransitionError::NotFound {
                kind: E::KIND,
                key: code.to_string(),
            })
    }

    pub async fn create(&self, entry: E) -> Result<Id<E>> {
        if self.find_by_code(entry.code()).await?.is_some() {
            return Err(self.duplicate(entry.code()));
        }

        let id = entry.id();
        let code = entry.code().clone();
        self.store.insert(entry).await.map_err(|err| match err {
            StoreError::UniqueViolation { .. } => self.duplicate(&code),
            other => other.into(),
        })?;

        info!(kind = %E::KIND, code = %code, "Catalog entry created");
        self.record(&code, ChangeKind::Created);
        Ok(id)
    }

    pub async fn relabel(&self, id: Id<E>, label: impl Into<String>) -> Result<E> {
        let mut entry = self.get(id).await?;
        entry.set_label(label.into());
        self.store.update(entry.clone()).await?;
        self.record(entry.code(), ChangeKind::Updated);
        Ok(entry)
    }

    pub async fn deactivate(&self, id: Id<E>) -> Result<E> {
        let mut entry = self.get(id).await?;
        self.ensure_unprotected(&entry)?;
        if !entry.is_active() {
            return Ok(entry);
        }
        entry.set_active(false);
        self.store.update(entry.clone()).await?;

        info!(kind = %E::KIND, code = %entry.code(), "Catalog entry deactivated");
        self.record(entry.code(), ChangeKind::Deactivated);
        Ok(entry)
    }

    pub async fn activate(&self, id: Id<E>) -> Result<E> {
        let mut entry = self.get(id).await?;
        if entry.is_active() {
            return Ok(entry);
        }
        entry.set_active(true);
        self.store.update(entry.clone()).await?;
        self.record(entry.code(), ChangeKind::Activated);
        Ok(entry)
    }

    /// Hard delete; refused for default entries and for entries rules still point at
    pub async fn delete(&self, id: Id<E>) -> Result<()> {
        let entry = self.get(id).await?;
        self.ensure_unprotected(&entry)?;

        let rule_count = self
            .store
            .count_rules_referencing(entry.rule_reference())
            .await?;
        if rule_count > 0 {
            return Err(TransitionError::EntryInUse {
                kind: E::KIND,
                code: entry.code().to_string(),
                rule_count,
            });
        }

        CatalogRepository::<E>::remove(&*self.store, id).await?;
        info!(kind = %E::KIND, code = %entry.code(), "Catalog entry deleted");
        self.record(entry.code(), ChangeKind::Deleted);
        Ok(())
    }

    fn ensure_unprotected(&self, entry: &E) -> Result<()> {
        if entry.is_protected() {
            return Err(TransitionError::DefaultEntryProtected {
                kind: E::KIND,
                code: entry.code().to_string(),
            });
        }
        Ok(())
    }

    fn duplicate(&self, code: &Code) -> TransitionError {
        TransitionError::DuplicateCode {
            kind: E::KIND,
            code: code.to_string(),
        }
    }

    fn record(&self, code: &Code, change: ChangeKind) {
        self.audit.record(&AuditEvent::CatalogChanged {
            kind: E::KIND,
            code: code.clone(),
            change,
        });
    }
}
