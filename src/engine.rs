// The transition engine: one handle over the catalogs, the rule table,
// rule administration and the resolver, all sharing a store and a cache

use std::sync::Arc;
use tracing::info;

use crate::audit::{AuditSink, TracingAuditSink};
use crate::catalog::{Action, Catalog, Code, Status, TicketType};
use crate::config::CacheConfig;
use crate::error::Result;
use crate::graph::LifecycleGraph;
use crate::resolver::{Resolution, TransitionRequest, TransitionResolver};
use crate::rules::{RuleAdmin, RuleCache, RuleFilter, TransitionTable};
use crate::store::TransitionStore;

pub struct TransitionEngine<S> {
    store: Arc<S>,
    statuses: Catalog<Status, S>,
    actions: Catalog<Action, S>,
    ticket_types: Catalog<TicketType, S>,
    table: TransitionTable<S>,
    admin: RuleAdmin<S>,
    resolver: TransitionResolver<S>,
}

impl<S> Clone for TransitionEngine<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            statuses: self.statuses.clone(),
            actions: self.actions.clone(),
            ticket_types: self.ticket_types.clone(),
            table: self.table.clone(),
            admin: self.admin.clone(),
            resolver: self.resolver.clone(),
        }
    }
}

impl<S: TransitionStore> TransitionEngine<S> {
    pub fn new(store: Arc<S>, cache: RuleCache, audit: Arc<dyn AuditSink>) -> Self {
        let statuses = Catalog::new(Arc::clone(&store), Arc::clone(&audit));
        let actions = Catalog::new(Arc::clone(&store), Arc::clone(&audit));
        let ticket_types = Catalog::new(Arc::clone(&store), Arc::clone(&audit));
        let table = TransitionTable::new(Arc::clone(&store), cache, Arc::clone(&audit));
        let admin = RuleAdmin::new(
            table.clone(),
            statuses.clone(),
            actions.clone(),
            ticket_types.clone(),
        );
        let resolver = TransitionResolver::new(
            statuses.clone(),
            actions.clone(),
            ticket_types.clone(),
            table.clone(),
            audit,
        );

        Self {
            store,
            statuses,
            actions,
            ticket_types,
            table,
            admin,
            resolver,
        }
    }

    /// Engine with a cache built from `config` and audit events sent to tracing
    pub fn with_cache_config(store: Arc<S>, config: &CacheConfig) -> Self {
        info!(
            cache.enabled = config.enabled,
            cache.ttl_seconds = config.ttl_seconds,
            "Creating transition engine"
        );
        Self::new(store, RuleCache::new(config), Arc::new(TracingAuditSink))
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn statuses(&self) -> &Catalog<Status, S> {
        &self.statuses
    }

    pub fn actions(&self) -> &Catalog<Action, S> {
        &self.actions
    }

    pub fn ticket_types(&self) -> &Catalog<TicketType, S> {
        &self.ticket_types
    }

    /// Id-based rule operations
    pub fn rules(&self) -> &TransitionTable<S> {
        &self.table
    }

    /// Code-based rule operations
    pub fn admin(&self) -> &RuleAdmin<S> {
        &self.admin
    }

    /// Drop cached rules, e.g. after another process changed the table
    pub async fn refresh_rules(&self) {
        self.table.clear_cache().await;
    }

    pub async fn resolve_transition(
        &self,
        current_status: &str,
        action: &str,
        ticket_type: &str,
    ) -> Result<Resolution> {
        self.resolver
            .resolve(&TransitionRequest::new(current_status, action, ticket_type))
            .await
    }

    pub async fn resolve(&self, request: &TransitionRequest) -> Result<Resolution> {
        self.resolver.resolve(request).await
    }

    pub async fn list_applicable_actions(
        &self,
        current_status: &str,
        ticket_type: &str,
    ) -> Result<Vec<Code>> {
        self.resolver
            .applicable_actions(current_status, ticket_type)
            .await
    }

    /// State machine of one ticket type; an inactive type has no edges
    pub async fn lifecycle_graph(&self, ticket_type: &str) -> Result<LifecycleGraph> {
        let ticket_type = self.ticket_types.get_by_code(ticket_type).await?;
        let statuses = self.statuses.list(true).await?;
        let actions = self.actions.list(true).await?;
        let rules = if ticket_type.is_active {
            self.table
                .list_rules(&RuleFilter::for_ticket_type(ticket_type.id).active_only())
                .await?
        } else {
            Vec::new()
        };

        Ok(LifecycleGraph::build(
            ticket_type.code,
            &statuses,
            &actions,
            &rules,
        ))
    }
}
