// ticket-flow: status transition engine for repair-shop tickets
//
// Statuses, actions and ticket types are reference data; transition rules map
// (status, action, ticket type) to a target status. The engine validates
// rules when they are written and resolves transitions when tickets move.

pub mod audit;
pub mod catalog;
pub mod cli;
pub mod config;
pub mod definition;
pub mod engine;
pub mod error;
pub mod graph;
pub mod observability;
pub mod resolver;
pub mod rules;
pub mod store;
pub mod telemetry;

// Re-export key types for easy access
pub use audit::{AuditEvent, AuditSink, ChangeKind, TracingAuditSink};
pub use catalog::{Action, Catalog, CatalogEntry, Code, Id, Protected, Status, TicketType};
pub use config::{config, init_config, CacheConfig, TicketFlowConfig};
pub use definition::{default_repair_workflow, DefinitionError, WorkflowDefinition};
pub use engine::TransitionEngine;
pub use error::{EntryKind, ErrorCategory, ReferenceProblem, Result, StoreError, TransitionError};
pub use graph::LifecycleGraph;
pub use observability::{engine_metrics, EngineMetrics, OperationTimer};
pub use resolver::{Resolution, TransitionRequest, TransitionResolver};
pub use rules::{
    RuleAdmin, RuleCache, RuleDraft, RuleFilter, RuleId, RulePatch, RuleQuery, RuleSpec,
    RuleUpdate, RuleView, TransitionKey, TransitionRule, TransitionTable,
};
pub use store::{CatalogRepository, InMemoryStore, RuleRepository, TransitionStore};
#[cfg(feature = "database")]
pub use store::SqliteStore;
pub use telemetry::{create_resolution_span, generate_correlation_id, init_telemetry};
