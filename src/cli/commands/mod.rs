use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

use crate::config::CacheConfig;
use crate::definition::{default_repair_workflow, DefinitionError, WorkflowDefinition};
use crate::engine::TransitionEngine;
use crate::error::TransitionError;
use crate::store::InMemoryStore;

pub mod actions;
pub mod check;
pub mod export;
pub mod graph;
pub mod resolve;
pub mod rules;

/// Exit status for rejected transitions and invalid administrative input
pub const EXIT_REJECTED: u8 = 2;
/// Exit status for everything else (I/O, storage, configuration)
pub const EXIT_FAILURE: u8 = 1;

/// An engine over a fresh in-memory store, populated from a definition
pub struct LoadedWorkflow {
    pub engine: TransitionEngine<InMemoryStore>,
    pub definition: WorkflowDefinition,
}

pub async fn load_workflow(path: Option<&Path>, cache: &CacheConfig) -> Result<LoadedWorkflow> {
    let definition = match path {
        Some(path) => WorkflowDefinition::from_path(path)?,
        None => default_repair_workflow(),
    };

    let engine = TransitionEngine::with_cache_config(Arc::new(InMemoryStore::new()), cache);
    let summary = definition
        .apply(&engine)
        .await
        .map_err(DefinitionError::from)
        .with_context(|| match path {
            Some(path) => format!("workflow definition {} is invalid", path.display()),
            None => "built-in workflow definition is invalid".to_string(),
        })?;
    info!(rules = summary.rules, "Workflow loaded");

    Ok(LoadedWorkflow { engine, definition })
}

/// Map a command failure to the process exit status
pub fn exit_code(err: &anyhow::Error) -> u8 {
    let transition = err.downcast_ref::<TransitionError>().or_else(|| {
        match err.downcast_ref::<DefinitionError>() {
            Some(DefinitionError::Transition(inner)) => Some(inner),
            _ => None,
        }
    });
    match transition {
        Some(inner) if !inner.is_infrastructure() => EXIT_REJECTED,
        _ => EXIT_FAILURE,
    }
}

pub(crate) fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
