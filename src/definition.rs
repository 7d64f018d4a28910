// Workflow definitions: catalogs and rules described in one TOML document
//
//   [[statuses]]
//   code = "OPEN"
//   label = "Open"
//
//   [[rules]]
//   from_status = "OPEN"
//   action = "ASSIGN"
//   ticket_type = "REPAIR"
//   to_status = "ASSIGNED"
//
// Applying a definition goes through the regular catalog and rule
// operations, so a bad definition fails with the same error a direct call
// would. Entries created before the failing one are kept.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;
use tracing::info;

use crate::catalog::{Action, Status, TicketType};
use crate::engine::TransitionEngine;
use crate::error::TransitionError;
use crate::rules::RuleSpec;
use crate::store::TransitionStore;

#[derive(Debug, Error)]
pub enum DefinitionError {
    #[error("failed to read workflow definition {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid workflow definition: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("failed to encode workflow definition: {0}")]
    Encode(#[from] toml::ser::Error),
    #[error(transparent)]
    Transition(#[from] TransitionError),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusSpec {
    pub code: String,
    pub label: String,
    #[serde(default)]
    pub terminal: bool,
    #[serde(default)]
    pub is_default: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionSpec {
    pub code: String,
    pub label: String,
    #[serde(default)]
    pub is_default: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TicketTypeSpec {
    pub code: String,
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub department_id: Option<String>,
    #[serde(default)]
    pub is_default: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkflowDefinition {
    #[serde(default)]
    pub statuses: Vec<StatusSpec>,
    #[serde(default)]
    pub actions: Vec<ActionSpec>,
    #[serde(default)]
    pub ticket_types: Vec<TicketTypeSpec>,
    #[serde(default)]
    pub rules: Vec<RuleSpec>,
}

/// Number of records created by [`WorkflowDefinition::apply`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    pub statuses: usize,
    pub actions: usize,
    pub ticket_types: usize,
    pub rules: usize,
}

impl WorkflowDefinition {
    pub fn from_toml_str(raw: &str) -> Result<Self, DefinitionError> {
        Ok(toml::from_str(raw)?)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, DefinitionError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| DefinitionError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&raw)
    }

    pub fn to_toml_string(&self) -> Result<String, DefinitionError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Create every entry and rule; catalogs first, then rules in document order
    pub async fn apply<S: TransitionStore>(
        &self,
        engine: &TransitionEngine<S>,
    ) -> Result<ImportSummary, TransitionError> {
        let mut summary = ImportSummary::default();

        for spec in &self.statuses {
            let mut status = Status::new(&spec.code, spec.label.clone())?;
            if spec.terminal {
                status = status.terminal();
            }
            if spec.is_default {
                status = status.as_default();
            }
            engine.statuses().create(status).await?;
            summary.statuses += 1;
        }

        for spec in &self.actions {
            let mut action = Action::new(&spec.code, spec.label.clone())?;
            if spec.is_default {
                action = action.as_default();
            }
            engine.actions().create(action).await?;
            summary.actions += 1;
        }

        for spec in &self.ticket_types {
            let mut ticket_type = TicketType::new(&spec.code, spec.label.clone())?;
            if let Some(department) = &spec.department_id {
                ticket_type = ticket_type.with_department(department.clone());
            }
            if spec.is_default {
                ticket_type = ticket_type.as_default();
            }
            engine.ticket_types().create(ticket_type).await?;
            summary.ticket_types += 1;
        }

        for spec in &self.rules {
            engine.admin().add(spec).await?;
            summary.rules += 1;
        }

        info!(
            statuses = summary.statuses,
            actions = summary.actions,
            ticket_types = summary.ticket_types,
            rules = summary.rules,
            "Workflow definition applied"
        );
        Ok(summary)
    }
}

fn status(code: &str, label: &str) -> StatusSpec {
    StatusSpec {
        code: code.to_string(),
        label: label.to_string(),
        terminal: false,
        is_default: false,
    }
}

fn action(code: &str, label: &str) -> ActionSpec {
    ActionSpec {
        code: code.to_string(),
        label: label.to_string(),
        is_default: false,
    }
}

fn repair_rule(from: &str, action: &str, to: &str, description: &str) -> RuleSpec {
    RuleSpec {
        from_status: from.to_string(),
        action: action.to_string(),
        ticket_type: "REPAIR".to_string(),
        to_status: to.to_string(),
        description: description.to_string(),
        is_default: true,
    }
}

/// The repair shop's standard lifecycle; its entries and rules are all protected
pub fn default_repair_workflow() -> WorkflowDefinition {
    let mut statuses = vec![
        status("OPEN", "Open"),
        status("ASSIGNED", "Assigned"),
        status("IN_PROGRESS", "In progress"),
        status("ON_HOLD", "On hold"),
        status("RESOLVED", "Resolved"),
        status("CLOSED", "Closed"),
        status("CANCELLED", "Cancelled"),
    ];
    for spec in &mut statuses {
        spec.is_default = true;
        spec.terminal = matches!(spec.code.as_str(), "CLOSED" | "CANCELLED");
    }

    let mut actions = vec![
        action("ASSIGN", "Assign technician"),
        action("START_WORK", "Start work"),
        action("HOLD", "Put on hold"),
        action("RESUME", "Resume work"),
        action("RESOLVE", "Mark resolved"),
        action("CLOSE", "Close ticket"),
        action("REOPEN", "Reopen ticket"),
        action("CANCEL", "Cancel ticket"),
    ];
    for spec in &mut actions {
        spec.is_default = true;
    }

    let ticket_types = vec![TicketTypeSpec {
        code: "REPAIR".to_string(),
        label: "Repair".to_string(),
        department_id: None,
        is_default: true,
    }];

    let rules = vec![
        repair_rule("OPEN", "ASSIGN", "ASSIGNED", "Technician assigned"),
        repair_rule("OPEN", "CANCEL", "CANCELLED", "Cancelled before assignment"),
        repair_rule("ASSIGNED", "START_WORK", "IN_PROGRESS", "Work started"),
        repair_rule("ASSIGNED", "CANCEL", "CANCELLED", "Cancelled after assignment"),
        repair_rule("IN_PROGRESS", "HOLD", "ON_HOLD", "Waiting on parts or customer"),
        repair_rule("IN_PROGRESS", "RESOLVE", "RESOLVED", "Repair completed"),
        repair_rule("ON_HOLD", "RESUME", "IN_PROGRESS", "Work resumed"),
        repair_rule("ON_HOLD", "CANCEL", "CANCELLED", "Cancelled while on hold"),
        repair_rule("RESOLVED", "CLOSE", "CLOSED", "Customer confirmed the repair"),
        repair_rule("RESOLVED", "REOPEN", "IN_PROGRESS", "Problem came back"),
    ];

    WorkflowDefinition {
        statuses,
        actions,
        ticket_types,
        rules,
    }
}
