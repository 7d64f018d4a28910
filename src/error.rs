use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// The kinds of records the engine manages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntryKind {
    Status,
    Action,
    TicketType,
    Rule,
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EntryKind::Status => "status",
            EntryKind::Action => "action",
            EntryKind::TicketType => "ticket type",
            EntryKind::Rule => "transition rule",
        };
        f.write_str(name)
    }
}

/// Why a reference failed validation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReferenceProblem {
    Missing,
    Inactive,
}

impl fmt::Display for ReferenceProblem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReferenceProblem::Missing => f.write_str("does not exist"),
            ReferenceProblem::Inactive => f.write_str("is not active"),
        }
    }
}

/// Infrastructure failures raised by a store implementation.
///
/// These are surfaced to callers unmodified; the only variant the engine
/// inspects is `UniqueViolation`, which is the storage-level signal for a
/// duplicate code or a duplicate rule triple.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("unique constraint violated: {constraint}")]
    UniqueViolation { constraint: String },

    #[error("storage unavailable: {reason}")]
    Unavailable { reason: String },

    #[error("stored record is corrupt: {reason}")]
    Corrupt { reason: String },

    #[cfg(feature = "database")]
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[cfg(feature = "database")]
    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// Every failure the transition engine can report
#[derive(Debug, Error)]
pub enum TransitionError {
    #[error("{kind} '{reference}' {reason}")]
    UnknownReference {
        kind: EntryKind,
        reference: String,
        reason: ReferenceProblem,
    },

    #[error("a rule for ({from_status}, {action}, {ticket_type}) already exists")]
    DuplicateTransition {
        from_status: String,
        action: String,
        ticket_type: String,
    },

    #[error("{kind} code '{code}' already exists")]
    DuplicateCode { kind: EntryKind, code: String },

    #[error("invalid code '{code}': codes must start with a letter and contain only letters, digits and underscores")]
    InvalidCode { code: String },

    #[error("{kind} '{key}' not found")]
    NotFound { kind: EntryKind, key: String },

    #[error("{kind} '{code}' is a default entry and cannot be deactivated or deleted")]
    DefaultEntryProtected { kind: EntryKind, code: String },

    #[error("transition rule {rule_id} is a default rule and cannot be deactivated or deleted")]
    DefaultRuleProtected { rule_id: String },

    #[error("{kind} '{code}' is referenced by {rule_count} transition rule(s)")]
    EntryInUse {
        kind: EntryKind,
        code: String,
        rule_count: usize,
    },

    #[error("transition rule {rule_id} is still active; deactivate it before deleting")]
    ActiveRuleDeletion { rule_id: String },

    #[error("status '{status}' is terminal; no further transitions are possible")]
    TerminalStatus { status: String },

    #[error("status '{status}' is terminal and cannot be the source of a rule")]
    TerminalStatusHasNoOutgoingRule { status: String },

    #[error("{kind} '{code}' is not active")]
    InactiveReference { kind: EntryKind, code: String },

    #[error("action '{action}' is not defined for status '{status}' on ticket type '{ticket_type}'")]
    NoMatchingTransition {
        status: String,
        action: String,
        ticket_type: String,
    },

    #[error("transition rule {rule_id} for action '{action}' from status '{status}' is disabled")]
    TransitionDisabled {
        rule_id: String,
        status: String,
        action: String,
    },

    #[error(transparent)]
    Storage(#[from] StoreError),
}

/// How a caller should present an error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCategory {
    /// The requested action is not available for the ticket right now
    Unavailable,
    /// Administrator input failed validation
    Validation,
    /// A protected record was targeted by a destructive operation
    Protected,
    /// The storage layer failed
    Infrastructure,
}

impl TransitionError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            TransitionError::NoMatchingTransition { .. }
            | TransitionError::TransitionDisabled { .. }
            | TransitionError::TerminalStatus { .. }
            | TransitionError::InactiveReference { .. } => ErrorCategory::Unavailable,
            TransitionError::UnknownReference { .. }
            | TransitionError::DuplicateTransition { .. }
            | TransitionError::DuplicateCode { .. }
            | TransitionError::InvalidCode { .. }
            | TransitionError::NotFound { .. }
            | TransitionError::TerminalStatusHasNoOutgoingRule { .. } => ErrorCategory::Validation,
            TransitionError::DefaultEntryProtected { .. }
            | TransitionError::DefaultRuleProtected { .. }
            | TransitionError::EntryInUse { .. }
            | TransitionError::ActiveRuleDeletion { .. } => ErrorCategory::Protected,
            TransitionError::Storage(_) => ErrorCategory::Infrastructure,
        }
    }

    /// Short stable identifier, used in logs and audit events
    pub fn code(&self) -> &'static str {
        match self {
            TransitionError::UnknownReference { .. } => "UNKNOWN_REFERENCE",
            TransitionError::DuplicateTransition { .. } => "DUPLICATE_TRANSITION",
            TransitionError::DuplicateCode { .. } => "DUPLICATE_CODE",
            TransitionError::InvalidCode { .. } => "INVALID_CODE",
            TransitionError::NotFound { .. } => "NOT_FOUND",
            TransitionError::DefaultEntryProtected { .. } => "DEFAULT_ENTRY_PROTECTED",
            TransitionError::DefaultRuleProtected { .. } => "DEFAULT_RULE_PROTECTED",
            TransitionError::EntryInUse { .. } => "ENTRY_IN_USE",
            TransitionError::ActiveRuleDeletion { .. } => "ACTIVE_RULE_DELETION",
            TransitionError::TerminalStatus { .. } => "TERMINAL_STATUS",
            TransitionError::TerminalStatusHasNoOutgoingRule { .. } => {
                "TERMINAL_STATUS_HAS_NO_OUTGOING_RULE"
            }
            TransitionError::InactiveReference { .. } => "INACTIVE_REFERENCE",
            TransitionError::NoMatchingTransition { .. } => "NO_MATCHING_TRANSITION",
            TransitionError::TransitionDisabled { .. } => "TRANSITION_DISABLED",
            TransitionError::Storage(_) => "STORAGE",
        }
    }

    pub fn is_infrastructure(&self) -> bool {
        matches!(self, TransitionError::Storage(_))
    }
}

pub type Result<T, E = TransitionError> = std::result::Result<T, E>;
