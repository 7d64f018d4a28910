// Audit trail for resolutions and administrative changes

use serde::Serialize;
use tracing::{info, warn};

use crate::catalog::Code;
use crate::error::EntryKind;
use crate::rules::RuleId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ChangeKind {
    Created,
    Updated,
    Activated,
    Deactivated,
    Deleted,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum AuditEvent {
    CatalogChanged {
        kind: EntryKind,
        code: Code,
        change: ChangeKind,
    },
    RuleChanged {
        rule_id: RuleId,
        change: ChangeKind,
    },
    TransitionResolved {
        status: Code,
        action: Code,
        ticket_type: Code,
        to_status: Code,
        rule_id: RuleId,
        description: String,
    },
    TransitionRejected {
        status: String,
        action: String,
        ticket_type: String,
        reason: &'static str,
    },
}

/// Receives one event per resolution and per administrative mutation
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
pub trait AuditSink: Send + Sync {
    fn record(&self, event: &AuditEvent);
}

/// Writes audit events to the tracing subscriber
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn record(&self, event: &AuditEvent) {
        match event {
            AuditEvent::CatalogChanged { kind, code, change } => {
                info!(kind = %kind, code = %code, change = ?change, "Catalog entry changed");
            }
            AuditEvent::RuleChanged { rule_id, change } => {
                info!(rule.id = %rule_id, change = ?change, "Transition rule changed");
            }
            AuditEvent::TransitionResolved {
                status,
                action,
                ticket_type,
                to_status,
                rule_id,
                description,
            } => {
                info!(
                    status = %status,
                    action = %action,
                    ticket_type = %ticket_type,
                    to_status = %to_status,
                    rule.id = %rule_id,
                    description = %description,
                    "Transition resolved"
                );
            }
            AuditEvent::TransitionRejected {
                status,
                action,
                ticket_type,
                reason,
            } => {
                warn!(
                    status = %status,
                    action = %action,
                    ticket_type = %ticket_type,
                    reason = reason,
                    "Transition rejected"
                );
            }
        }
    }
}
