use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::catalog::{Action, Code, Id, Protected, Status, TicketType};

pub type RuleId = Id<TransitionRule>;

/// The lookup triple of a rule: at most one rule exists per key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TransitionKey {
    pub from_status: Id<Status>,
    pub action: Id<Action>,
    pub ticket_type: Id<TicketType>,
}

impl TransitionKey {
    pub fn new(from_status: Id<Status>, action: Id<Action>, ticket_type: Id<TicketType>) -> Self {
        Self {
            from_status,
            action,
            ticket_type,
        }
    }
}

/// A declared mapping (status, action, ticket type) -> target status
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionRule {
    pub id: RuleId,
    pub from_status: Id<Status>,
    pub action: Id<Action>,
    pub to_status: Id<Status>,
    pub ticket_type: Id<TicketType>,
    pub description: String,
    pub is_active: bool,
    pub is_default: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TransitionRule {
    pub fn key(&self) -> TransitionKey {
        TransitionKey::new(self.from_status, self.action, self.ticket_type)
    }

    pub fn is_self_transition(&self) -> bool {
        self.from_status == self.to_status
    }
}

impl Protected for TransitionRule {
    fn is_protected(&self) -> bool {
        self.is_default
    }
}

/// Input for creating a rule, by id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleDraft {
    pub from_status: Id<Status>,
    pub action: Id<Action>,
    pub ticket_type: Id<TicketType>,
    pub to_status: Id<Status>,
    pub description: String,
    #[serde(default)]
    pub is_default: bool,
}

impl RuleDraft {
    pub fn key(&self) -> TransitionKey {
        TransitionKey::new(self.from_status, self.action, self.ticket_type)
    }

    pub(crate) fn into_rule(self) -> TransitionRule {
        let now = Utc::now();
        TransitionRule {
            id: RuleId::new(),
            from_status: self.from_status,
            action: self.action,
            to_status: self.to_status,
            ticket_type: self.ticket_type,
            description: self.description,
            is_active: true,
            is_default: self.is_default,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Partial update of a rule; `None` leaves a field unchanged
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuleUpdate {
    pub from_status: Option<Id<Status>>,
    pub action: Option<Id<Action>>,
    pub ticket_type: Option<Id<TicketType>>,
    pub to_status: Option<Id<Status>>,
    pub description: Option<String>,
}

impl RuleUpdate {
    pub fn is_empty(&self) -> bool {
        self.from_status.is_none()
            && self.action.is_none()
            && self.ticket_type.is_none()
            && self.to_status.is_none()
            && self.description.is_none()
    }

    pub(crate) fn apply_to(&self, rule: &TransitionRule) -> TransitionRule {
        let mut updated = rule.clone();
        if let Some(from_status) = self.from_status {
            updated.from_status = from_status;
        }
        if let Some(action) = self.action {
            updated.action = action;
        }
        if let Some(ticket_type) = self.ticket_type {
            updated.ticket_type = ticket_type;
        }
        if let Some(to_status) = self.to_status {
            updated.to_status = to_status;
        }
        if let Some(description) = &self.description {
            updated.description = description.clone();
        }
        updated.updated_at = Utc::now();
        updated
    }
}

/// A catalog entry that rules may point at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RuleReference {
    Status(Id<Status>),
    Action(Id<Action>),
    TicketType(Id<TicketType>),
}

impl RuleReference {
    pub fn is_referenced_by(&self, rule: &TransitionRule) -> bool {
        match *self {
            RuleReference::Status(id) => rule.from_status == id || rule.to_status == id,
            RuleReference::Action(id) => rule.action == id,
            RuleReference::TicketType(id) => rule.ticket_type == id,
        }
    }
}

/// Listing filter; every set field must match
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RuleFilter {
    pub ticket_type: Option<Id<TicketType>>,
    pub from_status: Option<Id<Status>>,
    pub action: Option<Id<Action>>,
    pub active_only: bool,
}

impl RuleFilter {
    pub fn for_ticket_type(ticket_type: Id<TicketType>) -> Self {
        Self {
            ticket_type: Some(ticket_type),
            ..Default::default()
        }
    }

    pub fn from_status(mut self, status: Id<Status>) -> Self {
        self.from_status = Some(status);
        self
    }

    pub fn active_only(mut self) -> Self {
        self.active_only = true;
        self
    }

    pub fn matches(&self, rule: &TransitionRule) -> bool {
        self.ticket_type.map_or(true, |t| rule.ticket_type == t)
            && self.from_status.map_or(true, |s| rule.from_status == s)
            && self.action.map_or(true, |a| rule.action == a)
            && (!self.active_only || rule.is_active)
    }
}

/// A rule with its references populated, for display
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleView {
    pub id: RuleId,
    pub from_status: Code,
    pub action: Code,
    pub to_status: Code,
    pub ticket_type: Code,
    pub description: String,
    pub is_active: bool,
    pub is_default: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft() -> RuleDraft {
        RuleDraft {
            from_status: Id::new(),
            action: Id::new(),
            ticket_type: Id::new(),
            to_status: Id::new(),
            description: "close the ticket".to_string(),
            is_default: false,
        }
    }

    #[test]
    fn test_new_rules_start_active() {
        let rule = draft().into_rule();
        assert!(rule.is_active);
        assert!(!rule.is_protected());
        assert!(!rule.is_self_transition());
    }

    #[test]
    fn test_update_only_touches_given_fields() {
        let rule = draft().into_rule();
        let target = Id::new();
        let update = RuleUpdate {
            to_status: Some(target),
            ..Default::default()
        };
        let updated = update.apply_to(&rule);
        assert_eq!(updated.to_status, target);
        assert_eq!(updated.key(), rule.key());
        assert_eq!(updated.description, rule.description);
        assert_eq!(updated.id, rule.id);
    }

    #[test]
    fn test_filter_matching() {
        let mut rule = draft().into_rule();
        assert!(RuleFilter::default().matches(&rule));
        assert!(RuleFilter::for_ticket_type(rule.ticket_type)
            .from_status(rule.from_status)
            .matches(&rule));
        assert!(!RuleFilter::for_ticket_type(Id::new()).matches(&rule));

        rule.is_active = false;
        assert!(!RuleFilter::default().active_only().matches(&rule));
    }
}
