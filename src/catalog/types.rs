// Reference data for the transition engine: statuses, actions, ticket types

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use std::sync::LazyLock;
use uuid::Uuid;

use crate::error::{EntryKind, TransitionError};
use crate::rules::RuleReference;

/// Identifier of an entity of type `E`.
///
/// The phantom parameter keeps a status id from being passed where an
/// action id is expected; the stored value is a plain UUID.
pub struct Id<E> {
    uuid: Uuid,
    _entity: PhantomData<fn() -> E>,
}

impl<E> Id<E> {
    pub fn new() -> Self {
        Self::from_uuid(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self {
            uuid,
            _entity: PhantomData,
        }
    }

    pub fn parse_str(raw: &str) -> Result<Self, uuid::Error> {
        Uuid::parse_str(raw).map(Self::from_uuid)
    }

    pub fn as_uuid(&self) -> Uuid {
        self.uuid
    }
}

impl<E> Default for Id<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> Clone for Id<E> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<E> Copy for Id<E> {}

impl<E> PartialEq for Id<E> {
    fn eq(&self, other: &Self) -> bool {
        self.uuid == other.uuid
    }
}

impl<E> Eq for Id<E> {}

impl<E> PartialOrd for Id<E> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<E> Ord for Id<E> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.uuid.cmp(&other.uuid)
    }
}

impl<E> Hash for Id<E> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.uuid.hash(state);
    }
}

impl<E> fmt::Debug for Id<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Id({})", self.uuid)
    }
}

impl<E> fmt::Display for Id<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.uuid, f)
    }
}

impl<E> Serialize for Id<E> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.uuid.serialize(serializer)
    }
}

impl<'de, E> Deserialize<'de> for Id<E> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Uuid::deserialize(deserializer).map(Self::from_uuid)
    }
}

static CODE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Z][A-Z0-9_]*$").expect("code pattern is a valid regex")
});

/// Upper-case business code of a catalog entry (e.g. `OPEN`, `CLOSE_ACTION`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Code(String);

impl Code {
    /// Normalise (trim, upper-case) and validate a raw code
    pub fn parse(raw: &str) -> Result<Self, TransitionError> {
        let normalized = raw.trim().to_uppercase();
        if !CODE_PATTERN.is_match(&normalized) {
            return Err(TransitionError::InvalidCode {
                code: raw.to_string(),
            });
        }
        Ok(Self(normalized))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Code {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Code {
    type Error = TransitionError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Code::parse(&value)
    }
}

impl From<Code> for String {
    fn from(code: Code) -> Self {
        code.0
    }
}

impl AsRef<str> for Code {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Records whose destructive operations are guarded by the default flag
pub trait Protected {
    fn is_protected(&self) -> bool;
}

/// Common surface of the three catalogs
pub trait CatalogEntry: Protected + Clone + fmt::Debug + Send + Sync + 'static {
    const KIND: EntryKind;

    fn id(&self) -> Id<Self>;
    fn code(&self) -> &Code;
    fn label(&self) -> &str;
    fn is_active(&self) -> bool;
    fn created_at(&self) -> DateTime<Utc>;
    fn updated_at(&self) -> DateTime<Utc>;
    fn set_active(&mut self, active: bool);
    fn set_label(&mut self, label: String);

    /// How rules point at this entry
    fn rule_reference(&self) -> RuleReference;
}

/// A named state a ticket can be in
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Status {
    pub id: Id<Status>,
    pub code: Code,
    pub label: String,
    pub is_terminal: bool,
    pub is_active: bool,
    pub is_default: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Status {
    pub fn new(code: &str, label: impl Into<String>) -> Result<Self, TransitionError> {
        let now = Utc::now();
        Ok(Self {
            id: Id::new(),
            code: Code::parse(code)?,
            label: label.into(),
            is_terminal: false,
            is_active: true,
            is_default: false,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn terminal(mut self) -> Self {
        self.is_terminal = true;
        self
    }

    pub fn as_default(mut self) -> Self {
        self.is_default = true;
        self
    }
}

/// A named event that can trigger a status change
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    pub id: Id<Action>,
    pub code: Code,
    pub label: String,
    pub is_active: bool,
    pub is_default: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Action {
    pub fn new(code: &str, label: impl Into<String>) -> Result<Self, TransitionError> {
        let now = Utc::now();
        Ok(Self {
            id: Id::new(),
            code: Code::parse(code)?,
            label: label.into(),
            is_active: true,
            is_default: false,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn as_default(mut self) -> Self {
        self.is_default = true;
        self
    }
}

/// Category of ticket that transition rules are scoped to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TicketType {
    pub id: Id<TicketType>,
    pub code: Code,
    pub label: String,
    /// Owning department; departments live outside the engine
    pub department_id: Option<String>,
    pub is_active: bool,
    pub is_default: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TicketType {
    pub fn new(code: &str, label: impl Into<String>) -> Result<Self, TransitionError> {
        let now = Utc::now();
        Ok(Self {
            id: Id::new(),
            code: Code::parse(code)?,
            label: label.into(),
            department_id: None,
            is_active: true,
            is_default: false,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn with_department(mut self, department_id: impl Into<String>) -> Self {
        self.department_id = Some(department_id.into());
        self
    }

    pub fn as_default(mut self) -> Self {
        self.is_default = true;
        self
    }
}

macro_rules! impl_catalog_entry {
    ($entry:ty, $kind:expr, $variant:ident) => {
        impl Protected for $entry {
            fn is_protected(&self) -> bool {
                self.is_default
            }
        }

        impl CatalogEntry for $entry {
            const KIND: EntryKind = $kind;

            fn id(&self) -> Id<Self> {
                self.id
            }

            fn code(&self) -> &Code {
                &self.code
            }

            fn label(&self) -> &str {
                &self.label
            }

            fn is_active(&self) -> bool {
                self.is_active
            }

            fn created_at(&self) -> DateTime<Utc> {
                self.created_at
            }

            fn updated_at(&self) -> DateTime<Utc> {
                self.updated_at
            }

            fn set_active(&mut self, active: bool) {
                self.is_active = active;
                self.updated_at = Utc::now();
            }

            fn set_label(&mut self, label: String) {
                self.label = label;
                self.updated_at = Utc::now();
            }

            fn rule_reference(&self) -> RuleReference {
                RuleReference::$variant(self.id)
            }
        }
    };
}

impl_catalog_entry!(Status, EntryKind::Status, Status);
impl_catalog_entry!(Action, EntryKind::Action, Action);
impl_catalog_entry!(TicketType, EntryKind::TicketType, TicketType);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_normalization() {
        assert_eq!(Code::parse("open").unwrap().as_str(), "OPEN");
        assert_eq!(Code::parse("  close_action ").unwrap().as_str(), "CLOSE_ACTION");
        assert_eq!(Code::parse("Step2").unwrap().as_str(), "STEP2");
    }

    #[test]
    fn test_invalid_codes_rejected() {
        for raw in ["", "   ", "2FAST", "IN PROGRESS", "ON-HOLD"] {
            assert!(
                matches!(Code::parse(raw), Err(TransitionError::InvalidCode { .. })),
                "expected {raw:?} to be rejected"
            );
        }
    }

    #[test]
    fn test_code_deserialization_normalizes() {
        let code: Code = serde_json::from_str("\"reopen\"").unwrap();
        assert_eq!(code.as_str(), "REOPEN");
        assert!(serde_json::from_str::<Code>("\"re open\"").is_err());
    }

    #[test]
    fn test_typed_ids_roundtrip_as_uuid() {
        let id: Id<Status> = Id::new();
        let json = serde_json::to_string(&id).unwrap();
        let back: Id<Status> = serde_json::from_str(&json).unwrap();
        assert_eq!(id, back);
        assert_eq!(Id::<Status>::parse_str(&id.to_string()).unwrap(), id);
    }

    #[test]
    fn test_protection_follows_default_flag() {
        let status = Status::new("OPEN", "Open").unwrap();
        assert!(!status.is_protected());
        assert!(status.as_default().is_protected());

        let ticket_type = TicketType::new("REPAIR", "Repair").unwrap().as_default();
        assert!(ticket_type.is_protected());
    }

    #[test]
    fn test_set_active_touches_timestamp() {
        let mut action = Action::new("CLOSE", "Close").unwrap();
        let before = action.updated_at;
        action.set_active(false);
        assert!(!action.is_active);
        assert!(action.updated_at >= before);
    }
}
