// Persistence boundary for catalogs and transition rules
//
// The engine only talks to storage through these traits. Uniqueness of
// codes and of the rule triple is enforced inside each implementation so
// that concurrent writers cannot both succeed.

pub mod memory;
#[cfg(feature = "database")]
pub mod sqlite;

use async_trait::async_trait;

use crate::catalog::{Action, CatalogEntry, Code, Id, Status, TicketType};
use crate::error::StoreError;
use crate::rules::{RuleFilter, RuleId, RuleReference, TransitionKey, TransitionRule};

pub use memory::InMemoryStore;
#[cfg(feature = "database")]
pub use sqlite::SqliteStore;

/// Constraint name reported when a rule triple is already taken
pub const RULE_TRIPLE_CONSTRAINT: &str = "transition_rules.triple";

/// Constraint name reported when a catalog code is already taken
pub fn code_constraint<E: CatalogEntry>() -> String {
    format!("{}.code", E::KIND)
}

/// Read/write access to one catalog
#[async_trait]
pub trait CatalogRepository<E: CatalogEntry>: Send + Sync {
    async fn get_by_id(&self, id: Id<E>) -> Result<Option<E>, StoreError>;

    /// Lookup by normalised code
    async fn get_by_code(&self, code: &Code) -> Result<Option<E>, StoreError>;

    /// Entries ordered by creation time, then code
    async fn list(&self, active_only: bool) -> Result<Vec<E>, StoreError>;

    async fn list_active(&self) -> Result<Vec<E>, StoreError> {
        self.list(true).await
    }

    /// Fails with `UniqueViolation` if the code is taken
    async fn insert(&self, entry: E) -> Result<(), StoreError>;

    async fn update(&self, entry: E) -> Result<(), StoreError>;

    /// Returns whether a record was removed
    async fn remove(&self, id: Id<E>) -> Result<bool, StoreError>;
}

pub trait StatusRepository: CatalogRepository<Status> {}
impl<T: CatalogRepository<Status> + ?Sized> StatusRepository for T {}

pub trait ActionRepository: CatalogRepository<Action> {}
impl<T: CatalogRepository<Action> + ?Sized> ActionRepository for T {}

pub trait TicketTypeRepository: CatalogRepository<TicketType> {}
impl<T: CatalogRepository<TicketType> + ?Sized> TicketTypeRepository for T {}

/// Storage of the transition rule table
#[async_trait]
pub trait RuleRepository: Send + Sync {
    async fn get_rule(&self, id: RuleId) -> Result<Option<TransitionRule>, StoreError>;

    /// Single-row lookup through the triple index
    async fn find_rule(&self, key: &TransitionKey) -> Result<Option<TransitionRule>, StoreError>;

    async fn list_rules(&self, filter: &RuleFilter) -> Result<Vec<TransitionRule>, StoreError>;

    /// Fails with `UniqueViolation` on `RULE_TRIPLE_CONSTRAINT` if the triple is taken
    async fn insert_rule(&self, rule: TransitionRule) -> Result<(), StoreError>;

    /// Fails with `UniqueViolation` if the new triple belongs to another rule
    async fn update_rule(&self, rule: TransitionRule) -> Result<(), StoreError>;

    async fn remove_rule(&self, id: RuleId) -> Result<bool, StoreError>;

    async fn count_rules_referencing(&self, reference: RuleReference) -> Result<usize, StoreError>;
}

/// Everything the engine needs from a backend
pub trait TransitionStore:
    StatusRepository + ActionRepository + TicketTypeRepository + RuleRepository + 'static
{
}

impl<T> TransitionStore for T where
    T: StatusRepository + ActionRepository + TicketTypeRepository + RuleRepository + 'static
{
}
