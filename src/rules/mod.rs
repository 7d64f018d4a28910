// Transition rule table, its cache and the code-based administration layer

pub mod admin;
pub mod cache;
pub mod table;
pub mod types;

pub use admin::{RuleAdmin, RulePatch, RuleQuery, RuleSpec};
pub use cache::RuleCache;
pub use table::TransitionTable;
pub use types::{
    RuleDraft, RuleFilter, RuleId, RuleReference, RuleUpdate, RuleView, TransitionKey,
    TransitionRule,
};
