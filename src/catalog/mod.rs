// Catalogs of reference data: statuses, actions and ticket types

pub mod service;
pub mod types;

pub use service::Catalog;
pub use types::{Action, CatalogEntry, Code, Id, Protected, Status, TicketType};
