//! Domain repositories.
//!
//! Every admin resource follows the same REST shape, so one generic
//! [`Repository`] covers all of them; [`ResourceKind`] names the collection.
//! Payloads default to `serde_json::Value`; callers with their own types can
//! pick any `DeserializeOwned` model.

pub mod query;
pub mod repository;

pub use query::{ListQuery, OrderDirection, Page};
pub use repository::{Repository, ResourceKind};
