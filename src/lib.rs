//! Admin client for the price-comparison backend.
//!
//! Thin, strongly-typed access to the admin REST API: bearer-token auth with
//! single-flight refresh, bounded retry of transient server errors, and
//! generic CRUD repositories for every managed collection.

pub mod auth;
pub mod config;
pub mod error;
pub mod http;
pub mod observability;
pub mod resilience;
pub mod resources;
pub mod session;

pub use auth::{AuthEvent, AuthEvents, RefreshCoordinator};
pub use config::ClientConfig;
pub use error::{ApiError, ApiResult};
pub use http::{ApiClient, ApiRequest};
pub use resources::{ListQuery, OrderDirection, Page, Repository, ResourceKind};
pub use session::{CredentialPair, Session};
