//! HTTP client core.
//!
//! # Data Flow
//! ```text
//! Repository builds ApiRequest
//!     → client.rs attaches bearer token from session cache
//!     → send
//!     → 2xx:  response returned to caller
//!     → 401:  auth::RefreshCoordinator (own or join the cycle), replay once
//!     → 5xx:  resilience::RetryPolicy (backoff, replay, bounded)
//!     → else: error::classify
//! ```

pub mod client;
pub mod request;

pub use client::ApiClient;
pub use request::{ApiRequest, X_REQUEST_ID};
