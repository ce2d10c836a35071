//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Response from backend:
//!     → retries.rs (5xx? idempotent? attempts left?)
//!     → backoff.rs (exponential delay + jitter)
//!     → one sleep, then the request is sent again
//! ```
//!
//! # Design Decisions
//! - Only server errors are retried; 4xx and 401 never are
//! - POST/PATCH are not retried by default. A 5xx does not tell us whether
//!   the server applied part of the write, and the client cannot know the
//!   backend's idempotency. Opting in accepts that risk.
//! - At most one pending retry timer per request (sequential loop)

pub mod backoff;
pub mod retries;

pub use backoff::calculate_backoff;
pub use retries::RetryPolicy;
