//! Authentication subsystem.
//!
//! # Data Flow
//! ```text
//! 401 observed by http::client
//!     → coordinator.rs
//!         Idle:       caller becomes owner, runs /auth/refresh
//!         Refreshing: caller joins the waiter queue
//!     → on success: session persisted, waiters released with new token
//!     → on failure: session cleared, waiters released with error,
//!                   events.rs broadcasts AuthenticationLost
//! ```
//!
//! # Design Decisions
//! - One coordinator per process, shared by every client clone
//! - Flag + queue are one critical section behind a mutex that is never
//!   held across an await
//! - Waiters are oneshot channels completed exactly once, in join order

pub mod coordinator;
pub mod events;

pub use coordinator::RefreshCoordinator;
pub use events::{AuthEvent, AuthEvents};
