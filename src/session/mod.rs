//! Persisted session subsystem.
//!
//! # Data Flow
//! ```text
//! login / refresh success
//!     → Session::replace (store.rs write, then in-memory cache)
//!
//! outbound request
//!     → Session::access_token (in-memory cache, never touches storage)
//!
//! logout / refresh failure
//!     → Session::clear (store.rs remove, then in-memory cache)
//!
//! process start
//!     → Session::restore (storage is the source of truth)
//! ```
//!
//! # Design Decisions
//! - Both tokens live under one key and are written as one record
//! - A partial or unreadable record means "logged out"
//! - The cache is an `ArcSwapOption` so readers never block

pub mod credentials;
pub mod store;

pub use credentials::{CredentialPair, Session, SessionError};
pub use store::{FileStore, KeyValueStore, MemoryStore, StoreError};
