//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured tracing events)
//!     → metrics.rs (counters, histograms)
//!
//! Consumers:
//!     → stderr via tracing-subscriber (CLI)
//!     → whatever metrics recorder the host process installs
//! ```
//!
//! # Design Decisions
//! - Request ID flows through every log line of a request and its replays
//! - Tokens are never logged
//! - No recorder is installed here; without one, metric calls are no-ops

pub mod logging;
pub mod metrics;

pub use logging::init_tracing;
