//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML, optional)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → CLI / environment overrides
//!     → ClientConfig (validated, immutable)
//!     → handed to ApiClient at construction
//! ```
//!
//! # Design Decisions
//! - All fields have defaults so a missing file is a valid config
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::{
    ApiConfig, ClientConfig, ObservabilityConfig, RefreshConfig, RetryConfig, SessionConfig,
};
pub use validation::{validate_config, ValidationError};
