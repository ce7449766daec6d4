//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → CoordinatorConfig (validated, immutable)
//!     → LifecycleConfig::build_lifecycle() / thread pool construction
//! ```
//!
//! # Design Decisions
//! - Config is read once at startup; a lifecycle runs once, so there is no reload
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, load_config_or_default, parse_config, ConfigError};
pub use schema::CoordinatorConfig;
pub use schema::LifecycleConfig;
pub use schema::ObservabilityConfig;
pub use schema::ThreadPoolConfig;
