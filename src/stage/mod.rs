//! Stage identity.
//!
//! # Data Flow
//! ```text
//! config / caller code
//!     → Stage::new("start") or a well-known constant (Stage::START)
//!     → used as key by lifecycle::driver (sequence) and lifecycle::engine (listeners)
//! ```
//!
//! # Design Decisions
//! - A stage is only its name; equality and hashing ignore case
//! - Well-known stages are `const` so they cost nothing to reference
//! - Custom stages are built at runtime from any string

pub mod identity;

pub use identity::Stage;
