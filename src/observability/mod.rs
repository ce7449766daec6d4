//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! lifecycle engine / thread pools produce:
//!     → logging.rs (structured log events via tracing)
//!     → metrics.rs (stage dispatch counters, pool gauges)
//!
//! Consumers:
//!     → stdout (fmt or JSON layer)
//!     → whatever `metrics` recorder the host process installs
//! ```
//!
//! # Design Decisions
//! - Structured fields on every event (stage, pool, counts)
//! - The library never installs a metrics recorder; without one the
//!   `metrics` macros are no-ops
//! - Log level comes from `RUST_LOG` first, then configuration

pub mod logging;
pub mod metrics;
