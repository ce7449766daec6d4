//! Process Lifecycle Coordinator Library
//!
//! Drives a process through an ordered sequence of named stages
//! (configure → start → stop by default), notifying the listeners registered
//! on each stage, and reaches the teardown stage when the process is told to
//! exit.

// Core
pub mod lifecycle;
pub mod stage;

// Components bound to a lifecycle
pub mod executor;
pub mod harness;
pub mod wiring;

// Cross-cutting concerns
pub mod config;
pub mod observability;

pub use config::schema::CoordinatorConfig;
pub use lifecycle::{Lifecycle, LifecycleError, LifecycleListener, Shutdown};
pub use stage::Stage;
