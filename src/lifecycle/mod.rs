//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Registration (listener.rs, engine.rs):
//!     component → add_listener(stage, listener) → per-stage copy-on-write list
//!
//! Dispatch (engine.rs):
//!     execute_next() → driver.next_stage() → execute(stage) → driver.on_stage(stage)
//!     execute_to(target) → execute_next() until target has fired
//!
//! Sequencing (driver.rs):
//!     configure → start → ... → stop → none (final)
//!
//! Termination (termination.rs, signals.rs, shutdown.rs):
//!     SIGTERM/SIGINT or Shutdown::trigger → exit hook thread → execute_to(stop)
//!     → joined caller thread released
//! ```
//!
//! # Design Decisions
//! - Ordered startup: listeners fire in registration order
//! - Ordered shutdown: the teardown stage fires in reverse registration order
//! - A lifecycle runs once; there is no reset and no way back
//! - Dispatch is synchronous on the calling thread; registration is safe
//!   from any thread, including during dispatch

pub mod driver;
pub mod engine;
pub mod error;
pub mod listener;
pub mod profiles;
pub mod shutdown;
pub mod signals;
pub mod termination;

pub use driver::StageDriver;
pub use engine::Lifecycle;
pub use error::{LifecycleError, LifecycleResult, ListenerError};
pub use listener::{listener, FnListener, LifecycleListener, SharedListener};
pub use profiles::LifecycleProfile;
pub use shutdown::Shutdown;
pub use termination::{JoinInterrupter, TerminationHook, TerminationMode};
