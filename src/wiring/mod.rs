//! Wiring components into a lifecycle.
//!
//! # Data Flow
//! ```text
//! Provider (provider.rs):
//!     add_action(stage, action)... → provide(factory) → instance
//!     → one listener per action, calling the action with the instance
//!
//! Registrar (registrar.rs):
//!     manage(component) → Lifecycled::lifecycle_hooks()
//!     → queued until lifecycle_available(), registered directly after
//!     → rejected once the freeze stage has fired
//! ```

pub mod provider;
pub mod registrar;

use thiserror::Error;

use crate::lifecycle::LifecycleError;
use crate::stage::Stage;

pub use provider::{LifecycleAction, LifecycleProvider};
pub use registrar::{Lifecycled, StageHook, StageRegistrar};

/// Errors raised while wiring components into a lifecycle.
#[derive(Debug, Error)]
pub enum WiringError {
    /// A component was handed over after the freeze stage fired.
    #[error("Component registered after stage '{0}'; the lifecycle is frozen")]
    Frozen(Stage),

    /// The registrar already has a lifecycle.
    #[error("A lifecycle is already available to this registrar")]
    AlreadyAvailable,

    /// Registering a listener failed.
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
}
