//! Lifecycle error definitions.

use thiserror::Error;

use crate::stage::Stage;

/// Error type a listener may return from `on_stage`.
pub type ListenerError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors raised by the stage driver, the dispatch engine and the join hook.
#[derive(Debug, Error)]
pub enum LifecycleError {
    /// The stage is not part of the declared sequence.
    #[error("This lifecycle does not support the '{stage}' stage, only [{supported}] are supported")]
    UnknownStage { stage: Stage, supported: String },

    /// The same stage was declared twice when building a sequence.
    #[error("Stage '{0}' appears more than once in the sequence")]
    DuplicateStage(Stage),

    /// `execute_next`/`execute_to` was called after the final stage fired.
    #[error("Lifecycle already hit the final stage")]
    SequenceExhausted,

    /// `execute_to` was asked for a stage the cursor will never reach.
    #[error("Never reached stage '{0}' before ending the lifecycle")]
    TargetUnreached(Stage),

    /// A listener failed; remaining listeners of the stage were skipped.
    #[error("Listener failed during stage '{stage}'")]
    ListenerFailure {
        stage: Stage,
        #[source]
        source: ListenerError,
    },

    /// The blocking join was released before the exit hook completed.
    #[error("Wait for lifecycle termination was interrupted")]
    Interrupted,

    /// A teardown listener panicked on the exit hook thread.
    #[error("Termination hook panicked: {0}")]
    HookPanicked(String),

    /// The exit hook thread could not be started.
    #[error("Failed to install termination hook: {0}")]
    HookInstall(#[from] std::io::Error),
}

/// Result type for lifecycle operations.
pub type LifecycleResult<T> = Result<T, LifecycleError>;
