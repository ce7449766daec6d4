//! Stage listeners and the append-only listener list.
//!
//! # Design Decisions
//! - Lists are copy-on-write (`ArcSwap<Vec<_>>`): appends publish a new
//!   vector, dispatch iterates whatever snapshot it loaded
//! - A dispatch in progress never observes a half-written list; it may miss
//!   listeners appended after its snapshot was taken

use std::fmt;
use std::sync::Arc;

use arc_swap::ArcSwap;

use crate::lifecycle::error::ListenerError;
use crate::stage::Stage;

/// Callback invoked when a stage fires.
pub trait LifecycleListener: Send + Sync {
    /// Called with the stage that is being executed.
    fn on_stage(&self, stage: &Stage) -> Result<(), ListenerError>;
}

/// Adapter turning a closure into a [`LifecycleListener`].
pub struct FnListener<F> {
    f: F,
}

impl<F> LifecycleListener for FnListener<F>
where
    F: Fn(&Stage) -> Result<(), ListenerError> + Send + Sync,
{
    fn on_stage(&self, stage: &Stage) -> Result<(), ListenerError> {
        (self.f)(stage)
    }
}

impl<F> fmt::Debug for FnListener<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnListener").finish_non_exhaustive()
    }
}

/// Wrap a closure as a listener.
///
/// ```
/// use lifecycle_coordinator::lifecycle::{listener, Lifecycle};
/// use lifecycle_coordinator::Stage;
///
/// let lifecycle = Lifecycle::default_profile(false);
/// lifecycle
///     .add_listener(&Stage::START, listener(|stage| {
///         println!("{stage} fired");
///         Ok(())
///     }))
///     .unwrap();
/// ```
pub fn listener<F>(f: F) -> FnListener<F>
where
    F: Fn(&Stage) -> Result<(), ListenerError> + Send + Sync,
{
    FnListener { f }
}

/// Shared handle to a registered listener.
pub type SharedListener = Arc<dyn LifecycleListener>;

/// Ordered, append-only listener collection for one stage.
pub(crate) struct ListenerList {
    entries: ArcSwap<Vec<SharedListener>>,
}

impl ListenerList {
    pub(crate) fn new() -> Self {
        Self {
            entries: ArcSwap::from_pointee(Vec::new()),
        }
    }

    /// Append a listener. Concurrent appends are serialized by `rcu` retries.
    pub(crate) fn push(&self, listener: SharedListener) {
        self.entries.rcu(|current| {
            let mut next = Vec::with_capacity(current.len() + 1);
            next.extend(current.iter().cloned());
            next.push(Arc::clone(&listener));
            next
        });
    }

    /// Current listeners in registration order.
    pub(crate) fn snapshot(&self) -> Arc<Vec<SharedListener>> {
        self.entries.load_full()
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.load().len()
    }
}

impl fmt::Debug for ListenerList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerList")
            .field("len", &self.len())
            .finish()
    }
}
