//! Factory wrapper that binds the instances it builds to lifecycle stages.

use std::fmt;
use std::sync::Arc;

use crate::lifecycle::{listener, Lifecycle, ListenerError};
use crate::stage::Stage;
use crate::wiring::WiringError;

/// Action run against a provided instance when its stage fires.
pub type LifecycleAction<T> = Arc<dyn Fn(&T) -> Result<(), ListenerError> + Send + Sync>;

/// Builds instances of `T` and registers stage actions for each of them.
pub struct LifecycleProvider<T> {
    lifecycle: Option<Arc<Lifecycle>>,
    actions: Vec<(Stage, LifecycleAction<T>)>,
}

impl<T> LifecycleProvider<T>
where
    T: Send + Sync + 'static,
{
    /// Provider registering on `lifecycle`.
    pub fn new(lifecycle: Arc<Lifecycle>) -> Self {
        Self {
            lifecycle: Some(lifecycle),
            actions: Vec::new(),
        }
    }

    /// Provider with no lifecycle; actions are recorded but never registered.
    pub fn detached() -> Self {
        Self {
            lifecycle: None,
            actions: Vec::new(),
        }
    }

    /// Run `action` on every provided instance when `stage` fires.
    pub fn add_action<F>(mut self, stage: Stage, action: F) -> Self
    where
        F: Fn(&T) -> Result<(), ListenerError> + Send + Sync + 'static,
    {
        self.actions.push((stage, Arc::new(action)));
        self
    }

    /// Build an instance with `factory` and register its actions.
    ///
    /// Every action stage is checked against the lifecycle before the factory
    /// runs, so an unknown stage never leaves a half-registered instance.
    pub fn provide<F>(&self, factory: F) -> Result<Arc<T>, WiringError>
    where
        F: FnOnce() -> T,
    {
        let Some(lifecycle) = &self.lifecycle else {
            return Ok(Arc::new(factory()));
        };

        if let Some((stage, _)) = self
            .actions
            .iter()
            .find(|(stage, _)| !lifecycle.driver().contains(stage))
        {
            return Err(lifecycle.driver().unknown_stage(stage).into());
        }

        let instance = Arc::new(factory());
        for (stage, action) in &self.actions {
            let target = Arc::clone(&instance);
            let action = Arc::clone(action);
            lifecycle.add_listener(stage, listener(move |_| action(target.as_ref())))?;
        }
        tracing::debug!(
            actions = self.actions.len(),
            instance = std::any::type_name::<T>(),
            "Provided lifecycled instance"
        );
        Ok(instance)
    }
}

impl<T> fmt::Debug for LifecycleProvider<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LifecycleProvider")
            .field("attached", &self.lifecycle.is_some())
            .field(
                "stages",
                &self.actions.iter().map(|(s, _)| s.name()).collect::<Vec<_>>(),
            )
            .finish()
    }
}
