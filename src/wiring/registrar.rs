//! Registers the stage hooks that components declare about themselves.
//!
//! # Design Decisions
//! - Components may be handed over before the lifecycle exists; their hooks
//!   are queued and registered when it becomes available
//! - Once the freeze stage has fired, new components are refused: hooks for
//!   stages already passed would silently never run
//! - Every hook stage is checked before anything is registered, so a
//!   rejected component or lifecycle leaves no listeners behind

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use crate::lifecycle::{listener, Lifecycle, ListenerError, SharedListener};
use crate::stage::Stage;
use crate::wiring::WiringError;

/// A method a component wants called when a stage fires.
pub struct StageHook<T> {
    stage: Stage,
    hook: fn(&T) -> Result<(), ListenerError>,
}

impl<T> StageHook<T> {
    pub fn new(stage: Stage, hook: fn(&T) -> Result<(), ListenerError>) -> Self {
        Self { stage, hook }
    }

    pub fn stage(&self) -> &Stage {
        &self.stage
    }
}

impl<T> fmt::Debug for StageHook<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StageHook").field("stage", &self.stage).finish_non_exhaustive()
    }
}

/// A component that declares its own stage hooks.
///
/// ```
/// use lifecycle_coordinator::lifecycle::ListenerError;
/// use lifecycle_coordinator::wiring::{Lifecycled, StageHook};
/// use lifecycle_coordinator::Stage;
///
/// struct Cache;
///
/// impl Cache {
///     fn warm(&self) -> Result<(), ListenerError> {
///         Ok(())
///     }
/// }
///
/// impl Lifecycled for Cache {
///     fn lifecycle_hooks() -> Vec<StageHook<Self>> {
///         vec![StageHook::new(Stage::START, Cache::warm)]
///     }
/// }
/// ```
pub trait Lifecycled: Send + Sync + 'static {
    fn lifecycle_hooks() -> Vec<StageHook<Self>>
    where
        Self: Sized;
}

#[derive(Default)]
struct RegistrarState {
    lifecycle: Option<Arc<Lifecycle>>,
    pending: Vec<(Stage, SharedListener)>,
}

/// Collects component hooks and registers them on a lifecycle.
pub struct StageRegistrar {
    freeze_stage: Stage,
    frozen: Arc<AtomicBool>,
    state: Mutex<RegistrarState>,
}

impl StageRegistrar {
    /// Registrar that freezes on CONFIGURE.
    pub fn new() -> Self {
        Self::with_freeze_stage(Stage::CONFIGURE)
    }

    pub fn with_freeze_stage(freeze_stage: Stage) -> Self {
        Self {
            freeze_stage,
            frozen: Arc::new(AtomicBool::new(false)),
            state: Mutex::new(RegistrarState::default()),
        }
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen.load(Ordering::Acquire)
    }

    /// Hand `component` over; its hooks are registered now or queued until
    /// [`lifecycle_available`](Self::lifecycle_available).
    pub fn manage<T: Lifecycled>(&self, component: Arc<T>) -> Result<(), WiringError> {
        if self.is_frozen() {
            return Err(WiringError::Frozen(self.freeze_stage.clone()));
        }

        let hooks: Vec<(Stage, SharedListener)> = T::lifecycle_hooks()
            .into_iter()
            .map(|StageHook { stage, hook }| {
                let target = Arc::clone(&component);
                let listener: SharedListener = Arc::new(listener(move |_| hook(target.as_ref())));
                (stage, listener)
            })
            .collect();

        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        match &state.lifecycle {
            Some(lifecycle) => {
                check_stages(lifecycle, hooks.iter().map(|(stage, _)| stage))?;
                for (stage, listener) in hooks {
                    lifecycle.add_shared_listener(&stage, listener)?;
                }
            }
            None => {
                tracing::trace!(
                    component = std::any::type_name::<T>(),
                    hooks = hooks.len(),
                    "Queued hooks until lifecycle is available"
                );
                state.pending.extend(hooks);
            }
        }
        Ok(())
    }

    /// Bind the registrar to `lifecycle` and register every queued hook.
    pub fn lifecycle_available(&self, lifecycle: Arc<Lifecycle>) -> Result<(), WiringError> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if state.lifecycle.is_some() {
            return Err(WiringError::AlreadyAvailable);
        }

        // Queued hooks stay queued if this lifecycle cannot take all of them.
        check_stages(
            &lifecycle,
            std::iter::once(&self.freeze_stage).chain(state.pending.iter().map(|(stage, _)| stage)),
        )?;

        let frozen = Arc::clone(&self.frozen);
        lifecycle.add_listener(&self.freeze_stage, listener(move |stage| {
            frozen.store(true, Ordering::Release);
            tracing::debug!(stage = %stage, "Component registration frozen");
            Ok(())
        }))?;

        let pending = std::mem::take(&mut state.pending);
        let count = pending.len();
        for (stage, listener) in pending {
            lifecycle.add_shared_listener(&stage, listener)?;
        }
        state.lifecycle = Some(lifecycle);

        tracing::debug!(hooks = count, "Registered queued component hooks");
        Ok(())
    }
}

fn check_stages<'a>(
    lifecycle: &Lifecycle,
    mut stages: impl Iterator<Item = &'a Stage>,
) -> Result<(), WiringError> {
    match stages.find(|stage| !lifecycle.driver().contains(stage)) {
        Some(stage) => Err(lifecycle.driver().unknown_stage(stage).into()),
        None => Ok(()),
    }
}

impl Default for StageRegistrar {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for StageRegistrar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StageRegistrar")
            .field("freeze_stage", &self.freeze_stage)
            .field("frozen", &self.is_frozen())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::LifecycleError;
    use std::sync::atomic::AtomicUsize;

    #[derive(Debug, Default)]
    struct Worker {
        starts: AtomicUsize,
        stops: AtomicUsize,
    }

    impl Worker {
        fn start(&self) -> Result<(), ListenerError> {
            self.starts.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn stop(&self) -> Result<(), ListenerError> {
            self.stops.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    impl Lifecycled for Worker {
        fn lifecycle_hooks() -> Vec<StageHook<Self>> {
            vec![
                StageHook::new(Stage::START, Worker::start),
                StageHook::new(Stage::STOP, Worker::stop),
            ]
        }
    }

    struct Announcer;

    impl Announcer {
        fn announce(&self) -> Result<(), ListenerError> {
            Ok(())
        }
    }

    impl Lifecycled for Announcer {
        fn lifecycle_hooks() -> Vec<StageHook<Self>> {
            vec![StageHook::new(Stage::ANNOUNCE, Announcer::announce)]
        }
    }

    struct Mixed;

    impl Mixed {
        fn start(&self) -> Result<(), ListenerError> {
            Ok(())
        }

        fn announce(&self) -> Result<(), ListenerError> {
            Ok(())
        }
    }

    impl Lifecycled for Mixed {
        fn lifecycle_hooks() -> Vec<StageHook<Self>> {
            vec![
                StageHook::new(Stage::START, Mixed::start),
                StageHook::new(Stage::ANNOUNCE, Mixed::announce),
            ]
        }
    }

    #[test]
    fn test_queued_hooks_register_on_availability() {
        let registrar = StageRegistrar::new();
        let worker = Arc::new(Worker::default());
        registrar.manage(worker.clone()).unwrap();

        let lifecycle = Arc::new(Lifecycle::default_profile(false));
        registrar.lifecycle_available(lifecycle.clone()).unwrap();
        lifecycle.execute_to(&Stage::STOP).unwrap();

        assert_eq!(worker.starts.load(Ordering::SeqCst), 1);
        assert_eq!(worker.stops.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_direct_registration_after_availability() {
        let registrar = StageRegistrar::new();
        let lifecycle = Arc::new(Lifecycle::default_profile(false));
        registrar.lifecycle_available(lifecycle.clone()).unwrap();

        let worker = Arc::new(Worker::default());
        registrar.manage(worker.clone()).unwrap();
        assert_eq!(lifecycle.listener_count(&Stage::START).unwrap(), 1);
    }

    #[test]
    fn test_frozen_after_freeze_stage() {
        let registrar = StageRegistrar::new();
        let lifecycle = Arc::new(Lifecycle::default_profile(false));
        registrar.lifecycle_available(lifecycle.clone()).unwrap();
        assert!(!registrar.is_frozen());

        lifecycle.execute_next().unwrap();
        assert!(registrar.is_frozen());
        let err = registrar.manage(Arc::new(Worker::default())).unwrap_err();
        assert!(matches!(err, WiringError::Frozen(stage) if stage == Stage::CONFIGURE));
    }

    #[test]
    fn test_second_lifecycle_refused() {
        let registrar = StageRegistrar::new();
        registrar
            .lifecycle_available(Arc::new(Lifecycle::default_profile(false)))
            .unwrap();
        let err = registrar
            .lifecycle_available(Arc::new(Lifecycle::default_profile(false)))
            .unwrap_err();
        assert!(matches!(err, WiringError::AlreadyAvailable));
    }

    #[test]
    fn test_unsupported_hook_stage() {
        let registrar = StageRegistrar::new();
        registrar
            .lifecycle_available(Arc::new(Lifecycle::default_profile(false)))
            .unwrap();
        let err = registrar.manage(Arc::new(Announcer)).unwrap_err();
        assert!(matches!(
            err,
            WiringError::Lifecycle(LifecycleError::UnknownStage { .. })
        ));

        let sd = Arc::new(Lifecycle::service_discovery(false));
        let other = StageRegistrar::new();
        other.manage(Arc::new(Announcer)).unwrap();
        other.lifecycle_available(sd.clone()).unwrap();
        assert_eq!(sd.listener_count(&Stage::ANNOUNCE).unwrap(), 1);
    }

    #[test]
    fn test_rejected_component_registers_nothing() {
        let registrar = StageRegistrar::new();
        let lifecycle = Arc::new(Lifecycle::default_profile(false));
        registrar.lifecycle_available(lifecycle.clone()).unwrap();

        let err = registrar.manage(Arc::new(Mixed)).unwrap_err();
        assert!(matches!(
            err,
            WiringError::Lifecycle(LifecycleError::UnknownStage { ref stage, .. }) if *stage == Stage::ANNOUNCE
        ));
        assert_eq!(lifecycle.listener_count(&Stage::START).unwrap(), 0);
    }

    #[test]
    fn test_rejected_lifecycle_keeps_queue() {
        let registrar = StageRegistrar::new();
        registrar.manage(Arc::new(Mixed)).unwrap();

        let plain = Arc::new(Lifecycle::default_profile(false));
        let err = registrar.lifecycle_available(plain.clone()).unwrap_err();
        assert!(matches!(
            err,
            WiringError::Lifecycle(LifecycleError::UnknownStage { .. })
        ));
        assert_eq!(plain.listener_count(&Stage::CONFIGURE).unwrap(), 0);
        assert_eq!(plain.listener_count(&Stage::START).unwrap(), 0);

        let sd = Arc::new(Lifecycle::service_discovery(false));
        registrar.lifecycle_available(sd.clone()).unwrap();
        assert_eq!(sd.listener_count(&Stage::CONFIGURE).unwrap(), 1);
        assert_eq!(sd.listener_count(&Stage::START).unwrap(), 1);
        assert_eq!(sd.listener_count(&Stage::ANNOUNCE).unwrap(), 1);
    }
}
