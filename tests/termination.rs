//! Joining a lifecycle and releasing it from another thread.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use lifecycle_coordinator::lifecycle::{LifecycleError, TerminationHook, TerminationMode};
use lifecycle_coordinator::{Lifecycle, Stage};

mod common;

#[test]
fn test_trigger_tears_down_joined_lifecycle() {
    let lifecycle = Arc::new(Lifecycle::service_discovery(false));
    let recorder = common::Recorder::new();
    recorder.watch_all(&lifecycle);
    lifecycle.execute_to(&Stage::ANNOUNCE).unwrap();

    let hook = TerminationHook::new(Stage::STOP, TerminationMode::Cycle).without_os_signals();
    let shutdown = hook.shutdown_handle();
    let trigger = thread::spawn(move || {
        thread::sleep(Duration::from_millis(50));
        shutdown.trigger();
    });

    hook.join(lifecycle.clone()).unwrap();
    trigger.join().unwrap();

    assert_eq!(
        recorder.events(),
        vec!["configure", "start", "announce", "unannounce", "stop"]
    );
    assert_eq!(lifecycle.next_stage(), None);
}

#[test]
fn test_interrupt_releases_join_without_teardown() {
    let lifecycle = Arc::new(Lifecycle::default_profile(false));
    let recorder = common::Recorder::new();
    recorder.watch_all(&lifecycle);
    lifecycle.execute_to(&Stage::START).unwrap();

    let hook = TerminationHook::new(Stage::STOP, TerminationMode::Cycle).without_os_signals();
    let interrupter = hook.interrupter();
    thread::spawn(move || {
        thread::sleep(Duration::from_millis(50));
        interrupter.interrupt();
    });

    let err = hook.join(lifecycle.clone()).unwrap_err();
    assert!(matches!(err, LifecycleError::Interrupted));
    assert_eq!(recorder.events(), vec!["configure", "start"]);
}
