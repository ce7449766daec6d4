//! Shared utilities for integration tests.

use std::sync::{Arc, Mutex};

use lifecycle_coordinator::lifecycle::{listener, ListenerError};
use lifecycle_coordinator::{Lifecycle, Stage};

/// Ordered record of listener invocations, shared across listeners.
#[derive(Clone, Default)]
pub struct Recorder {
    events: Arc<Mutex<Vec<String>>>,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, event: impl Into<String>) {
        self.events.lock().unwrap().push(event.into());
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    /// Listener recording `<tag>:<stage>` whenever it fires.
    #[allow(dead_code)]
    pub fn tagged(
        &self,
        tag: &'static str,
    ) -> impl Fn(&Stage) -> Result<(), ListenerError> + Send + Sync + 'static {
        let recorder = self.clone();
        move |stage| {
            recorder.push(format!("{tag}:{stage}"));
            Ok(())
        }
    }

    /// Register a listener on every stage of `lifecycle` recording the stage name.
    pub fn watch_all(&self, lifecycle: &Lifecycle) {
        for stage in lifecycle.stages().to_vec() {
            let recorder = self.clone();
            lifecycle
                .add_listener(&stage, listener(move |s| {
                    recorder.push(s.name());
                    Ok(())
                }))
                .unwrap();
        }
    }
}

/// Lifecycle over `names`, in order.
#[allow(dead_code)]
pub fn custom_lifecycle(names: &[&str]) -> Lifecycle {
    Lifecycle::with_stages(names.iter().map(|n| Stage::new(n.to_string())), false).unwrap()
}
