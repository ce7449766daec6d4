//! Run a test body inside a lifecycle.
//!
//! # Data Flow
//! ```text
//! evaluate(body):
//!     execute_to(start) → before hooks → body → after hooks
//!     → execute_to(stop)   (always, even when an earlier step failed or panicked)
//! ```
//!
//! # Design Decisions
//! - Teardown runs before a body panic is resumed, so a failing test still
//!   releases whatever the start stage acquired
//! - The first error wins; a teardown error is only reported when nothing
//!   failed before it
//! - A stage that failed during startup is never fired again by teardown

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use thiserror::Error;

use crate::lifecycle::{Lifecycle, LifecycleError, ListenerError};
use crate::stage::Stage;

/// Errors raised while evaluating a lifecycle statement.
#[derive(Debug, Error)]
pub enum HarnessError {
    #[error("Lifecycle failed: {0}")]
    Lifecycle(#[from] LifecycleError),

    #[error("Test body failed: {0}")]
    Body(#[source] ListenerError),

    #[error("Hook failed: {0}")]
    Hook(#[source] ListenerError),
}

type Hook = Box<dyn Fn(&Lifecycle) -> Result<(), ListenerError> + Send + Sync>;

/// A lifecycle driven from `start` to `stop` around a test body.
pub struct LifecycleStatement {
    lifecycle: Arc<Lifecycle>,
    start: Stage,
    stop: Stage,
    before: Vec<Hook>,
    after: Vec<Hook>,
}

impl LifecycleStatement {
    /// Default lifecycle, body runs between START and STOP.
    pub fn default_lifecycle() -> Self {
        Self::new(Arc::new(Lifecycle::default_profile(false)), Stage::START, Stage::STOP)
    }

    /// Service discovery lifecycle, body runs between ANNOUNCE and STOP.
    pub fn service_discovery_lifecycle() -> Self {
        Self::new(Arc::new(Lifecycle::service_discovery(false)), Stage::ANNOUNCE, Stage::STOP)
    }

    pub fn new(lifecycle: Arc<Lifecycle>, start: Stage, stop: Stage) -> Self {
        Self {
            lifecycle,
            start,
            stop,
            before: Vec::new(),
            after: Vec::new(),
        }
    }

    /// Run `hook` after the start stage, before the body.
    pub fn with_before<F>(mut self, hook: F) -> Self
    where
        F: Fn(&Lifecycle) -> Result<(), ListenerError> + Send + Sync + 'static,
    {
        self.before.push(Box::new(hook));
        self
    }

    /// Run `hook` after the body, before the stop stage.
    pub fn with_after<F>(mut self, hook: F) -> Self
    where
        F: Fn(&Lifecycle) -> Result<(), ListenerError> + Send + Sync + 'static,
    {
        self.after.push(Box::new(hook));
        self
    }

    /// The lifecycle, for registering listeners before evaluation.
    pub fn lifecycle(&self) -> &Arc<Lifecycle> {
        &self.lifecycle
    }

    /// Drive the lifecycle around `body`.
    ///
    /// The stop stage is always reached. A panic in the body or a hook is
    /// resumed after teardown.
    pub fn evaluate<F>(self, body: F) -> Result<(), HarnessError>
    where
        F: FnOnce(&Lifecycle) -> Result<(), ListenerError>,
    {
        let lifecycle = Arc::clone(&self.lifecycle);
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.run_body(body)));

        // Startup aborted: the cursor still sits on the stage that failed.
        // Step past it so teardown does not fire it a second time.
        if !matches!(outcome, Ok(Ok(()))) && lifecycle.driver().is_pending(&self.start) {
            if let Some(failed) = lifecycle.next_stage() {
                tracing::warn!(stage = %failed, "Startup failed, skipping stage on teardown");
                lifecycle.driver().on_stage(&failed)?;
            }
        }

        let teardown = lifecycle.execute_to(&self.stop);
        if let Err(e) = &teardown {
            tracing::error!(stage = %self.stop, error = %e, "Lifecycle teardown failed");
        }

        match outcome {
            Err(payload) => panic::resume_unwind(payload),
            Ok(Err(e)) => Err(e),
            Ok(Ok(())) => teardown.map_err(HarnessError::from),
        }
    }

    fn run_body<F>(&self, body: F) -> Result<(), HarnessError>
    where
        F: FnOnce(&Lifecycle) -> Result<(), ListenerError>,
    {
        self.lifecycle.execute_to(&self.start)?;
        for hook in &self.before {
            hook(&self.lifecycle).map_err(HarnessError::Hook)?;
        }
        body(&self.lifecycle).map_err(HarnessError::Body)?;
        for hook in &self.after {
            hook(&self.lifecycle).map_err(HarnessError::Hook)?;
        }
        Ok(())
    }
}

impl fmt::Debug for LifecycleStatement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LifecycleStatement")
            .field("lifecycle", &self.lifecycle.to_string())
            .field("start", &self.start)
            .field("stop", &self.stop)
            .field("before", &self.before.len())
            .field("after", &self.after.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::listener;
    use std::sync::Mutex;

    fn trace(statement: &LifecycleStatement) -> Arc<Mutex<Vec<String>>> {
        let log = Arc::new(Mutex::new(Vec::new()));
        for stage in statement.lifecycle().stages().to_vec() {
            let log = log.clone();
            statement
                .lifecycle()
                .add_listener(&stage, listener(move |s| {
                    log.lock().unwrap().push(s.to_string());
                    Ok(())
                }))
                .unwrap();
        }
        log
    }

    #[test]
    fn test_body_runs_between_stages() {
        let statement = LifecycleStatement::default_lifecycle();
        let log = trace(&statement);
        let l = log.clone();
        let before = log.clone();
        let after = log.clone();

        statement
            .with_before(move |_| {
                before.lock().unwrap().push("before".into());
                Ok(())
            })
            .with_after(move |_| {
                after.lock().unwrap().push("after".into());
                Ok(())
            })
            .evaluate(|_| {
                l.lock().unwrap().push("body".into());
                Ok(())
            })
            .unwrap();

        assert_eq!(
            *log.lock().unwrap(),
            vec!["configure", "start", "before", "body", "after", "stop"]
        );
    }

    #[test]
    fn test_service_discovery_runs_to_announce() {
        let statement = LifecycleStatement::service_discovery_lifecycle();
        let log = trace(&statement);
        let l = log.clone();
        statement
            .evaluate(|_| {
                l.lock().unwrap().push("body".into());
                Ok(())
            })
            .unwrap();

        assert_eq!(
            *log.lock().unwrap(),
            vec!["configure", "start", "announce", "body", "unannounce", "stop"]
        );
    }

    #[test]
    fn test_failing_body_still_stops() {
        let statement = LifecycleStatement::default_lifecycle();
        let log = trace(&statement);
        let err = statement.evaluate(|_| Err("boom".into())).unwrap_err();

        assert!(matches!(err, HarnessError::Body(_)));
        assert_eq!(log.lock().unwrap().last().map(String::as_str), Some("stop"));
    }

    #[test]
    fn test_panicking_body_still_stops() {
        let statement = LifecycleStatement::default_lifecycle();
        let log = trace(&statement);
        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            let _ = statement.evaluate(|_| panic!("body panicked"));
        }));

        assert!(result.is_err());
        assert_eq!(log.lock().unwrap().last().map(String::as_str), Some("stop"));
    }

    #[test]
    fn test_failed_start_stage_is_not_refired() {
        let statement = LifecycleStatement::default_lifecycle();
        let log = trace(&statement);
        let starts = Arc::new(Mutex::new(0));
        let s = starts.clone();
        statement
            .lifecycle()
            .add_listener(&Stage::START, listener(move |_| {
                *s.lock().unwrap() += 1;
                Ok(())
            }))
            .unwrap();
        statement
            .lifecycle()
            .add_listener(&Stage::START, listener(|_| Err("bind failed".into())))
            .unwrap();

        let mut body_ran = false;
        let err = statement
            .evaluate(|_| {
                body_ran = true;
                Ok(())
            })
            .unwrap_err();

        assert!(matches!(
            err,
            HarnessError::Lifecycle(LifecycleError::ListenerFailure { ref stage, .. }) if *stage == Stage::START
        ));
        assert!(!body_ran);
        assert_eq!(*starts.lock().unwrap(), 1);
        assert_eq!(*log.lock().unwrap(), vec!["configure", "start", "stop"]);
    }

    #[test]
    fn test_panicking_start_listener_still_stops() {
        let statement = LifecycleStatement::default_lifecycle();
        let log = trace(&statement);
        statement
            .lifecycle()
            .add_listener(&Stage::START, listener(|_| panic!("start panicked")))
            .unwrap();

        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            let _ = statement.evaluate(|_| Ok(()));
        }));

        assert!(result.is_err());
        assert_eq!(*log.lock().unwrap(), vec!["configure", "start", "stop"]);
    }

    #[test]
    fn test_teardown_failure_reported() {
        let statement = LifecycleStatement::default_lifecycle();
        statement
            .lifecycle()
            .add_listener(&Stage::STOP, listener(|_| Err("close failed".into())))
            .unwrap();
        let err = statement.evaluate(|_| Ok(())).unwrap_err();
        assert!(matches!(
            err,
            HarnessError::Lifecycle(LifecycleError::ListenerFailure { .. })
        ));
    }
}
