//! Listener dispatch engine.
//!
//! # Responsibilities
//! - Own the stage → listener list map, one entry per declared stage
//! - Execute a stage: invoke its listeners synchronously on the caller
//! - Drive the stage driver forward (`execute_next`, `execute_to`)
//!
//! # Design Decisions
//! - The teardown stage (STOP by default) runs listeners in reverse
//!   registration order so subsystems stop in the opposite order they started
//! - The first failing listener aborts the stage; no isolation between
//!   listeners of the same stage
//! - `execute` never moves the cursor; only `execute_next`/`execute_to` do,
//!   and only after the stage completed without error

use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;

use crate::lifecycle::driver::StageDriver;
use crate::lifecycle::error::{LifecycleError, LifecycleResult};
use crate::lifecycle::listener::{LifecycleListener, ListenerList, SharedListener};
use crate::observability::metrics;
use crate::stage::Stage;

/// A lifecycle: a stage sequence plus the listeners registered on it.
#[derive(Debug)]
pub struct Lifecycle {
    driver: StageDriver,
    listeners: DashMap<Stage, ListenerList>,
    teardown_stage: Option<Stage>,
    verbose: bool,
}

impl Lifecycle {
    /// Build a lifecycle over `driver`'s stages.
    ///
    /// The teardown stage defaults to [`Stage::STOP`] when the sequence
    /// contains it. If `verbose` is set, stage transitions log at info level
    /// instead of debug.
    pub fn new(driver: StageDriver, verbose: bool) -> Self {
        let listeners = DashMap::with_capacity(driver.stages().len());
        for stage in driver.stages() {
            listeners.insert(stage.clone(), ListenerList::new());
        }
        let teardown_stage = driver.contains(&Stage::STOP).then_some(Stage::STOP);

        Self {
            driver,
            listeners,
            teardown_stage,
            verbose,
        }
    }

    /// Build a lifecycle from an ordered list of distinct stages.
    pub fn with_stages(
        stages: impl IntoIterator<Item = Stage>,
        verbose: bool,
    ) -> LifecycleResult<Self> {
        Ok(Self::new(StageDriver::new(stages)?, verbose))
    }

    /// Choose which stage fires its listeners in reverse order, or none.
    pub fn with_teardown_stage(mut self, stage: Option<Stage>) -> LifecycleResult<Self> {
        if let Some(stage) = &stage {
            if !self.driver.contains(stage) {
                return Err(self.driver.unknown_stage(stage));
            }
        }
        self.teardown_stage = stage;
        Ok(self)
    }

    /// The declared stages in execution order.
    pub fn stages(&self) -> &[Stage] {
        self.driver.stages()
    }

    /// The underlying stage driver.
    pub fn driver(&self) -> &StageDriver {
        &self.driver
    }

    /// The stage whose listeners run in reverse registration order.
    pub fn teardown_stage(&self) -> Option<&Stage> {
        self.teardown_stage.as_ref()
    }

    pub fn is_verbose(&self) -> bool {
        self.verbose
    }

    /// Register `listener` to be called when `stage` fires.
    pub fn add_listener(
        &self,
        stage: &Stage,
        listener: impl LifecycleListener + 'static,
    ) -> LifecycleResult<()> {
        self.add_shared_listener(stage, Arc::new(listener))
    }

    /// Register an already shared listener.
    pub fn add_shared_listener(&self, stage: &Stage, listener: SharedListener) -> LifecycleResult<()> {
        let list = self
            .listeners
            .get(stage)
            .ok_or_else(|| self.driver.unknown_stage(stage))?;
        list.push(listener);
        tracing::trace!(stage = %stage, listeners = list.len(), "Listener added");
        Ok(())
    }

    /// Number of listeners currently registered on `stage`.
    pub fn listener_count(&self, stage: &Stage) -> LifecycleResult<usize> {
        self.listeners
            .get(stage)
            .map(|list| list.len())
            .ok_or_else(|| self.driver.unknown_stage(stage))
    }

    /// The stage the next `execute_next` call will fire.
    pub fn next_stage(&self) -> Option<Stage> {
        self.driver.next_stage()
    }

    /// Fire the next stage and advance the cursor. Returns the fired stage.
    pub fn execute_next(&self) -> LifecycleResult<Stage> {
        let stage = self.next_stage().ok_or(LifecycleError::SequenceExhausted)?;
        self.execute(&stage)?;
        self.driver.on_stage(&stage)?;
        Ok(stage)
    }

    /// Fire stages from the cursor up to and including `target`.
    ///
    /// Fails without firing anything if the sequence is exhausted or `target`
    /// is not among the remaining stages.
    pub fn execute_to(&self, target: &Stage) -> LifecycleResult<()> {
        if self.driver.is_exhausted() {
            return Err(LifecycleError::SequenceExhausted);
        }
        if !self.driver.is_pending(target) {
            return Err(LifecycleError::TargetUnreached(target.clone()));
        }

        loop {
            let fired = match self.execute_next() {
                Ok(stage) => stage,
                Err(LifecycleError::SequenceExhausted) => {
                    return Err(LifecycleError::TargetUnreached(target.clone()));
                }
                Err(e) => return Err(e),
            };
            if &fired == target {
                return Ok(());
            }
        }
    }

    /// Invoke every listener of `stage`. Does not move the cursor.
    pub fn execute(&self, stage: &Stage) -> LifecycleResult<()> {
        // Snapshot then release the map guard before calling out.
        let snapshot = self
            .listeners
            .get(stage)
            .map(|list| list.snapshot())
            .ok_or_else(|| self.driver.unknown_stage(stage))?;

        self.log_transition(stage, "starting...");

        let result = if self.teardown_stage.as_ref() == Some(stage) {
            dispatch(stage, snapshot.iter().rev())
        } else {
            dispatch(stage, snapshot.iter())
        };

        match result {
            Ok(()) => {
                metrics::record_stage_dispatch(stage, snapshot.len());
                self.log_transition(stage, "complete.");
                Ok(())
            }
            Err(e) => {
                metrics::record_stage_failure(stage);
                tracing::error!(stage = %stage, error = %e, "Stage aborted");
                Err(e)
            }
        }
    }

    fn log_transition(&self, stage: &Stage, what: &str) {
        if self.verbose {
            tracing::info!(stage = %stage, "Stage '{}' {}", stage, what);
        } else {
            tracing::debug!(stage = %stage, "Stage '{}' {}", stage, what);
        }
    }
}

impl fmt::Display for Lifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Lifecycle{}", self.driver)
    }
}

fn dispatch<'a>(
    stage: &Stage,
    listeners: impl Iterator<Item = &'a SharedListener>,
) -> LifecycleResult<()> {
    for listener in listeners {
        listener
            .on_stage(stage)
            .map_err(|source| LifecycleError::ListenerFailure {
                stage: stage.clone(),
                source,
            })?;
    }
    Ok(())
}
