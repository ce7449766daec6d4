//! Termination hook: tear the lifecycle down on process exit and block the
//! calling thread until that has happened.
//!
//! # Data Flow
//! ```text
//! caller thread                         exit hook thread
//!     join()                                 │
//!       ├─ spawn ──────────────────────────▶ wait: SIGINT | SIGTERM | Shutdown::trigger
//!       │                                    │
//!       │                                    ├─ execute_to(stage) or execute(stage)
//!       ◀──────────── JoinEvent::TornDown ───┘
//!     return teardown result
//!
//! JoinInterrupter::interrupt() ── JoinEvent::Interrupted ──▶ join() returns Interrupted
//! ```
//!
//! # Design Decisions
//! - The hook waits inside its own current-thread Tokio runtime, then drops
//!   it before running listeners so teardown never runs in an async context
//! - An interrupted join leaves the hook installed; a later signal still
//!   tears the lifecycle down
//! - A panicking teardown listener is caught on the hook thread and reported
//!   as [`LifecycleError::HookPanicked`]; the joined caller is always released

use std::any::Any;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread;

use tokio::sync::mpsc;

use crate::lifecycle::engine::Lifecycle;
use crate::lifecycle::error::{LifecycleError, LifecycleResult};
use crate::lifecycle::shutdown::Shutdown;
use crate::lifecycle::signals::{self, ExitReason};
use crate::stage::Stage;

/// How the hook reaches its terminal stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationMode {
    /// `execute_to(stage)`: fire every remaining stage up to and including it.
    Cycle,
    /// `execute(stage)`: fire only that stage's listeners.
    Direct,
}

#[derive(Debug)]
enum JoinEvent {
    TornDown(LifecycleResult<()>),
    Interrupted,
}

/// Releases a thread blocked in [`TerminationHook::join`].
#[derive(Debug, Clone)]
pub struct JoinInterrupter {
    tx: mpsc::UnboundedSender<JoinEvent>,
}

impl JoinInterrupter {
    /// Wake the joined thread; `join` returns [`LifecycleError::Interrupted`].
    pub fn interrupt(&self) {
        let _ = self.tx.send(JoinEvent::Interrupted);
    }
}

/// A process exit hook bound to one terminal stage.
#[derive(Debug)]
pub struct TerminationHook {
    stage: Stage,
    mode: TerminationMode,
    shutdown: Shutdown,
    os_signals: bool,
    tx: mpsc::UnboundedSender<JoinEvent>,
    rx: mpsc::UnboundedReceiver<JoinEvent>,
}

impl TerminationHook {
    /// Hook that reaches `stage` using `mode` once the process is told to exit.
    pub fn new(stage: Stage, mode: TerminationMode) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            stage,
            mode,
            shutdown: Shutdown::new(),
            os_signals: true,
            tx,
            rx,
        }
    }

    /// Only react to [`Shutdown::trigger`], not to OS signals.
    pub fn without_os_signals(mut self) -> Self {
        self.os_signals = false;
        self
    }

    /// Handle that fires the hook without an OS signal.
    pub fn shutdown_handle(&self) -> Shutdown {
        self.shutdown.clone()
    }

    /// Handle that releases the blocked caller without running teardown.
    pub fn interrupter(&self) -> JoinInterrupter {
        JoinInterrupter {
            tx: self.tx.clone(),
        }
    }

    /// Install the hook and block the calling thread.
    ///
    /// Returns the teardown result once the hook has run, or
    /// [`LifecycleError::Interrupted`] if a [`JoinInterrupter`] fired first.
    /// Must be called from a plain thread, not from inside an async runtime.
    pub fn join(self, lifecycle: Arc<Lifecycle>) -> LifecycleResult<()> {
        let Self {
            stage,
            mode,
            shutdown,
            os_signals,
            tx,
            mut rx,
        } = self;

        if !lifecycle.driver().contains(&stage) {
            return Err(lifecycle.driver().unknown_stage(&stage));
        }
        if tokio::runtime::Handle::try_current().is_ok() {
            return Err(LifecycleError::HookInstall(io::Error::other(
                "join() must not be called from within an async runtime",
            )));
        }

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;

        thread::Builder::new()
            .name("lifecycle-exit-hook".into())
            .spawn(move || {
                let reason = runtime.block_on(wait_for_exit(&shutdown, os_signals));
                drop(runtime);

                tracing::info!(reason = %reason, stage = %stage, mode = ?mode, "Termination hook running");
                let result = panic::catch_unwind(AssertUnwindSafe(|| match mode {
                    TerminationMode::Cycle => lifecycle.execute_to(&stage),
                    TerminationMode::Direct => lifecycle.execute(&stage),
                }))
                .unwrap_or_else(|payload| Err(LifecycleError::HookPanicked(panic_message(&*payload))));
                if let Err(e) = &result {
                    tracing::error!(stage = %stage, error = %e, "Termination hook failed");
                }
                let _ = tx.send(JoinEvent::TornDown(result));
            })?;

        tracing::debug!("Joined; waiting for process termination");
        match rx.blocking_recv() {
            Some(JoinEvent::TornDown(result)) => result,
            Some(JoinEvent::Interrupted) | None => Err(LifecycleError::Interrupted),
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

async fn wait_for_exit(shutdown: &Shutdown, os_signals: bool) -> ExitReason {
    if os_signals {
        tokio::select! {
            reason = signals::wait_for_exit_signal() => reason,
            _ = shutdown.triggered() => ExitReason::Triggered,
        }
    } else {
        shutdown.triggered().await;
        ExitReason::Triggered
    }
}

impl Lifecycle {
    /// Install an exit hook that cycles to the teardown stage (or the last
    /// stage when there is none), then block until it has run.
    pub fn join(self: &Arc<Self>) -> LifecycleResult<()> {
        let stage = self
            .teardown_stage()
            .or_else(|| self.stages().last())
            .cloned()
            .ok_or(LifecycleError::SequenceExhausted)?;
        self.join_on(stage, TerminationMode::Cycle)
    }

    /// Install an exit hook for `stage` and block until it has run.
    pub fn join_on(self: &Arc<Self>, stage: Stage, mode: TerminationMode) -> LifecycleResult<()> {
        TerminationHook::new(stage, mode).join(Arc::clone(self))
    }
}
