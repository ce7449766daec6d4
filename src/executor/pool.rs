//! A thread pool that shuts itself down on the lifecycle's stop stage.
//!
//! # Responsibilities
//! - Run submitted closures on a bounded set of blocking threads
//! - Bound admission to `max_threads + queue_size` tasks, then apply the
//!   rejected handler
//! - On the stop stage: refuse new work, wait up to the shutdown timeout for
//!   running tasks, then force the runtime down

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex, PoisonError, Weak};
use std::thread;
use std::time::{Duration, Instant};

use thiserror::Error;
use tokio::runtime::Runtime;
use tokio::sync::Semaphore;

use crate::config::schema::{RejectedHandler, ThreadPoolConfig};
use crate::executor::management::{PoolCounters, PoolState, PoolStats, TaskGuard};
use crate::lifecycle::{listener, Lifecycle, LifecycleError};
use crate::observability::metrics;
use crate::stage::Stage;

const DRAIN_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Errors raised by lifecycled thread pools.
#[derive(Debug, Error)]
pub enum PoolError {
    /// The backing runtime could not be built.
    #[error("Failed to build thread pool '{pool}': {source}")]
    Build {
        pool: String,
        #[source]
        source: std::io::Error,
    },

    /// Threads and queue are full and the handler is `abort`.
    #[error("Thread pool '{pool}' rejected the task: pool and queue are full")]
    Rejected { pool: String },

    /// The pool was stopped by the lifecycle.
    #[error("Thread pool '{pool}' is not running; it was used after lifecycle stop")]
    NotRunning { pool: String },

    /// The stop listener could not be registered.
    #[error("Thread pool lifecycle registration failed: {0}")]
    Lifecycle(#[from] LifecycleError),
}

/// Thread pool bound to a lifecycle.
pub struct LifecycledThreadPool {
    name: Arc<str>,
    config: ThreadPoolConfig,
    /// `None` for a same-thread pool, and after stop. Held while admitting a
    /// task and while leaving the running state.
    runtime: Mutex<Option<Runtime>>,
    slots: Arc<Semaphore>,
    counters: Arc<PoolCounters>,
}

impl LifecycledThreadPool {
    /// Build a pool and register its shutdown on the lifecycle's teardown
    /// stage (STOP unless the lifecycle says otherwise).
    pub fn new(
        name: &str,
        config: ThreadPoolConfig,
        lifecycle: &Lifecycle,
    ) -> Result<Arc<Self>, PoolError> {
        let pool = Arc::new(Self::build(name, config)?);
        let stage = lifecycle.teardown_stage().cloned().unwrap_or(Stage::STOP);

        let weak: Weak<Self> = Arc::downgrade(&pool);
        lifecycle.add_listener(&stage, listener(move |_| {
            match weak.upgrade() {
                Some(pool) if pool.state() == PoolState::Running => {
                    pool.stop().map_err(Into::into)
                }
                _ => Ok(()),
            }
        }))?;

        tracing::info!(
            pool = %pool.name,
            min_threads = pool.config.min_threads,
            max_threads = pool.config.max_threads,
            queue_size = pool.config.queue_size,
            rejected_handler = %pool.config.rejected_handler,
            stop_stage = %stage,
            "Thread pool created"
        );
        Ok(pool)
    }

    fn build(name: &str, config: ThreadPoolConfig) -> Result<Self, PoolError> {
        let runtime = if config.max_threads == 0 {
            None
        } else {
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .worker_threads(1)
                .max_blocking_threads(config.max_threads)
                .thread_keep_alive(Duration::from_secs(config.thread_timeout_secs))
                .thread_name(format!("{name}-worker"))
                .build()
                .map_err(|source| PoolError::Build {
                    pool: name.to_string(),
                    source,
                })?;
            Some(runtime)
        };
        let slots = Arc::new(Semaphore::new(config.max_threads + config.queue_size));

        Ok(Self {
            name: Arc::from(name),
            config,
            runtime: Mutex::new(runtime),
            slots,
            counters: Arc::new(PoolCounters::default()),
        })
    }

    /// Pool name.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> PoolState {
        self.counters.state()
    }

    /// Run `task` on the pool.
    pub fn submit<F>(&self, task: F) -> Result<(), PoolError>
    where
        F: FnOnce() + Send + 'static,
    {
        let runtime = self.runtime.lock().unwrap_or_else(PoisonError::into_inner);
        if self.state() != PoolState::Running {
            return Err(PoolError::NotRunning {
                pool: self.name.to_string(),
            });
        }

        let Some(rt) = runtime.as_ref() else {
            drop(runtime);
            metrics::record_pool_task(&self.name, "inline");
            self.run_inline(task);
            return Ok(());
        };

        match Arc::clone(&self.slots).try_acquire_owned() {
            Ok(permit) => {
                let mut guard = TaskGuard::admit(
                    Arc::clone(&self.counters),
                    Arc::clone(&self.name),
                    Some(permit),
                );
                let pool = Arc::clone(&self.name);
                rt.spawn_blocking(move || {
                    guard.start();
                    run_task(&pool, task);
                    drop(guard);
                });
                metrics::record_pool_task(&self.name, "accepted");
                Ok(())
            }
            Err(_) => {
                drop(runtime);
                self.reject(task)
            }
        }
    }

    fn reject<F>(&self, task: F) -> Result<(), PoolError>
    where
        F: FnOnce() + Send + 'static,
    {
        match self.config.rejected_handler {
            RejectedHandler::Abort => {
                metrics::record_pool_task(&self.name, "rejected");
                Err(PoolError::Rejected {
                    pool: self.name.to_string(),
                })
            }
            RejectedHandler::CallerRuns => {
                metrics::record_pool_task(&self.name, "caller_runs");
                self.run_inline(task);
                Ok(())
            }
            RejectedHandler::Discard => {
                metrics::record_pool_task(&self.name, "discarded");
                tracing::debug!(pool = %self.name, "Pool saturated, task discarded");
                Ok(())
            }
        }
    }

    fn run_inline<F>(&self, task: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let mut guard = TaskGuard::admit(Arc::clone(&self.counters), Arc::clone(&self.name), None);
        guard.start();
        run_task(&self.name, task);
    }

    /// Tasks admitted to the pool that have not finished yet.
    fn in_flight(&self) -> usize {
        (self.config.max_threads + self.config.queue_size) - self.slots.available_permits()
    }

    /// Stop accepting work, wait for running tasks, then shut the runtime down.
    ///
    /// Called by the stop-stage listener; calling it again fails with
    /// [`PoolError::NotRunning`].
    pub fn stop(&self) -> Result<(), PoolError> {
        let started = Instant::now();
        {
            // Every task admitted before this point is already in flight.
            let _admission = self.runtime.lock().unwrap_or_else(PoisonError::into_inner);
            self.counters
                .state
                .compare_exchange(
                    PoolState::Running as u8,
                    PoolState::Terminating as u8,
                    Ordering::AcqRel,
                    Ordering::Acquire,
                )
                .map_err(|_| PoolError::NotRunning {
                    pool: self.name.to_string(),
                })?;
        }

        let timeout = Duration::from_secs(self.config.shutdown_timeout_secs);
        if !self.wait_for_idle(timeout) {
            tracing::error!(
                pool = %self.name,
                in_flight = self.in_flight(),
                "Executor service {} did not shut down after {} seconds of waiting!",
                self.name,
                self.config.shutdown_timeout_secs
            );
        }

        let runtime = self
            .runtime
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(runtime) = runtime {
            runtime.shutdown_background();
        }

        self.counters
            .state
            .store(PoolState::Terminated as u8, Ordering::Release);
        tracing::info!(
            pool = %self.name,
            elapsed_ms = started.elapsed().as_millis() as u64,
            completed = self.counters.completed.load(Ordering::Relaxed),
            "Executor service shut down"
        );
        Ok(())
    }

    fn wait_for_idle(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while self.in_flight() > 0 {
            if Instant::now() >= deadline {
                return false;
            }
            thread::sleep(DRAIN_POLL_INTERVAL);
        }
        true
    }

    /// Snapshot of the pool's counters.
    pub fn stats(&self) -> PoolStats {
        let state = self.state();
        let active = self.counters.active.load(Ordering::SeqCst);
        let queued = self.in_flight().saturating_sub(active).min(self.config.queue_size);

        PoolStats {
            name: self.name.to_string(),
            state,
            is_shutdown: state != PoolState::Running,
            is_terminating: state == PoolState::Terminating,
            is_terminated: state == PoolState::Terminated,
            rejected_handler: self.config.rejected_handler.to_string(),
            core_pool_size: self.config.min_threads,
            maximum_pool_size: self.config.max_threads,
            keep_alive_ms: self.config.thread_timeout_secs.saturating_mul(1000),
            queue_current_size: queued,
            queue_remaining_size: self.config.queue_size - queued,
            currently_active_tasks: active,
            largest_active_tasks: self.counters.largest_active.load(Ordering::Relaxed),
            enqueued_task_count: self.counters.enqueued.load(Ordering::Relaxed),
            completed_task_count: self.counters.completed.load(Ordering::Relaxed),
        }
    }
}

fn run_task<F: FnOnce()>(pool: &str, task: F) {
    if panic::catch_unwind(AssertUnwindSafe(task)).is_err() {
        tracing::error!(pool = %pool, "Task panicked");
    }
}

impl fmt::Debug for LifecycledThreadPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LifecycledThreadPool")
            .field("name", &self.name)
            .field("state", &self.state())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Drop for LifecycledThreadPool {
    fn drop(&mut self) {
        let runtime = self
            .runtime
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(runtime) = runtime {
            runtime.shutdown_background();
        }
    }
}
