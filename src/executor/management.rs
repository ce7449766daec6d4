//! Pool counters, task guards and the management snapshot.

use std::sync::atomic::{AtomicU64, AtomicU8, AtomicUsize, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::OwnedSemaphorePermit;

use crate::observability::metrics;

/// Pool state.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PoolState {
    Running = 0,
    Terminating = 1,
    Terminated = 2,
}

impl From<u8> for PoolState {
    fn from(val: u8) -> Self {
        match val {
            0 => PoolState::Running,
            1 => PoolState::Terminating,
            _ => PoolState::Terminated,
        }
    }
}

/// Shared task counters.
#[derive(Debug, Default)]
pub(crate) struct PoolCounters {
    pub(crate) state: AtomicU8,
    pub(crate) active: AtomicUsize,
    pub(crate) largest_active: AtomicUsize,
    pub(crate) enqueued: AtomicU64,
    pub(crate) completed: AtomicU64,
}

impl PoolCounters {
    pub(crate) fn state(&self) -> PoolState {
        PoolState::from(self.state.load(Ordering::Acquire))
    }
}

/// RAII guard for one admitted task.
///
/// Holds the admission permit (if any) and, once started, counts the task as
/// active. Dropping it marks the task completed and frees its slot, whether
/// the task returned, panicked, or never ran.
pub(crate) struct TaskGuard {
    counters: Arc<PoolCounters>,
    pool: Arc<str>,
    _permit: Option<OwnedSemaphorePermit>,
    started: bool,
}

impl TaskGuard {
    pub(crate) fn admit(
        counters: Arc<PoolCounters>,
        pool: Arc<str>,
        permit: Option<OwnedSemaphorePermit>,
    ) -> Self {
        counters.enqueued.fetch_add(1, Ordering::Relaxed);
        Self {
            counters,
            pool,
            _permit: permit,
            started: false,
        }
    }

    pub(crate) fn start(&mut self) {
        let active = self.counters.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.counters.largest_active.fetch_max(active, Ordering::Relaxed);
        self.started = true;
        metrics::record_pool_active(&self.pool, active);
    }
}

impl Drop for TaskGuard {
    fn drop(&mut self) {
        if self.started {
            let active = self.counters.active.fetch_sub(1, Ordering::SeqCst) - 1;
            self.counters.completed.fetch_add(1, Ordering::Relaxed);
            metrics::record_pool_active(&self.pool, active);
        }
    }
}

/// Point-in-time view of a pool, for logs and admin output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PoolStats {
    pub name: String,
    pub state: PoolState,
    pub is_shutdown: bool,
    pub is_terminating: bool,
    pub is_terminated: bool,
    pub rejected_handler: String,
    pub core_pool_size: usize,
    pub maximum_pool_size: usize,
    pub keep_alive_ms: u64,
    pub queue_current_size: usize,
    pub queue_remaining_size: usize,
    pub currently_active_tasks: usize,
    pub largest_active_tasks: usize,
    pub enqueued_task_count: u64,
    pub completed_task_count: u64,
}
