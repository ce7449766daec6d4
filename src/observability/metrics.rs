//! Metrics collection.
//!
//! # Metrics
//! - `lifecycle_stage_dispatch_total` (counter): stages executed, by stage
//! - `lifecycle_listeners_invoked_total` (counter): listener calls, by stage
//! - `lifecycle_stage_failures_total` (counter): stages aborted by a listener error
//! - `thread_pool_tasks_total` (counter): submissions by pool and outcome
//! - `thread_pool_active_tasks` (gauge): tasks currently running, by pool

use crate::stage::Stage;

/// Record one execution of `stage` that invoked `listeners` callbacks.
pub fn record_stage_dispatch(stage: &Stage, listeners: usize) {
    let label = stage.name().to_lowercase();
    metrics::counter!("lifecycle_stage_dispatch_total", "stage" => label.clone()).increment(1);
    metrics::counter!("lifecycle_listeners_invoked_total", "stage" => label).increment(listeners as u64);
}

/// Record a stage whose dispatch was aborted by a failing listener.
pub fn record_stage_failure(stage: &Stage) {
    metrics::counter!("lifecycle_stage_failures_total", "stage" => stage.name().to_lowercase()).increment(1);
}

/// Record a task submission outcome (`accepted`, `caller_runs`, `rejected`, `discarded`).
pub fn record_pool_task(pool: &str, outcome: &'static str) {
    metrics::counter!("thread_pool_tasks_total", "pool" => pool.to_string(), "outcome" => outcome).increment(1);
}

/// Update the number of tasks currently running in a pool.
pub fn record_pool_active(pool: &str, active: usize) {
    metrics::gauge!("thread_pool_active_tasks", "pool" => pool.to_string()).set(active as f64);
}
