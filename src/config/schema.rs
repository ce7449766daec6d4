//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the
//! coordinator. All types derive Serde traits for deserialization from
//! config files.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::lifecycle::{Lifecycle, LifecycleProfile, LifecycleResult};
use crate::stage::Stage;

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct CoordinatorConfig {
    /// Stage sequence and termination behaviour.
    pub lifecycle: LifecycleConfig,

    /// Logging settings.
    pub observability: ObservabilityConfig,

    /// Thread pools shut down on the stop stage, keyed by pool name.
    pub thread_pools: BTreeMap<String, ThreadPoolConfig>,
}

/// Lifecycle configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct LifecycleConfig {
    /// Built-in stage sequence, or `custom` to use `stages`.
    pub profile: LifecycleProfile,

    /// Ordered stages for the custom profile.
    pub stages: Vec<Stage>,

    /// Stage whose listeners run in reverse order. Defaults to `stop` when
    /// the sequence has it.
    pub teardown_stage: Option<Stage>,

    /// Log stage transitions at info level instead of debug.
    pub verbose: bool,

    /// Stage the binary drives to before joining. Defaults to `start`
    /// (`announce` for service discovery, the first stage for custom).
    pub run_to: Option<Stage>,

    /// Stage the exit hook reaches. Defaults to the teardown stage, or the
    /// last stage.
    pub terminal_stage: Option<Stage>,

    /// Execute the terminal stage directly instead of cycling to it.
    pub direct_exit: bool,
}

impl LifecycleConfig {
    /// The stage sequence this configuration describes.
    pub fn resolved_stages(&self) -> Vec<Stage> {
        match self.profile {
            LifecycleProfile::Custom => self.stages.clone(),
            builtin => builtin.stages(),
        }
    }

    /// The stage to run to before joining.
    pub fn resolved_run_to(&self) -> Option<Stage> {
        if let Some(stage) = &self.run_to {
            return Some(stage.clone());
        }
        match self.profile {
            LifecycleProfile::Default => Some(Stage::START),
            LifecycleProfile::ServiceDiscovery => Some(Stage::ANNOUNCE),
            LifecycleProfile::Custom => self.stages.first().cloned(),
        }
    }

    /// The stage the exit hook reaches.
    pub fn resolved_terminal_stage(&self) -> Option<Stage> {
        if let Some(stage) = &self.terminal_stage {
            return Some(stage.clone());
        }
        let stages = self.resolved_stages();
        match &self.teardown_stage {
            Some(stage) => Some(stage.clone()),
            None if stages.contains(&Stage::STOP) => Some(Stage::STOP),
            None => stages.last().cloned(),
        }
    }

    /// Build the lifecycle this configuration describes.
    pub fn build_lifecycle(&self) -> LifecycleResult<Lifecycle> {
        let lifecycle = Lifecycle::from_profile(self.profile, &self.stages, self.verbose)?;
        match &self.teardown_stage {
            Some(stage) => lifecycle.with_teardown_stage(Some(stage.clone())),
            None => Ok(lifecycle),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Text,
    /// One JSON object per event.
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Output format.
    pub log_format: LogFormat,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Text,
        }
    }
}

/// What a saturated pool does with a new task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectedHandler {
    /// Refuse the task with an error.
    Abort,
    /// Run the task on the submitting thread.
    #[default]
    CallerRuns,
    /// Drop the task silently.
    Discard,
}

impl std::fmt::Display for RejectedHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RejectedHandler::Abort => f.write_str("abort"),
            RejectedHandler::CallerRuns => f.write_str("caller_runs"),
            RejectedHandler::Discard => f.write_str("discard"),
        }
    }
}

/// Thread pool configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ThreadPoolConfig {
    /// Informational only: reported as `core_pool_size` in stats. Tokio
    /// spawns blocking threads on demand up to `max_threads`.
    pub min_threads: usize,

    /// Maximum concurrently running tasks. 0 runs every task on the caller.
    pub max_threads: usize,

    /// Idle time before a surplus thread exits, in seconds.
    pub thread_timeout_secs: u64,

    /// Tasks that may wait for a free thread. 0 means direct hand-off only.
    pub queue_size: usize,

    /// Policy when both threads and queue are full.
    pub rejected_handler: RejectedHandler,

    /// How long the stop stage waits for running tasks, in seconds.
    pub shutdown_timeout_secs: u64,
}

impl Default for ThreadPoolConfig {
    fn default() -> Self {
        Self {
            min_threads: 1,
            max_threads: 16,
            thread_timeout_secs: 30 * 60,
            queue_size: 100,
            rejected_handler: RejectedHandler::CallerRuns,
            shutdown_timeout_secs: 20,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = CoordinatorConfig::default();
        assert_eq!(config.lifecycle.profile, LifecycleProfile::Default);
        assert_eq!(config.lifecycle.resolved_run_to(), Some(Stage::START));
        assert_eq!(config.lifecycle.resolved_terminal_stage(), Some(Stage::STOP));
        assert!(config.thread_pools.is_empty());

        let pool = ThreadPoolConfig::default();
        assert_eq!(pool.max_threads, 16);
        assert_eq!(pool.rejected_handler, RejectedHandler::CallerRuns);
    }

    #[test]
    fn test_service_discovery_runs_to_announce() {
        let config = LifecycleConfig {
            profile: LifecycleProfile::ServiceDiscovery,
            ..Default::default()
        };
        assert_eq!(config.resolved_run_to(), Some(Stage::ANNOUNCE));
        assert_eq!(config.resolved_stages().len(), 5);
    }

    #[test]
    fn test_custom_terminal_defaults_to_last_stage() {
        let config = LifecycleConfig {
            profile: LifecycleProfile::Custom,
            stages: vec![Stage::new("boot"), Stage::new("halt")],
            ..Default::default()
        };
        assert_eq!(config.resolved_run_to(), Some(Stage::new("boot")));
        assert_eq!(config.resolved_terminal_stage(), Some(Stage::new("halt")));
    }

    #[test]
    fn test_build_lifecycle_with_teardown() {
        let config = LifecycleConfig {
            profile: LifecycleProfile::Custom,
            stages: vec![Stage::new("boot"), Stage::new("halt")],
            teardown_stage: Some(Stage::new("HALT")),
            ..Default::default()
        };
        let lifecycle = config.build_lifecycle().unwrap();
        assert_eq!(lifecycle.teardown_stage(), Some(&Stage::new("halt")));
    }
}
