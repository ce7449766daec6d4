//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check that every referenced stage belongs to the resolved sequence
//! - Validate thread pool sizing and timeouts
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: CoordinatorConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;

use thiserror::Error;

use crate::config::schema::{CoordinatorConfig, LifecycleConfig, ThreadPoolConfig};
use crate::lifecycle::LifecycleProfile;
use crate::stage::Stage;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("custom profile requires at least one stage")]
    EmptyCustomSequence,

    #[error("stages are only used by the custom profile")]
    StagesWithoutCustomProfile,

    #[error("stage names must not be empty")]
    EmptyStageName,

    #[error("stage '{0}' is declared more than once")]
    DuplicateStage(Stage),

    #[error("{field} '{stage}' is not part of the stage sequence")]
    StageNotInSequence { field: &'static str, stage: Stage },

    #[error("thread pool '{pool}': min_threads {min} exceeds max_threads {max}")]
    PoolThreads { pool: String, min: usize, max: usize },

    #[error("thread pool '{pool}': shutdown_timeout_secs must be greater than 0")]
    PoolShutdownTimeout { pool: String },
}

/// Validate a parsed configuration.
pub fn validate_config(config: &CoordinatorConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    validate_lifecycle(&config.lifecycle, &mut errors);
    for (name, pool) in &config.thread_pools {
        validate_pool(name, pool, &mut errors);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_lifecycle(config: &LifecycleConfig, errors: &mut Vec<ValidationError>) {
    match config.profile {
        LifecycleProfile::Custom if config.stages.is_empty() => {
            errors.push(ValidationError::EmptyCustomSequence);
        }
        LifecycleProfile::Custom => {}
        _ if !config.stages.is_empty() => errors.push(ValidationError::StagesWithoutCustomProfile),
        _ => {}
    }

    let stages = config.resolved_stages();
    let mut seen = HashSet::new();
    for stage in &stages {
        if stage.name().is_empty() {
            errors.push(ValidationError::EmptyStageName);
        } else if !seen.insert(stage) {
            errors.push(ValidationError::DuplicateStage(stage.clone()));
        }
    }

    let referenced = [
        ("teardown_stage", config.teardown_stage.clone()),
        ("run_to", config.run_to.clone()),
        ("terminal_stage", config.terminal_stage.clone()),
    ];
    for (field, stage) in referenced {
        if let Some(stage) = stage {
            if !stages.contains(&stage) {
                errors.push(ValidationError::StageNotInSequence { field, stage });
            }
        }
    }
}

fn validate_pool(name: &str, pool: &ThreadPoolConfig, errors: &mut Vec<ValidationError>) {
    if pool.max_threads > 0 && pool.min_threads > pool.max_threads {
        errors.push(ValidationError::PoolThreads {
            pool: name.to_string(),
            min: pool.min_threads,
            max: pool.max_threads,
        });
    }
    if pool.shutdown_timeout_secs == 0 {
        errors.push(ValidationError::PoolShutdownTimeout {
            pool: name.to_string(),
        });
    }
}
