//! Lifecycle Coordinator daemon
//!
//! Builds the configured lifecycle and thread pools, drives the lifecycle to
//! its run stage, then waits for SIGINT/SIGTERM and drives it to its terminal
//! stage.
//!
//! ```text
//!   config.toml ──▶ load_config ──▶ init_logging
//!                        │
//!                        ▼
//!                 build_lifecycle ──▶ build_pools (stop listeners)
//!                        │
//!                        ▼
//!              execute_to(run_to)      configure → start
//!                        │
//!                        ▼
//!        join_on(terminal_stage)       blocks until SIGINT/SIGTERM
//!                        │
//!                        ▼
//!                 pool stats (JSON) ──▶ exit
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;

use lifecycle_coordinator::config::load_config_or_default;
use lifecycle_coordinator::executor::build_pools;
use lifecycle_coordinator::lifecycle::{listener, TerminationMode};
use lifecycle_coordinator::observability::logging::init_logging;

#[derive(Parser)]
#[command(name = "lifecycle-coordinator")]
#[command(about = "Drives a process through its lifecycle stages", long_about = None)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log stage transitions at info level
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = load_config_or_default(cli.config.as_deref())?;
    if cli.verbose {
        config.lifecycle.verbose = true;
    }
    init_logging(&config.observability);

    tracing::info!("lifecycle-coordinator v{} starting", env!("CARGO_PKG_VERSION"));

    let lifecycle = Arc::new(config.lifecycle.build_lifecycle()?);
    tracing::info!(
        lifecycle = %lifecycle,
        teardown_stage = ?lifecycle.teardown_stage().map(|s| s.name()),
        pools = config.thread_pools.len(),
        "Configuration loaded"
    );

    let pools = build_pools(&config, &lifecycle)?;

    for stage in lifecycle.stages().to_vec() {
        lifecycle.add_listener(&stage, listener(|stage| {
            tracing::info!(stage = %stage, "Reached stage");
            Ok(())
        }))?;
    }

    if let Some(run_to) = config.lifecycle.resolved_run_to() {
        lifecycle.execute_to(&run_to)?;
    }

    let Some(terminal) = config.lifecycle.resolved_terminal_stage() else {
        tracing::warn!("No terminal stage; exiting without waiting");
        return Ok(());
    };
    let mode = if config.lifecycle.direct_exit {
        TerminationMode::Direct
    } else {
        TerminationMode::Cycle
    };

    tracing::info!(stage = %terminal, mode = ?mode, "Waiting for SIGINT/SIGTERM");
    lifecycle.join_on(terminal, mode)?;

    for pool in pools.values() {
        println!("{}", serde_json::to_string_pretty(&pool.stats())?);
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
