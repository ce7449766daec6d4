//! Lifecycle-aware thread pools.
//!
//! # Data Flow
//! ```text
//! [thread_pools.<name>] config → build_pools() → LifecycledThreadPool
//!     submit(task) → admission permit → blocking worker thread
//!     stop stage → refuse new tasks → wait for in-flight → runtime shut down
//! ```

pub mod management;
pub mod pool;

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::config::CoordinatorConfig;
use crate::lifecycle::Lifecycle;

pub use management::{PoolState, PoolStats};
pub use pool::{LifecycledThreadPool, PoolError};

/// Build every configured pool, each bound to `lifecycle`'s stop stage.
pub fn build_pools(
    config: &CoordinatorConfig,
    lifecycle: &Lifecycle,
) -> Result<BTreeMap<String, Arc<LifecycledThreadPool>>, PoolError> {
    config
        .thread_pools
        .iter()
        .map(|(name, pool)| {
            LifecycledThreadPool::new(name, pool.clone(), lifecycle).map(|p| (name.clone(), p))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ThreadPoolConfig;
    use crate::stage::Stage;

    #[test]
    fn test_build_pools_registers_stop_listeners() {
        let mut config = CoordinatorConfig::default();
        config.thread_pools.insert("io".into(), ThreadPoolConfig::default());
        config.thread_pools.insert(
            "inline".into(),
            ThreadPoolConfig {
                max_threads: 0,
                ..Default::default()
            },
        );
        let lifecycle = Lifecycle::default_profile(false);

        let pools = build_pools(&config, &lifecycle).unwrap();
        assert_eq!(pools.keys().collect::<Vec<_>>(), vec!["inline", "io"]);
        assert_eq!(lifecycle.listener_count(&Stage::STOP).unwrap(), 2);

        lifecycle.execute_to(&Stage::STOP).unwrap();
        assert!(pools.values().all(|p| p.state() == PoolState::Terminated));
    }
}
