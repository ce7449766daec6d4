//! Ready-made stage sequences.
//!
//! - `default`: configure → start → stop
//! - `service_discovery`: configure → start → announce → unannounce → stop

use serde::{Deserialize, Serialize};

use crate::lifecycle::driver::StageDriver;
use crate::lifecycle::engine::Lifecycle;
use crate::lifecycle::error::LifecycleResult;
use crate::stage::Stage;

/// Which stage sequence a lifecycle uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleProfile {
    /// CONFIGURE, START, STOP.
    #[default]
    Default,
    /// CONFIGURE, START, ANNOUNCE, UNANNOUNCE, STOP.
    ServiceDiscovery,
    /// Stages listed explicitly in configuration.
    Custom,
}

impl LifecycleProfile {
    /// The built-in stages of this profile; empty for `Custom`.
    pub fn stages(&self) -> Vec<Stage> {
        match self {
            LifecycleProfile::Default => vec![Stage::CONFIGURE, Stage::START, Stage::STOP],
            LifecycleProfile::ServiceDiscovery => vec![
                Stage::CONFIGURE,
                Stage::START,
                Stage::ANNOUNCE,
                Stage::UNANNOUNCE,
                Stage::STOP,
            ],
            LifecycleProfile::Custom => Vec::new(),
        }
    }
}

impl Lifecycle {
    /// Lifecycle with the CONFIGURE, START and STOP stages.
    pub fn default_profile(verbose: bool) -> Self {
        Self::builtin(LifecycleProfile::Default, verbose)
    }

    /// Lifecycle that also announces and unannounces the service between
    /// START and STOP.
    pub fn service_discovery(verbose: bool) -> Self {
        Self::builtin(LifecycleProfile::ServiceDiscovery, verbose)
    }

    /// Lifecycle for `profile`, using `custom` stages for the custom profile.
    pub fn from_profile(
        profile: LifecycleProfile,
        custom: &[Stage],
        verbose: bool,
    ) -> LifecycleResult<Self> {
        match profile {
            LifecycleProfile::Custom => Self::with_stages(custom.iter().cloned(), verbose),
            builtin => Ok(Self::builtin(builtin, verbose)),
        }
    }

    fn builtin(profile: LifecycleProfile, verbose: bool) -> Self {
        Self::new(StageDriver::from_distinct(profile.stages()), verbose)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_profile_stages() {
        let lifecycle = Lifecycle::default_profile(true);
        assert_eq!(lifecycle.stages(), &[Stage::CONFIGURE, Stage::START, Stage::STOP]);
        assert_eq!(lifecycle.teardown_stage(), Some(&Stage::STOP));
        assert!(lifecycle.is_verbose());
    }

    #[test]
    fn test_service_discovery_profile_stages() {
        let lifecycle = Lifecycle::service_discovery(false);
        assert_eq!(lifecycle.stages().len(), 5);
        assert_eq!(lifecycle.stages()[2], Stage::ANNOUNCE);
        assert_eq!(lifecycle.stages()[3], Stage::UNANNOUNCE);
    }

    #[test]
    fn test_custom_profile() {
        let stages = [Stage::new("boot"), Stage::new("serve"), Stage::new("halt")];
        let lifecycle = Lifecycle::from_profile(LifecycleProfile::Custom, &stages, false).unwrap();
        assert_eq!(lifecycle.stages(), &stages);
        assert!(lifecycle.teardown_stage().is_none());

        let dupes = [Stage::new("boot"), Stage::new("BOOT")];
        assert!(Lifecycle::from_profile(LifecycleProfile::Custom, &dupes, false).is_err());
    }

    #[test]
    fn test_profile_deserializes_snake_case() {
        #[derive(Deserialize)]
        struct Wrapper {
            profile: LifecycleProfile,
        }
        let w: Wrapper = toml::from_str("profile = \"service_discovery\"").unwrap();
        assert_eq!(w.profile, LifecycleProfile::ServiceDiscovery);
    }
}
