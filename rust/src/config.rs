//! Configuration types for the scheduling engine.

use serde::{Deserialize, Serialize};

use crate::calendar::DEFAULT_SEARCH_LIMIT_DAYS;

/// What to do with a dependency whose predecessor id does not exist.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DanglingDependencyPolicy {
    /// Report `DanglingDependency` and refuse to schedule.
    #[default]
    Reject,
    /// Place the task right after the previous task of the same asset.
    SequentialFallback,
}

impl std::str::FromStr for DanglingDependencyPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "reject" => Ok(Self::Reject),
            "sequential_fallback" | "sequentialFallback" => Ok(Self::SequentialFallback),
            other => Err(format!("Unknown dangling dependency policy: {}", other)),
        }
    }
}

/// Engine-wide settings that are not part of the scheduling input itself.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SchedulerConfig {
    /// Verbosity level: 0=silent, 1=changes, 2=checks, 3=debug.
    pub verbosity: u8,
    /// Handling of references to unknown predecessors.
    pub dangling_dependency_policy: DanglingDependencyPolicy,
    /// Maximum consecutive non-working days a calendar search may cross.
    pub calendar_search_limit: u32,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            verbosity: 0,
            dangling_dependency_policy: DanglingDependencyPolicy::Reject,
            calendar_search_limit: DEFAULT_SEARCH_LIMIT_DAYS,
        }
    }
}

impl SchedulerConfig {
    /// Build a config from optional overrides, falling back to defaults.
    pub fn from_overrides(
        verbosity: Option<u8>,
        dangling_dependency_policy: Option<DanglingDependencyPolicy>,
        calendar_search_limit: Option<u32>,
    ) -> Self {
        let defaults = Self::default();
        Self {
            verbosity: verbosity.unwrap_or(defaults.verbosity),
            dangling_dependency_policy: dangling_dependency_policy
                .unwrap_or(defaults.dangling_dependency_policy),
            calendar_search_limit: calendar_search_limit.unwrap_or(defaults.calendar_search_limit),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = SchedulerConfig::default();
        assert_eq!(config.verbosity, 0);
        assert_eq!(
            config.dangling_dependency_policy,
            DanglingDependencyPolicy::Reject
        );
        assert_eq!(config.calendar_search_limit, 1000);
    }

    #[test]
    fn test_overrides() {
        let config =
            SchedulerConfig::from_overrides(Some(2), Some(DanglingDependencyPolicy::SequentialFallback), None);
        assert_eq!(config.verbosity, 2);
        assert_eq!(
            config.dangling_dependency_policy,
            DanglingDependencyPolicy::SequentialFallback
        );
        assert_eq!(config.calendar_search_limit, DEFAULT_SEARCH_LIMIT_DAYS);
    }

    #[test]
    fn test_policy_from_str() {
        assert_eq!(
            "sequential_fallback".parse::<DanglingDependencyPolicy>(),
            Ok(DanglingDependencyPolicy::SequentialFallback)
        );
        assert!("best_effort".parse::<DanglingDependencyPolicy>().is_err());
    }

    #[test]
    fn test_partial_config_deserializes_with_defaults() {
        let config: SchedulerConfig =
            serde_json::from_str(r#"{"danglingDependencyPolicy":"sequentialFallback"}"#).unwrap();
        assert_eq!(
            config.dangling_dependency_policy,
            DanglingDependencyPolicy::SequentialFallback
        );
        assert_eq!(config.calendar_search_limit, 1000);
    }
}
