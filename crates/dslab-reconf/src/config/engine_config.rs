//! Engine configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::objective::{objective_resolver, Objective};
use crate::plan::ActionDurations;

/// Holds raw engine config parsed from YAML file.
#[derive(Debug, Default, PartialEq, Serialize, Deserialize, Clone)]
struct RawEngineConfig {
    pub time_limit: Option<f64>,
    pub node_limit: Option<u64>,
    pub find_pass_max_waiting: Option<usize>,
    pub find_pass_backtrack_limit: Option<u64>,
    pub sort_resource: Option<String>,
    pub objective: Option<String>,
    pub durations: Option<ActionDurations>,
}

/// Represents engine configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Wall-clock budget of a solve call, unlimited if not set.
    pub time_limit: Option<Duration>,
    /// Maximum number of search nodes of the Prove pass, unlimited if not set.
    pub node_limit: Option<u64>,
    /// The Find pass is skipped if more VMs are waiting.
    pub find_pass_max_waiting: usize,
    /// Backtrack budget of the Find pass.
    pub find_pass_backtrack_limit: u64,
    /// Resource type used to order VMs in heuristics.
    /// The first registered resource type is used if not set.
    pub sort_resource: Option<String>,
    /// Objective applied when the request has none.
    pub objective: Option<Objective>,
    /// Durations of actions in the produced plans.
    pub durations: ActionDurations,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            time_limit: None,
            node_limit: None,
            find_pass_max_waiting: 5,
            find_pass_backtrack_limit: 1000,
            sort_resource: None,
            objective: None,
            durations: ActionDurations::default(),
        }
    }
}

impl EngineConfig {
    /// Creates engine config by reading parameter values from YAML file
    /// (uses default values if some parameters are absent).
    pub fn from_file(file_name: &str) -> Result<Self, ConfigError> {
        let data = std::fs::read_to_string(file_name).map_err(|source| ConfigError::Io {
            path: file_name.to_string(),
            source,
        })?;
        Self::parse(&data, file_name)
    }

    /// Creates engine config from YAML string.
    pub fn from_yaml(data: &str) -> Result<Self, ConfigError> {
        Self::parse(data, "<string>")
    }

    fn parse(data: &str, path: &str) -> Result<Self, ConfigError> {
        let raw: RawEngineConfig = if data.trim().is_empty() {
            RawEngineConfig::default()
        } else {
            serde_yaml::from_str(data).map_err(|source| ConfigError::Parse {
                path: path.to_string(),
                source,
            })?
        };
        let default = Self::default();
        Ok(Self {
            time_limit: raw.time_limit.map(Duration::from_secs_f64),
            node_limit: raw.node_limit,
            find_pass_max_waiting: raw.find_pass_max_waiting.unwrap_or(default.find_pass_max_waiting),
            find_pass_backtrack_limit: raw
                .find_pass_backtrack_limit
                .unwrap_or(default.find_pass_backtrack_limit),
            sort_resource: raw.sort_resource,
            objective: raw.objective.as_deref().map(objective_resolver).transpose()?,
            durations: raw.durations.unwrap_or_default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::from_yaml("").unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.find_pass_max_waiting, 5);
        assert_eq!(config.durations.migrate, 1);
    }

    #[test]
    fn test_values() {
        let config = EngineConfig::from_yaml(
            "time_limit: 2.5\nobjective: MinimizeMigrations[weight=3]\ndurations:\n  migrate: 4\n",
        )
        .unwrap();
        assert_eq!(config.time_limit, Some(Duration::from_millis(2500)));
        assert_eq!(config.objective, Some(Objective::MinimizeMigrations { weight: 3 }));
        assert_eq!(config.durations.migrate, 4);
        assert_eq!(config.durations.shutdown, 1);
        assert_eq!(config.node_limit, None);
    }

    #[test]
    fn test_errors() {
        assert!(matches!(
            EngineConfig::from_yaml("objective: MaximizeFun"),
            Err(ConfigError::UnknownObjective(_))
        ));
        assert!(matches!(
            EngineConfig::from_yaml("time_limit: [1"),
            Err(ConfigError::Parse { .. })
        ));
        assert!(matches!(
            EngineConfig::from_file("no-such-file.yaml"),
            Err(ConfigError::Io { .. })
        ));
    }
}
