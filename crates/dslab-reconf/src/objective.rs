//! Optimization objectives.

use crate::config::options::{option_or, parse_config_value, parse_options};
use crate::error::{ConfigError, SolveError};
use crate::heuristics::PackOnlineNodes;
use crate::model::ReconfigurationModel;

/// Minimized objective. Each variant contributes weighted terms to the objective variable of the model.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Objective {
    /// Number of running VMs moved to another host.
    MinimizeMigrations { weight: i64 },
    /// Number of online nodes.
    MinimizeOnlineNodes { weight: i64 },
}

impl Objective {
    pub fn name(&self) -> String {
        match self {
            Objective::MinimizeMigrations { weight } => format!("MinimizeMigrations[weight={}]", weight),
            Objective::MinimizeOnlineNodes { weight } => format!("MinimizeOnlineNodes[weight={}]", weight),
        }
    }

    /// Adds objective terms and heuristics to the model.
    pub fn inject(&self, model: &mut ReconfigurationModel, sort_resource: Option<&str>) -> Result<(), SolveError> {
        match *self {
            Objective::MinimizeMigrations { weight } => {
                for i in 0..model.vms().len() {
                    let migrated = model.is_migrated(i);
                    model.add_objective_term(weight, migrated);
                }
            }
            Objective::MinimizeOnlineNodes { weight } => {
                for state in model.node_states().to_vec() {
                    model.add_objective_term(weight, state);
                }
                let heuristic = PackOnlineNodes::new(model, sort_resource);
                model.add_heuristic(Box::new(heuristic));
            }
        }
        Ok(())
    }
}

/// Creates objective from config string such as `MinimizeMigrations[weight=2]`.
pub fn objective_resolver(config_str: &str) -> Result<Objective, ConfigError> {
    let (name, options) = parse_config_value(config_str);
    let options = parse_options(&options.unwrap_or_default());
    let weight = option_or(&options, "weight", 1, config_str)?;
    match name.as_str() {
        "MinimizeMigrations" => Ok(Objective::MinimizeMigrations { weight }),
        "MinimizeOnlineNodes" => Ok(Objective::MinimizeOnlineNodes { weight }),
        _ => Err(ConfigError::UnknownObjective(config_str.to_string())),
    }
}
