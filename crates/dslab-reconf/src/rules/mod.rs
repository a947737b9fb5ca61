//! Placement rules.

pub mod affinity;
pub mod capacity;
pub mod placement;
pub mod power;

use dslab_cp::IntVar;
use log::debug;

use crate::config::options::{parse_config_value, parse_list, parse_options, required_option};
use crate::configuration::Configuration;
use crate::element::VmState;
use crate::error::{ConfigError, SolveError};
use crate::model::ReconfigurationModel;

pub use affinity::{Gather, SameSite, Spread};
pub use capacity::HostCapacity;
pub use placement::{Ban, Fence, Run, Stop};
pub use power::{MaxOnline, Offline, Online};

/// Trait for implementation of placement rules.
///
/// A rule injects its constraints (and optionally objective terms and heuristics) into the model before search,
/// and is able to check itself on any configuration. Rules referring to VMs which must be stopped or moved
/// away from their host release these VMs via `stoppable_vms`, otherwise running VMs are kept running.
pub trait PlacementRule {
    fn name(&self) -> String;

    fn inject(&self, model: &mut ReconfigurationModel) -> Result<(), SolveError>;

    fn is_satisfied(&self, cfg: &Configuration) -> bool;

    /// Returns running VMs of the source configuration which this rule allows to stop.
    fn stoppable_vms(&self, _source: &Configuration) -> Vec<String> {
        Vec::new()
    }
}

/// Creates rule from config string such as `Ban[vms=vm1;vm2,hosts=n1]`.
pub fn rule_resolver(config_str: &str) -> Result<Box<dyn PlacementRule>, ConfigError> {
    let (rule_name, options) = parse_config_value(config_str);
    let options = parse_options(&options.unwrap_or_default());
    let list = |name: &str| options.get(name).map(|value| parse_list(value)).unwrap_or_default();
    let rule: Box<dyn PlacementRule> = match rule_name.as_str() {
        "Run" => Box::new(Run::new(list("vms"))),
        "Stop" => Box::new(Stop::new(list("vms"))),
        "Ban" => Box::new(Ban::new(list("vms"), list("hosts"))),
        "Fence" => Box::new(Fence::new(list("vms"), list("hosts"))),
        "Spread" => Box::new(Spread::new(list("vms"))),
        "Gather" => Box::new(Gather::new(list("vms"))),
        "SameSite" => Box::new(SameSite::new(list("vms"))),
        "Online" => Box::new(Online::new(list("nodes"))),
        "Offline" => Box::new(Offline::new(list("nodes"))),
        "MaxOnline" => Box::new(MaxOnline::new(
            list("nodes"),
            required_option(&options, "max", config_str)?,
        )),
        "HostCapacity" => Box::new(HostCapacity::new(
            list("hosts"),
            required_option(&options, "max", config_str)?,
        )),
        _ => return Err(ConfigError::UnknownRule(config_str.to_string())),
    };
    Ok(rule)
}

/// VMs named by a rule: location variables of the VMs placed by the solver and source states of the sleeping and
/// paused VMs, which keep their state.
struct RuleVms {
    locations: Vec<IntVar>,
    frozen: Vec<(String, VmState)>,
}

fn rule_vms(model: &ReconfigurationModel, vms: &[String]) -> Result<RuleVms, SolveError> {
    let mut locations = Vec::with_capacity(vms.len());
    let mut frozen = Vec::new();
    for vm in vms {
        match model.vm_index(vm)? {
            Some(i) => locations.push(model.location(i)),
            None => {
                let state = model.source().vm_state(vm).cloned().unwrap_or(VmState::Waiting);
                frozen.push((vm.clone(), state));
            }
        }
    }
    Ok(RuleVms { locations, frozen })
}

/// Error of a rule which can not hold because a frozen VM keeps its state.
fn violated_by_frozen(rule: &dyn PlacementRule, vm: &str, state: &VmState) -> SolveError {
    debug!("{} can not hold: {} stays {}", rule.name(), vm, state);
    SolveError::Infeasible
}

fn host_indices(model: &ReconfigurationModel, hosts: &[String]) -> Result<Vec<usize>, SolveError> {
    hosts.iter().map(|host| model.host_index(host)).collect()
}
