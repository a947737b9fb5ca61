//! Rules restricting where VMs may run.

use itertools::Itertools;

use crate::configuration::Configuration;
use crate::element::VmState;
use crate::error::SolveError;
use crate::model::ReconfigurationModel;
use crate::rules::{host_indices, rule_vms, violated_by_frozen, PlacementRule};

/// VMs must be running. A sleeping or paused VM stays so and can not satisfy it.
pub struct Run {
    vms: Vec<String>,
}

impl Run {
    pub fn new(vms: Vec<String>) -> Self {
        Self { vms }
    }
}

impl PlacementRule for Run {
    fn name(&self) -> String {
        format!("run({})", self.vms.join(", "))
    }

    fn inject(&self, model: &mut ReconfigurationModel) -> Result<(), SolveError> {
        let vms = rule_vms(model, &self.vms)?;
        if let Some((vm, state)) = vms.frozen.first() {
            return Err(violated_by_frozen(self, vm, state));
        }
        let waiting = model.waiting_value();
        for location in vms.locations {
            model.solver_mut().remove_value(location, waiting)?;
        }
        Ok(())
    }

    fn is_satisfied(&self, cfg: &Configuration) -> bool {
        self.vms
            .iter()
            .all(|vm| cfg.vm_state(vm).map_or(false, VmState::is_running))
    }
}

////////////////////////////////////////////////////////////////////////////////

/// VMs must be stopped.
pub struct Stop {
    vms: Vec<String>,
}

impl Stop {
    pub fn new(vms: Vec<String>) -> Self {
        Self { vms }
    }
}

impl PlacementRule for Stop {
    fn name(&self) -> String {
        format!("stop({})", self.vms.join(", "))
    }

    fn inject(&self, model: &mut ReconfigurationModel) -> Result<(), SolveError> {
        let waiting = model.waiting_value();
        for location in rule_vms(model, &self.vms)?.locations {
            model.solver_mut().instantiate(location, waiting)?;
        }
        Ok(())
    }

    fn is_satisfied(&self, cfg: &Configuration) -> bool {
        self.vms
            .iter()
            .all(|vm| !cfg.vm_state(vm).map_or(false, VmState::is_running))
    }

    fn stoppable_vms(&self, _source: &Configuration) -> Vec<String> {
        self.vms.clone()
    }
}

////////////////////////////////////////////////////////////////////////////////

/// VMs must not run on any of the hosts. A paused VM counts as running on its host.
pub struct Ban {
    vms: Vec<String>,
    hosts: Vec<String>,
}

impl Ban {
    pub fn new(vms: Vec<String>, hosts: Vec<String>) -> Self {
        Self { vms, hosts }
    }

    fn bans(&self, state: &VmState) -> bool {
        state
            .occupied_host()
            .map_or(false, |host| self.hosts.iter().any(|h| h == host))
    }
}

impl PlacementRule for Ban {
    fn name(&self) -> String {
        format!("ban({{{}}}, {{{}}})", self.vms.join(", "), self.hosts.join(", "))
    }

    fn inject(&self, model: &mut ReconfigurationModel) -> Result<(), SolveError> {
        let banned = host_indices(model, &self.hosts)?;
        let vms = rule_vms(model, &self.vms)?;
        if let Some((vm, state)) = vms.frozen.iter().find(|(_, state)| self.bans(state)) {
            return Err(violated_by_frozen(self, vm, state));
        }
        for location in vms.locations {
            for &h in banned.iter() {
                model.solver_mut().remove_value(location, h as i64)?;
            }
        }
        Ok(())
    }

    fn is_satisfied(&self, cfg: &Configuration) -> bool {
        self.vms
            .iter()
            .all(|vm| !cfg.vm_state(vm).map_or(false, |state| self.bans(state)))
    }
}

////////////////////////////////////////////////////////////////////////////////

/// VMs may only run on the hosts. A paused VM counts as running on its host.
pub struct Fence {
    vms: Vec<String>,
    hosts: Vec<String>,
}

impl Fence {
    pub fn new(vms: Vec<String>, hosts: Vec<String>) -> Self {
        Self { vms, hosts }
    }

    fn allows(&self, state: &VmState) -> bool {
        state
            .occupied_host()
            .map_or(true, |host| self.hosts.iter().any(|h| h == host))
    }
}

impl PlacementRule for Fence {
    fn name(&self) -> String {
        format!("fence({{{}}}, {{{}}})", self.vms.join(", "), self.hosts.join(", "))
    }

    fn inject(&self, model: &mut ReconfigurationModel) -> Result<(), SolveError> {
        let allowed = host_indices(model, &self.hosts)?;
        let forbidden = (0..model.hosts().len())
            .filter(|h| !allowed.contains(h))
            .collect_vec();
        let vms = rule_vms(model, &self.vms)?;
        if let Some((vm, state)) = vms.frozen.iter().find(|(_, state)| !self.allows(state)) {
            return Err(violated_by_frozen(self, vm, state));
        }
        for location in vms.locations {
            for &h in forbidden.iter() {
                model.solver_mut().remove_value(location, h as i64)?;
            }
        }
        Ok(())
    }

    fn is_satisfied(&self, cfg: &Configuration) -> bool {
        self.vms
            .iter()
            .all(|vm| cfg.vm_state(vm).map_or(true, |state| self.allows(state)))
    }
}
