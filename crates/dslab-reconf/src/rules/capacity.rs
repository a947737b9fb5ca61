//! Limit on the number of VMs placed on a group of hosts.

use dslab_cp::constraints::{Linear, ReifiedMember, Relation};

use crate::configuration::Configuration;
use crate::error::SolveError;
use crate::model::ReconfigurationModel;
use crate::rules::{host_indices, PlacementRule};

/// The hosts together run at most `max` VMs. Paused VMs are counted as they keep their resources.
pub struct HostCapacity {
    hosts: Vec<String>,
    max: usize,
}

impl HostCapacity {
    pub fn new(hosts: Vec<String>, max: usize) -> Self {
        Self { hosts, max }
    }

    fn count(&self, cfg: &Configuration) -> usize {
        self.hosts.iter().map(|host| cfg.consumers(host).count()).sum()
    }
}

impl PlacementRule for HostCapacity {
    fn name(&self) -> String {
        format!("capacity({{{}}}, {})", self.hosts.join(", "), self.max)
    }

    fn inject(&self, model: &mut ReconfigurationModel) -> Result<(), SolveError> {
        let values = host_indices(model, &self.hosts)?
            .into_iter()
            .map(|h| h as i64)
            .collect::<Vec<_>>();
        // paused VMs are not in the model, running ones are counted through their location
        let source = model.source();
        let fixed = self
            .hosts
            .iter()
            .flat_map(|host| source.consumers(host))
            .filter(|vm| !source.vm_state(vm).map_or(false, |s| s.is_running()))
            .count();
        let mut terms = Vec::with_capacity(model.vms().len());
        for i in 0..model.vms().len() {
            let location = model.location(i);
            let b = model.solver_mut().bool_var(&format!("hosted#{}", i));
            model.post(ReifiedMember::new(b, location, &values))?;
            terms.push((1, b));
        }
        model.post(Linear::new(terms, Relation::Le, self.max as i64 - fixed as i64))
    }

    fn is_satisfied(&self, cfg: &Configuration) -> bool {
        self.count(cfg) <= self.max
    }
}
