//! Affinity and anti-affinity rules between VMs.

use std::collections::HashSet;

use dslab_cp::constraints::{AllDifferentExcept, Element, Equal};

use crate::configuration::Configuration;
use crate::element::VmState;
use crate::error::SolveError;
use crate::model::ReconfigurationModel;
use crate::rules::{rule_vms, violated_by_frozen, PlacementRule, RuleVms};

/// Returns the hosts occupied by running and paused VMs.
fn occupied_hosts<'a>(cfg: &'a Configuration, vms: &'a [String]) -> impl Iterator<Item = &'a str> {
    vms.iter().filter_map(move |vm| cfg.vm_state(vm).and_then(VmState::occupied_host))
}

/// Returns the host index of every frozen VM which occupies a host, together with the VM.
fn frozen_hosts<'v>(
    model: &ReconfigurationModel,
    vms: &'v RuleVms,
) -> Result<Vec<(usize, &'v (String, VmState))>, SolveError> {
    let mut hosts = Vec::new();
    for frozen in vms.frozen.iter() {
        if let Some(host) = frozen.1.occupied_host() {
            hosts.push((model.host_index(host)?, frozen));
        }
    }
    Ok(hosts)
}

/// Running VMs are placed on pairwise different hosts. A paused VM keeps its host to itself.
pub struct Spread {
    vms: Vec<String>,
}

impl Spread {
    pub fn new(vms: Vec<String>) -> Self {
        Self { vms }
    }
}

impl PlacementRule for Spread {
    fn name(&self) -> String {
        format!("spread({})", self.vms.join(", "))
    }

    fn inject(&self, model: &mut ReconfigurationModel) -> Result<(), SolveError> {
        let vms = rule_vms(model, &self.vms)?;
        let mut taken = Vec::new();
        for (h, (vm, state)) in frozen_hosts(model, &vms)? {
            if taken.contains(&h) {
                return Err(violated_by_frozen(self, vm, state));
            }
            taken.push(h);
        }
        for &location in vms.locations.iter() {
            for &h in taken.iter() {
                model.solver_mut().remove_value(location, h as i64)?;
            }
        }
        let waiting = model.waiting_value();
        model.post(AllDifferentExcept::new(vms.locations, Some(waiting)))
    }

    fn is_satisfied(&self, cfg: &Configuration) -> bool {
        let mut seen = HashSet::new();
        occupied_hosts(cfg, &self.vms).all(|host| seen.insert(host))
    }
}

////////////////////////////////////////////////////////////////////////////////

/// VMs share the same location: all of them run on a single host or none of them runs.
/// A paused VM fixes the host, sleeping VMs are not placed anywhere.
pub struct Gather {
    vms: Vec<String>,
}

impl Gather {
    pub fn new(vms: Vec<String>) -> Self {
        Self { vms }
    }
}

impl PlacementRule for Gather {
    fn name(&self) -> String {
        format!("gather({})", self.vms.join(", "))
    }

    fn inject(&self, model: &mut ReconfigurationModel) -> Result<(), SolveError> {
        let vms = rule_vms(model, &self.vms)?;
        let mut fixed = None;
        for (h, (vm, state)) in frozen_hosts(model, &vms)? {
            match fixed {
                Some(other) if other != h => return Err(violated_by_frozen(self, vm, state)),
                _ => fixed = Some(h),
            }
        }
        if let Some(h) = fixed {
            let host_count = model.hosts().len();
            for &location in vms.locations.iter() {
                for other in (0..host_count).filter(|&other| other != h) {
                    model.solver_mut().remove_value(location, other as i64)?;
                }
            }
        }
        for pair in vms.locations.windows(2) {
            model.post(Equal::new(pair[0], pair[1]))?;
        }
        Ok(())
    }

    fn is_satisfied(&self, cfg: &Configuration) -> bool {
        occupied_hosts(cfg, &self.vms).collect::<HashSet<_>>().len() <= 1
    }
}

////////////////////////////////////////////////////////////////////////////////

/// VMs are running on hosts of the same site. A host which belongs to no site forms a site of its own.
/// Paused VMs count as running on their host.
pub struct SameSite {
    vms: Vec<String>,
}

impl SameSite {
    pub fn new(vms: Vec<String>) -> Self {
        Self { vms }
    }
}

/// Returns the site of every host. Sites are numbered first, then every host without a site gets its own number.
fn site_table(model: &ReconfigurationModel) -> Vec<i64> {
    let source = model.source();
    let sites = source.sites().map(|site| site.name.as_str()).collect::<Vec<_>>();
    let mut table = model
        .hosts()
        .iter()
        .enumerate()
        .map(|(h, host)| match source.site_of(host) {
            Some(site) => sites.iter().position(|&s| s == site).unwrap_or(0) as i64,
            None => (sites.len() + h) as i64,
        })
        .collect::<Vec<_>>();
    table.push((sites.len() + model.hosts().len()) as i64);
    table
}

impl PlacementRule for SameSite {
    fn name(&self) -> String {
        format!("same_site({})", self.vms.join(", "))
    }

    fn inject(&self, model: &mut ReconfigurationModel) -> Result<(), SolveError> {
        let vms = rule_vms(model, &self.vms)?;
        if let Some((vm, state)) = vms.frozen.iter().find(|(_, state)| state.occupied_host().is_none()) {
            return Err(violated_by_frozen(self, vm, state));
        }
        let table = site_table(model);
        let mut fixed_site = None;
        for (h, (vm, state)) in frozen_hosts(model, &vms)? {
            match fixed_site {
                Some(site) if site != table[h] => return Err(violated_by_frozen(self, vm, state)),
                _ => fixed_site = Some(table[h]),
            }
        }
        let waiting = model.waiting_value();
        let mut site_vars = Vec::with_capacity(vms.locations.len());
        for (i, &location) in vms.locations.iter().enumerate() {
            model.solver_mut().remove_value(location, waiting)?;
            if let Some(site) = fixed_site {
                for h in (0..model.hosts().len()).filter(|&h| table[h] != site) {
                    model.solver_mut().remove_value(location, h as i64)?;
                }
            }
            let site = model.solver_mut().var_from_values(&format!("site#{}", i), &table);
            model.post(Element::new(location, table.clone(), site))?;
            site_vars.push(site);
        }
        for pair in site_vars.windows(2) {
            model.post(Equal::new(pair[0], pair[1]))?;
        }
        Ok(())
    }

    fn is_satisfied(&self, cfg: &Configuration) -> bool {
        let mut sites = HashSet::new();
        for vm in self.vms.iter() {
            match cfg.vm_state(vm).and_then(VmState::occupied_host) {
                Some(host) => {
                    sites.insert(cfg.site_of(host).unwrap_or(host).to_string());
                }
                None => return false,
            }
        }
        sites.len() <= 1
    }
}
