//! Resource capacities of hosts and usages of VMs.

use indexmap::IndexMap;

use crate::configuration::Configuration;
use crate::error::SolveError;

/// Values of a single resource type (e.g. "cpu" or "mem"): capacity of every host and usage of every VM.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ResourceSpecification {
    name: String,
    capacities: IndexMap<String, u64>,
    usages: IndexMap<String, u64>,
}

impl ResourceSpecification {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            capacities: IndexMap::new(),
            usages: IndexMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_capacity(&mut self, host: &str, value: u64) {
        self.capacities.insert(host.to_string(), value);
    }

    pub fn set_usage(&mut self, vm: &str, value: u64) {
        self.usages.insert(vm.to_string(), value);
    }

    pub fn capacity(&self, host: &str) -> Option<u64> {
        self.capacities.get(host).copied()
    }

    pub fn usage(&self, vm: &str) -> Option<u64> {
        self.usages.get(vm).copied()
    }

    pub(crate) fn forget(&mut self, element: &str) {
        self.capacities.shift_remove(element);
        self.usages.shift_remove(element);
    }

    /// Returns the amount of resource used by the VMs placed on the host.
    /// Running and paused VMs are counted, sleeping VMs are not.
    pub fn load(&self, cfg: &Configuration, host: &str) -> u64 {
        cfg.consumers(host).map(|vm| self.usage(vm).unwrap_or(0)).sum()
    }

    /// Returns the ratio of the resource used by all running and paused VMs to the capacity of all hosts.
    pub fn total_load(&self, cfg: &Configuration) -> f64 {
        let used: u64 = cfg
            .vms()
            .filter(|vm| cfg.vm_state(vm).map_or(false, |s| s.consumes_resources()))
            .map(|vm| self.usage(vm).unwrap_or(0))
            .sum();
        let capacity: u64 = cfg.hosts().map(|host| self.capacity(host).unwrap_or(0)).sum();
        if capacity == 0 {
            0.
        } else {
            used as f64 / capacity as f64
        }
    }
}

////////////////////////////////////////////////////////////////////////////////

/// Resource specifications of all registered resource types.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ResourceLedger {
    specs: IndexMap<String, ResourceSpecification>,
}

impl ResourceLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers resource specification, replacing the existing one with the same name.
    pub fn register(&mut self, spec: ResourceSpecification) {
        self.specs.insert(spec.name.clone(), spec);
    }

    /// Returns specification of the resource type, registering an empty one if it is absent.
    pub fn entry(&mut self, resource: &str) -> &mut ResourceSpecification {
        self.specs
            .entry(resource.to_string())
            .or_insert_with(|| ResourceSpecification::new(resource))
    }

    /// Returns names of registered resource types in registration order.
    pub fn resource_types(&self) -> impl Iterator<Item = &str> {
        self.specs.keys().map(|name| name.as_str())
    }

    pub fn get(&self, resource: &str) -> Option<&ResourceSpecification> {
        self.specs.get(resource)
    }

    pub fn specs(&self) -> impl Iterator<Item = &ResourceSpecification> {
        self.specs.values()
    }

    pub fn capacity(&self, resource: &str, host: &str) -> Option<u64> {
        self.specs.get(resource).and_then(|spec| spec.capacity(host))
    }

    pub fn usage(&self, resource: &str, vm: &str) -> Option<u64> {
        self.specs.get(resource).and_then(|spec| spec.usage(vm))
    }

    pub fn load(&self, cfg: &Configuration, resource: &str, host: &str) -> u64 {
        self.specs.get(resource).map_or(0, |spec| spec.load(cfg, host))
    }

    pub fn total_load(&self, cfg: &Configuration, resource: &str) -> f64 {
        self.specs.get(resource).map_or(0., |spec| spec.total_load(cfg))
    }

    pub(crate) fn forget(&mut self, element: &str) {
        for spec in self.specs.values_mut() {
            spec.forget(element);
        }
    }

    /// Checks that every host has a capacity and every VM has a usage for every registered resource type.
    pub fn validate(&self, cfg: &Configuration) -> Result<(), SolveError> {
        for spec in self.specs.values() {
            let missing_host = cfg.hosts().find(|host| spec.capacity(host).is_none());
            let missing_vm = cfg.vms().find(|vm| spec.usage(vm).is_none());
            if let Some(element) = missing_host.or(missing_vm) {
                return Err(SolveError::MissingSpecification {
                    resource: spec.name.clone(),
                    element: element.to_string(),
                });
            }
        }
        Ok(())
    }

    /// Returns the number of VMs identical to `vm` the host can run, i.e. the minimum over resource types of
    /// `capacity / usage`. Resources not used by the VM impose no limit.
    pub fn max_vms_per_node(&self, host: &str, vm: &str) -> u64 {
        self.specs
            .values()
            .filter_map(|spec| {
                let usage = spec.usage(vm).unwrap_or(0);
                if usage == 0 {
                    None
                } else {
                    Some(spec.capacity(host).unwrap_or(0) / usage)
                }
            })
            .min()
            .unwrap_or(u64::MAX)
    }

    /// Checks that the host load does not exceed its capacity for every resource type.
    pub fn fits(&self, cfg: &Configuration, host: &str) -> bool {
        self.specs
            .values()
            .all(|spec| spec.load(cfg, host) <= spec.capacity(host).unwrap_or(0))
    }

    /// Returns the hosts whose load exceeds capacity for some resource type.
    pub fn overloaded_hosts(&self, cfg: &Configuration) -> Vec<String> {
        cfg.hosts()
            .filter(|host| !self.fits(cfg, host))
            .map(|host| host.to_string())
            .collect()
    }
}
