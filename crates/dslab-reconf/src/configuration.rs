//! Datacenter configuration: nodes, externs, sites, VMs and their states.

use std::collections::BTreeSet;
use std::fmt::{Display, Formatter};

use indexmap::{IndexMap, IndexSet};
use itertools::Itertools;
use serde::Serialize;

use crate::element::{Extern, Node, NodeState, Site, VirtualMachine, VmState};
use crate::error::ConfigurationError;
use crate::resources::ResourceLedger;

#[derive(Clone, Debug, Serialize)]
struct NodeEntry {
    node: Node,
    state: NodeState,
}

#[derive(Clone, Debug, Serialize)]
struct VmEntry {
    vm: VirtualMachine,
    state: VmState,
    migration_target: Option<String>,
}

/// Snapshot of a datacenter.
///
/// Every mutator keeps the configuration consistent: a VM placed on a host is in the hosted set of that host and
/// vice versa, nodes hosting VMs are online and migration targets are valid hosts. A mutation which would break
/// these invariants is rejected with [`ConfigurationError`] and leaves the configuration unchanged.
///
/// Two configurations are equal when they contain the same elements in the same states, regardless of insertion
/// order. Resource values are not compared.
#[derive(Clone, Debug, Default, Serialize)]
pub struct Configuration {
    nodes: IndexMap<String, NodeEntry>,
    externs: IndexMap<String, Extern>,
    vms: IndexMap<String, VmEntry>,
    sites: IndexMap<String, Site>,
    #[serde(skip)]
    hosted: IndexMap<String, IndexSet<String>>,
    #[serde(skip)]
    resources: ResourceLedger,
}

impl Configuration {
    /// Creates empty configuration.
    pub fn new() -> Self {
        Self::default()
    }

    fn check_new_name(&self, name: &str) -> Result<(), ConfigurationError> {
        if self.nodes.contains_key(name)
            || self.externs.contains_key(name)
            || self.vms.contains_key(name)
            || self.sites.contains_key(name)
        {
            return Err(ConfigurationError::DuplicateElement(name.to_string()));
        }
        Ok(())
    }

    /// Adds online node with the specified resource capacities.
    pub fn add_online(&mut self, name: &str, capacities: &[(&str, u64)]) -> Result<(), ConfigurationError> {
        self.add_node(name, NodeState::Online, capacities)
    }

    /// Adds offline node with the specified resource capacities.
    pub fn add_offline(&mut self, name: &str, capacities: &[(&str, u64)]) -> Result<(), ConfigurationError> {
        self.add_node(name, NodeState::Offline, capacities)
    }

    fn add_node(&mut self, name: &str, state: NodeState, capacities: &[(&str, u64)]) -> Result<(), ConfigurationError> {
        self.check_new_name(name)?;
        self.nodes.insert(
            name.to_string(),
            NodeEntry {
                node: Node::new(name),
                state,
            },
        );
        self.hosted.insert(name.to_string(), IndexSet::new());
        for &(resource, value) in capacities {
            self.resources.entry(resource).set_capacity(name, value);
        }
        Ok(())
    }

    /// Adds extern with the specified resource capacities.
    pub fn add_extern(&mut self, name: &str, capacities: &[(&str, u64)]) -> Result<(), ConfigurationError> {
        self.check_new_name(name)?;
        self.externs.insert(name.to_string(), Extern::new(name));
        self.hosted.insert(name.to_string(), IndexSet::new());
        for &(resource, value) in capacities {
            self.resources.entry(resource).set_capacity(name, value);
        }
        Ok(())
    }

    /// Adds VM running on the specified host or waiting if the host is `None`.
    pub fn add_vm(&mut self, name: &str, host: Option<&str>, usages: &[(&str, u64)]) -> Result<(), ConfigurationError> {
        self.check_new_name(name)?;
        if let Some(host) = host {
            self.check_can_host(host)?;
        }
        self.vms.insert(
            name.to_string(),
            VmEntry {
                vm: VirtualMachine::new(name),
                state: VmState::Waiting,
                migration_target: None,
            },
        );
        if let Some(host) = host {
            self.place(name, VmState::Running(host.to_string()));
        }
        for &(resource, value) in usages {
            self.resources.entry(resource).set_usage(name, value);
        }
        Ok(())
    }

    /// Adds site grouping the specified hosts. A host belongs to at most one site.
    pub fn add_site(&mut self, name: &str, hosts: &[&str]) -> Result<(), ConfigurationError> {
        self.check_new_name(name)?;
        for &host in hosts {
            if !self.is_host(host) {
                return Err(self.not_a_host(host));
            }
            if self.site_of(host).is_some() {
                return Err(ConfigurationError::DuplicateElement(host.to_string()));
            }
        }
        let hosts = hosts.iter().map(|h| h.to_string()).collect();
        self.sites.insert(name.to_string(), Site::new(name, hosts));
        Ok(())
    }

    /// Registers resource type without any values, so that missing values are reported on validation.
    pub fn register_resource(&mut self, resource: &str) {
        self.resources.entry(resource);
    }

    pub fn set_capacity(&mut self, resource: &str, host: &str, value: u64) -> Result<(), ConfigurationError> {
        if !self.is_host(host) {
            return Err(self.not_a_host(host));
        }
        self.resources.entry(resource).set_capacity(host, value);
        Ok(())
    }

    pub fn set_usage(&mut self, resource: &str, vm: &str, value: u64) -> Result<(), ConfigurationError> {
        self.vm_entry(vm)?;
        self.resources.entry(resource).set_usage(vm, value);
        Ok(())
    }

    pub fn resources(&self) -> &ResourceLedger {
        &self.resources
    }

    ////////////////////////////////////////////////////////////////////////////

    fn not_a_host(&self, name: &str) -> ConfigurationError {
        if self.vms.contains_key(name) || self.sites.contains_key(name) {
            ConfigurationError::NotAHost(name.to_string())
        } else {
            ConfigurationError::UnknownElement(name.to_string())
        }
    }

    fn check_can_host(&self, host: &str) -> Result<(), ConfigurationError> {
        if let Some(entry) = self.nodes.get(host) {
            if entry.state == NodeState::Offline {
                return Err(ConfigurationError::HostOffline(host.to_string()));
            }
            Ok(())
        } else if self.externs.contains_key(host) {
            Ok(())
        } else {
            Err(self.not_a_host(host))
        }
    }

    fn vm_entry(&self, vm: &str) -> Result<&VmEntry, ConfigurationError> {
        self.vms
            .get(vm)
            .ok_or_else(|| ConfigurationError::UnknownElement(vm.to_string()))
    }

    fn vm_entry_mut(&mut self, vm: &str) -> Result<&mut VmEntry, ConfigurationError> {
        self.vms
            .get_mut(vm)
            .ok_or_else(|| ConfigurationError::UnknownElement(vm.to_string()))
    }

    /// Moves existing VM to the new state, keeping hosted sets in sync.
    fn place(&mut self, vm: &str, state: VmState) {
        let Some(entry) = self.vms.get_mut(vm) else {
            return;
        };
        if let Some(old) = entry.state.host() {
            if let Some(set) = self.hosted.get_mut(old) {
                set.shift_remove(vm);
            }
        }
        if let Some(new) = state.host() {
            self.hosted.entry(new.to_string()).or_default().insert(vm.to_string());
        }
        entry.state = state;
    }

    /// Sets VM running on the host.
    pub fn set_host(&mut self, vm: &str, host: &str) -> Result<(), ConfigurationError> {
        self.vm_entry(vm)?;
        self.check_can_host(host)?;
        self.place(vm, VmState::Running(host.to_string()));
        let entry = self.vm_entry_mut(vm)?;
        if entry.migration_target.as_deref() == Some(host) {
            entry.migration_target = None;
        }
        Ok(())
    }

    pub fn set_waiting(&mut self, vm: &str) -> Result<(), ConfigurationError> {
        self.vm_entry(vm)?;
        self.place(vm, VmState::Waiting);
        self.vm_entry_mut(vm)?.migration_target = None;
        Ok(())
    }

    pub fn set_sleeping(&mut self, vm: &str, host: &str) -> Result<(), ConfigurationError> {
        self.vm_entry(vm)?;
        self.check_can_host(host)?;
        self.place(vm, VmState::Sleeping(host.to_string()));
        self.vm_entry_mut(vm)?.migration_target = None;
        Ok(())
    }

    pub fn set_paused(&mut self, vm: &str, host: &str) -> Result<(), ConfigurationError> {
        self.vm_entry(vm)?;
        self.check_can_host(host)?;
        self.place(vm, VmState::Paused(host.to_string()));
        self.vm_entry_mut(vm)?.migration_target = None;
        Ok(())
    }

    /// Sets or clears the host a running VM must be migrated to.
    pub fn set_migration_target(&mut self, vm: &str, target: Option<&str>) -> Result<(), ConfigurationError> {
        let entry = self.vm_entry(vm)?;
        let VmState::Running(current) = &entry.state else {
            return Err(ConfigurationError::VmNotRunning(vm.to_string()));
        };
        if let Some(target) = target {
            if target == current {
                return Err(ConfigurationError::InvalidMigrationTarget(
                    vm.to_string(),
                    target.to_string(),
                ));
            }
            self.check_can_host(target)?;
        }
        self.vm_entry_mut(vm)?.migration_target = target.map(|t| t.to_string());
        Ok(())
    }

    pub fn set_online(&mut self, node: &str) -> Result<(), ConfigurationError> {
        match self.nodes.get_mut(node) {
            Some(entry) => {
                entry.state = NodeState::Online;
                Ok(())
            }
            None => Err(self.not_a_node(node)),
        }
    }

    /// Sets node offline. Every VM placed on the node becomes waiting and migrations to the node are cancelled.
    pub fn set_offline(&mut self, node: &str) -> Result<(), ConfigurationError> {
        if !self.nodes.contains_key(node) {
            return Err(self.not_a_node(node));
        }
        let evicted = self.hosted(node).map(|vm| vm.to_string()).collect::<Vec<_>>();
        for vm in evicted {
            self.set_waiting(&vm)?;
        }
        for entry in self.vms.values_mut() {
            if entry.migration_target.as_deref() == Some(node) {
                entry.migration_target = None;
            }
        }
        if let Some(entry) = self.nodes.get_mut(node) {
            entry.state = NodeState::Offline;
        }
        Ok(())
    }

    fn not_a_node(&self, name: &str) -> ConfigurationError {
        if self.externs.contains_key(name) {
            ConfigurationError::NotAHost(name.to_string())
        } else {
            self.not_a_host(name)
        }
    }

    /// Removes VM, node, extern or site. Hosts can only be removed when they host no VMs.
    pub fn remove(&mut self, name: &str) -> Result<(), ConfigurationError> {
        if self.vms.contains_key(name) {
            self.place(name, VmState::Waiting);
            self.vms.shift_remove(name);
            self.resources.forget(name);
            return Ok(());
        }
        if self.sites.shift_remove(name).is_some() {
            return Ok(());
        }
        if !self.is_host(name) {
            return Err(ConfigurationError::UnknownElement(name.to_string()));
        }
        let count = self.hosted(name).count();
        if count > 0 {
            return Err(ConfigurationError::HostNotEmpty(name.to_string(), count));
        }
        for entry in self.vms.values_mut() {
            if entry.migration_target.as_deref() == Some(name) {
                entry.migration_target = None;
            }
        }
        for site in self.sites.values_mut() {
            site.hosts.retain(|h| h != name);
        }
        self.nodes.shift_remove(name);
        self.externs.shift_remove(name);
        self.hosted.shift_remove(name);
        self.resources.forget(name);
        Ok(())
    }

    pub fn tag_host(&mut self, host: &str, tag: &str) -> Result<(), ConfigurationError> {
        if let Some(entry) = self.nodes.get_mut(host) {
            entry.node.tags.insert(tag.to_string());
            Ok(())
        } else if let Some(ext) = self.externs.get_mut(host) {
            ext.tags.insert(tag.to_string());
            Ok(())
        } else {
            Err(self.not_a_host(host))
        }
    }

    /// Requires the VM to run on hosts carrying the tag.
    pub fn require_tag(&mut self, vm: &str, tag: &str) -> Result<(), ConfigurationError> {
        self.vm_entry_mut(vm)?.vm.required_tags.insert(tag.to_string());
        Ok(())
    }

    ////////////////////////////////////////////////////////////////////////////

    pub fn has_vm(&self, name: &str) -> bool {
        self.vms.contains_key(name)
    }

    pub fn has_node(&self, name: &str) -> bool {
        self.nodes.contains_key(name)
    }

    pub fn has_extern(&self, name: &str) -> bool {
        self.externs.contains_key(name)
    }

    /// Returns true if the element is a node or an extern.
    pub fn is_host(&self, name: &str) -> bool {
        self.nodes.contains_key(name) || self.externs.contains_key(name)
    }

    pub fn node(&self, name: &str) -> Option<&Node> {
        self.nodes.get(name).map(|entry| &entry.node)
    }

    pub fn get_extern(&self, name: &str) -> Option<&Extern> {
        self.externs.get(name)
    }

    pub fn vm(&self, name: &str) -> Option<&VirtualMachine> {
        self.vms.get(name).map(|entry| &entry.vm)
    }

    pub fn site(&self, name: &str) -> Option<&Site> {
        self.sites.get(name)
    }

    pub fn node_state(&self, name: &str) -> Option<NodeState> {
        self.nodes.get(name).map(|entry| entry.state)
    }

    pub fn vm_state(&self, name: &str) -> Option<&VmState> {
        self.vms.get(name).map(|entry| &entry.state)
    }

    pub fn migration_target(&self, vm: &str) -> Option<&str> {
        self.vms.get(vm).and_then(|entry| entry.migration_target.as_deref())
    }

    pub fn host_tags(&self, host: &str) -> Option<&BTreeSet<String>> {
        match self.nodes.get(host) {
            Some(entry) => Some(&entry.node.tags),
            None => self.externs.get(host).map(|ext| &ext.tags),
        }
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn vm_count(&self) -> usize {
        self.vms.len()
    }

    pub fn nodes(&self) -> impl Iterator<Item = &str> {
        self.nodes.keys().map(|name| name.as_str())
    }

    pub fn online_nodes(&self) -> impl Iterator<Item = &str> {
        self.nodes_in(NodeState::Online)
    }

    pub fn offline_nodes(&self) -> impl Iterator<Item = &str> {
        self.nodes_in(NodeState::Offline)
    }

    fn nodes_in(&self, state: NodeState) -> impl Iterator<Item = &str> {
        self.nodes
            .iter()
            .filter(move |(_, entry)| entry.state == state)
            .map(|(name, _)| name.as_str())
    }

    pub fn externs(&self) -> impl Iterator<Item = &str> {
        self.externs.keys().map(|name| name.as_str())
    }

    /// Returns all hosts: nodes first, then externs.
    pub fn hosts(&self) -> impl Iterator<Item = &str> {
        self.nodes().chain(self.externs())
    }

    pub fn sites(&self) -> impl Iterator<Item = &Site> {
        self.sites.values()
    }

    pub fn site_of(&self, host: &str) -> Option<&str> {
        self.sites
            .values()
            .find(|site| site.hosts.iter().any(|h| h == host))
            .map(|site| site.name.as_str())
    }

    pub fn vms(&self) -> impl Iterator<Item = &str> {
        self.vms.keys().map(|name| name.as_str())
    }

    pub fn running_vms(&self) -> impl Iterator<Item = &str> {
        self.vms_where(VmState::is_running)
    }

    pub fn waiting_vms(&self) -> impl Iterator<Item = &str> {
        self.vms_where(VmState::is_waiting)
    }

    pub fn sleeping_vms(&self) -> impl Iterator<Item = &str> {
        self.vms_where(|s| matches!(s, VmState::Sleeping(_)))
    }

    pub fn paused_vms(&self) -> impl Iterator<Item = &str> {
        self.vms_where(|s| matches!(s, VmState::Paused(_)))
    }

    fn vms_where<F: Fn(&VmState) -> bool>(&self, predicate: F) -> impl Iterator<Item = &str> {
        self.vms
            .iter()
            .filter(move |(_, entry)| predicate(&entry.state))
            .map(|(name, _)| name.as_str())
    }

    /// Returns all VMs placed on the host, whatever their state.
    pub fn hosted(&self, host: &str) -> impl Iterator<Item = &str> {
        self.hosted.get(host).into_iter().flatten().map(|vm| vm.as_str())
    }

    pub fn running_on(&self, host: &str) -> impl Iterator<Item = &str> {
        self.hosted(host)
            .filter(move |vm| self.vm_state(vm).map_or(false, VmState::is_running))
    }

    /// Returns VMs which occupy resources of the host (running and paused ones).
    pub fn consumers(&self, host: &str) -> impl Iterator<Item = &str> {
        self.hosted(host)
            .filter(move |vm| self.vm_state(vm).map_or(false, VmState::consumes_resources))
    }

    /// Checks that both configurations consist of the same nodes, externs and VMs, whatever their states.
    pub fn same_elements(&self, other: &Configuration) -> bool {
        fn same_keys<V, W>(a: &IndexMap<String, V>, b: &IndexMap<String, W>) -> bool {
            a.len() == b.len() && a.keys().all(|k| b.contains_key(k))
        }
        same_keys(&self.nodes, &other.nodes)
            && same_keys(&self.externs, &other.externs)
            && same_keys(&self.vms, &other.vms)
    }

    /// Re-verifies the consistency between VM states, hosted sets and migration targets.
    pub fn check_invariants(&self) -> Result<(), ConfigurationError> {
        for (name, entry) in self.vms.iter() {
            if let Some(host) = entry.state.host() {
                if self.node_state(host) == Some(NodeState::Offline) {
                    return Err(ConfigurationError::HostOffline(host.to_string()));
                }
                if !self.hosted.get(host).map_or(false, |set| set.contains(name)) {
                    return Err(ConfigurationError::Inconsistent(format!(
                        "{} is {} but not in its hosted set",
                        name, entry.state
                    )));
                }
            }
            if let Some(target) = &entry.migration_target {
                if !entry.state.is_running() {
                    return Err(ConfigurationError::VmNotRunning(name.clone()));
                }
                if !self.is_host(target) || entry.state.host() == Some(target.as_str()) {
                    return Err(ConfigurationError::InvalidMigrationTarget(name.clone(), target.clone()));
                }
            }
        }
        for (host, set) in self.hosted.iter() {
            if !self.is_host(host) {
                return Err(ConfigurationError::NotAHost(host.clone()));
            }
            for vm in set {
                if self.vm_state(vm).and_then(|s| s.host()) != Some(host.as_str()) {
                    return Err(ConfigurationError::Inconsistent(format!(
                        "{} is in the hosted set of {} but is not placed there",
                        vm, host
                    )));
                }
            }
        }
        Ok(())
    }
}

impl PartialEq for Configuration {
    fn eq(&self, other: &Self) -> bool {
        self.same_elements(other)
            && self
                .nodes
                .iter()
                .all(|(name, entry)| other.node_state(name) == Some(entry.state))
            && self.vms.iter().all(|(name, entry)| {
                other.vm_state(name) == Some(&entry.state)
                    && other.migration_target(name) == entry.migration_target.as_deref()
            })
    }
}

impl Eq for Configuration {}

impl Display for Configuration {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        for (name, entry) in self.nodes.iter() {
            let state = match entry.state {
                NodeState::Online => "online",
                NodeState::Offline => "offline",
            };
            writeln!(f, "{} ({}): {}", name, state, self.describe_hosted(name))?;
        }
        for name in self.externs.keys() {
            writeln!(f, "{} (extern): {}", name, self.describe_hosted(name))?;
        }
        write!(f, "waiting: {}", self.waiting_vms().join(" "))
    }
}

impl Configuration {
    fn describe_hosted(&self, host: &str) -> String {
        self.hosted(host)
            .map(|vm| match self.vm_state(vm) {
                Some(VmState::Sleeping(_)) => format!("({})", vm),
                Some(VmState::Paused(_)) => format!("[{}]", vm),
                _ => match self.migration_target(vm) {
                    Some(target) => format!("{}->{}", vm, target),
                    None => vm.to_string(),
                },
            })
            .join(" ")
    }
}
