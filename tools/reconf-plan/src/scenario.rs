//! Scenario file: source configuration, rules and objective.

use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;

use dslab_reconf::objective::objective_resolver;
use dslab_reconf::rules::rule_resolver;
use dslab_reconf::{Configuration, ReconfigurationRequest};

/// Holds configuration of a single host or a set of identical hosts.
#[derive(Debug, Deserialize)]
pub struct HostConfig {
    /// Host name.
    /// Should be set if count = 1.
    pub name: Option<String>,
    /// Host name prefix.
    /// Full name is produced by appending host instance number to the prefix.
    /// Should be set if count > 1.
    pub name_prefix: Option<String>,
    /// Number of such hosts.
    pub count: Option<u32>,
    /// Whether the node is online, ignored for externs.
    pub online: Option<bool>,
    pub capacity: BTreeMap<String, u64>,
    pub tags: Option<Vec<String>>,
}

impl HostConfig {
    fn names(&self) -> Result<Vec<String>, String> {
        let count = self.count.unwrap_or(1);
        match (&self.name, &self.name_prefix) {
            (Some(name), _) if count == 1 => Ok(vec![name.clone()]),
            (_, Some(prefix)) => Ok((1..=count).map(|i| format!("{}{}", prefix, i)).collect()),
            _ => Err(format!("host config {:?} needs a name or a name prefix", self)),
        }
    }
}

/// Holds configuration of a single VM.
#[derive(Debug, Deserialize)]
pub struct VmConfig {
    pub name: String,
    /// Host the VM is placed on, the VM is waiting if not set.
    pub host: Option<String>,
    /// One of `running` (default), `sleeping` or `paused`, used when the host is set.
    pub state: Option<String>,
    pub usage: BTreeMap<String, u64>,
    pub tags: Option<Vec<String>>,
    /// Host the running VM must be migrated to.
    pub target: Option<String>,
    /// Whether the running VM may be stopped.
    pub stoppable: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct SiteConfig {
    pub name: String,
    pub hosts: Vec<String>,
}

/// Holds raw scenario parsed from YAML file.
#[derive(Debug, Deserialize)]
pub struct Scenario {
    pub nodes: Option<Vec<HostConfig>>,
    pub externs: Option<Vec<HostConfig>>,
    pub vms: Option<Vec<VmConfig>>,
    pub sites: Option<Vec<SiteConfig>>,
    /// Rule config strings such as `Ban[vms=vm1,hosts=n1]`.
    pub rules: Option<Vec<String>>,
    /// Objective config string such as `MinimizeMigrations`.
    pub objective: Option<String>,
}

impl Scenario {
    pub fn from_file(path: &Path) -> Result<Self, String> {
        let data = std::fs::read_to_string(path).map_err(|e| format!("can't read file {}: {}", path.display(), e))?;
        serde_yaml::from_str(&data).map_err(|e| format!("can't parse YAML from {}: {}", path.display(), e))
    }

    /// Builds the source configuration.
    pub fn configuration(&self) -> Result<Configuration, String> {
        let mut cfg = Configuration::new();
        for node in self.nodes.iter().flatten() {
            let capacities = pairs(&node.capacity);
            for name in node.names()? {
                if node.online.unwrap_or(true) {
                    cfg.add_online(&name, &capacities).map_err(|e| e.to_string())?;
                } else {
                    cfg.add_offline(&name, &capacities).map_err(|e| e.to_string())?;
                }
                for tag in node.tags.iter().flatten() {
                    cfg.tag_host(&name, tag).map_err(|e| e.to_string())?;
                }
            }
        }
        for ext in self.externs.iter().flatten() {
            let capacities = pairs(&ext.capacity);
            for name in ext.names()? {
                cfg.add_extern(&name, &capacities).map_err(|e| e.to_string())?;
                for tag in ext.tags.iter().flatten() {
                    cfg.tag_host(&name, tag).map_err(|e| e.to_string())?;
                }
            }
        }
        for site in self.sites.iter().flatten() {
            let hosts = site.hosts.iter().map(|h| h.as_str()).collect::<Vec<_>>();
            cfg.add_site(&site.name, &hosts).map_err(|e| e.to_string())?;
        }
        for vm in self.vms.iter().flatten() {
            let host = vm.host.as_deref();
            cfg.add_vm(&vm.name, host, &pairs(&vm.usage))
                .map_err(|e| e.to_string())?;
            match (host, vm.state.as_deref()) {
                (_, None | Some("running")) => {}
                (Some(host), Some("sleeping")) => cfg.set_sleeping(&vm.name, host).map_err(|e| e.to_string())?,
                (Some(host), Some("paused")) => cfg.set_paused(&vm.name, host).map_err(|e| e.to_string())?,
                (_, Some(state)) => return Err(format!("invalid state {} of vm {}", state, vm.name)),
            }
            for tag in vm.tags.iter().flatten() {
                cfg.require_tag(&vm.name, tag).map_err(|e| e.to_string())?;
            }
            if let Some(target) = vm.target.as_deref() {
                cfg.set_migration_target(&vm.name, Some(target))
                    .map_err(|e| e.to_string())?;
            }
        }
        Ok(cfg)
    }

    /// Builds the reconfiguration request.
    pub fn request(&self) -> Result<ReconfigurationRequest, String> {
        let mut request = ReconfigurationRequest::new(self.configuration()?);
        for rule in self.rules.iter().flatten() {
            request = request.rule_boxed(rule_resolver(rule).map_err(|e| e.to_string())?);
        }
        if let Some(objective) = self.objective.as_deref() {
            request = request.objective(objective_resolver(objective).map_err(|e| e.to_string())?);
        }
        for vm in self.vms.iter().flatten() {
            if vm.stoppable.unwrap_or(false) {
                request = request.allow_stop(&vm.name);
            }
        }
        Ok(request)
    }
}

fn pairs(values: &BTreeMap<String, u64>) -> Vec<(&str, u64)> {
    values.iter().map(|(k, &v)| (k.as_str(), v)).collect()
}
