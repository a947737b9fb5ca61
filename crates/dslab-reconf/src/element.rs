//! Managed elements of a datacenter and their states.

use std::collections::BTreeSet;
use std::fmt::{Display, Formatter};
use std::hash::{Hash, Hasher};

use serde::Serialize;

/// Element identified by a unique name. Elements are equal if their names are equal.
pub trait ManagedElement {
    fn name(&self) -> &str;
}

macro_rules! impl_named_identity {
    ($t:ty) => {
        impl ManagedElement for $t {
            fn name(&self) -> &str {
                &self.name
            }
        }

        impl PartialEq for $t {
            fn eq(&self, other: &Self) -> bool {
                self.name == other.name
            }
        }

        impl Eq for $t {}

        impl Hash for $t {
            fn hash<H: Hasher>(&self, state: &mut H) {
                self.name.hash(state);
            }
        }

        impl Display for $t {
            fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
                write!(f, "{}", self.name)
            }
        }
    };
}

/// Physical node managed by the engine.
#[derive(Clone, Debug, Serialize)]
pub struct Node {
    pub name: String,
    pub tags: BTreeSet<String>,
}

/// Externally managed hosting capacity, e.g. a cloud account.
/// It hosts VMs under the same packing rules as a node but is never switched on or off.
#[derive(Clone, Debug, Serialize)]
pub struct Extern {
    pub name: String,
    pub tags: BTreeSet<String>,
}

/// Virtual machine.
#[derive(Clone, Debug, Serialize)]
pub struct VirtualMachine {
    pub name: String,
    /// Tags a host must carry to run this VM.
    pub required_tags: BTreeSet<String>,
}

/// Named group of hosts.
#[derive(Clone, Debug, Serialize)]
pub struct Site {
    pub name: String,
    pub hosts: Vec<String>,
}

impl_named_identity!(Node);
impl_named_identity!(Extern);
impl_named_identity!(VirtualMachine);
impl_named_identity!(Site);

impl Node {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            tags: BTreeSet::new(),
        }
    }
}

impl Extern {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            tags: BTreeSet::new(),
        }
    }
}

impl VirtualMachine {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            required_tags: BTreeSet::new(),
        }
    }

    /// Returns true if a host with the given tags can run this VM.
    pub fn accepts(&self, host_tags: &BTreeSet<String>) -> bool {
        self.required_tags.is_subset(host_tags)
    }
}

impl Site {
    pub fn new(name: &str, hosts: Vec<String>) -> Self {
        Self {
            name: name.to_string(),
            hosts,
        }
    }
}

////////////////////////////////////////////////////////////////////////////////

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum NodeState {
    Online,
    Offline,
}

/// State of a VM. Every state except `Waiting` carries the host the VM resides on.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum VmState {
    Running(String),
    /// Suspended to the disk of the host, consumes no resources.
    Sleeping(String),
    /// Paused in memory of the host, keeps its resources.
    Paused(String),
    Waiting,
}

impl VmState {
    pub fn host(&self) -> Option<&str> {
        match self {
            VmState::Running(host) | VmState::Sleeping(host) | VmState::Paused(host) => Some(host),
            VmState::Waiting => None,
        }
    }

    pub fn is_running(&self) -> bool {
        matches!(self, VmState::Running(_))
    }

    pub fn is_waiting(&self) -> bool {
        matches!(self, VmState::Waiting)
    }

    /// Returns the host whose resources the VM occupies.
    pub fn occupied_host(&self) -> Option<&str> {
        match self {
            VmState::Running(host) | VmState::Paused(host) => Some(host),
            VmState::Sleeping(_) | VmState::Waiting => None,
        }
    }

    /// Returns true if the VM occupies resources of its host.
    pub fn consumes_resources(&self) -> bool {
        matches!(self, VmState::Running(_) | VmState::Paused(_))
    }

    /// Sleeping and paused VMs are kept as they are during solving.
    pub fn is_frozen(&self) -> bool {
        matches!(self, VmState::Sleeping(_) | VmState::Paused(_))
    }
}

impl Display for VmState {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        match self {
            VmState::Running(host) => write!(f, "running on {}", host),
            VmState::Sleeping(host) => write!(f, "sleeping on {}", host),
            VmState::Paused(host) => write!(f, "paused on {}", host),
            VmState::Waiting => write!(f, "waiting"),
        }
    }
}
