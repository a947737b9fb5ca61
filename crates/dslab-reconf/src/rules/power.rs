//! Rules on node states.

use dslab_cp::constraints::{Linear, Relation};

use crate::configuration::Configuration;
use crate::element::NodeState;
use crate::error::SolveError;
use crate::model::{ReconfigurationModel, OFFLINE, ONLINE};
use crate::rules::PlacementRule;

/// Nodes must be online.
pub struct Online {
    nodes: Vec<String>,
}

impl Online {
    pub fn new(nodes: Vec<String>) -> Self {
        Self { nodes }
    }
}

impl PlacementRule for Online {
    fn name(&self) -> String {
        format!("online({})", self.nodes.join(", "))
    }

    fn inject(&self, model: &mut ReconfigurationModel) -> Result<(), SolveError> {
        for node in self.nodes.iter() {
            let state = model.node_state(node)?;
            model.solver_mut().instantiate(state, ONLINE)?;
        }
        Ok(())
    }

    fn is_satisfied(&self, cfg: &Configuration) -> bool {
        self.nodes
            .iter()
            .all(|node| cfg.node_state(node) == Some(NodeState::Online))
    }
}

////////////////////////////////////////////////////////////////////////////////

/// Nodes must be offline. VMs running on these nodes may be stopped if they can not be moved elsewhere.
pub struct Offline {
    nodes: Vec<String>,
}

impl Offline {
    pub fn new(nodes: Vec<String>) -> Self {
        Self { nodes }
    }
}

impl PlacementRule for Offline {
    fn name(&self) -> String {
        format!("offline({})", self.nodes.join(", "))
    }

    fn inject(&self, model: &mut ReconfigurationModel) -> Result<(), SolveError> {
        for node in self.nodes.iter() {
            let state = model.node_state(node)?;
            model.solver_mut().instantiate(state, OFFLINE)?;
        }
        Ok(())
    }

    fn is_satisfied(&self, cfg: &Configuration) -> bool {
        self.nodes
            .iter()
            .all(|node| cfg.node_state(node) == Some(NodeState::Offline))
    }

    fn stoppable_vms(&self, source: &Configuration) -> Vec<String> {
        self.nodes
            .iter()
            .flat_map(|node| source.running_on(node))
            .map(|vm| vm.to_string())
            .collect()
    }
}

////////////////////////////////////////////////////////////////////////////////

/// At most `max` of the nodes are online.
pub struct MaxOnline {
    nodes: Vec<String>,
    max: usize,
}

impl MaxOnline {
    pub fn new(nodes: Vec<String>, max: usize) -> Self {
        Self { nodes, max }
    }
}

impl PlacementRule for MaxOnline {
    fn name(&self) -> String {
        format!("max_online({{{}}}, {})", self.nodes.join(", "), self.max)
    }

    fn inject(&self, model: &mut ReconfigurationModel) -> Result<(), SolveError> {
        let mut terms = Vec::with_capacity(self.nodes.len());
        for node in self.nodes.iter() {
            terms.push((1, model.node_state(node)?));
        }
        model.post(Linear::new(terms, Relation::Le, self.max as i64))
    }

    fn is_satisfied(&self, cfg: &Configuration) -> bool {
        let online = self
            .nodes
            .iter()
            .filter(|node| cfg.node_state(node) == Some(NodeState::Online))
            .count();
        online <= self.max
    }
}
