//! Keeps running VMs and nodes in their source state.

use std::cmp::Reverse;

use dslab_cp::{BranchingStrategy, Decision, IntVar, Store};

use crate::element::NodeState;
use crate::heuristics::usage;
use crate::model::{ReconfigurationModel, OFFLINE, ONLINE};

/// Tries to keep every running VM on its source host, biggest consumers of the sort resource first,
/// then tries to keep every node in its source state.
pub struct StickToSource {
    preferences: Vec<(IntVar, i64)>,
}

impl StickToSource {
    pub fn new(model: &ReconfigurationModel, sort_resource: Option<&str>) -> Self {
        let mut vms = (0..model.vms().len())
            .filter_map(|i| model.source_location(i).map(|h| (i, h)))
            .collect::<Vec<_>>();
        vms.sort_by_key(|&(i, _)| Reverse(usage(model, sort_resource, &model.vms()[i])));

        let mut preferences = vms
            .into_iter()
            .map(|(i, h)| (model.location(i), h as i64))
            .collect::<Vec<_>>();
        let source = model.source();
        for (n, &state) in model.node_states().iter().enumerate() {
            let value = match source.node_state(&model.hosts()[n]) {
                Some(NodeState::Online) => ONLINE,
                _ => OFFLINE,
            };
            preferences.push((state, value));
        }
        Self { preferences }
    }
}

impl BranchingStrategy for StickToSource {
    fn name(&self) -> &str {
        "StickToSource"
    }

    fn next_decision(&mut self, store: &Store) -> Option<Decision> {
        self.preferences
            .iter()
            .find(|&&(var, value)| !store.is_instantiated(var) && store.contains(var, value))
            .map(|&(var, value)| Decision::new(var, value))
    }
}
