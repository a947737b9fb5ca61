//! Switches lightly loaded nodes off.

use dslab_cp::{BranchingStrategy, Decision, IntVar, Store};

use crate::heuristics::usage;
use crate::model::{ReconfigurationModel, OFFLINE};

/// Tries to switch nodes off, starting from the least loaded ones in the source configuration.
pub struct PackOnlineNodes {
    states: Vec<IntVar>,
}

impl PackOnlineNodes {
    pub fn new(model: &ReconfigurationModel, sort_resource: Option<&str>) -> Self {
        let source = model.source();
        let mut nodes = (0..model.node_count())
            .map(|n| {
                let load: u64 = source
                    .consumers(&model.hosts()[n])
                    .map(|vm| usage(model, sort_resource, vm))
                    .sum();
                (load, n)
            })
            .collect::<Vec<_>>();
        nodes.sort();
        Self {
            states: nodes.into_iter().map(|(_, n)| model.node_states()[n]).collect(),
        }
    }
}

impl BranchingStrategy for PackOnlineNodes {
    fn name(&self) -> &str {
        "PackOnlineNodes"
    }

    fn next_decision(&mut self, store: &Store) -> Option<Decision> {
        self.states
            .iter()
            .find(|&&state| !store.is_instantiated(state) && store.contains(state, OFFLINE))
            .map(|&state| Decision::new(state, OFFLINE))
    }
}
