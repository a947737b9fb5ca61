//! Keeps waiting VMs waiting.

use dslab_cp::{BranchingStrategy, Decision, IntVar, Store};

use crate::heuristics::waiting_states;
use crate::model::{ReconfigurationModel, WAITING};

/// Tries to leave every VM waiting in the source configuration in the waiting state,
/// so that no VM is started without a reason.
pub struct NoWaiting {
    states: Vec<IntVar>,
}

impl NoWaiting {
    pub fn new(model: &ReconfigurationModel) -> Self {
        Self {
            states: waiting_states(model),
        }
    }
}

impl BranchingStrategy for NoWaiting {
    fn name(&self) -> &str {
        "NoWaiting"
    }

    fn next_decision(&mut self, store: &Store) -> Option<Decision> {
        self.states
            .iter()
            .find(|&&state| !store.is_instantiated(state) && store.contains(state, WAITING))
            .map(|&state| Decision::new(state, WAITING))
    }
}
