//! Fallback strategy.

use dslab_cp::{BranchingStrategy, Decision, IntVar, Store};

use crate::model::ReconfigurationModel;

/// Assigns locations, node states and VM states to their minimal values.
pub struct Dummy {
    vars: Vec<IntVar>,
}

impl Dummy {
    pub fn new(model: &ReconfigurationModel) -> Self {
        let vars = model
            .locations()
            .iter()
            .chain(model.node_states())
            .chain(model.states())
            .copied()
            .collect();
        Self { vars }
    }
}

impl BranchingStrategy for Dummy {
    fn name(&self) -> &str {
        "Dummy"
    }

    fn next_decision(&mut self, store: &Store) -> Option<Decision> {
        self.vars
            .iter()
            .find(|&&var| !store.is_instantiated(var))
            .map(|&var| Decision::new(var, store.min(var)))
    }
}
