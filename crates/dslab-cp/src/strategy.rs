//! Branching strategies.

use crate::store::{IntVar, Store};

/// Branching decision: the left branch assigns `var = value`, the right branch removes `value` from `var`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Decision {
    pub var: IntVar,
    pub value: i64,
}

impl Decision {
    pub fn new(var: IntVar, value: i64) -> Self {
        Self { var, value }
    }
}

/// Trait for implementation of search strategies.
///
/// The solver asks its strategies for a decision in priority order and uses the first one offered.
/// A strategy returns `None` when it has nothing to decide in the current store.
pub trait BranchingStrategy {
    fn name(&self) -> &str;

    fn next_decision(&mut self, store: &Store) -> Option<Decision>;

    /// Called at the start of search and after every backtrack with the restored store.
    fn reconsider(&mut self, _store: &Store) {}
}
