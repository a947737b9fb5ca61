//! Propagator trait.

use crate::store::{IntVar, Store};
use crate::Contradiction;

/// Filtering algorithm of a constraint.
///
/// The solver calls `propagate` when the constraint is posted and every time the domain of one of `vars` changes.
/// Propagators must be stateless with respect to the search: all the state they need is in the store, because
/// the solver restores stores on backtrack but never rewinds propagators.
pub trait Propagator {
    /// Returns the name used in logs.
    fn name(&self) -> &str;
    /// Returns the variables which wake up the propagator.
    fn vars(&self) -> Vec<IntVar>;
    /// Removes unsupported values from the domains, fails if the constraint cannot be satisfied.
    fn propagate(&self, store: &mut Store) -> Result<(), Contradiction>;
}
