//! Composition of heuristics.

use dslab_cp::{BranchingStrategy, Decision, IntVar, Store};

/// Activation phase of an [`Activated`] heuristic.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    /// The activation condition does not hold yet.
    Idle,
    Active,
    /// The heuristic declined while active and stays silent until the next backtrack.
    Exhausted,
}

/// Heuristic which only offers decisions once its activation condition holds.
///
/// Idle becomes Active as soon as the condition holds in the current store. An active heuristic which has nothing
/// to decide becomes Exhausted. `reconsider` re-evaluates the condition in the restored store after a backtrack.
pub struct Activated {
    inner: Box<dyn BranchingStrategy>,
    condition: Box<dyn Fn(&Store) -> bool>,
    phase: Phase,
}

impl Activated {
    pub fn new<F: Fn(&Store) -> bool + 'static>(inner: Box<dyn BranchingStrategy>, condition: F) -> Self {
        Self {
            inner,
            condition: Box::new(condition),
            phase: Phase::Idle,
        }
    }

    /// Activates the heuristic once all the observed variables are instantiated.
    pub fn when_instantiated(inner: Box<dyn BranchingStrategy>, observed: Vec<IntVar>) -> Self {
        Self::new(inner, move |store| observed.iter().all(|&var| store.is_instantiated(var)))
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }
}

impl BranchingStrategy for Activated {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn next_decision(&mut self, store: &Store) -> Option<Decision> {
        if self.phase == Phase::Idle && (self.condition)(store) {
            self.phase = Phase::Active;
        }
        if self.phase != Phase::Active {
            return None;
        }
        let decision = self.inner.next_decision(store);
        if decision.is_none() {
            self.phase = Phase::Exhausted;
        }
        decision
    }

    fn reconsider(&mut self, store: &Store) {
        self.phase = if (self.condition)(store) {
            Phase::Active
        } else {
            Phase::Idle
        };
        self.inner.reconsider(store);
    }
}

////////////////////////////////////////////////////////////////////////////////

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChainState {
    Active,
    /// Every member declined, the chain is not asked again until the next backtrack.
    Exhausted,
}

/// Asks its members for a decision in priority order.
pub struct HeuristicChain {
    name: String,
    members: Vec<Box<dyn BranchingStrategy>>,
    state: ChainState,
}

impl HeuristicChain {
    pub fn new(name: &str, members: Vec<Box<dyn BranchingStrategy>>) -> Self {
        Self {
            name: name.to_string(),
            members,
            state: ChainState::Active,
        }
    }

    pub fn state(&self) -> ChainState {
        self.state
    }

    /// Returns member names in priority order.
    pub fn member_names(&self) -> Vec<&str> {
        self.members.iter().map(|m| m.name()).collect()
    }
}

impl BranchingStrategy for HeuristicChain {
    fn name(&self) -> &str {
        &self.name
    }

    fn next_decision(&mut self, store: &Store) -> Option<Decision> {
        if self.state == ChainState::Exhausted {
            return None;
        }
        for member in self.members.iter_mut() {
            if let Some(decision) = member.next_decision(store) {
                return Some(decision);
            }
        }
        self.state = ChainState::Exhausted;
        None
    }

    fn reconsider(&mut self, store: &Store) {
        self.state = ChainState::Active;
        for member in self.members.iter_mut() {
            member.reconsider(store);
        }
    }
}
