#![doc = include_str!("../readme.md")]

pub mod constraints;
pub mod domain;
pub mod propagator;
pub mod solver;
pub mod store;
pub mod strategy;

pub use domain::Domain;
pub use propagator::Propagator;
pub use solver::{Limit, SearchOutcome, SearchStatus, Solution, Solver, SolverStatistics};
pub use store::{IntVar, Store};
pub use strategy::{BranchingStrategy, Decision};

/// Raised when a domain becomes empty, i.e. the current branch has no solution.
#[derive(thiserror::Error, Clone, Copy, Debug, PartialEq, Eq)]
#[error("domain wipe-out")]
pub struct Contradiction;

#[cfg(test)]
mod tests;
