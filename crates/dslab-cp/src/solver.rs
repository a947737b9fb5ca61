//! Solver: model construction, propagation and search.

use std::collections::VecDeque;
use std::fmt::{Display, Formatter};
use std::time::{Duration, Instant};

use log::{debug, trace, warn};

use crate::domain::Domain;
use crate::propagator::Propagator;
use crate::store::{IntVar, Store};
use crate::strategy::{BranchingStrategy, Decision};
use crate::Contradiction;

/// Search limit which stopped the search.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Limit {
    Time,
    Nodes,
    Backtracks,
}

/// Final status of a search call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SearchStatus {
    /// A solution was found (satisfaction search).
    Solved,
    /// The best solution was found and proven optimal.
    Optimal,
    /// The search space was exhausted without a solution.
    Infeasible,
    /// A limit was reached; a solution may still have been found.
    Stopped(Limit),
}

/// Search statistics of a single search call.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SolverStatistics {
    pub nodes: u64,
    pub backtracks: u64,
    pub solutions: u64,
    pub elapsed: Duration,
}

impl Display for SolverStatistics {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "{} nodes, {} backtracks, {} solutions in {:.3?}",
            self.nodes, self.backtracks, self.solutions, self.elapsed
        )
    }
}

/// Values of all variables in a solution.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Solution {
    values: Vec<i64>,
}

impl Solution {
    fn from_store(store: &Store) -> Self {
        Self {
            values: (0..store.var_count()).map(|i| store.min(IntVar(i))).collect(),
        }
    }

    pub fn value(&self, var: IntVar) -> i64 {
        self.values[var.0]
    }
}

/// Result of a search call.
#[derive(Clone, Debug)]
pub struct SearchOutcome {
    pub status: SearchStatus,
    pub solution: Option<Solution>,
    pub statistics: SolverStatistics,
}

#[derive(Clone, Copy, Debug, Default)]
struct SearchLimits {
    time: Option<Duration>,
    nodes: Option<u64>,
    backtracks: Option<u64>,
}

struct Frame {
    saved: Store,
    decision: Decision,
    refuted: bool,
}

/// Constraint solver owning the variables, the propagators and the search strategies of one model.
///
/// Posting a constraint propagates it immediately at the root, so an inconsistent model is detected before search.
/// Search never modifies the root store: every search call starts from the root again, which allows to run
/// several searches (e.g. with different strategies) on the same model.
pub struct Solver {
    names: Vec<String>,
    root: Store,
    failed: bool,
    propagators: Vec<Box<dyn Propagator>>,
    watchers: Vec<Vec<usize>>,
    strategies: Vec<Box<dyn BranchingStrategy>>,
    complete: bool,
    limits: SearchLimits,
}

impl Solver {
    pub fn new() -> Self {
        Self {
            names: Vec::new(),
            root: Store::default(),
            failed: false,
            propagators: Vec::new(),
            watchers: Vec::new(),
            strategies: Vec::new(),
            complete: true,
            limits: SearchLimits::default(),
        }
    }

    fn add_var(&mut self, name: &str, domain: Domain) -> IntVar {
        self.names.push(name.to_string());
        self.watchers.push(Vec::new());
        self.root.add(domain)
    }

    /// Creates variable with enumerated domain `[lb, ub]`.
    pub fn int_var(&mut self, name: &str, lb: i64, ub: i64) -> IntVar {
        self.add_var(name, Domain::enumerated(lb, ub))
    }

    /// Creates variable with bounded domain `[lb, ub]`.
    pub fn bounded_var(&mut self, name: &str, lb: i64, ub: i64) -> IntVar {
        self.add_var(name, Domain::bounded(lb, ub))
    }

    /// Creates variable with enumerated domain consisting of the specified values.
    pub fn var_from_values(&mut self, name: &str, values: &[i64]) -> IntVar {
        self.add_var(name, Domain::from_values(values))
    }

    /// Creates 0/1 variable.
    pub fn bool_var(&mut self, name: &str) -> IntVar {
        self.int_var(name, 0, 1)
    }

    pub fn constant(&mut self, name: &str, value: i64) -> IntVar {
        self.add_var(name, Domain::enumerated(value, value))
    }

    pub fn var_name(&self, var: IntVar) -> &str {
        &self.names[var.0]
    }

    pub fn var_count(&self) -> usize {
        self.names.len()
    }

    pub fn propagator_count(&self) -> usize {
        self.propagators.len()
    }

    /// Returns the root store, i.e. the domains after the propagation of all posted constraints.
    pub fn root(&self) -> &Store {
        &self.root
    }

    /// Returns true if the model was proven inconsistent at the root.
    pub fn is_failed(&self) -> bool {
        self.failed
    }

    /// Posts constraint and propagates it at the root.
    pub fn post<P: Propagator + 'static>(&mut self, propagator: P) -> Result<(), Contradiction> {
        self.post_boxed(Box::new(propagator))
    }

    pub fn post_boxed(&mut self, propagator: Box<dyn Propagator>) -> Result<(), Contradiction> {
        let id = self.propagators.len();
        for var in propagator.vars() {
            if !self.watchers[var.0].contains(&id) {
                self.watchers[var.0].push(id);
            }
        }
        self.propagators.push(propagator);
        self.propagate_root(&[id])
    }

    /// Removes value from the root domain of the variable.
    pub fn remove_value(&mut self, var: IntVar, v: i64) -> Result<(), Contradiction> {
        let res = self.root.remove_value(var, v);
        self.after_root_change(res)
    }

    pub fn instantiate(&mut self, var: IntVar, v: i64) -> Result<(), Contradiction> {
        let res = self.root.instantiate(var, v);
        self.after_root_change(res)
    }

    pub fn update_lb(&mut self, var: IntVar, v: i64) -> Result<(), Contradiction> {
        let res = self.root.update_lb(var, v);
        self.after_root_change(res)
    }

    pub fn update_ub(&mut self, var: IntVar, v: i64) -> Result<(), Contradiction> {
        let res = self.root.update_ub(var, v);
        self.after_root_change(res)
    }

    fn after_root_change(&mut self, res: Result<bool, Contradiction>) -> Result<(), Contradiction> {
        if res.is_err() {
            self.failed = true;
        }
        res?;
        self.propagate_root(&[])
    }

    fn propagate_root(&mut self, initial: &[usize]) -> Result<(), Contradiction> {
        if self.failed {
            return Err(Contradiction);
        }
        let mut root = std::mem::take(&mut self.root);
        let res = self.propagate(&mut root, initial);
        self.root = root;
        if res.is_err() {
            self.failed = true;
        }
        res
    }

    /// Runs propagators until fixpoint.
    fn propagate(&self, store: &mut Store, initial: &[usize]) -> Result<(), Contradiction> {
        let mut queued = vec![false; self.propagators.len()];
        let mut queue = VecDeque::new();
        for &id in initial {
            if !queued[id] {
                queued[id] = true;
                queue.push_back(id);
            }
        }
        loop {
            for var in store.take_modified() {
                for &id in self.watchers[var.0].iter() {
                    if !queued[id] {
                        queued[id] = true;
                        queue.push_back(id);
                    }
                }
            }
            let Some(id) = queue.pop_front() else {
                return Ok(());
            };
            queued[id] = false;
            self.propagators[id].propagate(store)?;
        }
    }

    /// Replaces the search strategies. Strategies are asked for decisions in the given order.
    pub fn set_strategies(&mut self, strategies: Vec<Box<dyn BranchingStrategy>>) {
        self.strategies = strategies;
    }

    pub fn add_strategy(&mut self, strategy: Box<dyn BranchingStrategy>) {
        self.strategies.push(strategy);
    }

    /// If the search is complete (default), variables left unbound by all strategies are assigned to their minimum
    /// value. Otherwise such state is a dead end.
    pub fn set_complete_search(&mut self, complete: bool) {
        self.complete = complete;
    }

    pub fn limit_time(&mut self, limit: Option<Duration>) {
        self.limits.time = limit;
    }

    pub fn limit_nodes(&mut self, limit: Option<u64>) {
        self.limits.nodes = limit;
    }

    pub fn limit_backtracks(&mut self, limit: Option<u64>) {
        self.limits.backtracks = limit;
    }

    /// Searches for the first solution.
    pub fn find_solution(&mut self) -> SearchOutcome {
        self.search(None)
    }

    /// Searches for the solution with the best value of the objective variable using branch-and-bound.
    pub fn find_optimal_solution(&mut self, objective: IntVar, minimize: bool) -> SearchOutcome {
        self.search(Some((objective, minimize)))
    }

    fn search(&mut self, objective: Option<(IntVar, bool)>) -> SearchOutcome {
        let started = Instant::now();
        let mut stats = SolverStatistics::default();
        if self.failed {
            return SearchOutcome {
                status: SearchStatus::Infeasible,
                solution: None,
                statistics: stats,
            };
        }

        let mut best: Option<Solution> = None;
        let mut bound: Option<i64> = None;
        let mut stack: Vec<Frame> = Vec::new();
        let mut store = self.root.clone();
        for strategy in self.strategies.iter_mut() {
            strategy.reconsider(&store);
        }

        let mut consistent = true;
        let stopped = loop {
            if let Some(limit) = self.check_limits(started, &stats) {
                break Some(limit);
            }
            if consistent {
                if let Some(decision) = self.next_decision(&store) {
                    stats.nodes += 1;
                    trace!(
                        "[{}] {} = {} in {}",
                        stack.len(),
                        self.names[decision.var.0],
                        decision.value,
                        store.domain(decision.var)
                    );
                    stack.push(Frame {
                        saved: store.clone(),
                        decision,
                        refuted: false,
                    });
                    consistent = store.instantiate(decision.var, decision.value).is_ok()
                        && self.propagate_bounded(&mut store, objective, bound).is_ok();
                    continue;
                }
                if store.all_instantiated() {
                    stats.solutions += 1;
                    let solution = Solution::from_store(&store);
                    match objective {
                        None => {
                            best = Some(solution);
                            break None;
                        }
                        Some((var, minimize)) => {
                            let value = solution.value(var);
                            debug!("solution #{} with objective {}", stats.solutions, value);
                            bound = Some(if minimize { value - 1 } else { value + 1 });
                            best = Some(solution);
                        }
                    }
                }
            }
            if !self.backtrack(&mut stack, &mut store, &mut stats, objective, bound) {
                break None;
            }
            consistent = true;
        };

        stats.elapsed = started.elapsed();
        let status = match stopped {
            Some(limit) => SearchStatus::Stopped(limit),
            None => match (&best, objective) {
                (None, _) => SearchStatus::Infeasible,
                (Some(_), None) => SearchStatus::Solved,
                (Some(_), Some(_)) => SearchStatus::Optimal,
            },
        };
        debug!("search finished with {:?}: {}", status, stats);
        SearchOutcome {
            status,
            solution: best,
            statistics: stats,
        }
    }

    fn check_limits(&self, started: Instant, stats: &SolverStatistics) -> Option<Limit> {
        if let Some(limit) = self.limits.time {
            if started.elapsed() >= limit {
                return Some(Limit::Time);
            }
        }
        if let Some(limit) = self.limits.nodes {
            if stats.nodes >= limit {
                return Some(Limit::Nodes);
            }
        }
        if let Some(limit) = self.limits.backtracks {
            if stats.backtracks >= limit {
                return Some(Limit::Backtracks);
            }
        }
        None
    }

    fn next_decision(&mut self, store: &Store) -> Option<Decision> {
        for strategy in self.strategies.iter_mut() {
            if let Some(decision) = strategy.next_decision(store) {
                if !store.is_instantiated(decision.var) && store.contains(decision.var, decision.value) {
                    return Some(decision);
                }
                warn!(
                    "strategy {} returned invalid decision {} = {}",
                    strategy.name(),
                    self.names[decision.var.0],
                    decision.value
                );
            }
        }
        if self.complete {
            store.first_unbound().map(|var| Decision::new(var, store.min(var)))
        } else {
            None
        }
    }

    /// Restores the deepest open branch and takes its refutation. Returns false when the search space is exhausted.
    fn backtrack(
        &mut self,
        stack: &mut Vec<Frame>,
        store: &mut Store,
        stats: &mut SolverStatistics,
        objective: Option<(IntVar, bool)>,
        bound: Option<i64>,
    ) -> bool {
        while let Some(frame) = stack.last_mut() {
            if frame.refuted {
                stack.pop();
                continue;
            }
            frame.refuted = true;
            *store = std::mem::take(&mut frame.saved);
            stats.backtracks += 1;
            let decision = frame.decision;
            trace!(
                "[{}] {} != {}",
                stack.len() - 1,
                self.names[decision.var.0],
                decision.value
            );
            for strategy in self.strategies.iter_mut() {
                strategy.reconsider(store);
            }
            if store.remove_value(decision.var, decision.value).is_ok()
                && self.propagate_bounded(store, objective, bound).is_ok()
            {
                return true;
            }
        }
        false
    }

    fn propagate_bounded(
        &self,
        store: &mut Store,
        objective: Option<(IntVar, bool)>,
        bound: Option<i64>,
    ) -> Result<(), Contradiction> {
        if let (Some((var, minimize)), Some(bound)) = (objective, bound) {
            if minimize {
                store.update_ub(var, bound)?;
            } else {
                store.update_lb(var, bound)?;
            }
        }
        self.propagate(store, &[])
    }
}

impl Default for Solver {
    fn default() -> Self {
        Self::new()
    }
}
