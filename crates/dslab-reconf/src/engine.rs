//! Reconfiguration engine.

use std::collections::HashSet;
use std::fmt::{Display, Formatter};
use std::time::{Duration, Instant};

use log::{debug, info, warn};

use dslab_cp::{IntVar, Limit, SearchOutcome, SearchStatus, Solution};

use crate::config::EngineConfig;
use crate::configuration::Configuration;
use crate::error::SolveError;
use crate::heuristics::{find_heuristics, prove_heuristics};
use crate::model::ReconfigurationModel;
use crate::objective::Objective;
use crate::packing::{BinPackingPacker, Packer};
use crate::plan::{extract_with_durations, ActionGraph};
use crate::rules::PlacementRule;

/// Reconfiguration problem: the source configuration, the rules the destination must satisfy and the objective.
pub struct ReconfigurationRequest {
    source: Configuration,
    rules: Vec<Box<dyn PlacementRule>>,
    objective: Option<Objective>,
    stoppable: HashSet<String>,
    time_limit: Option<Duration>,
}

impl ReconfigurationRequest {
    pub fn new(source: Configuration) -> Self {
        Self {
            source,
            rules: Vec::new(),
            objective: None,
            stoppable: HashSet::new(),
            time_limit: None,
        }
    }

    pub fn rule<R: PlacementRule + 'static>(self, rule: R) -> Self {
        self.rule_boxed(Box::new(rule))
    }

    pub fn rule_boxed(mut self, rule: Box<dyn PlacementRule>) -> Self {
        self.rules.push(rule);
        self
    }

    /// Sets the objective, overriding the one from engine config.
    pub fn objective(mut self, objective: Objective) -> Self {
        self.objective = Some(objective);
        self
    }

    /// Allows the running VM to be stopped in the destination configuration.
    pub fn allow_stop(mut self, vm: &str) -> Self {
        self.stoppable.insert(vm.to_string());
        self
    }

    /// Sets the time budget of the solve call, overriding the one from engine config.
    pub fn time_limit(mut self, limit: Duration) -> Self {
        self.time_limit = Some(limit);
        self
    }

    pub fn source(&self) -> &Configuration {
        &self.source
    }

    pub fn rules(&self) -> &[Box<dyn PlacementRule>] {
        &self.rules
    }
}

////////////////////////////////////////////////////////////////////////////////

/// Search pass which produced the returned solution.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SearchPass {
    Find,
    Prove,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct SolvingStatistics {
    pub nodes: u64,
    pub backtracks: u64,
    pub solutions: u64,
    pub elapsed: Duration,
    /// Whether a search limit was reached, the returned destination (if any) is then not proven optimal.
    pub timed_out: bool,
    pub pass: Option<SearchPass>,
    /// Objective value of the returned destination.
    pub objective: Option<i64>,
}

impl SolvingStatistics {
    fn add(&mut self, outcome: &SearchOutcome) {
        self.nodes += outcome.statistics.nodes;
        self.backtracks += outcome.statistics.backtracks;
        self.solutions += outcome.statistics.solutions;
    }
}

impl Display for SolvingStatistics {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "{} nodes, {} backtracks, {} solutions in {:.3?}",
            self.nodes, self.backtracks, self.solutions, self.elapsed
        )?;
        if let Some(pass) = self.pass {
            write!(f, ", solved by {:?} pass", pass)?;
        }
        if let Some(objective) = self.objective {
            write!(f, ", objective = {}", objective)?;
        }
        if self.timed_out {
            write!(f, " (timed out)")?;
        }
        Ok(())
    }
}

/// Outcome of a solve call. The destination is absent if the problem is infeasible or the search timed out
/// before finding any solution.
#[derive(Clone, Debug)]
pub struct ReconfigurationResult {
    pub destination: Option<Configuration>,
    pub plan: ActionGraph,
    pub statistics: SolvingStatistics,
}

impl ReconfigurationResult {
    fn without_destination(statistics: SolvingStatistics) -> Self {
        Self {
            destination: None,
            plan: ActionGraph::new(),
            statistics,
        }
    }

    pub fn is_feasible(&self) -> bool {
        self.destination.is_some()
    }

    /// Returns the destination or the reason of its absence.
    pub fn into_destination(self) -> Result<Configuration, SolveError> {
        match self.destination {
            Some(destination) => Ok(destination),
            None if self.statistics.timed_out => Err(SolveError::Timeout),
            None => Err(SolveError::Infeasible),
        }
    }
}

////////////////////////////////////////////////////////////////////////////////

/// Computes destination configurations and the plans reaching them.
///
/// One engine can solve any number of requests one after another, each solve call builds its own model.
pub struct ReconfigurationEngine {
    config: EngineConfig,
    packer: Box<dyn Packer>,
}

impl Default for ReconfigurationEngine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl ReconfigurationEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            packer: Box::new(BinPackingPacker::new()),
        }
    }

    /// Replaces the packing constraint used for resources.
    pub fn with_packer(mut self, packer: Box<dyn Packer>) -> Self {
        self.packer = packer;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Solves the request.
    ///
    /// Infeasibility and timeouts are reported through an absent destination. Errors are returned only for
    /// invalid inputs: missing resource values, unknown elements referenced by rules, inconsistent source.
    pub fn solve(&self, request: &ReconfigurationRequest) -> Result<ReconfigurationResult, SolveError> {
        let started = Instant::now();
        let source = &request.source;
        source.resources().validate(source)?;
        source.check_invariants()?;

        let time_limit = request.time_limit.or(self.config.time_limit);
        let objective = request.objective.as_ref().or(self.config.objective.as_ref());
        let sort_resource = self
            .config
            .sort_resource
            .clone()
            .or_else(|| source.resources().resource_types().next().map(|r| r.to_string()));
        let sort_resource = sort_resource.as_deref();

        let mut stoppable = request.stoppable.clone();
        for rule in request.rules.iter() {
            stoppable.extend(rule.stoppable_vms(source));
        }

        let mut statistics = SolvingStatistics::default();
        let (mut model, objective_var) =
            match self.build_model(source, &request.rules, &stoppable, objective, sort_resource) {
                Ok(built) => built,
                Err(e @ (SolveError::Infeasible | SolveError::NotPlaceable(_))) => {
                    warn!("no destination: {}", e);
                    statistics.elapsed = started.elapsed();
                    return Ok(ReconfigurationResult::without_destination(statistics));
                }
                Err(e) => return Err(e),
            };

        let mut best: Option<(Solution, SearchPass)> = None;
        let waiting = source.waiting_vms().count();
        if waiting > self.config.find_pass_max_waiting {
            debug!("find pass skipped: {} waiting vms", waiting);
        } else {
            let chain = find_heuristics(&model, sort_resource);
            let solver = model.solver_mut();
            solver.set_strategies(vec![Box::new(chain)]);
            solver.set_complete_search(true);
            solver.limit_backtracks(Some(self.config.find_pass_backtrack_limit));
            solver.limit_nodes(None);
            solver.limit_time(remaining(time_limit, started));
            let outcome = solver.find_solution();
            debug!("find pass: {:?}, {}", outcome.status, outcome.statistics);
            statistics.add(&outcome);
            if let SearchStatus::Stopped(Limit::Time) = outcome.status {
                statistics.timed_out = true;
            }
            best = outcome.solution.map(|solution| (solution, SearchPass::Find));
        }

        let run_prove = match (&best, objective_var) {
            (None, _) => !statistics.timed_out,
            (Some(_), None) => false,
            (Some((solution, _)), Some(var)) => {
                let bound = solution.value(var) - 1;
                // failure means the first solution is already optimal
                model.solver_mut().update_ub(var, bound).is_ok()
            }
        };
        if run_prove {
            let chain = prove_heuristics(&mut model, sort_resource);
            let solver = model.solver_mut();
            solver.set_strategies(vec![Box::new(chain)]);
            solver.set_complete_search(true);
            solver.limit_backtracks(None);
            solver.limit_nodes(self.config.node_limit);
            solver.limit_time(remaining(time_limit, started));
            let outcome = match objective_var {
                Some(var) => solver.find_optimal_solution(var, true),
                None => solver.find_solution(),
            };
            debug!("prove pass: {:?}, {}", outcome.status, outcome.statistics);
            statistics.add(&outcome);
            if let SearchStatus::Stopped(_) = outcome.status {
                statistics.timed_out = true;
            }
            if let Some(solution) = outcome.solution {
                best = Some((solution, SearchPass::Prove));
            }
        }

        let (solution, pass) = match best {
            Some(best) => best,
            None => {
                statistics.elapsed = started.elapsed();
                if statistics.timed_out {
                    warn!("no destination found before the search limit: {}", statistics);
                } else {
                    warn!("no destination: {}", SolveError::Infeasible);
                }
                return Ok(ReconfigurationResult::without_destination(statistics));
            }
        };
        statistics.pass = Some(pass);
        statistics.objective = objective_var.map(|var| solution.value(var));

        let destination = model.destination(&solution)?;
        if let Some(rule) = request.rules.iter().find(|rule| !rule.is_satisfied(&destination)) {
            warn!("no destination: rule {} is not satisfied by the solution", rule.name());
            statistics.elapsed = started.elapsed();
            return Ok(ReconfigurationResult::without_destination(statistics));
        }
        debug_assert!(
            destination.resources().overloaded_hosts(&destination).is_empty(),
            "overloaded hosts in destination"
        );
        let plan = extract_with_durations(source, &destination, &self.config.durations);
        statistics.elapsed = started.elapsed();
        info!("reconfiguration plan with {} actions: {}", plan.len(), statistics);
        Ok(ReconfigurationResult {
            destination: Some(destination),
            plan,
            statistics,
        })
    }

    fn build_model<'a>(
        &self,
        source: &'a Configuration,
        rules: &[Box<dyn PlacementRule>],
        stoppable: &HashSet<String>,
        objective: Option<&Objective>,
        sort_resource: Option<&str>,
    ) -> Result<(ReconfigurationModel<'a>, Option<IntVar>), SolveError> {
        let mut model = ReconfigurationModel::build(source, rules, self.packer.as_ref(), stoppable)?;
        if let Some(objective) = objective {
            debug!("injecting objective {}", objective.name());
            objective.inject(&mut model, sort_resource)?;
        }
        let objective_var = model.create_objective()?;
        Ok((model, objective_var))
    }
}

fn remaining(limit: Option<Duration>, started: Instant) -> Option<Duration> {
    limit.map(|limit| limit.saturating_sub(started.elapsed()))
}
