//! Constraint model of a reconfiguration problem.
//!
//! Hosts are indexed with nodes first, then externs. The location of a VM is either a host index or the special
//! value [`ReconfigurationModel::waiting_value`] which equals the number of hosts.

use std::collections::{HashMap, HashSet};

use indexmap::IndexMap;
use log::debug;

use dslab_cp::constraints::{Element, Linear, ReifiedMember, Relation};
use dslab_cp::{BranchingStrategy, Contradiction, IntVar, Propagator, Solution, Solver, Store};

use crate::configuration::Configuration;
use crate::element::VmState;
use crate::error::SolveError;
use crate::packing::Packer;
use crate::rules::PlacementRule;

/// Value of a VM state variable for a waiting VM.
pub const WAITING: i64 = 0;
/// Value of a VM state variable for a VM running on a node.
pub const RUNNING_ON_NODE: i64 = 1;
/// Value of a VM state variable for a VM running on an extern.
pub const RUNNING_EXTERN: i64 = 2;

/// Values of a node state variable.
pub const OFFLINE: i64 = 0;
pub const ONLINE: i64 = 1;

/// Decision variables and constraints built from a source configuration.
///
/// Sleeping and paused VMs are not part of the model: they keep their state, paused VMs load their host and both
/// keep their host online. Every other VM has a location, a state and a migration flag. A running VM stays
/// running unless it is stoppable.
pub struct ReconfigurationModel<'a> {
    source: &'a Configuration,
    solver: Solver,
    hosts: Vec<String>,
    node_count: usize,
    host_index: HashMap<String, usize>,
    vms: Vec<String>,
    vm_index: HashMap<String, usize>,
    location: Vec<IntVar>,
    state: Vec<IntVar>,
    is_migrated: Vec<IntVar>,
    node_state: Vec<IntVar>,
    loads: IndexMap<String, Vec<IntVar>>,
    stoppable: HashSet<String>,
    objective_terms: Vec<(i64, IntVar)>,
    heuristics: Vec<Box<dyn BranchingStrategy>>,
}

impl<'a> ReconfigurationModel<'a> {
    /// Builds the model and lets every rule inject its constraints.
    ///
    /// Fails with [`SolveError::Infeasible`] as soon as the constraints are proven inconsistent and with
    /// [`SolveError::NotPlaceable`] if a VM which must keep running has no host able to run it.
    pub fn build(
        source: &'a Configuration,
        rules: &[Box<dyn PlacementRule>],
        packer: &dyn Packer,
        stoppable: &HashSet<String>,
    ) -> Result<Self, SolveError> {
        let hosts = source.hosts().map(|h| h.to_string()).collect::<Vec<_>>();
        let host_index = hosts.iter().enumerate().map(|(i, h)| (h.clone(), i)).collect();
        let vms = source
            .vms()
            .filter(|vm| !source.vm_state(vm).map_or(false, VmState::is_frozen))
            .map(|vm| vm.to_string())
            .collect::<Vec<_>>();
        let vm_index = vms.iter().enumerate().map(|(i, vm)| (vm.clone(), i)).collect();

        let mut model = Self {
            source,
            solver: Solver::new(),
            hosts,
            node_count: source.node_count(),
            host_index,
            vms,
            vm_index,
            location: Vec::new(),
            state: Vec::new(),
            is_migrated: Vec::new(),
            node_state: Vec::new(),
            loads: IndexMap::new(),
            stoppable: stoppable.clone(),
            objective_terms: Vec::new(),
            heuristics: Vec::new(),
        };
        model.create_vm_variables()?;
        model.create_node_variables()?;
        model.post_packing(packer)?;
        for rule in rules {
            debug!("injecting rule {}", rule.name());
            rule.inject(&mut model)?;
        }
        debug!(
            "model built: {} hosts, {} vms, {} variables, {} constraints",
            model.hosts.len(),
            model.vms.len(),
            model.solver.var_count(),
            model.solver.propagator_count()
        );
        Ok(model)
    }

    fn create_vm_variables(&mut self) -> Result<(), SolveError> {
        let waiting = self.waiting_value();
        let mut table = vec![RUNNING_ON_NODE; self.node_count];
        table.resize(self.hosts.len(), RUNNING_EXTERN);
        table.push(WAITING);

        for i in 0..self.vms.len() {
            let vm = self.vms[i].clone();
            let state = self.source.vm_state(&vm).cloned().unwrap_or(VmState::Waiting);
            let source_host = state.host().and_then(|h| self.host_index.get(h)).copied();
            let target = match self.source.migration_target(&vm) {
                Some(target) => Some(self.host_index(target)?),
                None => None,
            };

            let location = match target {
                Some(target) => self.solver.constant(&format!("location({})", vm), target as i64),
                None => self.solver.int_var(&format!("location({})", vm), 0, waiting),
            };
            let vm_state = self
                .solver
                .int_var(&format!("state({})", vm), WAITING, RUNNING_EXTERN);
            self.solver.post(Element::new(location, table.clone(), vm_state))?;

            if target.is_none() {
                let keep_running = state.is_running() && !self.stoppable.contains(&vm);
                let rejected = (0..self.hosts.len())
                    .filter(|&h| !self.can_host(&vm, h))
                    .collect::<Vec<_>>();
                if keep_running && rejected.len() == self.hosts.len() {
                    return Err(SolveError::NotPlaceable(vm));
                }
                for h in rejected {
                    self.solver.remove_value(location, h as i64)?;
                }
                if keep_running {
                    self.solver.remove_value(location, waiting)?;
                }
            }

            let migrated_name = format!("migrated({})", vm);
            let is_migrated = match (target, source_host) {
                (Some(_), _) => self.solver.constant(&migrated_name, 1),
                (None, Some(src)) if state.is_running() => {
                    let b = self.solver.bool_var(&migrated_name);
                    let others = (0..self.hosts.len())
                        .filter(|&h| h != src)
                        .map(|h| h as i64)
                        .collect::<Vec<_>>();
                    self.solver.post(ReifiedMember::new(b, location, &others))?;
                    b
                }
                _ => self.solver.constant(&migrated_name, 0),
            };

            self.location.push(location);
            self.state.push(vm_state);
            self.is_migrated.push(is_migrated);
        }
        Ok(())
    }

    /// Checks resource capacities and tags of the host.
    fn can_host(&self, vm: &str, host: usize) -> bool {
        let host = &self.hosts[host];
        let ledger = self.source.resources();
        let fits = ledger
            .specs()
            .all(|spec| spec.usage(vm).unwrap_or(0) <= spec.capacity(host).unwrap_or(0));
        let tagged = match (self.source.vm(vm), self.source.host_tags(host)) {
            (Some(vm), Some(tags)) => vm.accepts(tags),
            _ => false,
        };
        fits && tagged
    }

    fn create_node_variables(&mut self) -> Result<(), SolveError> {
        for n in 0..self.node_count {
            let node = self.hosts[n].clone();
            let var = self.solver.bool_var(&format!("state({})", node));
            let pinned = self
                .source
                .hosted(&node)
                .any(|vm| self.source.vm_state(vm).map_or(false, VmState::is_frozen));
            if pinned {
                self.solver.instantiate(var, ONLINE)?;
            }
            self.node_state.push(var);
        }
        self.solver.post(HostingRequiresOnline {
            locations: self.location.clone(),
            node_states: self.node_state.clone(),
        })?;
        Ok(())
    }

    fn post_packing(&mut self, packer: &dyn Packer) -> Result<(), SolveError> {
        let ledger = self.source.resources();
        for spec in ledger.specs() {
            let sizes = self
                .vms
                .iter()
                .map(|vm| spec.usage(vm).unwrap_or(0) as i64)
                .collect::<Vec<_>>();
            let mut loads = Vec::with_capacity(self.hosts.len());
            let mut fixed = Vec::with_capacity(self.hosts.len());
            for host in self.hosts.iter() {
                let capacity = spec.capacity(host).unwrap_or(0) as i64;
                loads.push(
                    self.solver
                        .bounded_var(&format!("load({}, {})", spec.name(), host), 0, capacity),
                );
                let paused: u64 = self
                    .source
                    .paused_vms()
                    .filter(|vm| self.source.vm_state(vm).and_then(|s| s.host()) == Some(host.as_str()))
                    .map(|vm| spec.usage(vm).unwrap_or(0))
                    .sum();
                fixed.push(paused as i64);
            }
            debug!("packing {} with {}", spec.name(), packer.name());
            packer.pack(&mut self.solver, &self.location, &sizes, &loads, &fixed)?;
            self.loads.insert(spec.name().to_string(), loads);
        }
        Ok(())
    }

    ////////////////////////////////////////////////////////////////////////////

    pub fn source(&self) -> &'a Configuration {
        self.source
    }

    pub fn solver(&self) -> &Solver {
        &self.solver
    }

    pub fn solver_mut(&mut self) -> &mut Solver {
        &mut self.solver
    }

    /// Posts constraint to the model.
    pub fn post<P: Propagator + 'static>(&mut self, propagator: P) -> Result<(), SolveError> {
        self.solver.post(propagator)?;
        Ok(())
    }

    /// Returns all hosts, nodes first.
    pub fn hosts(&self) -> &[String] {
        &self.hosts
    }

    pub fn node_count(&self) -> usize {
        self.node_count
    }

    pub fn host_index(&self, host: &str) -> Result<usize, SolveError> {
        self.host_index
            .get(host)
            .copied()
            .ok_or_else(|| SolveError::UnknownElement(host.to_string()))
    }

    /// Location value meaning that the VM is not running.
    pub fn waiting_value(&self) -> i64 {
        self.hosts.len() as i64
    }

    /// Returns VMs represented in the model.
    pub fn vms(&self) -> &[String] {
        &self.vms
    }

    /// Returns the index of the VM in the model or `None` for a sleeping or paused VM.
    pub fn vm_index(&self, vm: &str) -> Result<Option<usize>, SolveError> {
        if !self.source.has_vm(vm) {
            return Err(SolveError::UnknownElement(vm.to_string()));
        }
        Ok(self.vm_index.get(vm).copied())
    }

    pub fn location(&self, vm: usize) -> IntVar {
        self.location[vm]
    }

    pub fn state(&self, vm: usize) -> IntVar {
        self.state[vm]
    }

    pub fn is_migrated(&self, vm: usize) -> IntVar {
        self.is_migrated[vm]
    }

    pub fn locations(&self) -> &[IntVar] {
        &self.location
    }

    pub fn states(&self) -> &[IntVar] {
        &self.state
    }

    pub fn migrations(&self) -> &[IntVar] {
        &self.is_migrated
    }

    pub fn node_states(&self) -> &[IntVar] {
        &self.node_state
    }

    pub fn node_state(&self, node: &str) -> Result<IntVar, SolveError> {
        match self.host_index(node)? {
            n if n < self.node_count => Ok(self.node_state[n]),
            _ => Err(SolveError::UnknownElement(node.to_string())),
        }
    }

    /// Returns load variables of the resource type, one per host.
    pub fn loads(&self, resource: &str) -> Option<&[IntVar]> {
        self.loads.get(resource).map(|loads| loads.as_slice())
    }

    /// Returns the index of the host the VM runs on in the source configuration.
    pub fn source_location(&self, vm: usize) -> Option<usize> {
        match self.source.vm_state(&self.vms[vm]) {
            Some(VmState::Running(host)) => self.host_index.get(host).copied(),
            _ => None,
        }
    }

    pub fn is_stoppable(&self, vm: &str) -> bool {
        self.stoppable.contains(vm)
    }

    /// Adds `weight * var` to the minimized objective.
    pub fn add_objective_term(&mut self, weight: i64, var: IntVar) {
        self.objective_terms.push((weight, var));
    }

    /// Adds search heuristic which is tried before the default ones.
    pub fn add_heuristic(&mut self, heuristic: Box<dyn BranchingStrategy>) {
        self.heuristics.push(heuristic);
    }

    pub(crate) fn take_heuristics(&mut self) -> Vec<Box<dyn BranchingStrategy>> {
        std::mem::take(&mut self.heuristics)
    }

    /// Creates the objective variable equal to the weighted sum of all objective terms.
    pub fn create_objective(&mut self) -> Result<Option<IntVar>, SolveError> {
        if self.objective_terms.is_empty() {
            return Ok(None);
        }
        let root = self.solver.root();
        let (lb, ub) = self.objective_terms.iter().fold((0, 0), |(lb, ub), &(w, x)| {
            let (a, b) = (w * root.min(x), w * root.max(x));
            (lb + a.min(b), ub + a.max(b))
        });
        let objective = self.solver.bounded_var("objective", lb, ub);
        let mut terms = self.objective_terms.clone();
        terms.push((-1, objective));
        self.solver.post(Linear::new(terms, Relation::Eq, 0))?;
        Ok(Some(objective))
    }

    /// Builds the destination configuration by replaying the solution on a copy of the source one.
    pub fn destination(&self, solution: &Solution) -> Result<Configuration, SolveError> {
        let mut dst = self.source.clone();
        for (n, &var) in self.node_state.iter().enumerate() {
            if solution.value(var) == ONLINE {
                dst.set_online(&self.hosts[n])?;
            }
        }
        let waiting = self.waiting_value();
        for (i, vm) in self.vms.iter().enumerate() {
            let location = solution.value(self.location[i]);
            if location == waiting {
                if !dst.vm_state(vm).map_or(false, VmState::is_waiting) {
                    dst.set_waiting(vm)?;
                }
            } else {
                dst.set_host(vm, &self.hosts[location as usize])?;
            }
        }
        for (n, &var) in self.node_state.iter().enumerate() {
            if solution.value(var) == OFFLINE {
                dst.set_offline(&self.hosts[n])?;
            }
        }
        Ok(dst)
    }
}

////////////////////////////////////////////////////////////////////////////////

/// An offline node hosts no VM, a node hosting a VM is online.
struct HostingRequiresOnline {
    locations: Vec<IntVar>,
    node_states: Vec<IntVar>,
}

impl Propagator for HostingRequiresOnline {
    fn name(&self) -> &str {
        "hosting_requires_online"
    }

    fn vars(&self) -> Vec<IntVar> {
        self.locations.iter().chain(self.node_states.iter()).copied().collect()
    }

    fn propagate(&self, store: &mut Store) -> Result<(), Contradiction> {
        for (n, &state) in self.node_states.iter().enumerate() {
            if store.is_instantiated_to(state, OFFLINE) {
                for &location in self.locations.iter() {
                    store.remove_value(location, n as i64)?;
                }
            }
        }
        for &location in self.locations.iter() {
            if let Some(v) = store.value(location) {
                if v >= 0 && (v as usize) < self.node_states.len() {
                    store.instantiate(self.node_states[v as usize], ONLINE)?;
                }
            }
        }
        Ok(())
    }
}
