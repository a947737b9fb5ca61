//! Placement of VMs which have no usable source host.

use std::cmp::Reverse;

use dslab_cp::{BranchingStrategy, Decision, IntVar, Store};

use crate::element::NodeState;
use crate::heuristics::usage;
use crate::model::ReconfigurationModel;

struct Candidate {
    location: IntVar,
    sizes: Vec<i64>,
    hosts: Vec<usize>,
}

/// Places unplaced VMs, biggest consumers of the sort resource first.
///
/// Hosts are ranked per VM: nodes online in the source configuration, then externs, then offline nodes; within a
/// group hosts able to run more copies of the VM come first. The first ranked host whose current load leaves room
/// for the VM is chosen, falling back to the first host still in the domain.
pub struct HostPreference {
    candidates: Vec<Candidate>,
    /// Load variables per resource type, then per host.
    loads: Vec<Vec<IntVar>>,
}

impl HostPreference {
    pub fn new(model: &ReconfigurationModel, sort_resource: Option<&str>) -> Self {
        let source = model.source();
        let ledger = source.resources();
        let resources = ledger.resource_types().collect::<Vec<_>>();
        let loads = resources
            .iter()
            .filter_map(|r| model.loads(r).map(|loads| loads.to_vec()))
            .collect::<Vec<_>>();

        let mut order = (0..model.vms().len()).collect::<Vec<_>>();
        order.sort_by_key(|&i| Reverse(usage(model, sort_resource, &model.vms()[i])));

        let candidates = order
            .into_iter()
            .map(|i| {
                let vm = &model.vms()[i];
                let mut hosts = (0..model.hosts().len()).collect::<Vec<_>>();
                hosts.sort_by_key(|&h| {
                    let host = &model.hosts()[h];
                    let group = match source.node_state(host) {
                        Some(NodeState::Online) => 0,
                        None => 1,
                        Some(NodeState::Offline) => 2,
                    };
                    (group, Reverse(ledger.max_vms_per_node(host, vm)))
                });
                Candidate {
                    location: model.location(i),
                    sizes: resources
                        .iter()
                        .map(|r| ledger.usage(r, vm).unwrap_or(0) as i64)
                        .collect(),
                    hosts,
                }
            })
            .collect();
        Self { candidates, loads }
    }

    fn has_room(&self, store: &Store, candidate: &Candidate, host: usize) -> bool {
        self.loads.iter().zip(candidate.sizes.iter()).all(|(loads, &size)| {
            let load = loads[host];
            store.min(load) + size <= store.max(load)
        })
    }
}

impl BranchingStrategy for HostPreference {
    fn name(&self) -> &str {
        "HostPreference"
    }

    fn next_decision(&mut self, store: &Store) -> Option<Decision> {
        for candidate in self.candidates.iter() {
            if store.is_instantiated(candidate.location) {
                continue;
            }
            let mut allowed = candidate
                .hosts
                .iter()
                .copied()
                .filter(|&h| store.contains(candidate.location, h as i64))
                .peekable();
            let Some(&first) = allowed.peek() else {
                continue;
            };
            let host = allowed
                .find(|&h| self.has_room(store, candidate, h))
                .unwrap_or(first);
            return Some(Decision::new(candidate.location, host as i64));
        }
        None
    }
}
