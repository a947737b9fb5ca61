//! Search heuristics.
//!
//! The search runs in two passes. The cheap Find pass only tries to keep the source placement (StickToSource) and
//! the waiting VMs waiting (NoWaiting), assigns the remaining variables to their minimum value and gives up after
//! a bounded number of backtracks. It is skipped when too many VMs are waiting.
//! The Prove pass puts the heuristics contributed by rules and objectives first, then the same two heuristics, then
//! HostPreference once NoWaiting has nothing left to decide, and finally Dummy.

pub mod activation;
pub mod dummy;
pub mod host_preference;
pub mod no_waiting;
pub mod pack_online_nodes;
pub mod stick_to_source;

use dslab_cp::{BranchingStrategy, IntVar};

use crate::model::{ReconfigurationModel, WAITING};

pub use activation::{Activated, ChainState, HeuristicChain, Phase};
pub use dummy::Dummy;
pub use host_preference::HostPreference;
pub use no_waiting::NoWaiting;
pub use pack_online_nodes::PackOnlineNodes;
pub use stick_to_source::StickToSource;

/// Returns the usage of the sort resource by the VM, zero if no sort resource is set.
pub(crate) fn usage(model: &ReconfigurationModel, sort_resource: Option<&str>, vm: &str) -> u64 {
    sort_resource
        .and_then(|r| model.source().resources().usage(r, vm))
        .unwrap_or(0)
}

/// Returns the state variables of the VMs waiting in the source configuration.
pub fn waiting_states(model: &ReconfigurationModel) -> Vec<IntVar> {
    let source = model.source();
    model
        .vms()
        .iter()
        .enumerate()
        .filter(|(_, vm)| source.vm_state(vm).map_or(false, |s| s.is_waiting()))
        .map(|(i, _)| model.state(i))
        .collect()
}

/// Builds the strategy of the Find pass.
pub fn find_heuristics(model: &ReconfigurationModel, sort_resource: Option<&str>) -> HeuristicChain {
    HeuristicChain::new(
        "find",
        vec![
            Box::new(NoWaiting::new(model)),
            Box::new(StickToSource::new(model, sort_resource)),
        ],
    )
}

/// Builds the strategy of the Prove pass, taking the heuristics contributed to the model.
pub fn prove_heuristics(model: &mut ReconfigurationModel, sort_resource: Option<&str>) -> HeuristicChain {
    let mut members: Vec<Box<dyn BranchingStrategy>> = model.take_heuristics();
    members.push(Box::new(NoWaiting::new(model)));
    members.push(Box::new(StickToSource::new(model, sort_resource)));
    let observed = waiting_states(model);
    members.push(Box::new(Activated::new(
        Box::new(HostPreference::new(model, sort_resource)),
        move |store| {
            observed
                .iter()
                .all(|&state| store.is_instantiated(state) || !store.contains(state, WAITING))
        },
    )));
    members.push(Box::new(Dummy::new(model)));
    HeuristicChain::new("prove", members)
}
