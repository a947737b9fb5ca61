//! Extraction of the action graph from two configurations.

use std::collections::HashMap;

use crate::configuration::Configuration;
use crate::element::{NodeState, VmState};
use crate::plan::action::{Action, ActionDurations};
use crate::plan::graph::{ActionGraph, ActionGraphBuilder};

/// Returns the actions transforming `source` into `destination`, all actions lasting one time unit.
pub fn extract(source: &Configuration, destination: &Configuration) -> ActionGraph {
    extract_with_durations(source, destination, &ActionDurations::default())
}

/// Returns the actions transforming `source` into `destination`.
///
/// Dependencies: a node is started before any VM arrives on it, a VM is instantiated before it runs, the actions
/// of a VM are executed one after another and a node is shut down after every action involving it.
/// VMs absent from the destination are stopped, VMs absent from the source are instantiated.
pub fn extract_with_durations(
    source: &Configuration,
    destination: &Configuration,
    durations: &ActionDurations,
) -> ActionGraph {
    debug_assert!(source.check_invariants().is_ok(), "inconsistent source configuration");
    debug_assert!(
        destination.check_invariants().is_ok(),
        "inconsistent destination configuration"
    );

    let mut builder = ActionGraphBuilder::new();
    let mut startups = HashMap::new();
    let mut shutdowns = HashMap::new();
    for node in destination.nodes() {
        match (source.node_state(node), destination.node_state(node)) {
            (Some(NodeState::Offline), Some(NodeState::Online)) => {
                let id = builder.add(Action::Startup { node: node.to_string() });
                startups.insert(node, id);
            }
            (Some(NodeState::Online), Some(NodeState::Offline)) => {
                let id = builder.add(Action::Shutdown { node: node.to_string() });
                shutdowns.insert(node, id);
            }
            _ => {}
        }
    }

    let mut vm_actions = Vec::new();
    for vm in destination.vms() {
        let to = destination.vm_state(vm).cloned().unwrap_or(VmState::Waiting);
        let steps = match source.vm_state(vm) {
            Some(from) => transition(vm, from, &to),
            None => {
                let mut steps = vec![Action::Instantiate { vm: vm.to_string() }];
                steps.extend(transition(vm, &VmState::Waiting, &to));
                steps
            }
        };
        add_chain(&mut builder, steps, &mut vm_actions);
    }
    for vm in source.vms().filter(|vm| !destination.has_vm(vm)) {
        if let Some(from) = source.vm_state(vm) {
            add_chain(&mut builder, transition(vm, from, &VmState::Waiting), &mut vm_actions);
        }
    }

    let mut edges = Vec::new();
    for &id in vm_actions.iter() {
        for host in builder.actions()[id].hosts() {
            if let Some(&startup) = startups.get(host) {
                edges.push((startup, id));
            }
            if let Some(&shutdown) = shutdowns.get(host) {
                edges.push((id, shutdown));
            }
        }
    }
    for (before, after) in edges {
        builder.precede(before, after);
    }
    builder.build(durations)
}

fn add_chain(builder: &mut ActionGraphBuilder, steps: Vec<Action>, ids: &mut Vec<usize>) {
    let mut previous = None;
    for action in steps {
        let id = builder.add(action);
        if let Some(previous) = previous {
            builder.precede(previous, id);
        }
        previous = Some(id);
        ids.push(id);
    }
}

/// Returns the actions moving the VM from one state to another.
///
/// When no single action performs the transition, the VM goes through a running state first,
/// e.g. a waiting VM is put to sleep on `h` by running it on `h` and then suspending it.
fn transition(vm: &str, from: &VmState, to: &VmState) -> Vec<Action> {
    let mut actions = Vec::new();
    let mut current = from.clone();
    // at most three steps are needed: leave the state, migrate, enter the state
    for _ in 0..3 {
        if &current == to {
            break;
        }
        if let Some(action) = direct(vm, &current, to) {
            actions.push(action);
            current = to.clone();
        } else {
            let pivot = pivot(&current, to);
            match direct(vm, &current, &pivot) {
                Some(action) => actions.push(action),
                None => break,
            }
            current = pivot;
        }
    }
    debug_assert!(&current == to, "no transition of {} from {} to {}", vm, from, to);
    actions
}

fn direct(vm: &str, from: &VmState, to: &VmState) -> Option<Action> {
    let vm = vm.to_string();
    let action = match (from, to) {
        (VmState::Waiting, VmState::Running(host)) => Action::Run { vm, host: host.clone() },
        (VmState::Running(a), VmState::Running(b)) if a != b => Action::Migrate {
            vm,
            from: a.clone(),
            to: b.clone(),
        },
        (VmState::Running(host), VmState::Waiting) => Action::Stop { vm, host: host.clone() },
        (VmState::Running(a), VmState::Sleeping(b)) => Action::Suspend {
            vm,
            from: a.clone(),
            to: b.clone(),
        },
        (VmState::Running(a), VmState::Paused(b)) if a == b => Action::Pause { vm, host: a.clone() },
        (VmState::Sleeping(a), VmState::Running(b)) => Action::Resume {
            vm,
            from: a.clone(),
            to: b.clone(),
        },
        (VmState::Paused(a), VmState::Running(b)) if a == b => Action::Unpause { vm, host: a.clone() },
        _ => return None,
    };
    Some(action)
}

/// Running state the VM passes through on its way from `from` to `to`.
fn pivot(from: &VmState, to: &VmState) -> VmState {
    let host = match from {
        VmState::Paused(host) => host.as_str(),
        VmState::Running(host) | VmState::Sleeping(host) => to.host().unwrap_or(host),
        VmState::Waiting => match to.host() {
            Some(host) => host,
            None => return VmState::Waiting,
        },
    };
    VmState::Running(host.to_string())
}
