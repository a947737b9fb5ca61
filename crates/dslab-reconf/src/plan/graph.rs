//! Action graph.

use std::cmp::Reverse;
use std::collections::{BTreeSet, BinaryHeap};
use std::fmt::{Display, Formatter};

use serde::Serialize;

use crate::plan::action::{Action, ActionDurations, ActionKind, PlannedAction};

/// Actions with their dependencies, scheduled and linearised.
///
/// Every action starts at the earliest moment its dependencies allow. The linear order is a topological order of the
/// dependencies which prefers earlier start times, then lower kind ranks (so node shutdowns come last among
/// simultaneous actions), then subject names.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ActionGraph {
    actions: Vec<PlannedAction>,
    dependencies: Vec<Vec<usize>>,
}

impl ActionGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    /// Returns actions in linear order.
    pub fn actions(&self) -> &[PlannedAction] {
        &self.actions
    }

    pub fn iter(&self) -> impl Iterator<Item = &Action> {
        self.actions.iter().map(|planned| &planned.action)
    }

    /// Returns positions of the actions which must be completed before the action at position `i` starts.
    pub fn dependencies(&self, i: usize) -> &[usize] {
        &self.dependencies[i]
    }

    pub fn position(&self, action: &Action) -> Option<usize> {
        self.actions.iter().position(|planned| &planned.action == action)
    }

    pub fn count(&self, kind: ActionKind) -> usize {
        self.iter().filter(|action| action.kind() == kind).count()
    }

    /// Returns the moment when all actions are completed.
    pub fn makespan(&self) -> u64 {
        self.actions.iter().map(|planned| planned.end).max().unwrap_or(0)
    }
}

impl Display for ActionGraph {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        for planned in self.actions.iter() {
            writeln!(f, "{}", planned)?;
        }
        Ok(())
    }
}

////////////////////////////////////////////////////////////////////////////////

/// Collects actions and dependencies between them.
#[derive(Default)]
pub struct ActionGraphBuilder {
    actions: Vec<Action>,
    predecessors: Vec<BTreeSet<usize>>,
}

impl ActionGraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds action and returns its id.
    pub fn add(&mut self, action: Action) -> usize {
        self.actions.push(action);
        self.predecessors.push(BTreeSet::new());
        self.actions.len() - 1
    }

    /// Requires action `before` to be completed before action `after` starts.
    pub fn precede(&mut self, before: usize, after: usize) {
        if before != after {
            self.predecessors[after].insert(before);
        }
    }

    pub fn actions(&self) -> &[Action] {
        &self.actions
    }

    pub fn build(self, durations: &ActionDurations) -> ActionGraph {
        let total = self.actions.len();
        let mut visited = vec![false; total];
        let mut starts = vec![0; total];
        for i in 0..total {
            self.calc_start(i, durations, &mut starts, &mut visited);
        }

        let order = self.linearize(&starts);
        let mut position = vec![0; total];
        for (pos, &id) in order.iter().enumerate() {
            position[id] = pos;
        }

        let dependencies = order
            .iter()
            .map(|&id| {
                let mut deps = self.predecessors[id].iter().map(|&p| position[p]).collect::<Vec<_>>();
                deps.sort_unstable();
                deps
            })
            .collect();
        let mut actions = self.actions.into_iter().map(Some).collect::<Vec<_>>();
        let actions = order
            .iter()
            .filter_map(|&id| {
                let action = actions[id].take()?;
                let duration = durations.get(action.kind());
                Some(PlannedAction {
                    action,
                    start: starts[id],
                    end: starts[id] + duration,
                })
            })
            .collect();
        ActionGraph { actions, dependencies }
    }

    /// Orders actions so that every action comes after its dependencies, picking the ready action with the
    /// smallest (start, kind rank, subject) first. Zero durations make this differ from a plain sort by start.
    fn linearize(&self, starts: &[u64]) -> Vec<usize> {
        let total = self.actions.len();
        let mut successors = vec![Vec::new(); total];
        let mut pending = vec![0; total];
        for (v, preds) in self.predecessors.iter().enumerate() {
            pending[v] = preds.len();
            for &pred in preds.iter() {
                successors[pred].push(v);
            }
        }
        let key = |id: usize| Reverse((starts[id], self.actions[id].kind().rank(), self.actions[id].subject(), id));
        let mut ready = (0..total).filter(|&v| pending[v] == 0).map(key).collect::<BinaryHeap<_>>();
        let mut order = Vec::with_capacity(total);
        while let Some(Reverse((_, _, _, id))) = ready.pop() {
            order.push(id);
            for &next in successors[id].iter() {
                pending[next] -= 1;
                if pending[next] == 0 {
                    ready.push(key(next));
                }
            }
        }
        debug_assert_eq!(order.len(), total, "cyclic action dependencies");
        order
    }

    fn calc_start(&self, v: usize, durations: &ActionDurations, starts: &mut Vec<u64>, visited: &mut Vec<bool>) {
        if visited[v] {
            return;
        }
        visited[v] = true;
        starts[v] = 0;
        for &pred in self.predecessors[v].iter() {
            self.calc_start(pred, durations, starts, visited);
            let end = starts[pred] + durations.get(self.actions[pred].kind());
            starts[v] = starts[v].max(end);
        }
    }
}
