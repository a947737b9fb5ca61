//! Element constraint.

use crate::propagator::Propagator;
use crate::store::{IntVar, Store};
use crate::Contradiction;

/// `value = table[index]`.
pub struct Element {
    index: IntVar,
    table: Vec<i64>,
    value: IntVar,
}

impl Element {
    pub fn new(index: IntVar, table: Vec<i64>, value: IntVar) -> Self {
        Self { index, table, value }
    }

    fn lookup(&self, i: i64) -> Option<i64> {
        if i < 0 {
            return None;
        }
        self.table.get(i as usize).copied()
    }
}

impl Propagator for Element {
    fn name(&self) -> &str {
        "element"
    }

    fn vars(&self) -> Vec<IntVar> {
        vec![self.index, self.value]
    }

    fn propagate(&self, store: &mut Store) -> Result<(), Contradiction> {
        let values = store.domain(self.value).clone();
        store.retain(self.index, |i| self.lookup(i).map_or(false, |v| values.contains(v)))?;
        let supported = store
            .domain(self.index)
            .iter()
            .filter_map(|i| self.lookup(i))
            .collect::<Vec<_>>();
        store.retain(self.value, |v| supported.contains(&v))?;
        Ok(())
    }
}
