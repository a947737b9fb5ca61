//! Binary arithmetic relations of the form `x op y + c`.

use crate::propagator::Propagator;
use crate::store::{IntVar, Store};
use crate::Contradiction;

/// `x = y + offset`.
pub struct Equal {
    x: IntVar,
    y: IntVar,
    offset: i64,
}

impl Equal {
    pub fn new(x: IntVar, y: IntVar) -> Self {
        Self::with_offset(x, y, 0)
    }

    pub fn with_offset(x: IntVar, y: IntVar, offset: i64) -> Self {
        Self { x, y, offset }
    }
}

impl Propagator for Equal {
    fn name(&self) -> &str {
        "equal"
    }

    fn vars(&self) -> Vec<IntVar> {
        vec![self.x, self.y]
    }

    fn propagate(&self, store: &mut Store) -> Result<(), Contradiction> {
        let c = self.offset;
        store.update_lb(self.x, store.min(self.y) + c)?;
        store.update_ub(self.x, store.max(self.y) + c)?;
        store.update_lb(self.y, store.min(self.x) - c)?;
        store.update_ub(self.y, store.max(self.x) - c)?;
        if store.domain(self.x).is_enumerated() && store.domain(self.y).is_enumerated() {
            let y = self.y;
            let snapshot = store.domain(y).clone();
            store.retain(self.x, |v| snapshot.contains(v - c))?;
            let snapshot = store.domain(self.x).clone();
            store.retain(y, |v| snapshot.contains(v + c))?;
        }
        Ok(())
    }
}

/// `x != y + offset`.
pub struct NotEqual {
    x: IntVar,
    y: IntVar,
    offset: i64,
}

impl NotEqual {
    pub fn new(x: IntVar, y: IntVar) -> Self {
        Self::with_offset(x, y, 0)
    }

    pub fn with_offset(x: IntVar, y: IntVar, offset: i64) -> Self {
        Self { x, y, offset }
    }
}

impl Propagator for NotEqual {
    fn name(&self) -> &str {
        "not_equal"
    }

    fn vars(&self) -> Vec<IntVar> {
        vec![self.x, self.y]
    }

    fn propagate(&self, store: &mut Store) -> Result<(), Contradiction> {
        if let Some(v) = store.value(self.y) {
            store.remove_value(self.x, v + self.offset)?;
        }
        if let Some(v) = store.value(self.x) {
            store.remove_value(self.y, v - self.offset)?;
        }
        Ok(())
    }
}

/// `x <= y + offset`.
pub struct LessOrEqual {
    x: IntVar,
    y: IntVar,
    offset: i64,
}

impl LessOrEqual {
    pub fn new(x: IntVar, y: IntVar) -> Self {
        Self::with_offset(x, y, 0)
    }

    pub fn with_offset(x: IntVar, y: IntVar, offset: i64) -> Self {
        Self { x, y, offset }
    }
}

impl Propagator for LessOrEqual {
    fn name(&self) -> &str {
        "less_or_equal"
    }

    fn vars(&self) -> Vec<IntVar> {
        vec![self.x, self.y]
    }

    fn propagate(&self, store: &mut Store) -> Result<(), Contradiction> {
        store.update_ub(self.x, store.max(self.y) + self.offset)?;
        store.update_lb(self.y, store.min(self.x) - self.offset)?;
        Ok(())
    }
}
