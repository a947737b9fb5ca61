//! Reification and clauses over 0/1 variables.

use crate::propagator::Propagator;
use crate::store::{IntVar, Store};
use crate::Contradiction;

/// `b <=> (x = value)`, or `b <=> (x != value)` when negated.
pub struct ReifiedEqual {
    b: IntVar,
    x: IntVar,
    value: i64,
    negated: bool,
}

impl ReifiedEqual {
    pub fn new(b: IntVar, x: IntVar, value: i64) -> Self {
        Self {
            b,
            x,
            value,
            negated: false,
        }
    }

    pub fn not_equal(b: IntVar, x: IntVar, value: i64) -> Self {
        Self {
            b,
            x,
            value,
            negated: true,
        }
    }
}

impl Propagator for ReifiedEqual {
    fn name(&self) -> &str {
        "reified_equal"
    }

    fn vars(&self) -> Vec<IntVar> {
        vec![self.b, self.x]
    }

    fn propagate(&self, store: &mut Store) -> Result<(), Contradiction> {
        store.update_lb(self.b, 0)?;
        store.update_ub(self.b, 1)?;
        if let Some(b) = store.value(self.b) {
            let equal = (b == 1) != self.negated;
            if equal {
                store.instantiate(self.x, self.value)?;
            } else {
                store.remove_value(self.x, self.value)?;
            }
            return Ok(());
        }
        let equal = if !store.contains(self.x, self.value) {
            Some(false)
        } else if store.is_instantiated(self.x) {
            Some(true)
        } else {
            None
        };
        if let Some(equal) = equal {
            store.instantiate(self.b, (equal != self.negated) as i64)?;
        }
        Ok(())
    }
}

/// `b <=> (x in values)`, channels a value of `x` to the membership in a set.
pub struct ReifiedMember {
    b: IntVar,
    x: IntVar,
    values: Vec<i64>,
}

impl ReifiedMember {
    pub fn new(b: IntVar, x: IntVar, values: &[i64]) -> Self {
        let mut values = values.to_vec();
        values.sort_unstable();
        values.dedup();
        Self { b, x, values }
    }

    fn is_member(&self, v: i64) -> bool {
        self.values.binary_search(&v).is_ok()
    }
}

impl Propagator for ReifiedMember {
    fn name(&self) -> &str {
        "reified_member"
    }

    fn vars(&self) -> Vec<IntVar> {
        vec![self.b, self.x]
    }

    fn propagate(&self, store: &mut Store) -> Result<(), Contradiction> {
        store.update_lb(self.b, 0)?;
        store.update_ub(self.b, 1)?;
        match store.value(self.b) {
            Some(1) => {
                store.retain(self.x, |v| self.is_member(v))?;
            }
            Some(_) => {
                store.retain(self.x, |v| !self.is_member(v))?;
            }
            None => {
                let domain = store.domain(self.x);
                if domain.iter().all(|v| self.is_member(v)) {
                    store.instantiate(self.b, 1)?;
                } else if domain.iter().all(|v| !self.is_member(v)) {
                    store.instantiate(self.b, 0)?;
                }
            }
        }
        Ok(())
    }
}

/// Disjunction of literals over 0/1 variables. Literal `(x, true)` holds when `x = 1`, `(x, false)` when `x = 0`.
pub struct Clause {
    literals: Vec<(IntVar, bool)>,
}

impl Clause {
    pub fn new(literals: Vec<(IntVar, bool)>) -> Self {
        Self { literals }
    }

    /// `a => b` for 0/1 variables.
    pub fn implies(a: IntVar, b: IntVar) -> Self {
        Self::new(vec![(a, false), (b, true)])
    }

    /// `if c then t else e` for 0/1 variables, as a pair of clauses.
    pub fn if_then_else(c: IntVar, t: IntVar, e: IntVar) -> [Self; 2] {
        [Self::new(vec![(c, false), (t, true)]), Self::new(vec![(c, true), (e, true)])]
    }
}

impl Propagator for Clause {
    fn name(&self) -> &str {
        "clause"
    }

    fn vars(&self) -> Vec<IntVar> {
        self.literals.iter().map(|(x, _)| *x).collect()
    }

    fn propagate(&self, store: &mut Store) -> Result<(), Contradiction> {
        let mut unknown = None;
        let mut unknown_count = 0;
        for &(x, positive) in self.literals.iter() {
            match store.value(x) {
                Some(v) if (v == 1) == positive => return Ok(()),
                Some(_) => {}
                None => {
                    unknown_count += 1;
                    unknown = Some((x, positive));
                }
            }
        }
        match (unknown_count, unknown) {
            (0, _) => Err(Contradiction),
            (1, Some((x, positive))) => store.instantiate(x, positive as i64).map(|_| ()),
            _ => Ok(()),
        }
    }
}
