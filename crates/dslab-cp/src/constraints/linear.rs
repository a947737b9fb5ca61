//! Linear (in)equalities over weighted sums.

use crate::propagator::Propagator;
use crate::store::{IntVar, Store};
use crate::Contradiction;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Relation {
    Eq,
    Le,
    Ge,
}

/// `sum(a_i * x_i) <relation> rhs`, propagated on bounds.
pub struct Linear {
    terms: Vec<(i64, IntVar)>,
    relation: Relation,
    rhs: i64,
}

impl Linear {
    pub fn new(terms: Vec<(i64, IntVar)>, relation: Relation, rhs: i64) -> Self {
        Self {
            terms: terms.into_iter().filter(|(a, _)| *a != 0).collect(),
            relation,
            rhs,
        }
    }

    /// `sum(vars) = total`.
    pub fn sum(vars: &[IntVar], total: IntVar) -> Self {
        let mut terms = vars.iter().map(|&v| (1, v)).collect::<Vec<_>>();
        terms.push((-1, total));
        Self::new(terms, Relation::Eq, 0)
    }

    /// Filters `sum(sign * a_i * x_i) <= sign * rhs`.
    fn filter_le(&self, store: &mut Store, sign: i64) -> Result<(), Contradiction> {
        let rhs = sign * self.rhs;
        let term_min = |store: &Store, a: i64, x: IntVar| {
            if a > 0 {
                a * store.min(x)
            } else {
                a * store.max(x)
            }
        };
        let min_sum: i64 = self.terms.iter().map(|&(a, x)| term_min(store, sign * a, x)).sum();
        if min_sum > rhs {
            return Err(Contradiction);
        }
        for &(a, x) in self.terms.iter() {
            let a = sign * a;
            let slack = rhs - (min_sum - term_min(store, a, x));
            if a > 0 {
                store.update_ub(x, floor_div(slack, a))?;
            } else {
                store.update_lb(x, ceil_div(slack, a))?;
            }
        }
        Ok(())
    }
}

fn floor_div(a: i64, b: i64) -> i64 {
    let d = a / b;
    if a % b != 0 && ((a < 0) != (b < 0)) {
        d - 1
    } else {
        d
    }
}

fn ceil_div(a: i64, b: i64) -> i64 {
    let d = a / b;
    if a % b != 0 && ((a < 0) == (b < 0)) {
        d + 1
    } else {
        d
    }
}

impl Propagator for Linear {
    fn name(&self) -> &str {
        "linear"
    }

    fn vars(&self) -> Vec<IntVar> {
        self.terms.iter().map(|(_, x)| *x).collect()
    }

    fn propagate(&self, store: &mut Store) -> Result<(), Contradiction> {
        match self.relation {
            Relation::Le => self.filter_le(store, 1),
            Relation::Ge => self.filter_le(store, -1),
            Relation::Eq => {
                self.filter_le(store, 1)?;
                self.filter_le(store, -1)
            }
        }
    }
}
