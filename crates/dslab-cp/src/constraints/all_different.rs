//! All-different constraint with an optional ignored value.

use crate::propagator::Propagator;
use crate::store::{IntVar, Store};
use crate::Contradiction;

/// Variables take pairwise different values, except for `except` which may be shared.
///
/// Filtering is forward checking: the value of an instantiated variable is removed from the others.
pub struct AllDifferentExcept {
    vars: Vec<IntVar>,
    except: Option<i64>,
}

impl AllDifferentExcept {
    pub fn new(vars: Vec<IntVar>, except: Option<i64>) -> Self {
        Self { vars, except }
    }
}

impl Propagator for AllDifferentExcept {
    fn name(&self) -> &str {
        "all_different"
    }

    fn vars(&self) -> Vec<IntVar> {
        self.vars.clone()
    }

    fn propagate(&self, store: &mut Store) -> Result<(), Contradiction> {
        for (i, &x) in self.vars.iter().enumerate() {
            let Some(v) = store.value(x) else {
                continue;
            };
            if Some(v) == self.except {
                continue;
            }
            for (j, &y) in self.vars.iter().enumerate() {
                if i != j {
                    store.remove_value(y, v)?;
                }
            }
        }
        Ok(())
    }
}
