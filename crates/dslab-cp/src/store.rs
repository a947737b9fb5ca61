//! Variable store holding the current domains.

use std::fmt::{Display, Formatter};

use crate::domain::Domain;
use crate::Contradiction;

/// Handle of an integer variable.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IntVar(pub(crate) usize);

impl IntVar {
    pub fn index(&self) -> usize {
        self.0
    }
}

impl Display for IntVar {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "x{}", self.0)
    }
}

/// Current domains of all variables.
///
/// Every modification is recorded so that the solver can wake up propagators watching the modified variable.
/// The search keeps one store per open branch, so the store is cheap to clone and carries no references.
#[derive(Clone, Debug, Default)]
pub struct Store {
    domains: Vec<Domain>,
    modified: Vec<IntVar>,
    dirty: Vec<bool>,
}

impl Store {
    pub(crate) fn add(&mut self, domain: Domain) -> IntVar {
        self.domains.push(domain);
        self.dirty.push(false);
        IntVar(self.domains.len() - 1)
    }

    pub fn var_count(&self) -> usize {
        self.domains.len()
    }

    pub fn domain(&self, var: IntVar) -> &Domain {
        &self.domains[var.0]
    }

    pub fn min(&self, var: IntVar) -> i64 {
        self.domains[var.0].min()
    }

    pub fn max(&self, var: IntVar) -> i64 {
        self.domains[var.0].max()
    }

    pub fn size(&self, var: IntVar) -> u64 {
        self.domains[var.0].size()
    }

    pub fn value(&self, var: IntVar) -> Option<i64> {
        self.domains[var.0].value()
    }

    pub fn contains(&self, var: IntVar, v: i64) -> bool {
        self.domains[var.0].contains(v)
    }

    pub fn is_instantiated(&self, var: IntVar) -> bool {
        self.domains[var.0].is_instantiated()
    }

    pub fn is_instantiated_to(&self, var: IntVar, v: i64) -> bool {
        self.domains[var.0].value() == Some(v)
    }

    /// Returns true if every variable of the store is instantiated.
    pub fn all_instantiated(&self) -> bool {
        self.domains.iter().all(|d| d.is_instantiated())
    }

    /// Returns the first variable (by creation order) which is not instantiated yet.
    pub fn first_unbound(&self) -> Option<IntVar> {
        self.domains.iter().position(|d| !d.is_instantiated()).map(IntVar)
    }

    /// Removes value from the variable domain, returns true if the domain has changed.
    pub fn remove_value(&mut self, var: IntVar, v: i64) -> Result<bool, Contradiction> {
        let changed = self.domains[var.0].remove(v)?;
        self.touch(var, changed);
        Ok(changed)
    }

    pub fn update_lb(&mut self, var: IntVar, v: i64) -> Result<bool, Contradiction> {
        let changed = self.domains[var.0].update_lb(v)?;
        self.touch(var, changed);
        Ok(changed)
    }

    pub fn update_ub(&mut self, var: IntVar, v: i64) -> Result<bool, Contradiction> {
        let changed = self.domains[var.0].update_ub(v)?;
        self.touch(var, changed);
        Ok(changed)
    }

    pub fn instantiate(&mut self, var: IntVar, v: i64) -> Result<bool, Contradiction> {
        let changed = self.domains[var.0].instantiate(v)?;
        self.touch(var, changed);
        Ok(changed)
    }

    /// Removes every value for which `keep` returns false.
    ///
    /// For bounded domains only the bounds are moved, values strictly inside the interval are kept.
    pub fn retain<F: Fn(i64) -> bool>(&mut self, var: IntVar, keep: F) -> Result<bool, Contradiction> {
        let mut changed = false;
        if self.domains[var.0].is_enumerated() {
            let rejected = self.domains[var.0].iter().filter(|&v| !keep(v)).collect::<Vec<_>>();
            for v in rejected {
                changed |= self.remove_value(var, v)?;
            }
        } else {
            while !keep(self.min(var)) {
                let lb = self.min(var);
                changed |= self.update_lb(var, lb + 1)?;
            }
            while !keep(self.max(var)) {
                let ub = self.max(var);
                changed |= self.update_ub(var, ub - 1)?;
            }
        }
        Ok(changed)
    }

    pub(crate) fn take_modified(&mut self) -> Vec<IntVar> {
        for var in self.modified.iter() {
            self.dirty[var.0] = false;
        }
        std::mem::take(&mut self.modified)
    }

    fn touch(&mut self, var: IntVar, changed: bool) {
        if changed && !self.dirty[var.0] {
            self.dirty[var.0] = true;
            self.modified.push(var);
        }
    }
}
