//! Integer variable domains.

use std::fmt::{Display, Formatter};

use itertools::Itertools;

use crate::Contradiction;

/// Set of integer values stored as a bitset relative to `base`.
#[derive(Clone, Debug, PartialEq, Eq)]
struct BitSet {
    base: i64,
    words: Vec<u64>,
    count: u64,
}

impl BitSet {
    fn full(lb: i64, ub: i64) -> Self {
        let len = (ub - lb + 1) as usize;
        let mut words = vec![u64::MAX; (len + 63) / 64];
        let tail = len % 64;
        if tail != 0 {
            let last = words.len() - 1;
            words[last] = (1u64 << tail) - 1;
        }
        Self {
            base: lb,
            words,
            count: len as u64,
        }
    }

    fn from_sorted(values: &[i64]) -> Self {
        let base = values[0];
        let len = (values[values.len() - 1] - base + 1) as usize;
        let mut words = vec![0u64; (len + 63) / 64];
        for &v in values {
            let idx = (v - base) as usize;
            words[idx / 64] |= 1u64 << (idx % 64);
        }
        Self {
            base,
            words,
            count: values.len() as u64,
        }
    }

    fn contains(&self, v: i64) -> bool {
        if v < self.base {
            return false;
        }
        let idx = (v - self.base) as usize;
        if idx >= self.words.len() * 64 {
            return false;
        }
        (self.words[idx / 64] >> (idx % 64)) & 1 == 1
    }

    fn remove(&mut self, v: i64) -> bool {
        if !self.contains(v) {
            return false;
        }
        let idx = (v - self.base) as usize;
        self.words[idx / 64] &= !(1u64 << (idx % 64));
        self.count -= 1;
        true
    }

    /// Returns the smallest value of the set which is not less than `v`.
    fn next_from(&self, v: i64) -> Option<i64> {
        let start = if v < self.base { 0 } else { (v - self.base) as usize };
        let mut w = start / 64;
        if w >= self.words.len() {
            return None;
        }
        let mut word = self.words[w] & (u64::MAX << (start % 64));
        loop {
            if word != 0 {
                return Some(self.base + (w * 64 + word.trailing_zeros() as usize) as i64);
            }
            w += 1;
            if w >= self.words.len() {
                return None;
            }
            word = self.words[w];
        }
    }

    /// Returns the largest value of the set which is not greater than `v`.
    fn prev_from(&self, v: i64) -> Option<i64> {
        if v < self.base {
            return None;
        }
        let total = self.words.len() * 64;
        let idx = ((v - self.base) as usize).min(total - 1);
        let mut w = idx / 64;
        let shift = 63 - (idx % 64);
        let mut word = (self.words[w] << shift) >> shift;
        loop {
            if word != 0 {
                return Some(self.base + (w * 64 + 63 - word.leading_zeros() as usize) as i64);
            }
            if w == 0 {
                return None;
            }
            w -= 1;
            word = self.words[w];
        }
    }
}

/// Domain of an integer variable.
///
/// Enumerated domains keep every value and support holes. Bounded domains only keep the bounds, so removing a value
/// strictly inside the interval is a no-op. Domains are never empty: an operation which would wipe out the domain
/// fails with [`Contradiction`] and leaves the domain unchanged.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Domain {
    lb: i64,
    ub: i64,
    bits: Option<BitSet>,
}

impl Domain {
    /// Creates enumerated domain containing all values from `lb` to `ub` inclusive.
    pub fn enumerated(lb: i64, ub: i64) -> Self {
        assert!(lb <= ub, "empty domain [{}, {}]", lb, ub);
        Self {
            lb,
            ub,
            bits: Some(BitSet::full(lb, ub)),
        }
    }

    /// Creates bounded domain `[lb, ub]`.
    pub fn bounded(lb: i64, ub: i64) -> Self {
        assert!(lb <= ub, "empty domain [{}, {}]", lb, ub);
        Self { lb, ub, bits: None }
    }

    /// Creates enumerated domain from arbitrary values.
    pub fn from_values(values: &[i64]) -> Self {
        let sorted = values.iter().copied().sorted().dedup().collect::<Vec<_>>();
        assert!(!sorted.is_empty(), "empty domain");
        Self {
            lb: sorted[0],
            ub: sorted[sorted.len() - 1],
            bits: Some(BitSet::from_sorted(&sorted)),
        }
    }

    pub fn min(&self) -> i64 {
        self.lb
    }

    pub fn max(&self) -> i64 {
        self.ub
    }

    pub fn size(&self) -> u64 {
        match &self.bits {
            Some(bits) => bits.count,
            None => (self.ub - self.lb + 1) as u64,
        }
    }

    pub fn is_enumerated(&self) -> bool {
        self.bits.is_some()
    }

    pub fn is_instantiated(&self) -> bool {
        self.lb == self.ub
    }

    /// Returns the value of instantiated domain.
    pub fn value(&self) -> Option<i64> {
        if self.is_instantiated() {
            Some(self.lb)
        } else {
            None
        }
    }

    pub fn contains(&self, v: i64) -> bool {
        v >= self.lb && v <= self.ub && self.bits.as_ref().map_or(true, |bits| bits.contains(v))
    }

    /// Returns the smallest value of the domain which is not less than `v`.
    pub fn next_value(&self, v: i64) -> Option<i64> {
        if v > self.ub {
            return None;
        }
        match &self.bits {
            Some(bits) => bits.next_from(v.max(self.lb)),
            None => Some(v.max(self.lb)),
        }
    }

    /// Iterates over domain values in ascending order.
    pub fn iter(&self) -> DomainIter<'_> {
        DomainIter {
            domain: self,
            next: Some(self.lb),
        }
    }

    pub(crate) fn remove(&mut self, v: i64) -> Result<bool, Contradiction> {
        if !self.contains(v) {
            return Ok(false);
        }
        if self.is_instantiated() {
            return Err(Contradiction);
        }
        match &mut self.bits {
            Some(bits) => {
                bits.remove(v);
                if v == self.lb {
                    self.lb = bits.next_from(v + 1).ok_or(Contradiction)?;
                }
                if v == self.ub {
                    self.ub = bits.prev_from(v - 1).ok_or(Contradiction)?;
                }
                Ok(true)
            }
            None => {
                if v == self.lb {
                    self.lb += 1;
                    Ok(true)
                } else if v == self.ub {
                    self.ub -= 1;
                    Ok(true)
                } else {
                    Ok(false)
                }
            }
        }
    }

    pub(crate) fn update_lb(&mut self, v: i64) -> Result<bool, Contradiction> {
        if v <= self.lb {
            return Ok(false);
        }
        if v > self.ub {
            return Err(Contradiction);
        }
        if let Some(bits) = &mut self.bits {
            while let Some(x) = bits.next_from(self.lb) {
                if x >= v {
                    break;
                }
                bits.remove(x);
            }
            self.lb = bits.next_from(v).ok_or(Contradiction)?;
        } else {
            self.lb = v;
        }
        Ok(true)
    }

    pub(crate) fn update_ub(&mut self, v: i64) -> Result<bool, Contradiction> {
        if v >= self.ub {
            return Ok(false);
        }
        if v < self.lb {
            return Err(Contradiction);
        }
        if let Some(bits) = &mut self.bits {
            while let Some(x) = bits.prev_from(self.ub) {
                if x <= v {
                    break;
                }
                bits.remove(x);
            }
            self.ub = bits.prev_from(v).ok_or(Contradiction)?;
        } else {
            self.ub = v;
        }
        Ok(true)
    }

    pub(crate) fn instantiate(&mut self, v: i64) -> Result<bool, Contradiction> {
        if !self.contains(v) {
            return Err(Contradiction);
        }
        if self.is_instantiated() {
            return Ok(false);
        }
        if self.bits.is_some() {
            self.bits = Some(BitSet::from_sorted(&[v]));
        }
        self.lb = v;
        self.ub = v;
        Ok(true)
    }
}

impl Display for Domain {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        if self.is_instantiated() {
            write!(f, "{}", self.lb)
        } else if self.bits.is_some() {
            write!(f, "{{{}}}", self.iter().join(","))
        } else {
            write!(f, "[{}..{}]", self.lb, self.ub)
        }
    }
}

/// Ascending iterator over domain values.
pub struct DomainIter<'a> {
    domain: &'a Domain,
    next: Option<i64>,
}

impl<'a> Iterator for DomainIter<'a> {
    type Item = i64;

    fn next(&mut self) -> Option<i64> {
        let v = self.next?;
        self.next = if v >= self.domain.ub {
            None
        } else {
            self.domain.next_value(v + 1)
        };
        Some(v)
    }
}
