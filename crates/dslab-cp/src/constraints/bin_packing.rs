//! One-dimensional bin packing.

use crate::propagator::Propagator;
use crate::store::{IntVar, Store};
use crate::Contradiction;

/// Binds the load of every bin to the total size of the items assigned to it.
///
/// `items[i]` is the bin of item `i`. Values outside of `0..loads.len()` mean that the item is not packed at all.
/// `fixed[b]` is the load of bin `b` which does not depend on any item. The capacity of a bin is the upper bound of
/// its load variable.
pub struct BinPacking {
    items: Vec<IntVar>,
    sizes: Vec<i64>,
    loads: Vec<IntVar>,
    fixed: Vec<i64>,
}

impl BinPacking {
    pub fn new(items: Vec<IntVar>, sizes: Vec<i64>, loads: Vec<IntVar>) -> Self {
        let fixed = vec![0; loads.len()];
        Self::with_fixed_load(items, sizes, loads, fixed)
    }

    /// Every item needs a size and every bin needs a fixed load. Missing fixed loads are zero.
    pub fn with_fixed_load(items: Vec<IntVar>, sizes: Vec<i64>, loads: Vec<IntVar>, mut fixed: Vec<i64>) -> Self {
        debug_assert_eq!(items.len(), sizes.len(), "each item needs a size");
        debug_assert_eq!(loads.len(), fixed.len(), "each bin needs a fixed load");
        fixed.resize(loads.len(), 0);
        Self {
            items,
            sizes,
            loads,
            fixed,
        }
    }

    fn bin(&self, v: i64) -> Option<usize> {
        if v >= 0 && (v as usize) < self.loads.len() {
            Some(v as usize)
        } else {
            None
        }
    }
}

impl Propagator for BinPacking {
    fn name(&self) -> &str {
        "bin_packing"
    }

    fn vars(&self) -> Vec<IntVar> {
        self.items.iter().chain(self.loads.iter()).copied().collect()
    }

    fn propagate(&self, store: &mut Store) -> Result<(), Contradiction> {
        let mut required = self.fixed.clone();
        let mut possible = self.fixed.clone();
        for (&item, &size) in self.items.iter().zip(self.sizes.iter()) {
            if size == 0 {
                continue;
            }
            if let Some(v) = store.value(item) {
                if let Some(b) = self.bin(v) {
                    required[b] += size;
                    possible[b] += size;
                }
            } else {
                for v in store.domain(item).iter() {
                    if let Some(b) = self.bin(v) {
                        possible[b] += size;
                    }
                }
            }
        }

        for (b, &load) in self.loads.iter().enumerate() {
            store.update_lb(load, required[b])?;
            store.update_ub(load, possible[b])?;
        }

        for (&item, &size) in self.items.iter().zip(self.sizes.iter()) {
            if size == 0 || store.is_instantiated(item) {
                continue;
            }
            let candidates = store
                .domain(item)
                .iter()
                .filter_map(|v| self.bin(v).map(|b| (v, b)))
                .collect::<Vec<_>>();
            for (v, b) in candidates {
                let load = self.loads[b];
                if required[b] + size > store.max(load) {
                    store.remove_value(item, v)?;
                } else if possible[b] - size < store.min(load) {
                    // the bin cannot reach its minimal load without this item
                    store.instantiate(item, v)?;
                    break;
                }
            }
        }
        Ok(())
    }
}
