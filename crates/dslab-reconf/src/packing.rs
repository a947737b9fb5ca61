//! Resource packing constraints.

use dslab_cp::constraints::BinPacking;
use dslab_cp::{Contradiction, IntVar, Solver};

/// Trait for implementation of the packing constraint of one resource type.
///
/// `items[i]` is the location variable of VM `i` whose usage is `sizes[i]`; a location outside of `0..loads.len()`
/// means the VM is not placed. `loads[h]` must be equal to `fixed[h]` plus the total usage of the VMs placed on
/// host `h`, and its upper bound is the host capacity.
pub trait Packer {
    fn name(&self) -> &str;

    fn pack(
        &self,
        solver: &mut Solver,
        items: &[IntVar],
        sizes: &[i64],
        loads: &[IntVar],
        fixed: &[i64],
    ) -> Result<(), Contradiction>;
}

/// Posts one bin packing propagator per resource type.
pub struct BinPackingPacker;

impl BinPackingPacker {
    pub fn new() -> Self {
        Self {}
    }
}

impl Default for BinPackingPacker {
    fn default() -> Self {
        Self::new()
    }
}

impl Packer for BinPackingPacker {
    fn name(&self) -> &str {
        "BinPacking"
    }

    fn pack(
        &self,
        solver: &mut Solver,
        items: &[IntVar],
        sizes: &[i64],
        loads: &[IntVar],
        fixed: &[i64],
    ) -> Result<(), Contradiction> {
        solver.post(BinPacking::with_fixed_load(
            items.to_vec(),
            sizes.to_vec(),
            loads.to_vec(),
            fixed.to_vec(),
        ))
    }
}
