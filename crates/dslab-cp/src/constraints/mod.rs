//! Built-in propagators.

pub mod all_different;
pub mod arithmetic;
pub mod bin_packing;
pub mod element;
pub mod linear;
pub mod logical;

pub use all_different::AllDifferentExcept;
pub use arithmetic::{Equal, LessOrEqual, NotEqual};
pub use bin_packing::BinPacking;
pub use element::Element;
pub use linear::{Linear, Relation};
pub use logical::{Clause, ReifiedEqual, ReifiedMember};
