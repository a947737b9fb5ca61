//! Action plan: the actions transforming the source configuration into the destination one.

pub mod action;
pub mod extractor;
pub mod graph;

pub use action::{Action, ActionDurations, ActionKind, PlannedAction};
pub use extractor::{extract, extract_with_durations};
pub use graph::{ActionGraph, ActionGraphBuilder};
