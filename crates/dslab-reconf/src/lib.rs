#![doc = include_str!("../readme.md")]

pub mod config;
pub mod configuration;
pub mod element;
pub mod engine;
pub mod error;
pub mod heuristics;
pub mod model;
pub mod objective;
pub mod packing;
pub mod plan;
pub mod resources;
pub mod rules;

pub use configuration::Configuration;
pub use engine::{ReconfigurationEngine, ReconfigurationRequest, ReconfigurationResult, SolvingStatistics};
pub use error::{ConfigError, ConfigurationError, SolveError};
