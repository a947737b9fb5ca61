//! Engine configuration.

pub mod engine_config;
pub mod options;

pub use engine_config::EngineConfig;
pub use options::{parse_config_value, parse_list, parse_options};
