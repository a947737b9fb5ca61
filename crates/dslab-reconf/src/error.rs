//! Error types.

use thiserror::Error;

use dslab_cp::Contradiction;

/// Rejected mutation of a configuration.
#[derive(Error, Clone, Debug, PartialEq, Eq)]
pub enum ConfigurationError {
    #[error("element {0} already exists")]
    DuplicateElement(String),
    #[error("unknown element {0}")]
    UnknownElement(String),
    #[error("{0} is not a host")]
    NotAHost(String),
    #[error("host {0} is offline")]
    HostOffline(String),
    #[error("vm {0} is not running")]
    VmNotRunning(String),
    #[error("host {0} still hosts {1} vm(s)")]
    HostNotEmpty(String, usize),
    #[error("invalid migration target {1} for vm {0}")]
    InvalidMigrationTarget(String, String),
    #[error("inconsistent configuration: {0}")]
    Inconsistent(String),
}

/// Failure of a reconfiguration problem.
#[derive(Error, Clone, Debug, PartialEq, Eq)]
pub enum SolveError {
    #[error("no {resource} value specified for {element}")]
    MissingSpecification { resource: String, element: String },
    #[error("no configuration satisfies the constraints")]
    Infeasible,
    #[error("search limit reached before any solution was found")]
    Timeout,
    #[error("unknown element {0}")]
    UnknownElement(String),
    #[error("vm {0} can not be placed on any host")]
    NotPlaceable(String),
    #[error(transparent)]
    InvariantViolation(#[from] ConfigurationError),
}

impl From<Contradiction> for SolveError {
    fn from(_: Contradiction) -> Self {
        SolveError::Infeasible
    }
}

/// Failure while loading engine config or resolving config strings.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("can't read file {path}: {source}")]
    Io { path: String, source: std::io::Error },
    #[error("can't parse YAML from {path}: {source}")]
    Parse { path: String, source: serde_yaml::Error },
    #[error("unknown objective {0}")]
    UnknownObjective(String),
    #[error("unknown rule {0}")]
    UnknownRule(String),
    #[error("invalid option {option} in {value}")]
    InvalidOption { value: String, option: String },
}
