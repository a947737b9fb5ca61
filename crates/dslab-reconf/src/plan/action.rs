//! Reconfiguration actions.

use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

/// Action changing the state of a VM or a node.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "action")]
pub enum Action {
    /// Live migration of a running VM.
    Migrate { vm: String, from: String, to: String },
    Run { vm: String, host: String },
    Stop { vm: String, host: String },
    Startup { node: String },
    Shutdown { node: String },
    /// Suspends a running VM to the disk of `to`.
    Suspend { vm: String, from: String, to: String },
    /// Resumes a sleeping VM stored on `from` to run on `to`.
    Resume { vm: String, from: String, to: String },
    Pause { vm: String, host: String },
    Unpause { vm: String, host: String },
    /// Creates a new VM in the waiting state.
    Instantiate { vm: String },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ActionKind {
    Instantiate,
    Startup,
    Run,
    Migrate,
    Resume,
    Unpause,
    Pause,
    Suspend,
    Stop,
    Shutdown,
}

impl ActionKind {
    /// Rank of the kind among simultaneous actions, node shutdowns come last.
    pub fn rank(&self) -> u8 {
        *self as u8
    }
}

impl Action {
    pub fn kind(&self) -> ActionKind {
        match self {
            Action::Migrate { .. } => ActionKind::Migrate,
            Action::Run { .. } => ActionKind::Run,
            Action::Stop { .. } => ActionKind::Stop,
            Action::Startup { .. } => ActionKind::Startup,
            Action::Shutdown { .. } => ActionKind::Shutdown,
            Action::Suspend { .. } => ActionKind::Suspend,
            Action::Resume { .. } => ActionKind::Resume,
            Action::Pause { .. } => ActionKind::Pause,
            Action::Unpause { .. } => ActionKind::Unpause,
            Action::Instantiate { .. } => ActionKind::Instantiate,
        }
    }

    /// Returns the VM or the node the action is applied to.
    pub fn subject(&self) -> &str {
        match self {
            Action::Migrate { vm, .. }
            | Action::Run { vm, .. }
            | Action::Stop { vm, .. }
            | Action::Suspend { vm, .. }
            | Action::Resume { vm, .. }
            | Action::Pause { vm, .. }
            | Action::Unpause { vm, .. }
            | Action::Instantiate { vm } => vm.as_str(),
            Action::Startup { node } | Action::Shutdown { node } => node.as_str(),
        }
    }

    /// Returns the hosts touched by an action on a VM.
    pub fn hosts(&self) -> Vec<&str> {
        match self {
            Action::Migrate { from, to, .. } | Action::Suspend { from, to, .. } | Action::Resume { from, to, .. } => {
                if from == to {
                    vec![from.as_str()]
                } else {
                    vec![from.as_str(), to.as_str()]
                }
            }
            Action::Run { host, .. }
            | Action::Stop { host, .. }
            | Action::Pause { host, .. }
            | Action::Unpause { host, .. } => vec![host.as_str()],
            Action::Startup { .. } | Action::Shutdown { .. } | Action::Instantiate { .. } => Vec::new(),
        }
    }
}

impl Display for Action {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        match self {
            Action::Migrate { vm, from, to } => write!(f, "migrate({}, {}, {})", vm, from, to),
            Action::Run { vm, host } => write!(f, "run({}, {})", vm, host),
            Action::Stop { vm, host } => write!(f, "stop({}, {})", vm, host),
            Action::Startup { node } => write!(f, "startup({})", node),
            Action::Shutdown { node } => write!(f, "shutdown({})", node),
            Action::Suspend { vm, from, to } => write!(f, "suspend({}, {}, {})", vm, from, to),
            Action::Resume { vm, from, to } => write!(f, "resume({}, {}, {})", vm, from, to),
            Action::Pause { vm, host } => write!(f, "pause({}, {})", vm, host),
            Action::Unpause { vm, host } => write!(f, "unpause({}, {})", vm, host),
            Action::Instantiate { vm } => write!(f, "instantiate({})", vm),
        }
    }
}

////////////////////////////////////////////////////////////////////////////////

fn default_duration() -> u64 {
    1
}

/// Duration of every action kind, 1 by default.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionDurations {
    #[serde(default = "default_duration")]
    pub migrate: u64,
    #[serde(default = "default_duration")]
    pub run: u64,
    #[serde(default = "default_duration")]
    pub stop: u64,
    #[serde(default = "default_duration")]
    pub startup: u64,
    #[serde(default = "default_duration")]
    pub shutdown: u64,
    #[serde(default = "default_duration")]
    pub suspend: u64,
    #[serde(default = "default_duration")]
    pub resume: u64,
    #[serde(default = "default_duration")]
    pub pause: u64,
    #[serde(default = "default_duration")]
    pub unpause: u64,
    #[serde(default = "default_duration")]
    pub instantiate: u64,
}

impl Default for ActionDurations {
    fn default() -> Self {
        Self {
            migrate: 1,
            run: 1,
            stop: 1,
            startup: 1,
            shutdown: 1,
            suspend: 1,
            resume: 1,
            pause: 1,
            unpause: 1,
            instantiate: 1,
        }
    }
}

impl ActionDurations {
    pub fn get(&self, kind: ActionKind) -> u64 {
        match kind {
            ActionKind::Migrate => self.migrate,
            ActionKind::Run => self.run,
            ActionKind::Stop => self.stop,
            ActionKind::Startup => self.startup,
            ActionKind::Shutdown => self.shutdown,
            ActionKind::Suspend => self.suspend,
            ActionKind::Resume => self.resume,
            ActionKind::Pause => self.pause,
            ActionKind::Unpause => self.unpause,
            ActionKind::Instantiate => self.instantiate,
        }
    }
}

/// Action scheduled on the interval `[start, end)`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PlannedAction {
    pub action: Action,
    pub start: u64,
    pub end: u64,
}

impl Display for PlannedAction {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "{}:{} {}", self.start, self.end, self.action)
    }
}
