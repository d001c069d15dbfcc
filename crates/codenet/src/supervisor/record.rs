//! Child process records exposed for status reporting.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// What a supervised child is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChildKind {
    /// The agent network service.
    Network,
    /// A long-running agent started from a YAML configuration.
    Agent,
    /// A helper script run by the Python interpreter.
    Script,
}

impl ChildKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Network => "network",
            Self::Agent => "agent",
            Self::Script => "script",
        }
    }
}

impl std::fmt::Display for ChildKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChildStatus {
    Running,
    Stopped,
    Failed,
}

/// Public view of one launched child. Never carries the live process handle.
///
/// Field names on the wire follow the launcher's status report: `type`, `log`, `cwd`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChildProcessRecord {
    #[serde(rename = "type")]
    pub kind: ChildKind,
    /// Log label, e.g. `network` or `agent_code-navigator`.
    pub name: String,
    pub pid: u32,
    #[serde(rename = "log")]
    pub log_path: PathBuf,
    #[serde(rename = "cwd")]
    pub working_dir: PathBuf,
    pub status: ChildStatus,
}
