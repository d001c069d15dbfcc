//! Health payload served by the request bridge.

use serde::{Deserialize, Serialize};

/// Agent id reported by `GET /health` unless configured otherwise.
pub const DEFAULT_AGENT_ID: &str = "code-analyzer";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    #[default]
    Ok,
}

/// Static liveness response; it does not depend on request history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: HealthStatus,
    pub agent: String,
}

impl HealthResponse {
    pub fn ok(agent: impl Into<String>) -> Self {
        Self {
            status: HealthStatus::Ok,
            agent: agent.into(),
        }
    }
}
