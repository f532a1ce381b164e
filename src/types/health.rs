use serde::{Deserialize, Serialize};

/// Response body of the health endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthStatus {
    /// `"healthy"` when the server is serving.
    pub status: String,

    /// Number of sessions the server currently holds.
    #[serde(default)]
    pub active_sessions: u64,
}

impl HealthStatus {
    /// Returns true if the server reports itself healthy.
    pub fn is_healthy(&self) -> bool {
        self.status == "healthy"
    }
}
