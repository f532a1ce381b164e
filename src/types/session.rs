use serde::{Deserialize, Serialize};

use crate::types::Stage;

/// The client's view of a game session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Opaque identifier assigned by the server.
    pub session_id: String,

    /// Display name of the player.
    pub user_name: String,

    /// The stage the player is on, as last reported by the server.
    pub current_stage: Stage,
}

impl From<SessionInfo> for Session {
    fn from(info: SessionInfo) -> Self {
        Self {
            session_id: info.session_id,
            user_name: info.user_name,
            current_stage: info.stage,
        }
    }
}

/// Response body of session creation and session import.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionInfo {
    /// Opaque identifier assigned by the server.
    pub session_id: String,

    /// Display name of the player.
    #[serde(default = "default_user_name")]
    pub user_name: String,

    /// The stage the session is on.
    #[serde(default)]
    pub stage: Stage,

    /// Informational message, present on import.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

fn default_user_name() -> String {
    "Anonymous".to_string()
}
