use serde::{Deserialize, Serialize};

use crate::types::Stage;

/// What a slash command did to the session, beyond its message.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandAction {
    /// The player moved to the next stage.
    Advance,

    /// The player cleared the final stage.
    Win,

    /// The server cleared the conversation history; the stage is unchanged.
    Reset,

    /// An action this client does not know about.
    #[serde(other)]
    Unknown,
}

impl CommandAction {
    /// Returns true if the action moves the session to a new stage.
    pub fn changes_stage(self) -> bool {
        matches!(self, CommandAction::Advance | CommandAction::Win)
    }
}

/// Response body of a synchronous slash command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandResult {
    /// Whether the command succeeded.
    pub success: bool,

    /// Text to show the player.
    pub message: String,

    /// Side effect of the command, if any.
    #[serde(default)]
    pub action: Option<CommandAction>,

    /// The stage the command moved to, if it moved.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_stage: Option<Stage>,

    /// The stage of the session after the command.
    #[serde(default)]
    pub current_stage: Option<Stage>,
}

impl CommandResult {
    /// Returns the stage the session should move to, if the command changed it.
    ///
    /// `currentStage` is authoritative; `newStage` is used only when it is the sole value.
    pub fn stage_change(&self) -> Option<Stage> {
        match self.action {
            Some(action) if action.changes_stage() => self.current_stage.or(self.new_stage),
            _ => None,
        }
    }
}
