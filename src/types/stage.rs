use serde::{Deserialize, Serialize};
use std::fmt;

/// A stage of the game, numbered from 1 (easiest) to 5 (hardest).
///
/// The server owns stage progression; the client records whatever the server reports and
/// never validates the transition.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Stage(u8);

impl Stage {
    /// The stage every new session starts on.
    pub const FIRST: Stage = Stage(1);

    /// The final stage.
    pub const LAST: Stage = Stage(5);

    /// Creates a stage from its number.
    pub const fn new(number: u8) -> Self {
        Stage(number)
    }

    /// Returns the stage number.
    pub fn number(self) -> u8 {
        self.0
    }

    /// Returns the display name of the stage, or `"Unknown"` when the number is out of range.
    pub fn name(self) -> &'static str {
        match self.0 {
            1 => "The Warmup (Easy)",
            2 => "Basic Resistance (Medium)",
            3 => "Alternate attack surfaces (Hard)",
            4 => "External research (Very Hard)",
            5 => "True Redteam (Expert)",
            _ => "Unknown",
        }
    }

    /// Returns true if this is the last stage.
    pub fn is_final(self) -> bool {
        self >= Stage::LAST
    }
}

impl Default for Stage {
    fn default() -> Self {
        Stage::FIRST
    }
}

impl From<u8> for Stage {
    fn from(number: u8) -> Self {
        Stage(number)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "STAGE {} of {}: {}",
            self.0,
            Stage::LAST.0,
            self.name()
        )
    }
}
