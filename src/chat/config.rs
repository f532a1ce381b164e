//! Configuration types for the chat application.
//!
//! This module provides CLI argument parsing via `arrrg` and configuration
//! structures for controlling chat behavior.

use std::path::PathBuf;
use std::time::Duration;

use arrrg_derive::CommandLine;

use crate::config::ClientConfig;
use crate::error::Error;
use crate::transport::TransportKind;

/// Name used for new sessions when none is given.
pub const DEFAULT_USER_NAME: &str = "Anonymous";

/// Command-line arguments for the ctf-chat tool.
#[derive(CommandLine, Debug, Default, PartialEq, Eq)]
pub struct ChatArgs {
    /// Root URL of the game server.
    #[arrrg(optional, "Server URL (default: $CTF_BASE_URL or http://localhost:5001)", "URL")]
    pub base_url: Option<String>,

    /// Stream replies over a live event-stream connection.
    #[arrrg(flag, "Use the push transport instead of the buffered one")]
    pub push: bool,

    /// Cold-start notice threshold in milliseconds.
    #[arrrg(optional, "Show the waking-up notice after this many ms (default: 2000)", "MS")]
    pub cold_start_ms: Option<u64>,

    /// YAML client configuration file.
    #[arrrg(optional, "Load client configuration from a YAML file", "FILE")]
    pub config: Option<String>,

    /// Player name for the new session.
    #[arrrg(optional, "Player name (default: Anonymous)", "NAME")]
    pub name: Option<String>,

    /// JSON-lines log of every server result.
    #[arrrg(optional, "Append every server result to this file as JSON lines", "FILE")]
    pub log: Option<String>,

    /// Disable ANSI colors and styles.
    #[arrrg(flag, "Disable ANSI colors/styles")]
    pub no_color: bool,
}

/// Configuration for a chat session.
///
/// This struct holds the resolved configuration values after processing
/// command-line arguments with appropriate defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatConfig {
    /// Settings for the underlying client.
    pub client: ClientConfig,

    /// Player name used when starting sessions.
    pub user_name: String,

    /// Whether to use ANSI colors and styles in output.
    pub use_color: bool,

    /// Where to write the JSON-lines log, if anywhere.
    pub log_path: Option<PathBuf>,
}

impl ChatConfig {
    /// Creates a new ChatConfig with default values.
    ///
    /// Defaults:
    /// - Client: [`ClientConfig::from_env`]
    /// - User name: Anonymous
    /// - Color: enabled
    /// - Log: disabled
    pub fn new() -> Self {
        Self {
            client: ClientConfig::from_env(),
            user_name: DEFAULT_USER_NAME.to_string(),
            use_color: true,
            log_path: None,
        }
    }

    /// Sets the client configuration.
    pub fn with_client(mut self, client: ClientConfig) -> Self {
        self.client = client;
        self
    }

    /// Sets the player name.
    pub fn with_user_name(mut self, user_name: impl Into<String>) -> Self {
        self.user_name = user_name.into();
        self
    }

    /// Disables ANSI color output.
    pub fn without_color(mut self) -> Self {
        self.use_color = false;
        self
    }

    /// Sets the log path.
    pub fn with_log_path(mut self, path: Option<PathBuf>) -> Self {
        self.log_path = path;
        self
    }
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl TryFrom<ChatArgs> for ChatConfig {
    type Error = Error;

    /// Layers the arguments over the config file, the environment, and the defaults.
    fn try_from(args: ChatArgs) -> Result<Self, Error> {
        let mut client = match &args.config {
            Some(path) => ClientConfig::from_file(path)?,
            None => ClientConfig::new(),
        }
        .with_env_overrides();
        if let Some(base_url) = args.base_url {
            client = client.with_base_url(base_url);
        }
        if args.push {
            client = client.with_transport(TransportKind::Push);
        }
        if let Some(ms) = args.cold_start_ms {
            client = client.with_cold_start_threshold(Duration::from_millis(ms));
        }

        let user_name = args
            .name
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| DEFAULT_USER_NAME.to_string());

        Ok(ChatConfig {
            client,
            user_name,
            use_color: !args.no_color,
            log_path: args.log.map(PathBuf::from),
        })
    }
}
