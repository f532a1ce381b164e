//! Core chat session management.
//!
//! A [`ChatSession`] holds the one game session the user is playing and routes each line of
//! input to the server.  When the server reports the session gone, the session is dropped and
//! must be started again; nothing is retried.

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use serde_json::{Value, from_reader, to_writer_pretty};
use time::OffsetDateTime;
use tokio_util::sync::CancellationToken;

use super::commands::{Route, route};
use crate::client::CtfClient;
use crate::error::{Error, Result};
use crate::render::Renderer;
use crate::types::{AssembledResponse, CommandResult, Session, SessionInfo, Stage};

/// The message shown when the server has forgotten the session.
pub const SESSION_EXPIRED_NOTICE: &str =
    "Your session has expired. Start a new session to keep playing.";

/// What the server said in response to one line of input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// The answer to a command.
    Command(CommandResult),
    /// A streamed chat reply.
    Chat(AssembledResponse),
}

/// A single player's game session.
pub struct ChatSession {
    client: CtfClient,
    session: Option<Session>,
}

impl ChatSession {
    /// Creates a chat session with no game session yet.
    pub fn new(client: CtfClient) -> Self {
        Self {
            client,
            session: None,
        }
    }

    /// Returns the client this session talks through.
    pub fn client(&self) -> &CtfClient {
        &self.client
    }

    /// Returns the active session, if any.
    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    /// Returns the stage of the active session.
    pub fn stage(&self) -> Option<Stage> {
        self.session.as_ref().map(|s| s.current_stage)
    }

    /// Starts a new game session, replacing any current one.
    pub async fn start(&mut self, user_name: &str) -> Result<&Session> {
        let info = self.client.create_session(user_name).await?;
        Ok(self.session.insert(Session::from(info)))
    }

    /// Sends one line of input.
    ///
    /// Commands are answered synchronously and their message is shown on `renderer`; if the
    /// server advanced the stage, the new stage is recorded and announced.  Anything else is a
    /// chat message whose reply is streamed into `renderer`.
    pub async fn send(
        &mut self,
        input: &str,
        renderer: &mut dyn Renderer,
        cancel: &CancellationToken,
    ) -> Result<Reply> {
        let session_id = self.active()?.session_id.clone();
        let result = match route(input) {
            Route::Command(command) => match self.client.send_command(&session_id, command).await
            {
                Ok(result) => {
                    self.apply(&result, renderer);
                    Ok(Reply::Command(result))
                }
                Err(err) => Err(err),
            },
            Route::Chat("") => Err(Error::validation(
                "message is empty",
                Some("message".to_string()),
            )),
            Route::Chat(message) => self
                .client
                .stream_chat(&session_id, message, renderer, cancel)
                .await
                .map(Reply::Chat),
        };
        self.check(result)
    }

    /// Fetches the server's export of the active session.
    pub async fn export(&mut self) -> Result<Value> {
        let session_id = self.active()?.session_id.clone();
        let result = self.client.export_session(&session_id).await;
        self.check(result)
    }

    /// Exports the active session and writes it, pretty-printed, to `path`.
    pub async fn save_export_to<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        let export = self.export().await?;
        let file = File::create(path.as_ref())
            .map_err(|err| Error::io("failed to create export file", err))?;
        let writer = BufWriter::new(file);
        to_writer_pretty(writer, &export).map_err(|err| {
            Error::serialization("failed to serialize export", Some(Box::new(err)))
        })
    }

    /// Restores a session from an export, replacing the current one.
    ///
    /// Returns the server's description of the imported session.
    pub async fn import(&mut self, session_data: &Value) -> Result<SessionInfo> {
        let info = self.client.import_session(session_data).await?;
        self.session = Some(Session::from(info.clone()));
        Ok(info)
    }

    /// Reads an export file and imports it.
    pub async fn import_from<P: AsRef<Path>>(&mut self, path: P) -> Result<SessionInfo> {
        let file = File::open(path.as_ref())
            .map_err(|err| Error::io("failed to open export file", err))?;
        let reader = BufReader::new(file);
        let session_data: Value = from_reader(reader).map_err(|err| {
            Error::serialization("failed to parse export file", Some(Box::new(err)))
        })?;
        self.import(&session_data).await
    }

    fn active(&self) -> Result<&Session> {
        self.session
            .as_ref()
            .ok_or_else(|| Error::validation("no active session", Some("session".to_string())))
    }

    fn apply(&mut self, result: &CommandResult, renderer: &mut dyn Renderer) {
        if result.success {
            renderer.print_info(&result.message);
        } else {
            renderer.print_error(&result.message);
        }
        if let (Some(stage), Some(session)) = (result.stage_change(), self.session.as_mut()) {
            session.current_stage = stage;
            renderer.print_stage(stage);
        }
    }

    fn check<T>(&mut self, result: Result<T>) -> Result<T> {
        if matches!(&result, Err(err) if err.is_session_expired()) {
            self.session = None;
        }
        result
    }
}

/// Returns the default file name for an export: `ctf-session-<unix millis>.json`.
pub fn default_export_path() -> PathBuf {
    let millis = OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000;
    PathBuf::from(format!("ctf-session-{millis}.json"))
}
