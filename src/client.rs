use std::sync::Arc;
use std::time::Duration;

use reqwest::Response;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;

use crate::assembler::assemble;
use crate::client_logger::ClientLogger;
use crate::config::ClientConfig;
use crate::envelope::decode_json;
use crate::error::{Error, Result};
use crate::observability::CLIENT_SESSIONS_EXPIRED;
use crate::render::Renderer;
use crate::transport::{self, Endpoint, Transport, TransportKind};
use crate::types::{AssembledResponse, CommandResult, HealthStatus, SessionInfo};
use crate::watchdog::ColdStartWatchdog;

const HEALTH_PATH: &str = "api/health";
const CREATE_SESSION_PATH: &str = "api/session/create";
const CHAT_PATH: &str = "api/chat";
const EXPORT_SESSION_PATH: &str = "api/session/export";
const IMPORT_SESSION_PATH: &str = "api/session/import";

/// Client for the CTF chat backend.
///
/// One client can serve any number of sessions; it holds no per-session state.  Callers are
/// expected to have at most one request in flight per session.
#[derive(Clone)]
pub struct CtfClient {
    endpoint: Endpoint,
    transport: Arc<dyn Transport>,
    transport_kind: Option<TransportKind>,
    cold_start_threshold: Duration,
    logger: Option<Arc<dyn ClientLogger>>,
}

impl CtfClient {
    /// Create a new client from `config`.
    pub fn new(config: ClientConfig) -> Result<Self> {
        let endpoint = Endpoint::new(&config.base_url, config.request_timeout())?;
        let transport = transport::for_kind(config.transport, endpoint.clone());
        Ok(Self {
            endpoint,
            transport: Arc::from(transport),
            transport_kind: Some(config.transport),
            cold_start_threshold: config.cold_start_threshold(),
            logger: None,
        })
    }

    /// Create a new client with the default configuration and `CTF_BASE_URL` applied.
    pub fn from_env() -> Result<Self> {
        Self::new(ClientConfig::from_env())
    }

    /// Replace the transport used for streamed replies.
    pub fn with_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = transport;
        self.transport_kind = None;
        self
    }

    /// Install a logger that sees every result and stream event.
    pub fn with_logger(mut self, logger: Arc<dyn ClientLogger>) -> Self {
        self.logger = Some(logger);
        self
    }

    /// The base URL requests are resolved against.
    pub fn base_url(&self) -> &str {
        self.endpoint.base_url().as_str()
    }

    /// The configured transport, or `None` when a custom transport was installed.
    pub fn transport_kind(&self) -> Option<TransportKind> {
        self.transport_kind
    }

    /// How long a streamed reply may take to start before the cold-start notice appears.
    pub fn cold_start_threshold(&self) -> Duration {
        self.cold_start_threshold
    }

    /// Ask the server whether it is up.
    pub async fn health(&self) -> Result<HealthStatus> {
        let response = self
            .endpoint
            .get(HEALTH_PATH, &[], "application/json")
            .await?;
        self.read_json(response).await
    }

    /// Start a new game session for `user_name`.
    pub async fn create_session(&self, user_name: &str) -> Result<SessionInfo> {
        let response = self
            .endpoint
            .post_json(CREATE_SESSION_PATH, &json!({ "userName": user_name }))
            .await?;
        let info: SessionInfo = self.read_json(response).await?;
        if let Some(logger) = &self.logger {
            logger.log_session(&info);
        }
        Ok(info)
    }

    /// Send a slash command and return the server's answer.
    pub async fn send_command(&self, session_id: &str, command: &str) -> Result<CommandResult> {
        require_session(session_id)?;
        let response = self
            .endpoint
            .post_json(
                CHAT_PATH,
                &json!({ "sessionId": session_id, "message": command }),
            )
            .await?;
        let result: CommandResult = self.read_json(response).await?;
        if let Some(logger) = &self.logger {
            logger.log_command_result(&result);
        }
        Ok(result)
    }

    /// Send a chat message and stream the reply into `renderer`.
    ///
    /// The cold-start notice is shown on `renderer` if nothing arrives within the threshold.
    /// Cancelling `cancel` drops the connection and fails with [`Error::Abort`].
    pub async fn stream_chat(
        &self,
        session_id: &str,
        message: &str,
        renderer: &mut dyn Renderer,
        cancel: &CancellationToken,
    ) -> Result<AssembledResponse> {
        require_session(session_id)?;
        let mut watchdog = ColdStartWatchdog::arm(self.cold_start_threshold);

        let opened = tokio::select! {
            biased;
            () = cancel.cancelled() => None,
            result = watchdog.guard(self.transport.open(session_id, message), renderer) => Some(result),
        };
        let events = match opened {
            Some(Ok(events)) => events,
            Some(Err(err)) => {
                if watchdog.disarm() {
                    renderer.clear_advisory();
                }
                return Err(err);
            }
            None => {
                if watchdog.disarm() {
                    renderer.clear_advisory();
                }
                renderer.print_interrupted();
                return Err(Error::abort("reply cancelled"));
            }
        };

        assemble(
            events,
            renderer,
            &mut watchdog,
            cancel,
            self.logger.as_deref(),
        )
        .await
    }

    /// Fetch the server's export of `session_id`.
    ///
    /// The export is opaque; it is meant to be stored and later handed to
    /// [`import_session`](Self::import_session) unchanged.
    pub async fn export_session(&self, session_id: &str) -> Result<Value> {
        require_session(session_id)?;
        let response = self
            .endpoint
            .post_json(EXPORT_SESSION_PATH, &json!({ "sessionId": session_id }))
            .await?;
        self.read_json(response).await
    }

    /// Restore a session from an export.  The server assigns it a new identifier.
    pub async fn import_session(&self, session_data: &Value) -> Result<SessionInfo> {
        let response = self
            .endpoint
            .post_json(IMPORT_SESSION_PATH, &json!({ "sessionData": session_data }))
            .await?;
        let info: SessionInfo = self.read_json(response).await?;
        if let Some(logger) = &self.logger {
            logger.log_session(&info);
        }
        Ok(info)
    }

    async fn read_json<T: DeserializeOwned>(&self, response: Response) -> Result<T> {
        let raw = self.endpoint.text(response).await?;
        decode_json(&raw).inspect_err(|err| {
            if err.is_session_expired() {
                CLIENT_SESSIONS_EXPIRED.click();
            }
        })
    }
}

fn require_session(session_id: &str) -> Result<()> {
    if session_id.trim().is_empty() {
        return Err(Error::validation(
            "no active session",
            Some("session_id".to_string()),
        ));
    }
    Ok(())
}
