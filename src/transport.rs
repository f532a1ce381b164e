//! Transports that deliver a streamed chat reply.
//!
//! Two deployments exist.  One can hold a connection open and push events as they are produced;
//! the other buffers the whole event stream and returns it as a single body.  Both are exposed
//! through [`Transport`], which yields the same lazy, ordered, finite sequence of
//! [`StreamEvent`]s either way.

use std::fmt;
use std::io;
use std::pin::Pin;
use std::str::FromStr;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures::stream::{self, Stream, StreamExt};
use reqwest::header::{self, HeaderValue};
use reqwest::{Client as ReqwestClient, RequestBuilder, Response};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::envelope::{error_message, unwrap_envelope};
use crate::error::{Error, Result};
use crate::observability::{
    CLIENT_REQUEST_DURATION, CLIENT_REQUEST_ERRORS, CLIENT_REQUESTS, CLIENT_SESSIONS_EXPIRED,
    STREAM_BYTES,
};
use crate::sse::{parse_body, process_sse};
use crate::types::StreamEvent;

/// Path of the streaming chat endpoint, relative to the base URL.
pub const STREAM_PATH: &str = "api/chat/stream";

const EVENT_STREAM: &str = "text/event-stream";

/// A boxed stream of events, as returned by [`Transport::open`].
pub type EventStream = Pin<Box<dyn Stream<Item = Result<StreamEvent>> + Send>>;

/// Opens the event stream for one chat message.
///
/// Dropping the returned stream releases the underlying connection.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Sends `message` on `session_id` and returns the reply as a stream of events.
    ///
    /// Fails before yielding anything if the server answers with a non-success status.
    async fn open(&self, session_id: &str, message: &str) -> Result<EventStream>;
}

/// Which [`Transport`] a client uses.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// One request, one complete body.
    #[default]
    Buffered,
    /// A long-lived `text/event-stream` connection.
    Push,
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportKind::Buffered => write!(f, "buffered"),
            TransportKind::Push => write!(f, "push"),
        }
    }
}

impl FromStr for TransportKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "buffered" => Ok(TransportKind::Buffered),
            "push" => Ok(TransportKind::Push),
            _ => Err(Error::validation(
                format!("unknown transport {s:?}, expected \"buffered\" or \"push\""),
                Some("transport".to_string()),
            )),
        }
    }
}

/// The HTTP side of the client: a reqwest client bound to a base URL.
#[derive(Debug, Clone)]
pub(crate) struct Endpoint {
    client: ReqwestClient,
    base_url: Url,
    timeout: Option<Duration>,
}

impl Endpoint {
    pub(crate) fn new(base_url: &str, timeout: Option<Duration>) -> Result<Self> {
        // Url::join replaces the last path segment unless the base ends in a slash.
        let mut base = base_url.trim().to_string();
        if !base.ends_with('/') {
            base.push('/');
        }
        let base_url = Url::parse(&base)
            .map_err(|e| Error::url(format!("invalid base URL {base_url:?}: {e}"), Some(e)))?;

        let mut builder = ReqwestClient::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().map_err(|e| {
            Error::http_client(
                format!("Failed to build HTTP client: {e}"),
                Some(Box::new(e)),
            )
        })?;

        Ok(Self {
            client,
            base_url,
            timeout,
        })
    }

    pub(crate) fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub(crate) fn url(&self, path: &str) -> Result<Url> {
        Ok(self.base_url.join(path)?)
    }

    /// POSTs `body` as JSON and returns the successful response.
    pub(crate) async fn post_json<T: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &T,
    ) -> Result<Response> {
        let request = self
            .client
            .post(self.url(path)?)
            .header(header::ACCEPT, HeaderValue::from_static("application/json"))
            .json(body);
        self.send(request).await
    }

    /// GETs `path` with `query` and returns the successful response.
    pub(crate) async fn get(
        &self,
        path: &str,
        query: &[(&str, &str)],
        accept: &'static str,
    ) -> Result<Response> {
        let request = self
            .client
            .get(self.url(path)?)
            .header(header::ACCEPT, HeaderValue::from_static(accept))
            .query(query);
        self.send(request).await
    }

    /// Reads the whole body of `response` as text.
    pub(crate) async fn text(&self, response: Response) -> Result<String> {
        response.text().await.map_err(|e| self.request_error(e))
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response> {
        CLIENT_REQUESTS.click();
        let start = Instant::now();
        let result = request.send().await;
        CLIENT_REQUEST_DURATION.add(start.elapsed().as_secs_f64());
        let response = result.map_err(|e| {
            CLIENT_REQUEST_ERRORS.click();
            self.request_error(e)
        })?;

        if !response.status().is_success() {
            CLIENT_REQUEST_ERRORS.click();
            let err = Self::status_error(response).await;
            if err.is_session_expired() {
                CLIENT_SESSIONS_EXPIRED.click();
            }
            return Err(err);
        }
        Ok(response)
    }

    async fn status_error(response: Response) -> Error {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        let unwrapped = unwrap_envelope(&body);
        let message = if unwrapped.body.trim().is_empty() {
            status
                .canonical_reason()
                .unwrap_or("Request failed")
                .to_string()
        } else {
            error_message(&unwrapped.body)
        };
        Error::from_status(status.as_u16(), message)
    }

    fn request_error(&self, e: reqwest::Error) -> Error {
        if e.is_timeout() {
            Error::timeout(
                format!("Request timed out: {e}"),
                self.timeout.map(|t| t.as_secs_f64()),
            )
        } else if e.is_connect() {
            Error::connection(format!("Connection error: {e}"), Some(Box::new(e)))
        } else {
            Error::http_client(format!("Request failed: {e}"), Some(Box::new(e)))
        }
    }
}

/// Parses a complete response body, envelope and all, into events.
fn buffered_events(raw: String) -> Result<EventStream> {
    STREAM_BYTES.count(raw.len() as u64);
    let unwrapped = unwrap_envelope(&raw);
    if let Some(err) = unwrapped.status_error() {
        if err.is_session_expired() {
            CLIENT_SESSIONS_EXPIRED.click();
        }
        return Err(err);
    }
    let frames = parse_body(unwrapped.body.into_owned());
    Ok(Box::pin(stream::iter(frames.map(Ok::<_, Error>))))
}

/// Fetches the whole reply in one request and replays it as events.
#[derive(Debug, Clone)]
pub struct BufferedTransport {
    endpoint: Endpoint,
}

impl BufferedTransport {
    pub(crate) fn new(endpoint: Endpoint) -> Self {
        Self { endpoint }
    }
}

#[async_trait]
impl Transport for BufferedTransport {
    async fn open(&self, session_id: &str, message: &str) -> Result<EventStream> {
        let response = self
            .endpoint
            .get(
                STREAM_PATH,
                &[("sessionId", session_id), ("message", message)],
                EVENT_STREAM,
            )
            .await?;
        let raw = self.endpoint.text(response).await?;
        buffered_events(raw)
    }
}

/// Reads the reply from a live `text/event-stream` connection.
///
/// When the server answers with some other content type (a gateway that buffers, for
/// instance), the body is parsed the way [`BufferedTransport`] would parse it.
#[derive(Debug, Clone)]
pub struct PushTransport {
    endpoint: Endpoint,
}

impl PushTransport {
    pub(crate) fn new(endpoint: Endpoint) -> Self {
        Self { endpoint }
    }
}

#[async_trait]
impl Transport for PushTransport {
    async fn open(&self, session_id: &str, message: &str) -> Result<EventStream> {
        let response = self
            .endpoint
            .get(
                STREAM_PATH,
                &[("sessionId", session_id), ("message", message)],
                EVENT_STREAM,
            )
            .await?;

        if !is_event_stream(&response) {
            let raw = self.endpoint.text(response).await?;
            return buffered_events(raw);
        }

        let bytes = Box::pin(response.bytes_stream().map(|chunk| {
            chunk
                .map(|bytes| {
                    STREAM_BYTES.count(bytes.len() as u64);
                    bytes
                })
                .map_err(io::Error::other)
        }));
        Ok(Box::pin(process_sse(bytes)))
    }
}

fn is_event_stream(response: &Response) -> bool {
    response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.starts_with(EVENT_STREAM))
        .unwrap_or(false)
}

/// Builds the transport named by `kind` on top of `endpoint`.
pub(crate) fn for_kind(kind: TransportKind, endpoint: Endpoint) -> Box<dyn Transport> {
    match kind {
        TransportKind::Buffered => Box::new(BufferedTransport::new(endpoint)),
        TransportKind::Push => Box::new(PushTransport::new(endpoint)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_kind_parsing() {
        assert_eq!(
            "buffered".parse::<TransportKind>().unwrap(),
            TransportKind::Buffered
        );
        assert_eq!("push".parse::<TransportKind>().unwrap(), TransportKind::Push);
        assert!("websocket".parse::<TransportKind>().unwrap_err().is_validation());
        assert_eq!(TransportKind::Push.to_string(), "push");
    }

    #[test]
    fn endpoint_keeps_base_path() {
        let endpoint = Endpoint::new("https://example.com/prod", None).unwrap();
        assert_eq!(endpoint.base_url().as_str(), "https://example.com/prod/");
        assert_eq!(
            endpoint.url("api/chat").unwrap().as_str(),
            "https://example.com/prod/api/chat"
        );
    }

    #[test]
    fn endpoint_rejects_garbage() {
        assert!(matches!(
            Endpoint::new("not a url", None).unwrap_err(),
            Error::Url { .. }
        ));
    }

    #[tokio::test]
    async fn buffered_events_unwrap_envelope() {
        let raw = serde_json::json!({
            "statusCode": 200,
            "body": "data: \"Hi\"\n\nevent: done\ndata: {}\n\n"
        })
        .to_string();
        let events: Vec<_> = buffered_events(raw).unwrap().collect().await;
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].as_ref().unwrap(), &StreamEvent::chunk("Hi"));
        assert!(matches!(events[1], Ok(StreamEvent::Done)));
    }

    #[test]
    fn buffered_events_enveloped_not_found() {
        let raw = serde_json::json!({
            "statusCode": 404,
            "body": "{\"error\":true,\"message\":\"Session not found or expired\"}"
        })
        .to_string();
        let err = buffered_events(raw).err().unwrap();
        assert!(err.is_session_expired());
    }
}
