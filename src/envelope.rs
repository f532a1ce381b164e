//! Unwrapping of gateway response envelopes.
//!
//! Some deployments put the real response inside a JSON object of the form
//! `{"statusCode": 200, "headers": {...}, "body": "<payload>"}`.  Others return the payload
//! directly.  [`unwrap_envelope`] accepts either and never fails: anything that is not an
//! envelope is the payload.

use std::borrow::Cow;

use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{Error, Result};
use crate::observability::ENVELOPES_UNWRAPPED;

#[derive(Deserialize)]
struct Envelope {
    #[serde(rename = "statusCode", default)]
    status_code: Option<u16>,
    body: String,
}

/// The payload of a response after any envelope has been removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unwrapped<'a> {
    /// The status code the envelope claimed, when there was an envelope that carried one.
    pub status_code: Option<u16>,
    /// The real payload.
    pub body: Cow<'a, str>,
}

impl Unwrapped<'_> {
    /// Returns true if the raw body was an envelope.
    pub fn was_enveloped(&self) -> bool {
        matches!(self.body, Cow::Owned(_))
    }

    /// Returns the error implied by a non-success envelope status, if any.
    pub fn status_error(&self) -> Option<Error> {
        match self.status_code {
            Some(code) if !(200..300).contains(&code) => {
                Some(Error::from_status(code, error_message(&self.body)))
            }
            _ => None,
        }
    }
}

/// Strips a gateway envelope from `raw`, if there is one.
///
/// Returns `raw` unchanged when it does not parse as an envelope.
pub fn unwrap_envelope(raw: &str) -> Unwrapped<'_> {
    match serde_json::from_str::<Envelope>(raw) {
        Ok(envelope) => {
            ENVELOPES_UNWRAPPED.click();
            Unwrapped {
                status_code: envelope.status_code,
                body: Cow::Owned(envelope.body),
            }
        }
        Err(_) => Unwrapped {
            status_code: None,
            body: Cow::Borrowed(raw),
        },
    }
}

/// Unwraps `raw` and decodes the payload as JSON.
///
/// A non-success status inside the envelope is reported the same way an HTTP status would be.
pub fn decode_json<T: DeserializeOwned>(raw: &str) -> Result<T> {
    let unwrapped = unwrap_envelope(raw);
    if let Some(err) = unwrapped.status_error() {
        return Err(err);
    }
    serde_json::from_str(&unwrapped.body).map_err(|e| {
        Error::serialization(
            format!("Failed to parse response: {e}"),
            Some(Box::new(e)),
        )
    })
}

/// Pulls the human-readable message out of an error body, or returns the body itself.
pub(crate) fn error_message(body: &str) -> String {
    #[derive(Deserialize)]
    struct ErrorBody {
        message: Option<String>,
        error: Option<Value>,
    }

    match serde_json::from_str::<ErrorBody>(body) {
        Ok(ErrorBody {
            message: Some(message),
            ..
        }) => message,
        Ok(ErrorBody {
            error: Some(Value::String(error)),
            ..
        }) => error,
        _ => body.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SessionInfo;

    #[test]
    fn plain_text_is_unchanged() {
        let raw = "data: \"He\"\n\nevent: done\ndata: {}\n\n";
        let unwrapped = unwrap_envelope(raw);
        assert_eq!(unwrapped.body, raw);
        assert!(!unwrapped.was_enveloped());
        assert_eq!(unwrapped.status_code, None);
    }

    #[test]
    fn json_without_body_is_unchanged() {
        let raw = r#"{"sessionId":"abc","userName":"x","stage":1}"#;
        let unwrapped = unwrap_envelope(raw);
        assert_eq!(unwrapped.body, raw);
        assert!(!unwrapped.was_enveloped());
    }

    #[test]
    fn non_string_body_is_unchanged() {
        let raw = r#"{"statusCode":200,"body":{"nested":true}}"#;
        assert_eq!(unwrap_envelope(raw).body, raw);
    }

    #[test]
    fn envelope_is_stripped() {
        let raw = r#"{"statusCode":200,"headers":{"Content-Type":"text/event-stream"},"body":"data: \"hi\"\n\n"}"#;
        let unwrapped = unwrap_envelope(raw);
        assert_eq!(unwrapped.body, "data: \"hi\"\n\n");
        assert_eq!(unwrapped.status_code, Some(200));
        assert!(unwrapped.was_enveloped());
        assert!(unwrapped.status_error().is_none());
    }

    #[test]
    fn envelope_without_headers_is_stripped() {
        let raw = r#"{"statusCode":200,"body":"inner"}"#;
        assert_eq!(unwrap_envelope(raw).body, "inner");
    }

    #[test]
    fn decode_json_through_envelope() {
        let inner = r#"{"sessionId":"abc","userName":"x","stage":2}"#;
        let raw = serde_json::json!({"statusCode": 200, "body": inner}).to_string();
        let direct: SessionInfo = decode_json(inner).unwrap();
        let wrapped: SessionInfo = decode_json(&raw).unwrap();
        assert_eq!(direct, wrapped);
    }

    #[test]
    fn enveloped_not_found_is_session_expired() {
        let raw = serde_json::json!({
            "statusCode": 404,
            "body": r#"{"error":true,"message":"Session not found or expired"}"#
        })
        .to_string();
        let err = decode_json::<SessionInfo>(&raw).unwrap_err();
        assert!(err.is_session_expired());
        assert!(err.to_string().contains("Session not found or expired"));
    }

    #[test]
    fn error_message_extraction() {
        assert_eq!(
            error_message(r#"{"error":true,"message":"Missing sessionId"}"#),
            "Missing sessionId"
        );
        assert_eq!(
            error_message(r#"{"error":"Use /api/chat/stream for regular messages"}"#),
            "Use /api/chat/stream for regular messages"
        );
        assert_eq!(error_message("Internal Server Error"), "Internal Server Error");
    }
}
