use serde::{Deserialize, Serialize};

/// A decoded event of a chat response stream.
///
/// A well-formed stream is any number of `Chunk`s followed by exactly one terminal event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    /// An incremental piece of response text.
    Chunk {
        /// The decoded text.
        text: String,
    },

    /// The response is complete.
    Done,

    /// The server aborted the response.
    Error {
        /// Detail carried by the error event, if any.
        detail: Option<String>,
    },
}

impl StreamEvent {
    /// Creates a chunk event.
    pub fn chunk(text: impl Into<String>) -> Self {
        StreamEvent::Chunk { text: text.into() }
    }

    /// Returns true for `Done` and `Error`.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, StreamEvent::Chunk { .. })
    }
}

/// The text of a chunk payload and how it was obtained.
///
/// Payloads are usually JSON string literals, but a payload that is not valid JSON is still
/// text; it is taken verbatim.  Falling back is the expected path, not an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChunkText {
    /// The payload was a JSON scalar and this is its decoded text.
    Decoded(String),

    /// The payload was not a JSON scalar and is used as-is.
    Verbatim(String),
}

impl ChunkText {
    /// Returns the text regardless of how it was obtained.
    pub fn as_str(&self) -> &str {
        match self {
            ChunkText::Decoded(text) | ChunkText::Verbatim(text) => text,
        }
    }

    /// Consumes the value and returns the text.
    pub fn into_string(self) -> String {
        match self {
            ChunkText::Decoded(text) | ChunkText::Verbatim(text) => text,
        }
    }

    /// Returns true if the payload decoded as JSON.
    pub fn is_decoded(&self) -> bool {
        matches!(self, ChunkText::Decoded(_))
    }
}

impl From<ChunkText> for StreamEvent {
    fn from(text: ChunkText) -> Self {
        StreamEvent::Chunk {
            text: text.into_string(),
        }
    }
}
