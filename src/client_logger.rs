//! Logging trait for CTF client operations.
//!
//! This module provides the [`ClientLogger`] trait that allows callers to capture
//! every result passing through the [`CtfClient`](crate::CtfClient), and
//! [`JsonLinesLogger`], which writes them to a file one JSON object per line.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Mutex;

use serde_json::{Value, json};

use crate::error::{Error, Result};
use crate::types::{AssembledResponse, CommandResult, SessionInfo, StreamEvent};

/// A trait for logging CTF client operations.
///
/// Implement this trait to capture and record all interactions with the server,
/// including synchronous command results and individual streaming events.
pub trait ClientLogger: Send + Sync {
    /// Log a session that was created or imported.
    fn log_session(&self, session: &SessionInfo);

    /// Log the response to a slash command.
    fn log_command_result(&self, result: &CommandResult);

    /// Log an individual streaming event.
    ///
    /// This method is called for each [`StreamEvent`] decoded during a streamed
    /// reply, in arrival order, including the terminal event.
    fn log_stream_event(&self, event: &StreamEvent);

    /// Log the reply assembled from a completed stream.
    fn log_stream_message(&self, response: &AssembledResponse);
}

/// A [`ClientLogger`] that appends one JSON object per call to a file.
pub struct JsonLinesLogger {
    writer: Mutex<BufWriter<File>>,
}

impl JsonLinesLogger {
    /// Opens `path` for appending, creating it if needed.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path.as_ref())
            .map_err(|err| Error::io("failed to open log file", err))?;
        Ok(Self {
            writer: Mutex::new(BufWriter::new(file)),
        })
    }

    fn write(&self, kind: &str, payload: Value) {
        let record = json!({ "kind": kind, "payload": payload });
        if let Ok(mut writer) = self.writer.lock() {
            let _ = writeln!(writer, "{record}");
            let _ = writer.flush();
        }
    }
}

impl ClientLogger for JsonLinesLogger {
    fn log_session(&self, session: &SessionInfo) {
        self.write("session", json!(session));
    }

    fn log_command_result(&self, result: &CommandResult) {
        self.write("command_result", json!(result));
    }

    fn log_stream_event(&self, event: &StreamEvent) {
        self.write("stream_event", json!(event));
    }

    fn log_stream_message(&self, response: &AssembledResponse) {
        self.write(
            "stream_message",
            json!({ "text": response.text, "chunks": response.chunk_count() }),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_one_line_per_call() {
        let path = std::env::temp_dir().join(format!(
            "ctf-client-logger-{}.jsonl",
            std::process::id()
        ));
        let _ = std::fs::remove_file(&path);
        let logger = JsonLinesLogger::open(&path).unwrap();
        logger.log_stream_event(&StreamEvent::chunk("He"));
        logger.log_stream_event(&StreamEvent::Done);
        logger.log_stream_message(&AssembledResponse {
            text: "He".to_string(),
            chunks: vec!["He".to_string()],
        });

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<Value> = content
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0]["kind"], "stream_event");
        assert_eq!(lines[0]["payload"]["text"], "He");
        assert_eq!(lines[1]["payload"]["type"], "done");
        assert_eq!(lines[2]["payload"]["chunks"], 1);
        let _ = std::fs::remove_file(&path);
    }
}
