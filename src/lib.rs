// Public modules
pub mod assembler;
pub mod chat;
pub mod client;
pub mod client_logger;
pub mod config;
pub mod envelope;
pub mod error;
pub mod render;
pub mod sse;
pub mod transport;
pub mod types;
pub mod watchdog;

mod observability;

// Re-exports
pub use assembler::{ResponseAssembler, Step, assemble};
pub use client::CtfClient;
pub use client_logger::{ClientLogger, JsonLinesLogger};
pub use config::ClientConfig;
pub use envelope::{Unwrapped, decode_json, unwrap_envelope};
pub use error::{Error, Result};
pub use observability::register_biometrics;
pub use render::{PlainTextRenderer, RecordingRenderer, RenderEvent, Renderer};
pub use sse::{Frames, parse_body, process_sse};
pub use transport::{BufferedTransport, EventStream, PushTransport, Transport, TransportKind};
pub use types::*;
pub use watchdog::ColdStartWatchdog;
