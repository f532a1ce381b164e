// Public modules
pub mod assembled_response;
pub mod command_result;
pub mod health;
pub mod session;
pub mod stage;
pub mod stream_event;

// Re-exports
pub use assembled_response::AssembledResponse;
pub use command_result::{CommandAction, CommandResult};
pub use health::HealthStatus;
pub use session::{Session, SessionInfo};
pub use stage::Stage;
pub use stream_event::{ChunkText, StreamEvent};
