use serde::{Deserialize, Serialize};

/// The complete text of a streamed reply.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssembledResponse {
    /// All chunk texts concatenated in arrival order.
    pub text: String,

    /// The chunks as they were delivered to the renderer.
    pub chunks: Vec<String>,
}

impl AssembledResponse {
    /// Returns the number of chunks that made up the reply.
    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }
}
