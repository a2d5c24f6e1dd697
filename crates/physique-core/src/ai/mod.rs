pub mod ollama;

pub use ollama::OllamaClient;

use async_trait::async_trait;
use futures_util::stream::BoxStream;

use crate::error::BackendError;

/// Ordered text fragments of one streamed response.
pub type FragmentStream = BoxStream<'static, Result<String, BackendError>>;

/// A single-message multimodal chat call.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub model: String,
    pub prompt: String,
    pub images: Vec<Vec<u8>>,
}

/// A chat-style inference service that streams its answer.
#[async_trait]
pub trait PlanBackend: Send + Sync {
    async fn open_stream(&self, request: ChatRequest) -> Result<FragmentStream, BackendError>;
}
