use std::collections::VecDeque;

use async_trait::async_trait;
use base64::Engine;
use futures_util::stream::{self, Stream, StreamExt};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{ChatRequest, FragmentStream, PlanBackend};
use crate::error::BackendError;

#[derive(Serialize)]
struct OllamaChatRequest {
    model: String,
    messages: Vec<OllamaMessage>,
    stream: bool,
}

#[derive(Serialize)]
struct OllamaMessage {
    role: String,
    content: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    images: Vec<String>,
}

#[derive(Deserialize)]
struct OllamaChatChunk {
    #[serde(default)]
    message: Option<OllamaChunkMessage>,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Deserialize)]
struct OllamaChunkMessage {
    #[serde(default)]
    content: String,
}

#[derive(Deserialize)]
struct OllamaModel {
    name: String,
}

#[derive(Deserialize)]
struct OllamaModelsResponse {
    models: Vec<OllamaModel>,
}

#[derive(Clone)]
pub struct OllamaClient {
    client: Client,
    base_url: String,
}

impl OllamaClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Open a streaming `/api/chat` call. Images are sent base64-encoded.
    pub async fn chat_stream(&self, request: ChatRequest) -> Result<FragmentStream, BackendError> {
        let url = format!("{}/api/chat", self.base_url);

        let images: Vec<String> = request
            .images
            .iter()
            .map(|bytes| base64::engine::general_purpose::STANDARD.encode(bytes))
            .collect();

        info!(model = %request.model, images = images.len(), "opening chat stream");

        let body = OllamaChatRequest {
            model: request.model,
            messages: vec![OllamaMessage {
                role: "user".to_string(),
                content: request.prompt,
                images,
            }],
            stream: true,
        };

        let response = self.client.post(&url).json(&body).send().await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(BackendError::Status { status, body });
        }

        Ok(decode_chat_stream(Box::pin(response.bytes_stream())).boxed())
    }

    pub async fn list_models(&self) -> Result<Vec<String>, BackendError> {
        let url = format!("{}/api/tags", self.base_url);

        let response = self.client.get(&url).send().await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(BackendError::Status { status, body });
        }

        let models_response: OllamaModelsResponse = response.json().await?;
        let model_names: Vec<String> = models_response
            .models
            .into_iter()
            .map(|model| model.name)
            .collect();

        Ok(model_names)
    }

    pub async fn has_model(&self, name: &str) -> Result<bool, BackendError> {
        let models = self.list_models().await?;
        Ok(models.iter().any(|m| m == name))
    }
}

#[async_trait]
impl PlanBackend for OllamaClient {
    async fn open_stream(&self, request: ChatRequest) -> Result<FragmentStream, BackendError> {
        self.chat_stream(request).await
    }
}

struct ChunkDecoder<S> {
    inner: S,
    buffer: Vec<u8>,
    pending: VecDeque<Result<String, BackendError>>,
    finished: bool,
}

impl<S> ChunkDecoder<S> {
    fn push(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            self.decode_line(&line);
            if self.finished {
                return;
            }
        }
    }

    fn flush(&mut self) {
        let line = std::mem::take(&mut self.buffer);
        self.decode_line(&line);
        self.finished = true;
    }

    fn decode_line(&mut self, line: &[u8]) {
        if line.iter().all(u8::is_ascii_whitespace) {
            return;
        }

        match serde_json::from_slice::<OllamaChatChunk>(line) {
            Ok(chunk) => {
                if let Some(message) = chunk.error {
                    self.fail(BackendError::Remote(message));
                    return;
                }
                if let Some(message) = chunk.message {
                    if !message.content.is_empty() {
                        self.pending.push_back(Ok(message.content));
                    }
                }
                if chunk.done {
                    debug!("chat stream reported done");
                    self.finished = true;
                }
            }
            Err(e) => self.fail(e.into()),
        }
    }

    fn fail(&mut self, error: BackendError) {
        self.pending.push_back(Err(error));
        self.buffer.clear();
        self.finished = true;
    }
}

/// Turn newline-delimited JSON chunks into text fragments, in arrival order.
/// The stream ends after the first error.
fn decode_chat_stream<S, B, E>(inner: S) -> impl Stream<Item = Result<String, BackendError>> + Send
where
    S: Stream<Item = Result<B, E>> + Unpin + Send,
    B: AsRef<[u8]> + Send,
    E: Into<BackendError> + Send,
{
    let decoder = ChunkDecoder {
        inner,
        buffer: Vec::new(),
        pending: VecDeque::new(),
        finished: false,
    };

    stream::unfold(decoder, |mut decoder| async move {
        loop {
            if let Some(item) = decoder.pending.pop_front() {
                if item.is_err() {
                    decoder.pending.clear();
                }
                return Some((item, decoder));
            }
            if decoder.finished {
                return None;
            }
            match decoder.inner.next().await {
                Some(Ok(chunk)) => decoder.push(chunk.as_ref()),
                Some(Err(e)) => decoder.fail(e.into()),
                None => decoder.flush(),
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunks(parts: &[&str]) -> impl Stream<Item = Result<Vec<u8>, BackendError>> + Unpin + Send {
        let owned: Vec<Result<Vec<u8>, BackendError>> =
            parts.iter().map(|p| Ok(p.as_bytes().to_vec())).collect();
        stream::iter(owned)
    }

    async fn collect(stream: impl Stream<Item = Result<String, BackendError>>) -> Vec<Result<String, BackendError>> {
        stream.collect().await
    }

    #[tokio::test]
    async fn test_decodes_fragments_in_order() {
        let input = chunks(&[
            "{\"message\":{\"role\":\"assistant\",\"content\":\"### Diet\"},\"done\":false}\n",
            "{\"message\":{\"role\":\"assistant\",\"content\":\" Plan\"},\"done\":false}\n",
            "{\"message\":{\"role\":\"assistant\",\"content\":\"\"},\"done\":true}\n",
        ]);

        let fragments: Vec<String> = collect(decode_chat_stream(input))
            .await
            .into_iter()
            .map(Result::unwrap)
            .collect();
        assert_eq!(fragments, vec!["### Diet", " Plan"]);
    }

    #[tokio::test]
    async fn test_line_split_across_chunks() {
        let input = chunks(&[
            "{\"message\":{\"content\":\"he",
            "llo\"},\"done\":false}\n{\"message\":{\"content\":\" world\"}",
            ",\"done\":true}",
        ]);

        let fragments: Vec<String> = collect(decode_chat_stream(input))
            .await
            .into_iter()
            .map(Result::unwrap)
            .collect();
        assert_eq!(fragments, vec!["hello", " world"]);
    }

    #[tokio::test]
    async fn test_remote_error_ends_stream() {
        let input = chunks(&[
            "{\"message\":{\"content\":\"partial\"},\"done\":false}\n",
            "{\"error\":\"model 'nope' not found\"}\n",
            "{\"message\":{\"content\":\"ignored\"},\"done\":false}\n",
        ]);

        let items = collect(decode_chat_stream(input)).await;
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].as_deref().unwrap(), "partial");
        assert!(matches!(&items[1], Err(BackendError::Remote(msg)) if msg.contains("nope")));
    }

    #[tokio::test]
    async fn test_malformed_line_is_decode_error() {
        let input = chunks(&["not json\n"]);
        let items = collect(decode_chat_stream(input)).await;
        assert_eq!(items.len(), 1);
        assert!(matches!(items[0], Err(BackendError::Decode(_))));
    }

    #[tokio::test]
    async fn test_transport_error_is_forwarded() {
        let input = stream::iter(vec![
            Ok(b"{\"message\":{\"content\":\"a\"}}\n".to_vec()),
            Err(BackendError::EmptyResponse),
        ]);
        let items = collect(decode_chat_stream(input)).await;
        assert_eq!(items.len(), 2);
        assert!(items[1].is_err());
    }

    #[test]
    fn test_request_serializes_images() {
        let body = OllamaChatRequest {
            model: "gemma3:4b".to_string(),
            messages: vec![OllamaMessage {
                role: "user".to_string(),
                content: "hi".to_string(),
                images: vec!["aGk=".to_string()],
            }],
            stream: true,
        };

        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["stream"], true);
        assert_eq!(json["messages"][0]["images"][0], "aGk=");
    }

    #[test]
    fn test_new_trims_trailing_slash() {
        let client = OllamaClient::new("http://localhost:11434/");
        assert_eq!(client.base_url(), "http://localhost:11434");
    }
}
