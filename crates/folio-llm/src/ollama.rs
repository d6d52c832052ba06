use ollama_rs::Ollama;
use ollama_rs::generation::chat::ChatMessage;
use ollama_rs::generation::chat::request::ChatMessageRequest;
use ollama_rs::models::ModelOptions;

use crate::error::LlmError;
use crate::provider::{CompletionOptions, LlmProvider};

const DEFAULT_PORT: u16 = 11434;

/// Local models served by an Ollama daemon.
#[derive(Debug, Clone)]
pub struct OllamaProvider {
    client: Ollama,
    model: String,
}

impl OllamaProvider {
    /// # Errors
    ///
    /// Returns `LlmError::Other` when `base_url` is not an absolute http(s) URL.
    pub fn new(base_url: &str, model: String) -> Result<Self, LlmError> {
        let (host, port) = split_endpoint(base_url)?;
        Ok(Self {
            client: Ollama::new(host, port),
            model,
        })
    }

    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }
}

impl LlmProvider for OllamaProvider {
    async fn complete(
        &self,
        prompt: &str,
        options: &CompletionOptions,
    ) -> Result<String, LlmError> {
        let system = options.system_prompt.iter().map(|s| ChatMessage::system(s.clone()));
        let messages: Vec<ChatMessage> = system
            .chain(std::iter::once(ChatMessage::user(prompt.to_owned())))
            .collect();

        let num_predict = i32::try_from(options.max_tokens).unwrap_or(i32::MAX);
        let request = ChatMessageRequest::new(self.model.clone(), messages).options(
            ModelOptions::default()
                .temperature(options.temperature)
                .num_predict(num_predict),
        );

        let reply = self
            .client
            .send_chat_messages(request)
            .await
            .map_err(|e| LlmError::Other(format!("ollama request to {} failed: {e}", self.model)))?
            .message
            .content;

        if reply.trim().is_empty() {
            return Err(LlmError::EmptyResponse { provider: "ollama" });
        }
        Ok(reply)
    }

    #[allow(clippy::unnecessary_literal_bound)]
    fn name(&self) -> &str {
        "ollama"
    }
}

/// `ollama-rs` wants the scheme+host and the port separately.
fn split_endpoint(base_url: &str) -> Result<(String, u16), LlmError> {
    let url = reqwest::Url::parse(base_url)
        .map_err(|e| LlmError::Other(format!("invalid ollama url {base_url:?}: {e}")))?;
    let host = url
        .host_str()
        .filter(|_| matches!(url.scheme(), "http" | "https"))
        .ok_or_else(|| LlmError::Other(format!("invalid ollama url {base_url:?}")))?;
    let port = url.port().unwrap_or(DEFAULT_PORT);
    Ok((format!("{}://{host}", url.scheme()), port))
}
