use serde::{Deserialize, Serialize};

/// Per-request sampling options passed alongside the prompt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionOptions {
    pub temperature: f32,
    pub max_tokens: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
}

impl Default for CompletionOptions {
    fn default() -> Self {
        Self {
            temperature: 0.3,
            max_tokens: 4096,
            system_prompt: None,
        }
    }
}

impl CompletionOptions {
    #[must_use]
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    #[must_use]
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    #[must_use]
    pub fn with_system_prompt(mut self, system_prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(system_prompt.into());
        self
    }
}

pub trait LlmProvider: Send + Sync {
    /// Submit a prompt and return the model's text response.
    ///
    /// # Errors
    ///
    /// Returns an error if the provider fails to communicate or the response is invalid.
    fn complete(
        &self,
        prompt: &str,
        options: &CompletionOptions,
    ) -> impl Future<Output = Result<String, crate::LlmError>> + Send;

    fn name(&self) -> &str;
}

impl<P: LlmProvider> LlmProvider for std::sync::Arc<P> {
    async fn complete(
        &self,
        prompt: &str,
        options: &CompletionOptions,
    ) -> Result<String, crate::LlmError> {
        (**self).complete(prompt, options).await
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}
