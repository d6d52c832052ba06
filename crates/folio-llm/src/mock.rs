//! Test-only mock LLM provider.

use std::fmt;
use std::sync::{Arc, Mutex};

use crate::provider::{CompletionOptions, LlmProvider};

type Responder = Arc<dyn Fn(&str) -> String + Send + Sync>;

#[derive(Clone)]
pub struct MockProvider {
    responses: Arc<Mutex<Vec<String>>>,
    prompts: Arc<Mutex<Vec<String>>>,
    responder: Option<Responder>,
    pub default_response: String,
    pub fail_chat: bool,
    /// Zero-based call index that fails; earlier and later calls succeed.
    pub fail_at: Option<usize>,
}

impl fmt::Debug for MockProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MockProvider")
            .field("default_response", &self.default_response)
            .field("fail_chat", &self.fail_chat)
            .field("fail_at", &self.fail_at)
            .field("responder", &self.responder.is_some())
            .finish_non_exhaustive()
    }
}

impl Default for MockProvider {
    fn default() -> Self {
        Self {
            responses: Arc::new(Mutex::new(Vec::new())),
            prompts: Arc::new(Mutex::new(Vec::new())),
            responder: None,
            default_response: "mock response".into(),
            fail_chat: false,
            fail_at: None,
        }
    }
}

impl MockProvider {
    #[must_use]
    pub fn with_responses(responses: Vec<String>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(responses)),
            ..Self::default()
        }
    }

    /// Answer every prompt by calling `f` on it.
    #[must_use]
    pub fn with_responder(f: impl Fn(&str) -> String + Send + Sync + 'static) -> Self {
        Self {
            responder: Some(Arc::new(f)),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn failing() -> Self {
        Self {
            fail_chat: true,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn failing_at(mut self, call: usize) -> Self {
        self.fail_at = Some(call);
        self
    }

    /// Every prompt received so far, in call order.
    #[must_use]
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    #[must_use]
    pub fn call_count(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }
}

impl LlmProvider for MockProvider {
    async fn complete(
        &self,
        prompt: &str,
        _options: &CompletionOptions,
    ) -> Result<String, crate::LlmError> {
        let call = {
            let mut prompts = self.prompts.lock().unwrap();
            prompts.push(prompt.to_owned());
            prompts.len() - 1
        };
        if self.fail_chat || self.fail_at == Some(call) {
            return Err(crate::LlmError::Other("mock LLM error".into()));
        }
        if let Some(responder) = &self.responder {
            return Ok(responder(prompt));
        }
        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            Ok(self.default_response.clone())
        } else {
            Ok(responses.remove(0))
        }
    }

    #[allow(clippy::unnecessary_literal_bound)]
    fn name(&self) -> &str {
        "mock"
    }
}
