#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON parse failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("rate limited")]
    RateLimited,

    #[error("empty response from {provider}")]
    EmptyResponse { provider: &'static str },

    #[error("{provider} API request failed (status {status})")]
    Api {
        provider: &'static str,
        status: u16,
    },

    #[error("missing API key for {0}")]
    MissingApiKey(&'static str),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, LlmError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_error_display_includes_status() {
        let err = LlmError::Api {
            provider: "claude",
            status: 500,
        };
        assert_eq!(err.to_string(), "claude API request failed (status 500)");
    }

    #[test]
    fn empty_response_display() {
        let err = LlmError::EmptyResponse { provider: "openai" };
        assert_eq!(err.to_string(), "empty response from openai");
    }
}
