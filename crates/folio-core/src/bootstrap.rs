//! Provider construction from configuration.

use anyhow::Context;
use folio_llm::any::AnyProvider;
use folio_llm::claude::ClaudeProvider;
use folio_llm::ollama::OllamaProvider;
use folio_llm::openai::OpenAiProvider;

use crate::config::{Config, ProviderKind};

/// Build the configured language-model backend.
///
/// # Errors
///
/// Returns an error if a hosted provider is selected without its API key, or the
/// Ollama base URL cannot be parsed.
pub fn create_provider(config: &Config) -> anyhow::Result<AnyProvider> {
    let llm = &config.llm;
    let provider = match llm.provider {
        ProviderKind::Ollama => AnyProvider::Ollama(
            OllamaProvider::new(llm.effective_base_url(), llm.model.clone())
                .context("llm.base_url is not usable for ollama")?,
        ),
        ProviderKind::Claude => {
            let key = config
                .secrets
                .claude_api_key
                .as_ref()
                .context("FOLIO_CLAUDE_API_KEY not found in environment")?;
            AnyProvider::Claude(
                ClaudeProvider::new(key.expose().to_owned(), llm.model.clone())
                    .with_base_url(llm.effective_base_url().to_owned()),
            )
        }
        ProviderKind::OpenAi => {
            let key = config
                .secrets
                .openai_api_key
                .as_ref()
                .context("FOLIO_OPENAI_API_KEY not found in environment")?;
            AnyProvider::OpenAi(OpenAiProvider::new(
                key.expose().to_owned(),
                llm.effective_base_url().to_owned(),
                llm.model.clone(),
            ))
        }
    };
    tracing::debug!(provider = llm.provider.as_str(), model = %llm.model, "provider created");
    Ok(provider)
}

#[cfg(test)]
mod tests {
    use folio_llm::LlmProvider;

    use super::*;
    use crate::config::Secret;

    #[test]
    fn create_provider_ollama() {
        let config = Config::default();
        let provider = create_provider(&config).unwrap();
        assert!(matches!(provider, AnyProvider::Ollama(_)));
        assert_eq!(provider.name(), "ollama");
    }

    #[test]
    fn create_provider_claude_without_api_key_errors() {
        let mut config = Config::default();
        config.llm.provider = ProviderKind::Claude;
        let err = create_provider(&config).unwrap_err();
        assert!(err.to_string().contains("FOLIO_CLAUDE_API_KEY"));
    }

    #[test]
    fn create_provider_claude_with_key() {
        let mut config = Config::default();
        config.llm.provider = ProviderKind::Claude;
        config.secrets.claude_api_key = Some(Secret::new("sk-ant-test"));
        let provider = create_provider(&config).unwrap();
        assert!(matches!(provider, AnyProvider::Claude(_)));
    }

    #[test]
    fn create_provider_openai_without_api_key_errors() {
        let mut config = Config::default();
        config.llm.provider = ProviderKind::OpenAi;
        assert!(create_provider(&config).is_err());
    }

    #[test]
    fn create_provider_ollama_bad_url_errors() {
        let mut config = Config::default();
        config.llm.base_url = Some("localhost".into());
        assert!(create_provider(&config).is_err());
    }

    #[test]
    fn create_provider_openai_with_custom_base_url() {
        let mut config = Config::default();
        config.llm.provider = ProviderKind::OpenAi;
        config.llm.base_url = Some("http://localhost:8000/v1".into());
        config.secrets.openai_api_key = Some(Secret::new("sk-test"));
        let provider = create_provider(&config).unwrap();
        assert_eq!(provider.name(), "openai");
    }
}
