mod env;
mod types;


pub use types::*;

use std::path::{Path, PathBuf};

use anyhow::{Context, bail};
use folio_index::RetrievalConfig;
use folio_llm::{CompletionOptions, Pacer};
use folio_memory::ConversationConfig;
use folio_memory::document::SegmenterConfig;

pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// Config file location: explicit flag, then `FOLIO_CONFIG`, then the default path.
#[must_use]
pub fn resolve_config_path(cli_arg: Option<&Path>) -> PathBuf {
    if let Some(path) = cli_arg {
        return path.to_owned();
    }
    if let Ok(path) = std::env::var("FOLIO_CONFIG") {
        return PathBuf::from(path);
    }
    PathBuf::from(DEFAULT_CONFIG_PATH)
}

impl Config {
    /// Load configuration from a TOML file with env var overrides.
    ///
    /// Falls back to defaults when the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed, or if the
    /// resulting values are out of range.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path).context("failed to read config file")?;
            toml::from_str::<Self>(&content).context("failed to parse config file")?
        } else {
            tracing::debug!(path = %path.display(), "config file not found, using defaults");
            Self::default()
        };

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// # Errors
    ///
    /// Returns an error naming the first out-of-range setting.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.llm.context_tokens == 0 {
            bail!("llm.context_tokens must be greater than 0");
        }
        if self.llm.tokens_per_minute == 0 {
            bail!("llm.tokens_per_minute must be greater than 0");
        }
        if !(0.0..=2.0).contains(&self.llm.temperature) {
            bail!("llm.temperature must be between 0.0 and 2.0");
        }
        if !(1..=100).contains(&self.chunking.chunk_size_percentage) {
            bail!("chunking.chunk_size_percentage must be between 1 and 100");
        }
        if self.chunking.overlap_percentage > 50 {
            bail!("chunking.overlap_percentage must be at most 50");
        }
        if self.chunking.chars_per_token == 0 {
            bail!("chunking.chars_per_token must be greater than 0");
        }
        if self.retrieval.max_chunks_per_query == 0 {
            bail!("retrieval.max_chunks_per_query must be greater than 0");
        }
        if self.retrieval.group_size == 0 {
            bail!("retrieval.group_size must be greater than 0");
        }
        if self.retrieval.no_index_threshold_percentage > 100 {
            bail!("retrieval.no_index_threshold_percentage must be at most 100");
        }
        if self.conversation.merge_frequency == 0 {
            bail!("conversation.merge_frequency must be greater than 0");
        }
        if !self.prompt.template.contains("{question}") {
            bail!("prompt.template must contain a {{question}} placeholder");
        }
        Ok(())
    }

    /// Characters per segment: `context_tokens * chunk% * chars_per_token`.
    #[must_use]
    pub fn max_segment_chars(&self) -> usize {
        self.segmenter_config().max_segment_chars
    }

    #[must_use]
    pub fn segmenter_config(&self) -> SegmenterConfig {
        let mut cfg = SegmenterConfig::from_budget(
            self.llm.context_tokens,
            self.chunking.chunk_size_percentage,
            self.chunking.overlap_percentage,
            self.chunking.chars_per_token,
        );
        cfg.preserve_paragraphs = self.chunking.preserve_paragraphs;
        cfg
    }

    /// Largest document, in bytes, answered in one call without building an index.
    #[must_use]
    pub fn no_index_threshold_chars(&self) -> usize {
        self.llm.context_tokens * self.chunking.chars_per_token
            * usize::from(self.retrieval.no_index_threshold_percentage)
            / 100
    }

    #[must_use]
    pub fn pacer(&self) -> Pacer {
        Pacer::new(
            self.llm.tokens_per_minute,
            u32::try_from(self.chunking.chars_per_token).unwrap_or(u32::MAX),
        )
    }

    #[must_use]
    pub fn retrieval_config(&self) -> RetrievalConfig {
        RetrievalConfig {
            max_chunks_per_query: self.retrieval.max_chunks_per_query,
            grouped: self.retrieval.grouped,
            group_size: self.retrieval.group_size,
            stop_words: self
                .retrieval
                .stop_words
                .iter()
                .map(|w| w.to_lowercase())
                .collect(),
        }
    }

    #[must_use]
    pub fn conversation_config(&self) -> ConversationConfig {
        ConversationConfig {
            max_recent_exchanges: self.conversation.max_recent_exchanges,
            merge_frequency: self.conversation.merge_frequency,
            summary_tokens: self.conversation.summary_tokens,
        }
    }

    /// Options for answer-producing calls.
    #[must_use]
    pub fn completion_options(&self) -> CompletionOptions {
        let options = CompletionOptions::default()
            .with_temperature(self.llm.temperature)
            .with_max_tokens(self.llm.max_output_tokens);
        match &self.llm.system_prompt {
            Some(prompt) => options.with_system_prompt(prompt.clone()),
            None => options,
        }
    }
}
