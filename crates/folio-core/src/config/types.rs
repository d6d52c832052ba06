use std::fmt;
use std::path::PathBuf;

use folio_memory::DEFAULT_PROMPT_TEMPLATE;
use serde::{Deserialize, Serialize};

#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub llm: LlmConfig,
    pub chunking: ChunkingConfig,
    pub retrieval: RetrievalSection,
    pub conversation: ConversationSection,
    pub storage: StorageConfig,
    pub prompt: PromptConfig,
    #[serde(skip)]
    pub secrets: ResolvedSecrets,
}

/// LLM provider backend selector.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    #[default]
    Ollama,
    Claude,
    OpenAi,
}

impl ProviderKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ollama => "ollama",
            Self::Claude => "claude",
            Self::OpenAi => "openai",
        }
    }

    #[must_use]
    pub fn default_base_url(self) -> &'static str {
        match self {
            Self::Ollama => "http://localhost:11434",
            Self::Claude => folio_llm::claude::DEFAULT_BASE_URL,
            Self::OpenAi => "https://api.openai.com/v1",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct LlmConfig {
    pub provider: ProviderKind,
    /// Endpoint override; each provider has its own default.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    pub model: String,
    /// Size of the model's input window in tokens.
    pub context_tokens: usize,
    pub max_output_tokens: u32,
    pub temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
    pub tokens_per_minute: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: ProviderKind::Ollama,
            base_url: None,
            model: "mistral:7b".into(),
            context_tokens: 100_000,
            max_output_tokens: 4096,
            temperature: 0.3,
            system_prompt: None,
            tokens_per_minute: 40_000,
        }
    }
}

impl LlmConfig {
    #[must_use]
    pub fn effective_base_url(&self) -> &str {
        self.base_url
            .as_deref()
            .unwrap_or_else(|| self.provider.default_base_url())
    }
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct ChunkingConfig {
    pub chunk_size_percentage: u8,
    pub overlap_percentage: u8,
    pub chars_per_token: usize,
    pub preserve_paragraphs: bool,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size_percentage: 40,
            overlap_percentage: 10,
            chars_per_token: 4,
            preserve_paragraphs: false,
        }
    }
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct RetrievalSection {
    pub max_chunks_per_query: usize,
    pub grouped: bool,
    pub group_size: usize,
    /// Documents at most this share of the model window are answered without an index.
    pub no_index_threshold_percentage: u8,
    pub stop_words: Vec<String>,
}

impl Default for RetrievalSection {
    fn default() -> Self {
        Self {
            max_chunks_per_query: 5,
            grouped: true,
            group_size: 50,
            no_index_threshold_percentage: 50,
            stop_words: folio_index::keywords::DEFAULT_STOP_WORDS
                .iter()
                .map(|w| (*w).to_owned())
                .collect(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct ConversationSection {
    pub max_recent_exchanges: usize,
    pub merge_frequency: u64,
    pub summary_tokens: u32,
}

impl Default for ConversationSection {
    fn default() -> Self {
        Self {
            max_recent_exchanges: 5,
            merge_frequency: 3,
            summary_tokens: 1000,
        }
    }
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct StorageConfig {
    pub data_dir: PathBuf,
    pub persist_content: bool,
    pub summary_max_chars: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            persist_content: true,
            summary_max_chars: folio_index::store::DEFAULT_SUMMARY_MAX_CHARS,
        }
    }
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct PromptConfig {
    pub template: String,
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            template: DEFAULT_PROMPT_TEMPLATE.to_owned(),
        }
    }
}

/// Wrapper for sensitive strings with redacted Debug/Display.
#[derive(Clone)]
pub struct Secret(String);

impl Secret {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

impl fmt::Display for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

/// API keys read from the environment; never loaded from or written to TOML.
#[derive(Debug, Default, Clone)]
pub struct ResolvedSecrets {
    pub claude_api_key: Option<Secret>,
    pub openai_api_key: Option<Secret>,
}
