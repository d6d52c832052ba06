use std::str::FromStr;

use super::{Config, Secret};

/// Parse `key` from the environment; unset yields `None`, unparsable values warn.
fn env_value<T: FromStr>(key: &str) -> Option<T> {
    let raw = std::env::var(key).ok()?;
    match raw.trim().parse::<T>() {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::warn!("ignoring invalid {key} value: {raw}");
            None
        }
    }
}

impl Config {
    pub(crate) fn apply_env_overrides(&mut self) {
        self.apply_env_overrides_llm();
        self.apply_env_overrides_pipeline();
        self.apply_env_secrets();
    }

    fn apply_env_overrides_llm(&mut self) {
        if let Ok(v) = std::env::var("FOLIO_LLM_PROVIDER") {
            if let Ok(kind) = serde_json::from_value(serde_json::Value::String(v.to_lowercase())) {
                self.llm.provider = kind;
            } else {
                tracing::warn!("ignoring invalid FOLIO_LLM_PROVIDER value: {v}");
            }
        }
        if let Ok(v) = std::env::var("FOLIO_LLM_BASE_URL") {
            self.llm.base_url = Some(v);
        }
        if let Ok(v) = std::env::var("FOLIO_LLM_MODEL") {
            self.llm.model = v;
        }
        if let Some(tokens) = env_value("FOLIO_LLM_CONTEXT_TOKENS") {
            self.llm.context_tokens = tokens;
        }
        if let Some(tokens) = env_value("FOLIO_LLM_MAX_OUTPUT_TOKENS") {
            self.llm.max_output_tokens = tokens;
        }
        if let Some(t) = env_value("FOLIO_LLM_TEMPERATURE") {
            self.llm.temperature = t;
        }
        if let Some(tpm) = env_value("FOLIO_LLM_TOKENS_PER_MINUTE") {
            self.llm.tokens_per_minute = tpm;
        }
    }

    fn apply_env_overrides_pipeline(&mut self) {
        if let Some(pct) = env_value("FOLIO_CHUNK_SIZE_PERCENTAGE") {
            self.chunking.chunk_size_percentage = pct;
        }
        if let Some(pct) = env_value("FOLIO_OVERLAP_PERCENTAGE") {
            self.chunking.overlap_percentage = pct;
        }
        if let Some(enabled) = env_value("FOLIO_PRESERVE_PARAGRAPHS") {
            self.chunking.preserve_paragraphs = enabled;
        }
        if let Some(n) = env_value("FOLIO_MAX_CHUNKS_PER_QUERY") {
            self.retrieval.max_chunks_per_query = n;
        }
        if let Some(enabled) = env_value("FOLIO_RETRIEVAL_GROUPED") {
            self.retrieval.grouped = enabled;
        }
        if let Some(n) = env_value("FOLIO_RETRIEVAL_GROUP_SIZE") {
            self.retrieval.group_size = n;
        }
        if let Some(pct) = env_value("FOLIO_NO_INDEX_THRESHOLD_PERCENTAGE") {
            self.retrieval.no_index_threshold_percentage = pct;
        }
        if let Ok(v) = std::env::var("FOLIO_STOP_WORDS") {
            self.retrieval.stop_words = v
                .split(',')
                .map(|s| s.trim().to_lowercase())
                .filter(|s| !s.is_empty())
                .collect();
        }
        if let Some(n) = env_value("FOLIO_MAX_RECENT_EXCHANGES") {
            self.conversation.max_recent_exchanges = n;
        }
        if let Some(n) = env_value("FOLIO_MERGE_FREQUENCY") {
            self.conversation.merge_frequency = n;
        }
        if let Some(n) = env_value("FOLIO_SUMMARY_TOKENS") {
            self.conversation.summary_tokens = n;
        }
        if let Ok(v) = std::env::var("FOLIO_DATA_DIR") {
            self.storage.data_dir = v.into();
        }
        if let Some(enabled) = env_value("FOLIO_PERSIST_CONTENT") {
            self.storage.persist_content = enabled;
        }
    }

    fn apply_env_secrets(&mut self) {
        if let Ok(v) = std::env::var("FOLIO_CLAUDE_API_KEY")
            && !v.is_empty()
        {
            self.secrets.claude_api_key = Some(Secret::new(v));
        }
        if let Ok(v) = std::env::var("FOLIO_OPENAI_API_KEY")
            && !v.is_empty()
        {
            self.secrets.openai_api_key = Some(Secret::new(v));
        }
    }
}
