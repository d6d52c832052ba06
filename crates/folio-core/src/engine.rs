//! The question-answering engine: the operations the CLI exposes.
//!
//! `Engine` owns one configured instance of each pipeline stage and threads a shared
//! provider handle through them. It adds no behaviour of its own beyond sequencing,
//! not-found checks, and the no-index shortcut for small documents.

use std::path::Path;

use folio_index::{
    Enricher, IndexError, IndexInfo, IndexOptions, IndexStore, IndexSummary, RetrievalStrategy,
    Retriever,
};
use folio_llm::{CompletionOptions, LlmError, LlmProvider};
use folio_memory::document::{DocumentError, Segmenter, extract_text};
use folio_memory::{
    ContextSnippet, Conversation, ConversationStore, ConversationSummary, MemoryError,
    build_prompt,
};

use crate::config::Config;
use crate::synthesis::{IterativeSynthesizer, SynthesisError};

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("failed to extract document text: {0}")]
    Document(#[from] DocumentError),

    #[error(transparent)]
    Index(#[from] IndexError),

    #[error(transparent)]
    Memory(#[from] MemoryError),

    #[error("answer synthesis failed: {0}")]
    Synthesis(#[from] SynthesisError),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("index not found: {0}")]
    IndexNotFound(String),

    #[error("conversation not found: {0}")]
    ConversationNotFound(String),
}

/// Outcome of an index build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexReport {
    pub index_id: String,
    pub segments: usize,
    pub enrichment_failures: usize,
}

/// An answer and where it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct Answer {
    pub text: String,
    /// `None` when the document was answered directly without an index.
    pub index_id: Option<String>,
    pub conversation_id: Option<String>,
    pub sources: Vec<String>,
    pub strategy: Option<RetrievalStrategy>,
}

pub struct Engine<P: LlmProvider + Clone> {
    config: Config,
    provider: P,
    answer_options: CompletionOptions,
    segmenter: Segmenter,
    enricher: Enricher<P>,
    indexes: IndexStore,
    retriever: Retriever<P>,
    synthesizer: IterativeSynthesizer<P>,
    conversations: ConversationStore<P>,
}

impl<P: LlmProvider + Clone> Engine<P> {
    #[must_use]
    pub fn new(config: Config, provider: P) -> Self {
        let data_dir = config.storage.data_dir.clone();
        let answer_options = config.completion_options();
        Self {
            segmenter: Segmenter::new(config.segmenter_config()),
            enricher: Enricher::new(provider.clone(), config.pacer()),
            indexes: IndexStore::new(&data_dir)
                .with_summary_max_chars(config.storage.summary_max_chars),
            retriever: Retriever::new(provider.clone(), config.retrieval_config()),
            synthesizer: IterativeSynthesizer::new(
                provider.clone(),
                config.pacer(),
                answer_options.clone(),
            ),
            conversations: ConversationStore::new(
                &data_dir,
                provider.clone(),
                config.conversation_config(),
            ),
            answer_options,
            provider,
            config,
        }
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Extract, segment, enrich, and persist `path` as an index.
    ///
    /// # Errors
    ///
    /// Fails if the document cannot be read or the index cannot be written. Enrichment
    /// failures for individual segments do not fail the build.
    pub async fn create_index(
        &self,
        path: &Path,
        mut options: IndexOptions,
    ) -> Result<IndexReport, EngineError> {
        let source = tokio::fs::canonicalize(path)
            .await
            .unwrap_or_else(|_| path.to_owned())
            .to_string_lossy()
            .into_owned();
        let document = extract_text(path).await?;

        if !document.is_byte_addressable() && !options.persist_content {
            tracing::info!(source, "extracted text is not byte-addressable, keeping content");
            options.persist_content = true;
        }
        options.source = Some(source.clone());

        let mut segments = self.segmenter.segment(&document.content, &source);
        tracing::info!(
            source,
            bytes = document.content.len(),
            segments = segments.len(),
            "indexing document"
        );

        let report = self.enricher.enrich(&mut segments).await;
        let segment_count = segments.len();
        let index_id = self.indexes.create_index(segments, &options).await?;

        Ok(IndexReport {
            index_id,
            segments: segment_count,
            enrichment_failures: report.failed,
        })
    }

    /// Answer `question` against an index, recording the exchange in a conversation.
    ///
    /// A new conversation is started when `conversation_id` is `None`.
    ///
    /// # Errors
    ///
    /// Fails if the index or named conversation does not exist, or if answer synthesis
    /// fails.
    pub async fn answer_question(
        &self,
        index_id: &str,
        question: &str,
        conversation_id: Option<&str>,
    ) -> Result<Answer, EngineError> {
        let index = self
            .indexes
            .load_index(index_id)
            .await?
            .ok_or_else(|| EngineError::IndexNotFound(index_id.to_owned()))?;

        let existing = match conversation_id {
            Some(id) => {
                let conversation = self
                    .conversations
                    .get_conversation(id)
                    .await?
                    .ok_or_else(|| EngineError::ConversationNotFound(id.to_owned()))?;
                if conversation.index_id != index.id {
                    tracing::warn!(
                        conversation_id = id,
                        expected = %index.id,
                        actual = %conversation.index_id,
                        "conversation belongs to a different index"
                    );
                }
                Some(conversation)
            }
            None => None,
        };

        let retrieved = self.retriever.find_relevant_chunks(&index, question).await;
        let sources: Vec<String> = retrieved.ids().into_iter().map(str::to_owned).collect();

        let text = if retrieved.segments.is_empty() {
            tracing::info!(index_id = %index.id, "no relevant segments, answering from summary");
            let prompt = build_prompt(
                existing.as_ref(),
                &index.summary,
                &[],
                question,
                &self.config.prompt.template,
            );
            self.config.pacer().wait(prompt.len()).await;
            self.provider.complete(&prompt, &self.answer_options).await?
        } else {
            let history = existing
                .as_ref()
                .map(Conversation::history_text)
                .unwrap_or_default();
            let segments: Vec<_> = retrieved.segments.into_iter().map(|s| s.segment).collect();
            self.synthesizer
                .generate_answer(question, &segments, &history)
                .await?
        };

        // New conversations are only persisted once there is an exchange to record.
        let conversation_id = match existing {
            Some(conversation) => conversation.id,
            None => self.conversations.create_conversation(&index.id).await?.id,
        };
        self.conversations
            .add_exchange(&conversation_id, question, &text)
            .await?;

        Ok(Answer {
            text,
            index_id: Some(index.id),
            conversation_id: Some(conversation_id),
            sources,
            strategy: Some(retrieved.strategy),
        })
    }

    /// Answer a question about a file, indexing it first only when it is too large to
    /// fit in one prompt.
    ///
    /// # Errors
    ///
    /// Fails if the document cannot be read or answering fails.
    pub async fn ask_document(&self, path: &Path, question: &str) -> Result<Answer, EngineError> {
        let document = extract_text(path).await?;
        let threshold = self.config.no_index_threshold_chars();

        if document.content.len() <= threshold {
            tracing::info!(
                bytes = document.content.len(),
                threshold,
                "document fits in one prompt, answering directly"
            );
            let source = path.to_string_lossy();
            let snippet = ContextSnippet {
                path: &source,
                content: &document.content,
            };
            let prompt = build_prompt(
                None,
                "",
                &[snippet],
                question,
                &self.config.prompt.template,
            );
            self.config.pacer().wait(prompt.len()).await;
            let text = self.provider.complete(&prompt, &self.answer_options).await?;
            return Ok(Answer {
                text,
                index_id: None,
                conversation_id: None,
                sources: vec![source.into_owned()],
                strategy: None,
            });
        }

        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .filter(|s| !s.is_empty());
        let options = IndexOptions {
            name,
            persist_content: self.config.storage.persist_content,
            ..IndexOptions::default()
        };
        let report = self.create_index(path, options).await?;
        self.answer_question(&report.index_id, question, None).await
    }

    /// # Errors
    ///
    /// Fails if the index directory cannot be read.
    pub async fn list_indexes(&self) -> Result<Vec<IndexSummary>, EngineError> {
        Ok(self.indexes.list_indexes().await?)
    }

    /// # Errors
    ///
    /// Fails if the index exists but cannot be read.
    pub async fn get_index_info(&self, id: &str) -> Result<Option<IndexInfo>, EngineError> {
        Ok(self.indexes.get_index_info(id).await?)
    }

    /// # Errors
    ///
    /// Fails if the index exists but cannot be removed.
    pub async fn delete_index(&self, id: &str) -> Result<bool, EngineError> {
        Ok(self.indexes.delete_index(id).await?)
    }

    /// # Errors
    ///
    /// Fails if the conversation directory cannot be read.
    pub async fn list_conversations(
        &self,
        index_id: Option<&str>,
    ) -> Result<Vec<ConversationSummary>, EngineError> {
        Ok(self.conversations.list_conversations(index_id).await?)
    }

    /// # Errors
    ///
    /// Fails if the conversation exists but cannot be read.
    pub async fn get_conversation_info(
        &self,
        id: &str,
    ) -> Result<Option<Conversation>, EngineError> {
        Ok(self.conversations.get_conversation(id).await?)
    }

    /// # Errors
    ///
    /// Fails if the conversation exists but cannot be removed.
    pub async fn delete_conversation(&self, id: &str) -> Result<bool, EngineError> {
        Ok(self.conversations.delete_conversation(id).await?)
    }
}
