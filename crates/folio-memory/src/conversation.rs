//! Per-index conversation history with periodic compaction into a running summary.

use std::fmt::Write;
use std::path::Path;

use chrono::{DateTime, Utc};
use folio_llm::{CompletionOptions, LlmProvider};
use serde::{Deserialize, Serialize};

use crate::error::MemoryError;
use crate::store::JsonStore;

pub const NAMESPACE: &str = "conversations";

/// Upper bound on the exchange text folded into the summary by one compaction call.
/// A single exchange larger than this is still sent on its own.
pub const MAX_MERGE_BATCH_CHARS: usize = 48_000;

/// Compaction calls made per exchange; a larger backlog drains over later exchanges.
pub const MAX_MERGE_BATCHES: usize = 4;

pub const DEFAULT_PROMPT_TEMPLATE: &str = "You are answering questions about a document.\n\n\
    {context}\n\n\
    Question: {question}\n\n\
    Answer using only the information above. If it is insufficient, say what is missing.";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Exchange {
    pub timestamp: DateTime<Utc>,
    pub question: String,
    pub answer: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: String,
    pub index_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub recent_exchanges: Vec<Exchange>,
    #[serde(default)]
    pub history_summary: String,
    pub exchange_count: u64,
    pub last_merge_count: u64,
    /// Exchanges trimmed from `recent_exchanges` that have not reached the summary yet.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pending_merge: Vec<Exchange>,
}

impl Conversation {
    #[must_use]
    pub fn new(id: String, index_id: String) -> Self {
        let now = Utc::now();
        Self {
            id,
            index_id,
            created_at: now,
            updated_at: now,
            recent_exchanges: Vec::new(),
            history_summary: String::new(),
            exchange_count: 0,
            last_merge_count: 0,
            pending_merge: Vec::new(),
        }
    }

    /// Append an exchange and trim the recent window to `max_recent` entries.
    pub fn record(&mut self, exchange: Exchange, max_recent: usize) {
        self.updated_at = exchange.timestamp;
        self.recent_exchanges.push(exchange);
        self.exchange_count += 1;

        if self.recent_exchanges.len() > max_recent {
            let overflow = self.recent_exchanges.len() - max_recent;
            self.pending_merge
                .extend(self.recent_exchanges.drain(..overflow));
        }
    }

    #[must_use]
    pub fn merge_due(&self, merge_frequency: u64) -> bool {
        !self.pending_merge.is_empty()
            && self.exchange_count - self.last_merge_count >= merge_frequency.max(1)
    }

    /// Summary plus verbatim recent exchanges, for inclusion in answer prompts.
    #[must_use]
    pub fn history_text(&self) -> String {
        let mut out = String::new();
        if !self.history_summary.is_empty() {
            let _ = writeln!(out, "Summary of earlier conversation:\n{}\n", self.history_summary);
        }
        if !self.recent_exchanges.is_empty() {
            out.push_str("Recent exchanges:\n");
            for ex in &self.recent_exchanges {
                let _ = writeln!(out, "Q: {}\nA: {}\n", ex.question, ex.answer);
            }
        }
        out.trim_end().to_owned()
    }

    #[must_use]
    pub fn summary(&self) -> ConversationSummary {
        ConversationSummary {
            id: self.id.clone(),
            index_id: self.index_id.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
            exchange_count: self.exchange_count,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationSummary {
    pub id: String,
    pub index_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub exchange_count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationConfig {
    pub max_recent_exchanges: usize,
    pub merge_frequency: u64,
    /// Target length of the compacted history summary.
    pub summary_tokens: u32,
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            max_recent_exchanges: 5,
            merge_frequency: 3,
            summary_tokens: 1000,
        }
    }
}

impl Exchange {
    fn text_len(&self) -> usize {
        self.question.len() + self.answer.len()
    }
}

/// Number of leading exchanges that fit in one compaction batch (always at least one).
fn merge_batch_len(pending: &[Exchange], max_chars: usize) -> usize {
    let mut used = 0;
    let mut count = 0;
    for ex in pending {
        used += ex.text_len();
        if count > 0 && used > max_chars {
            break;
        }
        count += 1;
    }
    count
}

fn build_compaction_prompt(previous: &str, exchanges: &[Exchange], summary_tokens: u32) -> String {
    let mut prompt = format!(
        "Update the running summary of a question-and-answer session about a document. \
         Preserve facts, conclusions, and open questions needed to continue the session. \
         Keep the result under {summary_tokens} tokens.\n\n"
    );
    if previous.is_empty() {
        prompt.push_str("Existing summary: (none)\n\n");
    } else {
        let _ = write!(prompt, "Existing summary:\n{previous}\n\n");
    }
    prompt.push_str("Exchanges to merge:\n");
    for ex in exchanges {
        let _ = write!(prompt, "Q: {}\nA: {}\n\n", ex.question, ex.answer);
    }
    prompt.push_str("Updated summary:");
    prompt
}

pub struct ConversationStore<P: LlmProvider> {
    store: JsonStore,
    provider: P,
    config: ConversationConfig,
    options: CompletionOptions,
}

impl<P: LlmProvider> ConversationStore<P> {
    #[must_use]
    pub fn new(data_dir: impl AsRef<Path>, provider: P, config: ConversationConfig) -> Self {
        let options = CompletionOptions::default()
            .with_temperature(0.2)
            .with_max_tokens(config.summary_tokens.saturating_mul(2));
        Self {
            store: JsonStore::new(data_dir, NAMESPACE),
            provider,
            config,
            options,
        }
    }

    #[must_use]
    pub fn config(&self) -> &ConversationConfig {
        &self.config
    }

    /// # Errors
    ///
    /// Returns an error if the conversation cannot be persisted.
    pub async fn create_conversation(&self, index_id: &str) -> Result<Conversation, MemoryError> {
        let conversation = Conversation::new(uuid::Uuid::new_v4().to_string(), index_id.to_owned());
        self.store.save(&conversation.id, &conversation).await?;
        tracing::info!(conversation_id = %conversation.id, index_id, "created conversation");
        Ok(conversation)
    }

    /// # Errors
    ///
    /// Returns an error if the stored conversation cannot be read.
    pub async fn get_conversation(&self, id: &str) -> Result<Option<Conversation>, MemoryError> {
        self.store.load(id).await
    }

    /// Append an exchange, compacting older history when due. `Ok(None)` if `id` is unknown.
    ///
    /// A failed compaction is logged and retried at the next opportunity; it never fails
    /// the exchange itself.
    ///
    /// # Errors
    ///
    /// Returns an error if the conversation cannot be read or written.
    pub async fn add_exchange(
        &self,
        id: &str,
        question: &str,
        answer: &str,
    ) -> Result<Option<Conversation>, MemoryError> {
        let Some(mut conversation) = self.store.load::<Conversation>(id).await? else {
            return Ok(None);
        };

        conversation.record(
            Exchange {
                timestamp: Utc::now(),
                question: question.to_owned(),
                answer: answer.to_owned(),
            },
            self.config.max_recent_exchanges,
        );

        if conversation.merge_due(self.config.merge_frequency) {
            self.compact(&mut conversation).await;
        }

        self.store.save(&conversation.id, &conversation).await?;
        Ok(Some(conversation))
    }

    /// Fold pending exchanges into the summary in bounded batches, oldest first.
    /// A failed batch stops the pass; what is left stays pending.
    async fn compact(&self, conversation: &mut Conversation) {
        for _ in 0..MAX_MERGE_BATCHES {
            let batch = merge_batch_len(&conversation.pending_merge, MAX_MERGE_BATCH_CHARS);
            if batch == 0 {
                break;
            }
            let prompt = build_compaction_prompt(
                &conversation.history_summary,
                &conversation.pending_merge[..batch],
                self.config.summary_tokens,
            );
            match self.provider.complete(&prompt, &self.options).await {
                Ok(summary) => {
                    conversation.history_summary = summary.trim().to_owned();
                    conversation.pending_merge.drain(..batch);
                    tracing::info!(
                        conversation_id = %conversation.id,
                        merged = batch,
                        pending = conversation.pending_merge.len(),
                        "compacted conversation history"
                    );
                }
                Err(e) => {
                    tracing::warn!(
                        conversation_id = %conversation.id,
                        pending = conversation.pending_merge.len(),
                        "history compaction failed, will retry: {e:#}"
                    );
                    return;
                }
            }
        }
        if conversation.pending_merge.is_empty() {
            conversation.last_merge_count = conversation.exchange_count;
        }
    }

    /// Summaries of stored conversations, most recently updated first.
    ///
    /// # Errors
    ///
    /// Returns an error if the conversation directory cannot be listed.
    pub async fn list_conversations(
        &self,
        index_id: Option<&str>,
    ) -> Result<Vec<ConversationSummary>, MemoryError> {
        let mut summaries: Vec<ConversationSummary> = self
            .store
            .load_all::<Conversation>()
            .await?
            .iter()
            .filter(|c| index_id.is_none_or(|wanted| c.index_id == wanted))
            .map(Conversation::summary)
            .collect();
        summaries.sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then(a.id.cmp(&b.id)));
        Ok(summaries)
    }

    /// # Errors
    ///
    /// Returns an error if an existing conversation file cannot be removed.
    pub async fn delete_conversation(&self, id: &str) -> Result<bool, MemoryError> {
        let deleted = self.store.delete(id).await?;
        if deleted {
            tracing::info!(conversation_id = id, "deleted conversation");
        }
        Ok(deleted)
    }
}

/// A piece of source text to quote in a single-shot prompt.
#[derive(Debug, Clone, Copy)]
pub struct ContextSnippet<'a> {
    pub path: &'a str,
    pub content: &'a str,
}

/// Assemble a single-shot answering prompt from history, document summary and snippets.
///
/// `template` must contain `{context}` and `{question}` placeholders. This path is
/// independent of iterative synthesis, which builds its own per-segment prompts.
#[must_use]
pub fn build_prompt(
    conversation: Option<&Conversation>,
    document_summary: &str,
    snippets: &[ContextSnippet<'_>],
    question: &str,
    template: &str,
) -> String {
    let mut context = String::new();

    if let Some(conversation) = conversation {
        if !conversation.history_summary.is_empty() {
            let _ = write!(
                context,
                "Conversation summary:\n{}\n\n",
                conversation.history_summary
            );
        }
        if !conversation.recent_exchanges.is_empty() {
            context.push_str("Recent exchanges:\n");
            for ex in &conversation.recent_exchanges {
                let _ = write!(context, "Q: {}\nA: {}\n\n", ex.question, ex.answer);
            }
        }
    }

    if !document_summary.is_empty() {
        let _ = write!(context, "Document summary:\n{document_summary}\n\n");
    }

    for snippet in snippets {
        let _ = write!(
            context,
            "Excerpt from {}:\n{}\n\n",
            snippet.path, snippet.content
        );
    }

    fill_template(template, context.trim_end(), question)
}

/// Substitute both placeholders in one pass, so placeholder-like text inside the
/// inserted values is left alone.
fn fill_template(template: &str, context: &str, question: &str) -> String {
    const CONTEXT: &str = "{context}";
    const QUESTION: &str = "{question}";

    let mut out = String::with_capacity(template.len() + context.len() + question.len());
    let mut rest = template;
    loop {
        let next_context = rest.find(CONTEXT);
        let next_question = rest.find(QUESTION);
        let (pos, placeholder, value) = match (next_context, next_question) {
            (Some(c), Some(q)) if q < c => (q, QUESTION, question),
            (Some(c), _) => (c, CONTEXT, context),
            (None, Some(q)) => (q, QUESTION, question),
            (None, None) => break,
        };
        out.push_str(&rest[..pos]);
        out.push_str(value);
        rest = &rest[pos + placeholder.len()..];
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use folio_llm::mock::MockProvider;

    use super::*;

    fn store_with(
        dir: &Path,
        provider: MockProvider,
        max_recent: usize,
        freq: u64,
    ) -> ConversationStore<MockProvider> {
        ConversationStore::new(
            dir,
            provider,
            ConversationConfig {
                max_recent_exchanges: max_recent,
                merge_frequency: freq,
                summary_tokens: 200,
            },
        )
    }

    fn exchange(n: usize) -> Exchange {
        Exchange {
            timestamp: Utc::now(),
            question: format!("q{n}"),
            answer: format!("a{n}"),
        }
    }

    #[test]
    fn record_trims_recent_window() {
        let mut conv = Conversation::new("c".into(), "i".into());
        for n in 0..4 {
            conv.record(exchange(n), 2);
        }
        assert_eq!(conv.recent_exchanges.len(), 2);
        assert_eq!(conv.recent_exchanges[0].question, "q2");
        assert_eq!(conv.pending_merge.len(), 2);
        assert_eq!(conv.exchange_count, 4);
    }

    #[test]
    fn merge_due_respects_frequency() {
        let mut conv = Conversation::new("c".into(), "i".into());
        conv.record(exchange(0), 0);
        assert!(!conv.merge_due(2));
        conv.record(exchange(1), 0);
        assert!(conv.merge_due(2));
    }

    #[test]
    fn merge_due_requires_pending() {
        let mut conv = Conversation::new("c".into(), "i".into());
        conv.record(exchange(0), 5);
        assert!(!conv.merge_due(1));
    }

    #[tokio::test]
    async fn create_and_get_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_with(dir.path(), MockProvider::default(), 5, 3);
        let conv = store.create_conversation("idx").await.unwrap();

        let loaded = store.get_conversation(&conv.id).await.unwrap().unwrap();
        assert_eq!(loaded.index_id, "idx");
        assert!(loaded.recent_exchanges.is_empty());
        assert_eq!(loaded.exchange_count, 0);
    }

    #[tokio::test]
    async fn add_exchange_to_unknown_conversation_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_with(dir.path(), MockProvider::default(), 5, 3);
        assert!(store.add_exchange("missing", "q", "a").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn compaction_folds_overflow_into_summary() {
        let dir = tempfile::tempdir().unwrap();
        let provider = MockProvider::with_responses(vec!["  merged summary  ".into()]);
        let store = store_with(dir.path(), provider.clone(), 2, 3);
        let conv = store.create_conversation("idx").await.unwrap();

        let mut last = None;
        for n in 0..3 {
            last = store
                .add_exchange(&conv.id, &format!("q{n}"), &format!("a{n}"))
                .await
                .unwrap();
        }
        let last = last.unwrap();
        assert_eq!(last.history_summary, "merged summary");
        assert_eq!(last.last_merge_count, 3);
        assert!(last.pending_merge.is_empty());
        assert_eq!(last.recent_exchanges.len(), 2);
        assert_eq!(provider.call_count(), 1);
        assert!(provider.prompts()[0].contains("Q: q0\nA: a0"));
    }

    #[tokio::test]
    async fn failed_compaction_keeps_summary_and_pending() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_with(dir.path(), MockProvider::failing(), 1, 1);
        let conv = store.create_conversation("idx").await.unwrap();

        store.add_exchange(&conv.id, "q0", "a0").await.unwrap();
        let after = store
            .add_exchange(&conv.id, "q1", "a1")
            .await
            .unwrap()
            .unwrap();

        assert!(after.history_summary.is_empty());
        assert_eq!(after.last_merge_count, 0);
        assert_eq!(after.pending_merge.len(), 1);
        assert_eq!(after.recent_exchanges.len(), 1);
    }

    #[tokio::test]
    async fn recent_window_bounded_after_every_exchange() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_with(dir.path(), MockProvider::default(), 3, 4);
        let conv = store.create_conversation("idx").await.unwrap();

        for n in 0..12 {
            let updated = store
                .add_exchange(&conv.id, &format!("q{n}"), "a")
                .await
                .unwrap()
                .unwrap();
            assert!(updated.recent_exchanges.len() <= 3);
            assert!(updated.last_merge_count <= updated.exchange_count);
        }
    }

    #[tokio::test]
    async fn list_filters_by_index_and_delete_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_with(dir.path(), MockProvider::default(), 5, 3);
        let a = store.create_conversation("alpha").await.unwrap();
        store.create_conversation("beta").await.unwrap();

        assert_eq!(store.list_conversations(None).await.unwrap().len(), 2);
        let alpha = store.list_conversations(Some("alpha")).await.unwrap();
        assert_eq!(alpha.len(), 1);
        assert_eq!(alpha[0].id, a.id);

        assert!(store.delete_conversation(&a.id).await.unwrap());
        assert!(!store.delete_conversation(&a.id).await.unwrap());
    }

    #[test]
    fn history_text_includes_summary_and_exchanges() {
        let mut conv = Conversation::new("c".into(), "i".into());
        conv.history_summary = "earlier talk".into();
        conv.record(exchange(1), 5);
        let text = conv.history_text();
        assert!(text.starts_with("Summary of earlier conversation:\nearlier talk"));
        assert!(text.contains("Q: q1\nA: a1"));
    }

    #[test]
    fn history_text_empty_for_new_conversation() {
        let conv = Conversation::new("c".into(), "i".into());
        assert!(conv.history_text().is_empty());
    }

    #[test]
    fn build_prompt_substitutes_template() {
        let mut conv = Conversation::new("c".into(), "i".into());
        conv.history_summary = "prior".into();
        conv.record(exchange(7), 5);
        let snippets = [ContextSnippet {
            path: "/docs/a.txt",
            content: "segment text",
        }];

        let prompt = build_prompt(
            Some(&conv),
            "doc summary",
            &snippets,
            "What now?",
            "CTX[{context}] Q[{question}]",
        );
        assert!(prompt.starts_with("CTX[Conversation summary:\nprior"));
        assert!(prompt.contains("Q: q7\nA: a7"));
        assert!(prompt.contains("Document summary:\ndoc summary"));
        assert!(prompt.contains("Excerpt from /docs/a.txt:\nsegment text]"));
        assert!(prompt.ends_with("Q[What now?]"));
    }

    #[test]
    fn placeholders_inside_inserted_text_are_left_alone() {
        let snippets = [ContextSnippet {
            path: "/docs/t.txt",
            content: "Template uses {question} here",
        }];
        let prompt = build_prompt(
            None,
            "mentions {context} too",
            &snippets,
            "SECRET Q",
            "{context}\n--\n{question}",
        );
        assert!(prompt.contains("Template uses {question} here"));
        assert!(prompt.contains("mentions {context} too"));
        assert!(prompt.ends_with("--\nSECRET Q"));
        assert_eq!(prompt.matches("SECRET Q").count(), 1);
    }

    #[test]
    fn fill_template_handles_repeats_and_missing() {
        assert_eq!(fill_template("{question}/{context}/{question}", "C", "Q"), "Q/C/Q");
        assert_eq!(fill_template("no placeholders", "C", "Q"), "no placeholders");
        assert_eq!(fill_template("{questio} {context", "C", "Q"), "{questio} {context");
    }

    fn big_exchange(n: usize) -> Exchange {
        Exchange {
            timestamp: Utc::now(),
            question: format!("q{n}"),
            answer: "x".repeat(20_000),
        }
    }

    #[test]
    fn merge_batches_respect_char_limit() {
        let pending: Vec<Exchange> = (0..5).map(big_exchange).collect();
        assert_eq!(merge_batch_len(&pending, MAX_MERGE_BATCH_CHARS), 2);
        assert_eq!(merge_batch_len(&pending[..1], 10), 1);
        assert_eq!(merge_batch_len(&[], MAX_MERGE_BATCH_CHARS), 0);
    }

    #[tokio::test]
    async fn large_backlog_drains_in_bounded_batches() {
        let dir = tempfile::tempdir().unwrap();
        let provider = MockProvider::default();
        let store = store_with(dir.path(), provider.clone(), 1, 1);

        let mut conv = Conversation::new("backlog".into(), "idx".into());
        conv.pending_merge = (0..10).map(big_exchange).collect();
        conv.exchange_count = 10;
        store.store.save(&conv.id, &conv).await.unwrap();

        let first = store
            .add_exchange(&conv.id, "q10", "a10")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(provider.call_count(), MAX_MERGE_BATCHES);
        assert_eq!(first.pending_merge.len(), 2);
        assert_eq!(first.last_merge_count, 0);
        assert!(
            provider
                .prompts()
                .iter()
                .all(|p| p.len() < MAX_MERGE_BATCH_CHARS + 1_000)
        );

        let second = store
            .add_exchange(&conv.id, "q11", "a11")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(provider.call_count(), MAX_MERGE_BATCHES + 1);
        assert!(second.pending_merge.is_empty());
        assert_eq!(second.last_merge_count, 12);
        assert_eq!(second.history_summary, "mock response");
    }

    #[test]
    fn default_template_has_placeholders() {
        assert!(DEFAULT_PROMPT_TEMPLATE.contains("{context}"));
        assert!(DEFAULT_PROMPT_TEMPLATE.contains("{question}"));
    }
}
