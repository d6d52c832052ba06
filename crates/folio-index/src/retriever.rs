//! Relevance retrieval: model-ranked selection with a deterministic keyword fallback.
//!
//! Small indexes are ranked in a single pass over every segment summary. Indexes with
//! more segments than `group_size` are ranked group by group, and the per-group lists
//! are merged by a score that favours earlier groups and higher in-group rank. Any
//! failure in either path drops to keyword overlap, which cannot fail.

use std::collections::{BTreeSet, HashMap};
use std::fmt::Write;

use folio_llm::{CompletionOptions, LlmProvider};
use folio_memory::document::Segment;

use crate::error::{IndexError, Result};
use crate::keywords::{default_stop_words, tokenize_question};
use crate::parse::parse_segment_ids;
use crate::store::read_segment_content;
use crate::types::Index;

/// Strategy that produced a retrieval result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetrievalStrategy {
    Simple,
    Grouped,
    Keyword,
}

impl RetrievalStrategy {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Simple => "simple",
            Self::Grouped => "grouped",
            Self::Keyword => "keyword",
        }
    }
}

#[derive(Debug, Clone)]
pub struct RetrievalConfig {
    pub max_chunks_per_query: usize,
    /// Rank in fixed-size groups when the index has more than `group_size` segments.
    pub grouped: bool,
    pub group_size: usize,
    pub stop_words: BTreeSet<String>,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            max_chunks_per_query: 5,
            grouped: true,
            group_size: 50,
            stop_words: default_stop_words(),
        }
    }
}

/// A retrieved segment with its content resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredSegment {
    pub segment: Segment,
    /// Higher is more relevant. Rank-derived for model strategies, match count for keywords.
    pub relevance_score: f64,
}

#[derive(Debug, Clone)]
pub struct Retrieved {
    pub segments: Vec<ScoredSegment>,
    pub strategy: RetrievalStrategy,
}

impl Retrieved {
    #[must_use]
    pub fn ids(&self) -> Vec<&str> {
        self.segments.iter().map(|s| s.segment.id.as_str()).collect()
    }
}

pub struct Retriever<P: LlmProvider> {
    provider: P,
    config: RetrievalConfig,
    options: CompletionOptions,
}

impl<P: LlmProvider> Retriever<P> {
    #[must_use]
    pub fn new(provider: P, config: RetrievalConfig) -> Self {
        Self {
            provider,
            config,
            options: CompletionOptions::default()
                .with_temperature(0.0)
                .with_max_tokens(1024),
        }
    }

    #[must_use]
    pub fn config(&self) -> &RetrievalConfig {
        &self.config
    }

    /// Segments relevant to `question`, most relevant first, at most `max_chunks_per_query`.
    ///
    /// Never fails. Model errors and unusable responses fall back to keyword matching.
    pub async fn find_relevant_chunks(&self, index: &Index, question: &str) -> Retrieved {
        let use_grouped = self.config.grouped && index.segments.len() > self.config.group_size;
        let attempt = if use_grouped {
            self.grouped(index, question)
                .await
                .map(|ranked| (ranked, RetrievalStrategy::Grouped))
        } else {
            self.simple(index, question)
                .await
                .map(|ranked| (ranked, RetrievalStrategy::Simple))
        };

        let (ranked, strategy) = match attempt {
            Ok(result) => result,
            Err(e) => {
                tracing::warn!(index_id = %index.id, "model retrieval failed, using keywords: {e:#}");
                (self.keyword(index, question), RetrievalStrategy::Keyword)
            }
        };

        let mut segments = Vec::with_capacity(ranked.len().min(self.config.max_chunks_per_query));
        for (id, relevance_score) in ranked.into_iter().take(self.config.max_chunks_per_query) {
            let Some(stored) = index.segments.get(&id) else {
                continue;
            };
            let mut segment = stored.clone();
            if segment.content.is_none() {
                segment.content = Some(read_segment_content(&segment).await);
            }
            segments.push(ScoredSegment {
                segment,
                relevance_score,
            });
        }

        tracing::info!(
            index_id = %index.id,
            strategy = strategy.as_str(),
            selected = segments.len(),
            "retrieval complete"
        );
        Retrieved { segments, strategy }
    }

    #[allow(clippy::cast_precision_loss)]
    async fn simple(&self, index: &Index, question: &str) -> Result<Vec<(String, f64)>> {
        let ids = self
            .rank_pass(index, &index.ordered_segments(), question)
            .await?;
        let n = ids.len();
        Ok(ids
            .into_iter()
            .enumerate()
            .map(|(rank, id)| (id, (n - rank) as f64))
            .collect())
    }

    #[allow(clippy::cast_precision_loss)]
    async fn grouped(&self, index: &Index, question: &str) -> Result<Vec<(String, f64)>> {
        let group_size = self.config.group_size.max(1);
        let ordered = index.ordered_segments();
        let groups: Vec<&[&Segment]> = ordered.chunks(group_size).collect();
        let total_groups = groups.len();

        let mut scored: Vec<(String, f64)> = Vec::new();
        for (group_index, group) in groups.into_iter().enumerate() {
            let ids = self.rank_pass(index, group, question).await?;
            tracing::debug!(
                index_id = %index.id,
                group = group_index + 1,
                total_groups,
                selected = ids.len(),
            );
            for (rank, id) in ids.into_iter().enumerate() {
                let score = (total_groups - group_index) as f64
                    + group_size.saturating_sub(rank) as f64 / group_size as f64;
                scored.push((id, score));
            }
        }

        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        let mut seen = BTreeSet::new();
        scored.retain(|(id, _)| seen.insert(id.clone()));
        Ok(scored)
    }

    /// One ranking call over `candidates`; returns known IDs in the model's order.
    async fn rank_pass(
        &self,
        index: &Index,
        candidates: &[&Segment],
        question: &str,
    ) -> Result<Vec<String>> {
        let prompt = selection_prompt(
            &index.summary,
            candidates,
            question,
            self.config.max_chunks_per_query,
        );
        let response = self.provider.complete(&prompt, &self.options).await?;

        let named = parse_segment_ids(&response);
        let known: Vec<String> = named
            .iter()
            .filter(|id| candidates.iter().any(|s| &s.id == *id))
            .cloned()
            .collect();

        if !named.is_empty() && known.is_empty() {
            return Err(IndexError::MalformedResponse(format!(
                "no known segment IDs among {named:?}"
            )));
        }
        Ok(known)
    }

    /// Segments ranked by how many question words appear among their keywords.
    #[allow(clippy::cast_precision_loss)]
    fn keyword(&self, index: &Index, question: &str) -> Vec<(String, f64)> {
        let words = tokenize_question(question, &self.config.stop_words);
        let mut counts: HashMap<&str, usize> = HashMap::new();
        for word in &words {
            if let Some(ids) = index.keywords.get(word) {
                for id in ids {
                    if index.segments.contains_key(id) {
                        *counts.entry(id.as_str()).or_default() += 1;
                    }
                }
            }
        }

        let mut ranked: Vec<(&Segment, usize)> = counts
            .into_iter()
            .filter_map(|(id, count)| index.segments.get(id).map(|s| (s, count)))
            .collect();
        ranked.sort_by(|(a, ca), (b, cb)| {
            cb.cmp(ca)
                .then(a.ordinal.cmp(&b.ordinal))
                .then_with(|| a.id.cmp(&b.id))
        });

        ranked
            .into_iter()
            .take(self.config.max_chunks_per_query)
            .map(|(s, count)| (s.id.clone(), count as f64))
            .collect()
    }
}

fn selection_prompt(
    summary: &str,
    candidates: &[&Segment],
    question: &str,
    max_chunks: usize,
) -> String {
    let mut prompt = String::from(
        "You are selecting which sections of a long document are needed to answer a question.\n\n",
    );
    if !summary.is_empty() {
        let _ = write!(prompt, "Document summary:\n{summary}\n\n");
    }
    prompt.push_str("Sections:\n");
    for segment in candidates {
        let _ = writeln!(
            prompt,
            "- {}: {}",
            segment.id,
            segment.summary.as_deref().unwrap_or("(no summary)")
        );
    }
    let _ = write!(
        prompt,
        "\nQuestion: {question}\n\n\
         Reply with a JSON array of the IDs of the relevant sections, most relevant first, \
         at most {max_chunks} entries. Reply with [] if no section is relevant. \
         Output only the JSON array."
    );
    prompt
}
