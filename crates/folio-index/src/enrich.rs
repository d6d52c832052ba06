//! Per-segment summary and keyword extraction ahead of index creation.

use folio_llm::{CompletionOptions, LlmProvider, Pacer};
use folio_memory::document::Segment;

use crate::keywords::normalize_keywords;
use crate::parse::parse_enrichment;

/// Summary recorded for a segment whose enrichment call failed.
pub const PLACEHOLDER_SUMMARY: &str = "[summary unavailable]";

const MAX_KEYWORDS: usize = 12;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct EnrichReport {
    pub enriched: usize,
    pub failed: usize,
}

/// Fills in `summary` and `keywords` for each segment, one paced call at a time.
pub struct Enricher<P: LlmProvider> {
    provider: P,
    pacer: Pacer,
    options: CompletionOptions,
}

impl<P: LlmProvider> Enricher<P> {
    #[must_use]
    pub fn new(provider: P, pacer: Pacer) -> Self {
        Self {
            provider,
            pacer,
            options: CompletionOptions::default()
                .with_temperature(0.1)
                .with_max_tokens(1024),
        }
    }

    /// Enrich every segment in place. Failures are recorded as a placeholder summary with
    /// no keywords; this never aborts the run.
    pub async fn enrich(&self, segments: &mut [Segment]) -> EnrichReport {
        let total = segments.len();
        let mut report = EnrichReport::default();

        for (i, segment) in segments.iter_mut().enumerate() {
            let content = segment.content.as_deref().unwrap_or_default();
            self.pacer.wait(content.len()).await;

            let prompt = enrichment_prompt(content);
            match self.provider.complete(&prompt, &self.options).await {
                Ok(response) => {
                    let parsed = parse_enrichment(&response);
                    let summary = parsed.summary.trim();
                    segment.summary = Some(if summary.is_empty() {
                        PLACEHOLDER_SUMMARY.to_owned()
                    } else {
                        summary.to_owned()
                    });
                    let mut keywords = normalize_keywords(&parsed.keywords);
                    keywords.truncate(MAX_KEYWORDS);
                    segment.keywords = keywords;
                    report.enriched += 1;
                    tracing::info!(
                        segment = %segment.id,
                        progress = format_args!("{}/{total}", i + 1),
                        keywords = segment.keywords.len(),
                    );
                }
                Err(e) => {
                    tracing::warn!(segment = %segment.id, "enrichment failed, using placeholder: {e:#}");
                    segment.summary = Some(PLACEHOLDER_SUMMARY.to_owned());
                    segment.keywords.clear();
                    report.failed += 1;
                }
            }
        }

        report
    }
}

fn enrichment_prompt(content: &str) -> String {
    format!(
        "Read the following document excerpt and describe it for a search index.\n\n\
         Respond with a single JSON object and nothing else, in this shape:\n\
         {{\"summary\": \"two to four sentences covering the main facts\", \
         \"keywords\": [\"up to {MAX_KEYWORDS} single-word lowercase terms\"]}}\n\n\
         Excerpt:\n{content}"
    )
}

#[cfg(test)]
mod tests {
    use folio_llm::mock::MockProvider;

    use super::*;

    fn segments(n: usize) -> Vec<Segment> {
        (1..=n)
            .map(|i| Segment {
                id: format!("doc_chunk_{i}"),
                ordinal: i,
                path: "doc.txt".into(),
                content: Some(format!("segment body {i}")),
                start: 0,
                end: 0,
                summary: None,
                keywords: vec![],
            })
            .collect()
    }

    #[tokio::test(start_paused = true)]
    async fn parses_summary_and_keywords() {
        let provider = MockProvider::with_responses(vec![
            r#"{"summary": "Pricing table.", "keywords": ["Pricing", "pricing", "Tiers"]}"#.into(),
        ]);
        let enricher = Enricher::new(provider.clone(), Pacer::default());
        let mut segs = segments(1);

        let report = enricher.enrich(&mut segs).await;
        assert_eq!(report, EnrichReport { enriched: 1, failed: 0 });
        assert_eq!(segs[0].summary.as_deref(), Some("Pricing table."));
        assert_eq!(segs[0].keywords, ["pricing", "tiers"]);
        assert!(provider.prompts()[0].contains("segment body 1"));
    }

    #[tokio::test(start_paused = true)]
    async fn failure_records_placeholder_and_continues() {
        let provider = MockProvider::with_responses(vec![
            r#"{"summary": "first", "keywords": ["a1"]}"#.into(),
            r#"{"summary": "third", "keywords": ["c3"]}"#.into(),
        ])
        .failing_at(1);
        let enricher = Enricher::new(provider.clone(), Pacer::default());
        let mut segs = segments(3);
        segs[1].keywords = vec!["stale".into()];

        let report = enricher.enrich(&mut segs).await;
        assert_eq!(report, EnrichReport { enriched: 2, failed: 1 });
        assert_eq!(segs[1].summary.as_deref(), Some(PLACEHOLDER_SUMMARY));
        assert!(segs[1].keywords.is_empty());
        assert_eq!(segs[2].summary.as_deref(), Some("third"));
        assert_eq!(provider.call_count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn calls_are_paced() {
        let provider = MockProvider::default();
        let enricher = Enricher::new(provider, Pacer::default());
        let mut segs = segments(3);

        let start = tokio::time::Instant::now();
        enricher.enrich(&mut segs).await;
        assert!(start.elapsed() >= folio_llm::pacing::MIN_INTERVAL * 3);
    }

    #[tokio::test(start_paused = true)]
    async fn plain_text_response_becomes_summary() {
        let provider = MockProvider::with_responses(vec!["Just prose.".into()]);
        let enricher = Enricher::new(provider, Pacer::default());
        let mut segs = segments(1);
        enricher.enrich(&mut segs).await;
        assert_eq!(segs[0].summary.as_deref(), Some("Just prose."));
        assert!(segs[0].keywords.is_empty());
    }
}
