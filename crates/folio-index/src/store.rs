//! Persistent index storage: one pretty-printed JSON document per index.

use std::collections::{BTreeMap, BTreeSet};
use std::io::SeekFrom;
use std::path::Path;

use chrono::Utc;
use folio_memory::document::Segment;
use folio_memory::{JsonStore, slugify};
use tokio::io::{AsyncReadExt, AsyncSeekExt};

use crate::enrich::PLACEHOLDER_SUMMARY;
use crate::error::Result;
use crate::keywords::normalize_keywords;
use crate::types::{Index, IndexInfo, IndexOptions, IndexSummary};

pub const NAMESPACE: &str = "indexes";
pub const DEFAULT_SUMMARY_MAX_CHARS: usize = 4000;
const ELLIPSIS: &str = "...";

#[derive(Debug, Clone)]
pub struct IndexStore {
    store: JsonStore,
    summary_max_chars: usize,
}

impl IndexStore {
    #[must_use]
    pub fn new(data_dir: impl AsRef<Path>) -> Self {
        Self {
            store: JsonStore::new(data_dir, NAMESPACE),
            summary_max_chars: DEFAULT_SUMMARY_MAX_CHARS,
        }
    }

    #[must_use]
    pub fn with_summary_max_chars(mut self, max_chars: usize) -> Self {
        self.summary_max_chars = max_chars;
        self
    }

    /// Build and persist an index from enriched segments, returning its identifier.
    ///
    /// An existing index with the same identifier is rewritten in full; only its
    /// creation timestamp survives.
    ///
    /// # Errors
    ///
    /// Returns an error if the index cannot be written.
    pub async fn create_index(
        &self,
        segments: Vec<Segment>,
        options: &IndexOptions,
    ) -> Result<String> {
        let id = options
            .name
            .as_deref()
            .map(slugify)
            .filter(|slug| !slug.is_empty())
            .unwrap_or_else(|| uuid::Uuid::new_v4().simple().to_string());

        let now = Utc::now();
        let created_at = match self.store.load::<Index>(&id).await {
            Ok(Some(existing)) => existing.created_at,
            Ok(None) => now,
            Err(e) => {
                tracing::warn!(index_id = %id, "existing index unreadable, replacing: {e:#}");
                now
            }
        };

        let summary = build_summary(&segments, self.summary_max_chars);
        let keywords = build_keyword_map(&segments);
        let segment_count = segments.len();
        let segments: BTreeMap<String, Segment> = segments
            .into_iter()
            .map(|mut s| {
                s.keywords = normalize_keywords(&s.keywords);
                if !options.persist_content {
                    s.content = None;
                }
                (s.id.clone(), s)
            })
            .collect();

        let index = Index {
            name: options.name.clone().unwrap_or_else(|| id.clone()),
            id,
            created_at,
            updated_at: now,
            segment_count,
            segments,
            keywords,
            summary,
            options: options.clone(),
        };

        self.store.save(&index.id, &index).await?;
        tracing::info!(
            index_id = %index.id,
            segments = index.segment_count,
            keywords = index.keywords.len(),
            "index saved"
        );
        Ok(index.id)
    }

    /// # Errors
    ///
    /// Returns an error if the index file exists but cannot be read or parsed.
    pub async fn load_index(&self, id: &str) -> Result<Option<Index>> {
        Ok(self.store.load(id).await?)
    }

    /// Summaries of all readable indexes, sorted by identifier. Corrupt files are skipped.
    ///
    /// # Errors
    ///
    /// Returns an error if the index directory cannot be listed.
    pub async fn list_indexes(&self) -> Result<Vec<IndexSummary>> {
        let indexes = self.store.load_all::<Index>().await?;
        Ok(indexes.iter().map(Index::summary).collect())
    }

    /// # Errors
    ///
    /// Returns an error if the index file exists but cannot be read or parsed.
    pub async fn get_index_info(&self, id: &str) -> Result<Option<IndexInfo>> {
        Ok(self.load_index(id).await?.map(|index| index.info()))
    }

    /// # Errors
    ///
    /// Returns an error if an existing index file cannot be removed.
    pub async fn delete_index(&self, id: &str) -> Result<bool> {
        let deleted = self.store.delete(id).await?;
        if deleted {
            tracing::info!(index_id = id, "index deleted");
        }
        Ok(deleted)
    }

    pub async fn read_segment_content(&self, segment: &Segment) -> String {
        read_segment_content(segment).await
    }
}

/// Raw text of `segment`, re-read from its source file when it was not persisted.
///
/// Never fails: an unreadable source yields a placeholder so retrieval can continue.
pub async fn read_segment_content(segment: &Segment) -> String {
    if let Some(content) = &segment.content {
        return content.clone();
    }
    match read_range(&segment.path, segment.start, segment.end).await {
        Ok(text) => text,
        Err(e) => {
            tracing::warn!(
                segment = %segment.id,
                path = %segment.path,
                "segment content unavailable: {e:#}"
            );
            format!("[content unavailable: {} bytes {}-{}]", segment.path, segment.start, segment.end)
        }
    }
}

async fn read_range(path: &str, start: usize, end: usize) -> std::io::Result<String> {
    let mut file = tokio::fs::File::open(path).await?;
    file.seek(SeekFrom::Start(start as u64)).await?;
    let mut buf = Vec::with_capacity(end.saturating_sub(start));
    file.take(end.saturating_sub(start) as u64)
        .read_to_end(&mut buf)
        .await?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

fn build_keyword_map(segments: &[Segment]) -> BTreeMap<String, BTreeSet<String>> {
    let mut map: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    for segment in segments {
        for keyword in normalize_keywords(&segment.keywords) {
            map.entry(keyword).or_default().insert(segment.id.clone());
        }
    }
    map
}

/// Concatenated segment summaries, capped at `max_chars` characters including the ellipsis.
fn build_summary(segments: &[Segment], max_chars: usize) -> String {
    let mut ordered: Vec<&Segment> = segments.iter().collect();
    ordered.sort_by_key(|s| s.ordinal);

    let joined = ordered
        .iter()
        .filter_map(|s| s.summary.as_deref())
        .map(str::trim)
        .filter(|s| !s.is_empty() && *s != PLACEHOLDER_SUMMARY)
        .collect::<Vec<_>>()
        .join("\n\n");

    if joined.chars().count() <= max_chars {
        return joined;
    }
    let keep = max_chars.saturating_sub(ELLIPSIS.len());
    let mut truncated: String = joined.chars().take(keep).collect();
    truncated.push_str(ELLIPSIS);
    truncated
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segment(ordinal: usize, summary: &str, keywords: &[&str]) -> Segment {
        Segment {
            id: format!("doc_chunk_{ordinal}"),
            ordinal,
            path: "/nonexistent/doc.txt".into(),
            content: Some(format!("content {ordinal}")),
            start: 0,
            end: 9,
            summary: Some(summary.into()),
            keywords: keywords.iter().map(|k| (*k).to_owned()).collect(),
        }
    }

    fn sample() -> Vec<Segment> {
        vec![
            segment(1, "Intro.", &["Overview", "company"]),
            segment(2, "Prices.", &["pricing", "company"]),
            segment(3, "Outlook.", &[]),
        ]
    }

    #[tokio::test]
    async fn create_then_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = IndexStore::new(dir.path());
        let segments = sample();
        let id = store
            .create_index(segments.clone(), &IndexOptions::named("Annual Report"))
            .await
            .unwrap();
        assert_eq!(id, "annual-report");

        let index = store.load_index(&id).await.unwrap().unwrap();
        assert_eq!(index.segment_count, segments.len());
        assert_eq!(index.segments.len(), segments.len());
        assert_eq!(index.name, "Annual Report");
        for segment in &segments {
            for kw in &segment.keywords {
                let ids = &index.keywords[&kw.to_lowercase()];
                assert!(ids.contains(&segment.id));
            }
        }
        assert_eq!(index.keywords["company"].len(), 2);
        assert_eq!(index.summary, "Intro.\n\nPrices.\n\nOutlook.");
    }

    #[tokio::test]
    async fn keyword_map_only_references_known_segments() {
        let dir = tempfile::tempdir().unwrap();
        let store = IndexStore::new(dir.path());
        let id = store
            .create_index(sample(), &IndexOptions::default())
            .await
            .unwrap();
        let index = store.load_index(&id).await.unwrap().unwrap();
        for ids in index.keywords.values() {
            for seg_id in ids {
                assert!(index.segments.contains_key(seg_id));
            }
        }
    }

    #[tokio::test]
    async fn unnamed_index_gets_generated_id() {
        let dir = tempfile::tempdir().unwrap();
        let store = IndexStore::new(dir.path());
        let a = store.create_index(sample(), &IndexOptions::default()).await.unwrap();
        let b = store.create_index(sample(), &IndexOptions::default()).await.unwrap();
        assert_ne!(a, b);
        assert_eq!(store.list_indexes().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn recreate_preserves_created_at() {
        let dir = tempfile::tempdir().unwrap();
        let store = IndexStore::new(dir.path());
        let opts = IndexOptions::named("report");
        store.create_index(sample(), &opts).await.unwrap();
        let first = store.load_index("report").await.unwrap().unwrap();

        store.create_index(sample()[..1].to_vec(), &opts).await.unwrap();
        let second = store.load_index("report").await.unwrap().unwrap();
        assert_eq!(second.created_at, first.created_at);
        assert!(second.updated_at >= first.updated_at);
        assert_eq!(second.segment_count, 1);
    }

    #[tokio::test]
    async fn delete_twice() {
        let dir = tempfile::tempdir().unwrap();
        let store = IndexStore::new(dir.path());
        let id = store
            .create_index(sample(), &IndexOptions::named("doc"))
            .await
            .unwrap();
        assert!(store.delete_index(&id).await.unwrap());
        assert!(!store.delete_index(&id).await.unwrap());
        assert!(store.load_index(&id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn info_for_missing_index_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = IndexStore::new(dir.path());
        assert!(store.get_index_info("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn list_skips_corrupt_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = IndexStore::new(dir.path());
        store
            .create_index(sample(), &IndexOptions::named("good"))
            .await
            .unwrap();
        std::fs::write(dir.path().join(NAMESPACE).join("broken.json"), "{not json").unwrap();

        let listed = store.list_indexes().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, "good");
    }

    #[tokio::test]
    async fn content_dropped_and_lazily_reloaded() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("doc.txt");
        std::fs::write(&source, "0123456789abcdef").unwrap();

        let mut seg = segment(1, "digits", &[]);
        seg.path = source.to_string_lossy().into_owned();
        seg.start = 4;
        seg.end = 10;

        let store = IndexStore::new(dir.path());
        let opts = IndexOptions {
            persist_content: false,
            ..IndexOptions::named("lazy")
        };
        store.create_index(vec![seg], &opts).await.unwrap();

        let index = store.load_index("lazy").await.unwrap().unwrap();
        let stored = &index.segments["doc_chunk_1"];
        assert!(stored.content.is_none());
        assert_eq!(store.read_segment_content(stored).await, "456789");
    }

    #[tokio::test]
    async fn missing_source_yields_placeholder() {
        let mut seg = segment(1, "s", &[]);
        seg.content = None;
        let text = read_segment_content(&seg).await;
        assert!(text.starts_with("[content unavailable"));
    }

    #[test]
    fn summary_is_capped_with_ellipsis() {
        let long = "x".repeat(50);
        let segments = vec![segment(1, &long, &[]), segment(2, &long, &[])];
        let summary = build_summary(&segments, 40);
        assert_eq!(summary.chars().count(), 40);
        assert!(summary.ends_with("..."));
    }

    #[test]
    fn summary_skips_placeholders() {
        let segments = vec![segment(1, PLACEHOLDER_SUMMARY, &[]), segment(2, "Real.", &[])];
        assert_eq!(build_summary(&segments, 100), "Real.");
    }
}
