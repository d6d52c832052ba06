use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use folio_memory::document::Segment;
use serde::{Deserialize, Serialize};

/// Caller-supplied settings for index creation, persisted alongside the index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexOptions {
    /// Display name; its slug becomes the index identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Keep raw segment text in the index file instead of re-reading the source.
    #[serde(default = "default_true")]
    pub persist_content: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, String>,
}

fn default_true() -> bool {
    true
}

impl Default for IndexOptions {
    fn default() -> Self {
        Self {
            name: None,
            persist_content: true,
            source: None,
            extra: BTreeMap::new(),
        }
    }
}

impl IndexOptions {
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Index {
    pub id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub segment_count: usize,
    pub segments: BTreeMap<String, Segment>,
    /// Keyword to the set of segment IDs tagged with it.
    pub keywords: BTreeMap<String, BTreeSet<String>>,
    pub summary: String,
    pub options: IndexOptions,
}

impl Index {
    /// Segments in document order.
    #[must_use]
    pub fn ordered_segments(&self) -> Vec<&Segment> {
        let mut segments: Vec<&Segment> = self.segments.values().collect();
        segments.sort_by(|a, b| a.ordinal.cmp(&b.ordinal).then_with(|| a.id.cmp(&b.id)));
        segments
    }

    #[must_use]
    pub fn summary(&self) -> IndexSummary {
        IndexSummary {
            id: self.id.clone(),
            name: self.name.clone(),
            segment_count: self.segment_count,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }

    #[must_use]
    pub fn info(&self) -> IndexInfo {
        IndexInfo {
            id: self.id.clone(),
            name: self.name.clone(),
            segment_count: self.segment_count,
            created_at: self.created_at,
            updated_at: self.updated_at,
            summary: self.summary.clone(),
            keywords: self.keywords.keys().cloned().collect(),
            segments: self
                .ordered_segments()
                .into_iter()
                .map(|s| SegmentInfo {
                    id: s.id.clone(),
                    path: s.path.clone(),
                    summary: s.summary.clone(),
                })
                .collect(),
            options: self.options.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexSummary {
    pub id: String,
    pub name: String,
    pub segment_count: usize,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Detailed view of an index without raw content or keyword map internals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexInfo {
    pub id: String,
    pub name: String,
    pub segment_count: usize,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub summary: String,
    pub keywords: Vec<String>,
    pub segments: Vec<SegmentInfo>,
    pub options: IndexOptions,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentInfo {
    pub id: String,
    pub path: String,
    pub summary: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segment(id: &str, ordinal: usize) -> Segment {
        Segment {
            id: id.into(),
            ordinal,
            path: "/tmp/doc.txt".into(),
            content: Some("text".into()),
            start: 0,
            end: 4,
            summary: Some(format!("about {id}")),
            keywords: vec![],
        }
    }

    fn index_with(segments: Vec<Segment>) -> Index {
        let now = Utc::now();
        Index {
            id: "doc".into(),
            name: "doc".into(),
            created_at: now,
            updated_at: now,
            segment_count: segments.len(),
            segments: segments.into_iter().map(|s| (s.id.clone(), s)).collect(),
            keywords: BTreeMap::from([(
                "pricing".to_owned(),
                BTreeSet::from(["doc_chunk_2".to_owned()]),
            )]),
            summary: "whole".into(),
            options: IndexOptions::default(),
        }
    }

    #[test]
    fn ordered_segments_follow_ordinal_not_id() {
        // lexical order would put chunk_10 before chunk_2
        let index = index_with(vec![
            segment("doc_chunk_10", 10),
            segment("doc_chunk_2", 2),
            segment("doc_chunk_1", 1),
        ]);
        let ids: Vec<&str> = index
            .ordered_segments()
            .iter()
            .map(|s| s.id.as_str())
            .collect();
        assert_eq!(ids, ["doc_chunk_1", "doc_chunk_2", "doc_chunk_10"]);
    }

    #[test]
    fn info_omits_content() {
        let index = index_with(vec![segment("doc_chunk_1", 1), segment("doc_chunk_2", 2)]);
        let info = index.info();
        assert_eq!(info.keywords, ["pricing"]);
        assert_eq!(info.segments.len(), 2);
        let json = serde_json::to_string(&info).unwrap();
        assert!(!json.contains("\"content\""));
    }

    #[test]
    fn options_default_persist_content_when_missing() {
        let options: IndexOptions = serde_json::from_str("{}").unwrap();
        assert!(options.persist_content);
        assert!(options.name.is_none());
    }
}
