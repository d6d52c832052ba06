//! Segment indexes: enrichment, persistence, and relevance retrieval.
//!
//! Segments produced by the segmenter are enriched with a summary and keywords by the
//! language model, persisted as one JSON document per index, and later selected for a
//! question by model-driven ranking with a deterministic keyword fallback.

pub mod enrich;
pub mod error;
pub mod keywords;
pub mod parse;
pub mod retriever;
pub mod store;
pub mod types;

pub use enrich::{EnrichReport, Enricher, PLACEHOLDER_SUMMARY};
pub use error::{IndexError, Result};
pub use retriever::{RetrievalConfig, RetrievalStrategy, Retrieved, Retriever, ScoredSegment};
pub use store::{IndexStore, read_segment_content};
pub use types::{Index, IndexInfo, IndexOptions, IndexSummary, SegmentInfo};
