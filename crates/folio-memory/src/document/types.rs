use serde::{Deserialize, Serialize};

pub const CONTENT_TYPE_PDF: &str = "application/pdf";

#[derive(Debug, Clone)]
pub struct DocumentMetadata {
    pub source: String,
    pub content_type: String,
}

#[derive(Debug, Clone)]
pub struct Document {
    pub content: String,
    pub metadata: DocumentMetadata,
}

impl Document {
    /// Offsets into extracted text only line up with the source file for plain text.
    #[must_use]
    pub fn is_byte_addressable(&self) -> bool {
        self.metadata.content_type != CONTENT_TYPE_PDF
    }
}

/// A contiguous byte range of one source document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    pub id: String,
    /// 1-based position within the source document.
    pub ordinal: usize,
    pub path: String,
    /// Raw text; `None` when the index was saved without content.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    pub start: usize,
    pub end: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
}

impl Segment {
    #[must_use]
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.end == self.start
    }
}
