//! Fixed-stride segmentation with symmetric overlap padding.
//!
//! The text is walked in strides of `max_segment_chars` bytes. Each emitted segment is
//! widened on both sides by `overlap_fraction / 2 * max_segment_chars`, clamped to the
//! document, so neighbours share context while the stride itself never shrinks.

use std::path::Path;

use super::types::Segment;

#[derive(Debug, Clone, PartialEq)]
pub struct SegmenterConfig {
    pub max_segment_chars: usize,
    pub overlap_fraction: f64,
    /// End strides at the last paragraph break in their second half, when one exists.
    pub preserve_paragraphs: bool,
}

impl Default for SegmenterConfig {
    fn default() -> Self {
        Self::from_budget(100_000, 40, 10, 4)
    }
}

impl SegmenterConfig {
    /// Derive the segment size from a model window: `context_tokens * chunk% * chars_per_token`.
    #[must_use]
    pub fn from_budget(
        context_tokens: usize,
        chunk_size_percentage: u8,
        overlap_percentage: u8,
        chars_per_token: usize,
    ) -> Self {
        let max_segment_chars =
            context_tokens * usize::from(chunk_size_percentage) / 100 * chars_per_token;
        Self {
            max_segment_chars: max_segment_chars.max(1),
            overlap_fraction: f64::from(overlap_percentage) / 100.0,
            preserve_paragraphs: false,
        }
    }

    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    fn padding(&self) -> usize {
        (self.overlap_fraction.clamp(0.0, 1.0) / 2.0 * self.max_segment_chars as f64) as usize
    }
}

#[derive(Debug, Clone, Default)]
pub struct Segmenter {
    config: SegmenterConfig,
}

impl Segmenter {
    #[must_use]
    pub fn new(config: SegmenterConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub fn config(&self) -> &SegmenterConfig {
        &self.config
    }

    /// Split `text` read from `source` into ordered, overlapping segments.
    ///
    /// Always returns at least one segment; empty text yields one empty segment.
    #[must_use]
    pub fn segment(&self, text: &str, source: &str) -> Vec<Segment> {
        let base = source_base_name(source);
        let len = text.len();
        let max = self.config.max_segment_chars.max(1);

        if len <= max {
            return vec![make_segment(&base, source, text, 1, 0, len)];
        }

        let pad = self.config.padding();
        let mut segments = Vec::with_capacity(len / max + 1);
        let mut stride_start = 0;

        while stride_start < len {
            let mut stride_end = floor_boundary(text, stride_start + max);
            if stride_end <= stride_start {
                stride_end = ceil_boundary(text, stride_start + 1);
            }
            if self.config.preserve_paragraphs && stride_end < len {
                stride_end = paragraph_end(text, stride_start, stride_end, max);
            }

            let start = ceil_boundary(text, stride_start.saturating_sub(pad));
            let end = floor_boundary(text, stride_end + pad);
            let ordinal = segments.len() + 1;
            segments.push(make_segment(&base, source, text, ordinal, start, end));

            stride_start = stride_end;
        }

        tracing::debug!(
            source,
            segments = segments.len(),
            max_segment_chars = max,
            padding = pad,
            "segmented document"
        );
        segments
    }
}

fn make_segment(
    base: &str,
    source: &str,
    text: &str,
    ordinal: usize,
    start: usize,
    end: usize,
) -> Segment {
    Segment {
        id: format!("{base}_chunk_{ordinal}"),
        ordinal,
        path: source.to_owned(),
        content: Some(text[start..end].to_owned()),
        start,
        end,
        summary: None,
        keywords: Vec::new(),
    }
}

fn source_base_name(source: &str) -> String {
    Path::new(source)
        .file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .unwrap_or("document")
        .to_owned()
}

/// Pull `stride_end` back to just after the last `\n\n` in the stride's second half.
fn paragraph_end(text: &str, stride_start: usize, stride_end: usize, max: usize) -> usize {
    let search_from = ceil_boundary(text, stride_start + max / 2);
    if search_from >= stride_end {
        return stride_end;
    }
    text[search_from..stride_end]
        .rfind("\n\n")
        .map_or(stride_end, |pos| search_from + pos + 2)
}

fn floor_boundary(text: &str, idx: usize) -> usize {
    if idx >= text.len() {
        return text.len();
    }
    let mut i = idx;
    while !text.is_char_boundary(i) {
        i -= 1;
    }
    i
}

fn ceil_boundary(text: &str, idx: usize) -> usize {
    if idx >= text.len() {
        return text.len();
    }
    let mut i = idx;
    while !text.is_char_boundary(i) {
        i += 1;
    }
    i
}
