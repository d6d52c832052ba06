pub mod error;
pub mod extract;
pub mod segmenter;
pub mod types;

pub use error::DocumentError;
pub use extract::{DEFAULT_MAX_FILE_SIZE, Extractor, SourceFormat, extract_text};
pub use segmenter::{Segmenter, SegmenterConfig};
pub use types::{CONTENT_TYPE_PDF, Document, DocumentMetadata, Segment};
