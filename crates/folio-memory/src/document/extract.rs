//! Text extraction from source files.
//!
//! Plain text is read as-is, so byte offsets into the extracted text are byte offsets
//! into the file. PDF text is produced by `pdf-extract` on the blocking pool and has no
//! such correspondence.

use std::path::{Path, PathBuf};

use super::error::DocumentError;
use super::types::{CONTENT_TYPE_PDF, Document, DocumentMetadata};

/// Default maximum file size: 50 MiB.
pub const DEFAULT_MAX_FILE_SIZE: u64 = 50 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    PlainText,
    Markdown,
    Pdf,
}

impl SourceFormat {
    /// Anything without a recognised extension is treated as plain text.
    #[must_use]
    pub fn detect(path: &Path) -> Self {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        match ext.as_str() {
            "pdf" => Self::Pdf,
            "md" | "markdown" => Self::Markdown,
            _ => Self::PlainText,
        }
    }

    #[must_use]
    pub fn content_type(self) -> &'static str {
        match self {
            Self::PlainText => "text/plain",
            Self::Markdown => "text/markdown",
            Self::Pdf => CONTENT_TYPE_PDF,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Extractor {
    pub max_file_size: u64,
}

impl Default for Extractor {
    fn default() -> Self {
        Self {
            max_file_size: DEFAULT_MAX_FILE_SIZE,
        }
    }
}

impl Extractor {
    /// # Errors
    ///
    /// Returns an error if the file is missing, too large, not valid UTF-8 text, or a PDF
    /// that cannot be parsed (or the `pdf` feature is disabled).
    pub async fn extract(&self, path: &Path) -> Result<Document, DocumentError> {
        let path = tokio::fs::canonicalize(path).await?;
        let size = tokio::fs::metadata(&path).await?.len();
        if size > self.max_file_size {
            return Err(DocumentError::FileTooLarge(size));
        }

        let format = SourceFormat::detect(&path);
        let source = path.display().to_string();
        let content = match format {
            SourceFormat::PlainText | SourceFormat::Markdown => {
                tokio::fs::read_to_string(&path).await?
            }
            SourceFormat::Pdf => extract_pdf(path).await?,
        };

        tracing::debug!(
            source,
            content_type = format.content_type(),
            bytes = content.len(),
            "extracted document text"
        );
        Ok(Document {
            content,
            metadata: DocumentMetadata {
                source,
                content_type: format.content_type().to_owned(),
            },
        })
    }
}

#[cfg(feature = "pdf")]
async fn extract_pdf(path: PathBuf) -> Result<String, DocumentError> {
    tokio::task::spawn_blocking(move || {
        pdf_extract::extract_text(&path).map_err(|e| DocumentError::Pdf(e.to_string()))
    })
    .await
    .map_err(|e| DocumentError::Io(std::io::Error::other(e)))?
}

#[cfg(not(feature = "pdf"))]
#[allow(clippy::unused_async)]
async fn extract_pdf(path: PathBuf) -> Result<String, DocumentError> {
    Err(DocumentError::UnsupportedFormat(format!(
        "{} is a PDF; rebuild with the `pdf` feature",
        path.display()
    )))
}

/// Extract the full text of `path` with the default size limit.
///
/// # Errors
///
/// See [`Extractor::extract`].
pub async fn extract_text(path: &Path) -> Result<Document, DocumentError> {
    Extractor::default().extract(path).await
}
