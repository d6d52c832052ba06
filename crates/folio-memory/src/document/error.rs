/// Failure to turn a source file into text. Fatal for that document only.
#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    #[error("cannot read document: {0}")]
    Io(#[from] std::io::Error),

    #[error("unsupported document format: {0}")]
    UnsupportedFormat(String),

    #[error("document exceeds the size limit ({0} bytes)")]
    FileTooLarge(u64),

    #[cfg(feature = "pdf")]
    #[error("PDF extraction failed: {0}")]
    Pdf(String),
}
