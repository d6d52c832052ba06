//! Error types for folio-index.

/// Errors that can occur while building, storing, or querying an index.
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    /// Persistence failure in the underlying JSON store.
    #[error("storage error: {0}")]
    Memory(#[from] folio_memory::MemoryError),

    /// LLM provider error.
    #[error("LLM error: {0}")]
    Llm(#[from] folio_llm::LlmError),

    /// The model answered, but not with anything usable.
    #[error("malformed model response: {0}")]
    MalformedResponse(String),
}

/// Result type alias using `IndexError`.
pub type Result<T> = std::result::Result<T, IndexError>;
