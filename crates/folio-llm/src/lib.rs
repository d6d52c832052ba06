//! Language-model completion backends and request pacing.

pub mod any;
pub mod claude;
pub mod error;
pub mod http;
#[cfg(feature = "mock")]
pub mod mock;
pub mod ollama;
pub mod openai;
pub mod pacing;
pub mod provider;
pub(crate) mod retry;

pub use error::LlmError;
pub use pacing::Pacer;
pub use provider::{CompletionOptions, LlmProvider};
