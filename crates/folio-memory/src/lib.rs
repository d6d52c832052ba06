//! Document loading and segmentation, JSON-file persistence, and conversation memory.

pub mod conversation;
pub mod document;
pub mod error;
pub mod store;

pub use conversation::{
    ContextSnippet, Conversation, ConversationConfig, ConversationStore, ConversationSummary,
    DEFAULT_PROMPT_TEMPLATE, Exchange, build_prompt,
};
pub use error::MemoryError;
pub use store::{JsonStore, slugify};
