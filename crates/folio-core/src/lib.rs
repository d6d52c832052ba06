//! Configuration, iterative answer synthesis, and the engine that wires segmenting,
//! indexing, retrieval, and conversation memory together.

pub mod bootstrap;
pub mod config;
pub mod engine;
pub mod synthesis;

pub use config::Config;
pub use engine::{Answer, Engine, EngineError, IndexReport};
pub use synthesis::{IterativeSynthesizer, SynthesisError};
