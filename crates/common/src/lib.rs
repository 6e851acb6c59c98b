//! SAMAY Common Library
//!
//! Shared code for the SAMAY retrieval and answering crates including:
//! - Passage data model (verses, sutras and their metadata)
//! - Embedding client abstraction
//! - Generation (LLM) client abstraction
//! - Error types and handling
//! - Configuration management
//! - Tracing initialisation and metrics helpers

pub mod config;
pub mod embeddings;
pub mod errors;
pub mod llm;
pub mod metrics;
pub mod models;
pub mod telemetry;

// Re-export commonly used types
pub use errors::{AppError, Result};
pub use config::AppConfig;
pub use embeddings::Embedder;
pub use llm::Generator;
pub use models::{PassageId, PassageMetadata, PassageRecord};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default embedding model
pub const DEFAULT_EMBEDDING_MODEL: &str = "sentence-transformers/all-MiniLM-L6-v2";

/// Default embedding dimension
pub const DEFAULT_EMBEDDING_DIMENSION: usize = 384;
