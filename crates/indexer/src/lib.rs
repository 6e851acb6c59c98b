//! SAMAY offline corpus builder
//!
//! Provides:
//! - Verse row parsing (flexible JSON shapes)
//! - Chunking rows into passage records under a text strategy
//! - Batched embedding and snapshot writing for the corpus and relation graph

pub mod chunker;
pub mod errors;
pub mod processor;
pub mod rows;

pub use chunker::{chunk_rows, TextStrategy};
pub use errors::IndexerError;
pub use processor::{BuiltIndex, IndexBuilder};
pub use rows::{load_rows, VerseRow};
