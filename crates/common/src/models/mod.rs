//! Data models shared across SAMAY crates

pub mod passage;

pub use passage::{PassageId, PassageMetadata, PassageRecord, TextField, Translations};
