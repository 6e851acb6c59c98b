//! Indexer error types

use samay_common::errors::AppError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum IndexerError {
    #[error("Source parse error for {path}: {message}")]
    SourceParse { path: String, message: String },

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("No passages left after chunking {0}")]
    EmptyCorpus(String),

    #[error(transparent)]
    App(#[from] AppError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
