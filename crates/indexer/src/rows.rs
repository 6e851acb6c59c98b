//! Verse rows as produced by the scraping and cleaning scripts
//!
//! Chapter and verse may arrive as numbers or numeric strings; speaker,
//! questions and purport as a single string or a list; translations as a
//! list or a source -> text map.

use crate::errors::IndexerError;
use samay_common::models::{TextField, Translations};
use serde::{Deserialize, Deserializer, Serialize};
use std::path::Path;

const DEFAULT_SOURCE: &str = "Bhagavad Gita";

/// One verse or sutra with its commentary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerseRow {
    #[serde(deserialize_with = "number_or_string")]
    pub chapter: u32,

    #[serde(deserialize_with = "number_or_string")]
    pub verse: u32,

    #[serde(default = "default_source")]
    pub source: String,

    #[serde(default)]
    pub sanskrit: Option<String>,

    #[serde(default)]
    pub translations: Translations,

    #[serde(default)]
    pub speaker: Option<TextField>,

    /// Questions this verse answers
    #[serde(default)]
    pub questions: Option<TextField>,

    #[serde(default)]
    pub purport: Option<TextField>,
}

fn default_source() -> String {
    DEFAULT_SOURCE.to_string()
}

fn number_or_string<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(u32),
        Text(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Number(n) => Ok(n),
        Raw::Text(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}

/// Read a JSON array of verse rows
pub fn load_rows(path: impl AsRef<Path>) -> Result<Vec<VerseRow>, IndexerError> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(IndexerError::FileNotFound(path.display().to_string()));
    }

    let raw = std::fs::read_to_string(path)?;
    serde_json::from_str(&raw).map_err(|e| IndexerError::SourceParse {
        path: path.display().to_string(),
        message: e.to_string(),
    })
}
