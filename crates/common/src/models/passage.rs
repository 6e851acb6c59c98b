//! Passage model - the unit of retrievable scripture content
//!
//! Provides:
//! - `PassageRecord`: id, embedded text and verse metadata
//! - `PassageId`: the `chapter-<c>-verse-<v>` key
//! - Flexible text fields that accept a single string or a list

use crate::errors::{AppError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// A text field stored either as one string or as several
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TextField {
    One(String),
    Many(Vec<String>),
}

impl TextField {
    /// Individual values, skipping blanks
    pub fn values(&self) -> Vec<&str> {
        match self {
            TextField::One(s) => vec![s.as_str()],
            TextField::Many(v) => v.iter().map(String::as_str).collect(),
        }
        .into_iter()
        .filter(|s| !s.trim().is_empty())
        .collect()
    }

    /// Values joined with a separator
    pub fn joined(&self, separator: &str) -> String {
        self.values().join(separator)
    }

    pub fn is_empty(&self) -> bool {
        self.values().is_empty()
    }
}

impl From<&str> for TextField {
    fn from(value: &str) -> Self {
        TextField::One(value.to_string())
    }
}

/// Translations of a verse, keyed by translator or listed in order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Translations {
    Named(BTreeMap<String, String>),
    Listed(Vec<String>),
}

impl Default for Translations {
    fn default() -> Self {
        Translations::Listed(Vec::new())
    }
}

impl Translations {
    /// Translation texts regardless of representation, skipping blanks
    pub fn values(&self) -> Vec<&str> {
        match self {
            Translations::Named(map) => map.values().map(String::as_str).collect::<Vec<_>>(),
            Translations::Listed(list) => list.iter().map(String::as_str).collect(),
        }
        .into_iter()
        .filter(|s| !s.trim().is_empty())
        .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.values().is_empty()
    }
}

/// Metadata attached to every passage
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PassageMetadata {
    /// Who speaks the verse (Krishna, Arjuna, Sanjaya, Patanjali...)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speaker: Option<TextField>,

    /// Original-language text
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shloka: Option<String>,

    pub chapter: u32,

    pub verse: u32,

    #[serde(default)]
    pub translations: Translations,

    /// Commentary; falls back to the translations when the source has none
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub purport: Option<TextField>,

    /// Scripture the verse belongs to
    #[serde(default)]
    pub source: String,
}

impl PassageMetadata {
    /// Speakers rendered for display; lists are joined with ", "
    pub fn speaker_label(&self) -> String {
        self.speaker
            .as_ref()
            .map(|s| s.joined(", "))
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| "Unknown".to_string())
    }

    /// Commentary paragraphs, or the translations when there is no purport
    pub fn purport_values(&self) -> Vec<&str> {
        match &self.purport {
            Some(purport) if !purport.is_empty() => purport.values(),
            _ => self.translations.values(),
        }
    }
}

/// Immutable unit of retrievable content
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PassageRecord {
    /// `chapter-<c>-verse-<v>`, unique within one corpus
    pub id: String,

    /// The content that is embedded and lexically matched
    pub text: String,

    pub metadata: PassageMetadata,
}

impl PassageRecord {
    pub fn new(id: impl Into<String>, text: impl Into<String>, metadata: PassageMetadata) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            metadata,
        }
    }

    /// Parsed identifier, if the id follows the canonical format
    pub fn passage_id(&self) -> Result<PassageId> {
        self.id.parse()
    }
}

/// Canonical passage key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PassageId {
    pub chapter: u32,
    pub verse: u32,
}

impl PassageId {
    pub fn new(chapter: u32, verse: u32) -> Self {
        Self { chapter, verse }
    }
}

impl fmt::Display for PassageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "chapter-{}-verse-{}", self.chapter, self.verse)
    }
}

impl FromStr for PassageId {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || AppError::InvalidFormat {
            message: format!("passage id '{}' is not of the form chapter-<c>-verse-<v>", s),
        };

        let rest = s.strip_prefix("chapter-").ok_or_else(invalid)?;
        let (chapter, verse) = rest.split_once("-verse-").ok_or_else(invalid)?;

        Ok(Self {
            chapter: chapter.parse().map_err(|_| invalid())?,
            verse: verse.parse().map_err(|_| invalid())?,
        })
    }
}
