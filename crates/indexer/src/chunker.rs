//! Chunking module
//!
//! Turns verse rows into passage records, one record per verse. The text
//! strategy decides what gets embedded and matched.

use crate::rows::VerseRow;
use samay_common::models::{PassageId, PassageMetadata, PassageRecord};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use tracing::{debug, warn};

/// What a passage's text is made of
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextStrategy {
    /// The verse's questions joined by a space
    #[default]
    CombinedQuestions,
    /// The Sanskrit followed by every translation
    SanskritTranslation,
}

impl TextStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            TextStrategy::CombinedQuestions => "combined_questions",
            TextStrategy::SanskritTranslation => "sanskrit_translation",
        }
    }

    fn text_for(&self, row: &VerseRow) -> String {
        match self {
            TextStrategy::CombinedQuestions => row
                .questions
                .as_ref()
                .map(|q| q.joined(" "))
                .unwrap_or_default(),
            TextStrategy::SanskritTranslation => row
                .sanskrit
                .iter()
                .map(String::as_str)
                .chain(row.translations.values())
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .collect::<Vec<_>>()
                .join(" "),
        }
    }
}

impl fmt::Display for TextStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TextStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.replace('-', "_").as_str() {
            "combined_questions" => Ok(TextStrategy::CombinedQuestions),
            "sanskrit_translation" => Ok(TextStrategy::SanskritTranslation),
            other => Err(format!("unknown text strategy '{}'", other)),
        }
    }
}

/// Build passage records in row order.
///
/// Rows whose text comes out empty are skipped; of several rows with the
/// same chapter and verse only the first is kept.
pub fn chunk_rows(rows: &[VerseRow], strategy: TextStrategy) -> Vec<PassageRecord> {
    let mut records = Vec::with_capacity(rows.len());
    let mut seen = HashSet::with_capacity(rows.len());

    for row in rows {
        let id = PassageId::new(row.chapter, row.verse).to_string();

        let text = strategy.text_for(row);
        if text.trim().is_empty() {
            warn!(passage_id = %id, strategy = %strategy, "Row has no text, skipping");
            continue;
        }

        if !seen.insert(id.clone()) {
            warn!(passage_id = %id, "Duplicate verse, keeping the first row");
            continue;
        }

        let metadata = PassageMetadata {
            speaker: row.speaker.clone(),
            shloka: row.sanskrit.clone(),
            chapter: row.chapter,
            verse: row.verse,
            translations: row.translations.clone(),
            purport: row.purport.clone(),
            source: row.source.clone(),
        };
        records.push(PassageRecord::new(id, text, metadata));
    }

    debug!(
        rows = rows.len(),
        passages = records.len(),
        strategy = %strategy,
        "Rows chunked"
    );
    records
}
