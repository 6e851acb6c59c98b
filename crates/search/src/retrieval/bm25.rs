//! In-memory Okapi BM25 over passage texts
//!
//! Texts are split on whitespace with no stemming, stopword removal or case
//! folding. Terms whose inverse document frequency would be negative (they
//! occur in more than half the corpus) get `epsilon * average_idf` instead,
//! so common terms still contribute a small positive amount.

use samay_common::models::PassageRecord;
use std::collections::HashMap;

const K1: f64 = 1.5;
const B: f64 = 0.75;
const EPSILON: f64 = 0.25;

/// BM25 statistics for one fixed corpus
#[derive(Debug, Clone)]
pub struct LexicalIndex {
    /// Term frequencies per document, in corpus order
    doc_freqs: Vec<HashMap<String, u32>>,

    /// Token count per document
    doc_len: Vec<usize>,

    avgdl: f64,

    idf: HashMap<String, f64>,
}

impl LexicalIndex {
    /// Build from raw document texts
    pub fn build<S: AsRef<str>>(texts: &[S]) -> Self {
        let mut doc_freqs = Vec::with_capacity(texts.len());
        let mut doc_len = Vec::with_capacity(texts.len());
        let mut document_frequency: HashMap<String, u32> = HashMap::new();
        let mut total_tokens = 0usize;

        for text in texts {
            let mut frequencies: HashMap<String, u32> = HashMap::new();
            let mut length = 0usize;
            for token in tokenize(text.as_ref()) {
                *frequencies.entry(token.to_string()).or_insert(0) += 1;
                length += 1;
            }
            for term in frequencies.keys() {
                *document_frequency.entry(term.clone()).or_insert(0) += 1;
            }
            total_tokens += length;
            doc_len.push(length);
            doc_freqs.push(frequencies);
        }

        let corpus_size = texts.len() as f64;
        let avgdl = if texts.is_empty() {
            0.0
        } else {
            total_tokens as f64 / corpus_size
        };

        let mut idf = HashMap::with_capacity(document_frequency.len());
        let mut idf_sum = 0.0;
        let mut negative = Vec::new();
        for (term, freq) in document_frequency {
            let freq = freq as f64;
            let value = (corpus_size - freq + 0.5).ln() - (freq + 0.5).ln();
            idf_sum += value;
            if value < 0.0 {
                negative.push(term.clone());
            }
            idf.insert(term, value);
        }

        if !idf.is_empty() {
            let floor = EPSILON * idf_sum / idf.len() as f64;
            for term in negative {
                idf.insert(term, floor);
            }
        }

        Self {
            doc_freqs,
            doc_len,
            avgdl,
            idf,
        }
    }

    /// Build over the `text` of each record, preserving record order
    pub fn from_records<'a, I>(records: I) -> Self
    where
        I: IntoIterator<Item = &'a PassageRecord>,
    {
        let texts: Vec<&str> = records.into_iter().map(|r| r.text.as_str()).collect();
        Self::build(&texts)
    }

    /// Number of indexed documents
    pub fn doc_count(&self) -> usize {
        self.doc_freqs.len()
    }

    /// Inverse document frequency after the epsilon floor, if the term is known
    pub fn idf(&self, term: &str) -> Option<f64> {
        self.idf.get(term).copied()
    }

    /// One score per document, in corpus order
    pub fn get_scores(&self, query_tokens: &[&str]) -> Vec<f32> {
        let mut scores = vec![0.0f64; self.doc_count()];
        if self.avgdl <= 0.0 {
            return scores.into_iter().map(|s| s as f32).collect();
        }

        for token in query_tokens {
            let idf = match self.idf.get(*token) {
                Some(idf) => *idf,
                None => continue,
            };
            for (doc, score) in scores.iter_mut().enumerate() {
                let tf = self.doc_freqs[doc].get(*token).copied().unwrap_or(0) as f64;
                if tf == 0.0 {
                    continue;
                }
                let norm = 1.0 - B + B * self.doc_len[doc] as f64 / self.avgdl;
                *score += idf * (tf * (K1 + 1.0)) / (tf + K1 * norm);
            }
        }

        scores.into_iter().map(|s| s as f32).collect()
    }

    /// Tokenise the query the same way documents were tokenised, then score
    pub fn score_query(&self, query: &str) -> Vec<f32> {
        let tokens: Vec<&str> = tokenize(query).collect();
        self.get_scores(&tokens)
    }
}

/// Whitespace tokenisation, case preserved
pub fn tokenize(text: &str) -> impl Iterator<Item = &str> {
    text.split_whitespace()
}
