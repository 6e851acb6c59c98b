//! Post-fusion candidate filters
//!
//! Both filters preserve the incoming order.

use super::ScoredCandidate;
use regex::Regex;
use std::collections::HashSet;
use std::sync::OnceLock;

fn word_pattern() -> &'static Regex {
    static WORD: OnceLock<Regex> = OnceLock::new();
    WORD.get_or_init(|| Regex::new(r"\b\w+\b").expect("word pattern is valid"))
}

/// Lower-cased word tokens of a text
pub fn query_terms(text: &str) -> HashSet<String> {
    let lowered = text.to_lowercase();
    word_pattern()
        .find_iter(&lowered)
        .map(|m| m.as_str().to_string())
        .collect()
}

/// Keep candidates whose text shares at least one word with the query.
///
/// Returns the filtered set and whether it fell back to the input because
/// nothing matched.
pub fn keyword_filter(query: &str, candidates: Vec<ScoredCandidate>) -> (Vec<ScoredCandidate>, bool) {
    let keywords = query_terms(query);
    let matched: Vec<ScoredCandidate> = candidates
        .iter()
        .filter(|c| !query_terms(&c.record.text).is_disjoint(&keywords))
        .cloned()
        .collect();

    if matched.is_empty() && !candidates.is_empty() {
        (candidates, true)
    } else {
        (matched, false)
    }
}

/// Keep candidates whose stored embedding has cosine similarity of at least
/// `threshold` with the query embedding. Candidates without a stored
/// embedding are dropped. No fallback: this filter may empty the set.
pub fn similarity_filter<'a, F>(
    query_embedding: &[f32],
    candidates: Vec<ScoredCandidate>,
    threshold: f32,
    embedding_of: F,
) -> Vec<ScoredCandidate>
where
    F: Fn(&str) -> Option<&'a [f32]>,
{
    candidates
        .into_iter()
        .filter(|c| {
            embedding_of(&c.record.id)
                .map(|e| cosine_similarity(query_embedding, e) >= threshold)
                .unwrap_or(false)
        })
        .collect()
}

/// Cosine similarity; 0 when either vector has zero norm
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a <= 0.0 || norm_b <= 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retrieval::test_support::record;

    fn candidate(id: &str, text: &str) -> ScoredCandidate {
        ScoredCandidate {
            record: record(id, text),
            semantic_score: 0.0,
            lexical_score: 0.0,
            fused_score: 0.0,
            rerank_score: None,
        }
    }

    #[test]
    fn test_query_terms_lowercase_words() {
        let terms = query_terms("What is Karma-Yoga?");
        let expected: HashSet<String> = ["what", "is", "karma", "yoga"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(terms, expected);
    }

    #[test]
    fn test_query_terms_keep_transliterated_words_whole() {
        let expected: HashSet<String> = ["kṛṣṇa".to_string()].into_iter().collect();
        assert_eq!(query_terms("kṛṣṇa"), expected);

        let terms = query_terms("Arjuna's Dhyāna");
        assert!(terms.contains("dhyāna"));
        assert!(terms.contains("arjuna"));
        assert!(!terms.contains("dhy"));
    }

    #[test]
    fn test_keyword_filter_does_not_match_diacritic_fragments() {
        let candidates = vec![
            candidate("chapter-1-verse-1", "a weather forecast"),
            candidate("chapter-1-verse-2", "duty of kings"),
        ];
        let (kept, fallback) = keyword_filter("kṛṣṇa", candidates);
        assert!(fallback);
        assert_eq!(kept.len(), 2);

        let candidates = vec![
            candidate("chapter-1-verse-1", "a weather forecast"),
            candidate("chapter-1-verse-2", "Kṛṣṇa speaks of duty"),
        ];
        let (kept, fallback) = keyword_filter("kṛṣṇa", candidates);
        assert!(!fallback);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].record.id, "chapter-1-verse-2");
    }

    #[test]
    fn test_keyword_filter_keeps_overlapping() {
        let candidates = vec![
            candidate("chapter-1-verse-1", "Duty without attachment"),
            candidate("chapter-1-verse-2", "weather forecast tomorrow"),
        ];
        let (kept, fallback) = keyword_filter("what is my duty", candidates);
        assert!(!fallback);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].record.id, "chapter-1-verse-1");
    }

    #[test]
    fn test_keyword_filter_falls_back_when_nothing_matches() {
        let candidates = vec![
            candidate("chapter-1-verse-1", "duty without attachment"),
            candidate("chapter-1-verse-2", "weather forecast tomorrow"),
        ];
        let (kept, fallback) = keyword_filter("samadhi", candidates.clone());
        assert!(fallback);
        let ids: Vec<_> = kept.iter().map(|c| c.record.id.clone()).collect();
        let expected: Vec<_> = candidates.iter().map(|c| c.record.id.clone()).collect();
        assert_eq!(ids, expected);
    }

    #[test]
    fn test_keyword_filter_on_empty_input() {
        let (kept, fallback) = keyword_filter("duty", Vec::new());
        assert!(kept.is_empty());
        assert!(!fallback);
    }

    #[test]
    fn test_similarity_filter_threshold() {
        let a = [1.0, 0.0];
        let b = [0.0, 1.0];
        let candidates = vec![
            candidate("chapter-1-verse-1", "close"),
            candidate("chapter-1-verse-2", "orthogonal"),
            candidate("chapter-1-verse-3", "missing"),
        ];
        let kept = similarity_filter(&[1.0, 0.1], candidates, 0.5, |id| match id {
            "chapter-1-verse-1" => Some(&a[..]),
            "chapter-1-verse-2" => Some(&b[..]),
            _ => None,
        });
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].record.id, "chapter-1-verse-1");
    }

    #[test]
    fn test_cosine_zero_vector() {
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
        assert!((cosine_similarity(&[2.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
    }
}
