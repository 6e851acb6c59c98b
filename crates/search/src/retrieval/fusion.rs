//! Linear fusion of min-max normalised semantic and lexical scores
//!
//! Vector distances are inverted while normalising (smaller distance means
//! higher similarity); BM25 scores are not. A batch with zero variance
//! normalises to 1.0 everywhere and non-finite inputs to 0.0, so fusion
//! never divides by zero or produces NaN.

use samay_common::errors::{AppError, Result};

/// Fusion parameters
#[derive(Debug, Clone, Copy)]
pub struct ScoreFusion {
    /// Weight of the semantic score; lexical gets `1 - alpha`
    alpha: f32,
}

/// Normalised scores of one pool position
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FusedScore {
    /// Position in the candidate pool
    pub index: usize,
    pub semantic: f32,
    pub lexical: f32,
    pub fused: f32,
}

impl Default for ScoreFusion {
    fn default() -> Self {
        Self { alpha: 0.3 }
    }
}

impl ScoreFusion {
    /// Create with a semantic weight in [0, 1]
    pub fn new(alpha: f32) -> Result<Self> {
        if !(0.0..=1.0).contains(&alpha) {
            return Err(AppError::Validation {
                message: format!("alpha must be within [0, 1], got {}", alpha),
                field: Some("alpha".to_string()),
            });
        }
        Ok(Self { alpha })
    }

    pub fn alpha(&self) -> f32 {
        self.alpha
    }

    /// Min-max normalise distances into similarities: `1 - (d - min) / (max - min)`
    pub fn normalize_distances(distances: &[f32]) -> Vec<f32> {
        min_max(distances, true)
    }

    /// Min-max normalise scores where higher is better
    pub fn normalize_scores(scores: &[f32]) -> Vec<f32> {
        min_max(scores, false)
    }

    /// Fuse aligned distance and lexical arrays; `distances[i]` and
    /// `lexical[i]` describe the same pool position.
    ///
    /// Output is sorted by fused score, descending; equal scores keep pool
    /// order.
    pub fn fuse(&self, distances: &[f32], lexical: &[f32]) -> Result<Vec<FusedScore>> {
        if distances.len() != lexical.len() {
            return Err(AppError::IndexMismatch {
                message: format!(
                    "{} semantic scores for {} lexical scores",
                    distances.len(),
                    lexical.len()
                ),
            });
        }

        let semantic = Self::normalize_distances(distances);
        let lexical = Self::normalize_scores(lexical);

        let mut fused: Vec<FusedScore> = semantic
            .iter()
            .zip(&lexical)
            .enumerate()
            .map(|(index, (&sem, &lex))| FusedScore {
                index,
                semantic: sem,
                lexical: lex,
                fused: self.alpha * sem + (1.0 - self.alpha) * lex,
            })
            .collect();

        // sort_by is stable
        fused.sort_by(|a, b| {
            b.fused
                .partial_cmp(&a.fused)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        Ok(fused)
    }
}

fn min_max(values: &[f32], invert: bool) -> Vec<f32> {
    if values.is_empty() {
        return Vec::new();
    }

    let mut min = f32::MAX;
    let mut max = f32::MIN;
    for v in values.iter().filter(|v| v.is_finite()) {
        min = min.min(*v);
        max = max.max(*v);
    }

    // no finite value at all
    if min > max {
        return vec![0.0; values.len()];
    }

    let range = max - min;
    values
        .iter()
        .map(|v| {
            if !v.is_finite() {
                0.0
            } else if range <= f32::EPSILON {
                1.0
            } else {
                let scaled = (v - min) / range;
                if invert {
                    1.0 - scaled
                } else {
                    scaled
                }
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distance_normalisation_inverts() {
        let normalised = ScoreFusion::normalize_distances(&[0.5, 1.0, 1.5]);
        assert_eq!(normalised, vec![1.0, 0.5, 0.0]);
    }

    #[test]
    fn test_lexical_normalisation_keeps_direction() {
        let normalised = ScoreFusion::normalize_scores(&[0.0, 2.0, 4.0]);
        assert_eq!(normalised, vec![0.0, 0.5, 1.0]);
    }

    #[test]
    fn test_zero_variance_is_constant_not_nan() {
        assert_eq!(ScoreFusion::normalize_distances(&[0.7, 0.7, 0.7]), vec![1.0; 3]);
        assert_eq!(ScoreFusion::normalize_scores(&[0.0, 0.0]), vec![1.0; 2]);
        assert_eq!(ScoreFusion::normalize_distances(&[3.2]), vec![1.0]);

        let fused = ScoreFusion::default().fuse(&[0.4, 0.4], &[1.0, 1.0]).unwrap();
        assert!(fused.iter().all(|f| f.fused.is_finite()));
    }

    #[test]
    fn test_non_finite_inputs_become_zero() {
        let normalised = ScoreFusion::normalize_scores(&[f32::NAN, 1.0, 3.0]);
        assert_eq!(normalised, vec![0.0, 0.0, 1.0]);
        assert_eq!(ScoreFusion::normalize_scores(&[f32::NAN]), vec![0.0]);
    }

    #[test]
    fn test_alpha_validation() {
        assert!(ScoreFusion::new(-0.1).is_err());
        assert!(ScoreFusion::new(1.1).is_err());
        assert!(ScoreFusion::new(0.0).is_ok());
        assert!(ScoreFusion::new(1.0).is_ok());
    }

    #[test]
    fn test_ties_keep_pool_order() {
        let fused = ScoreFusion::new(0.5).unwrap().fuse(&[1.0, 1.0, 1.0], &[2.0, 2.0, 2.0]).unwrap();
        let order: Vec<usize> = fused.iter().map(|f| f.index).collect();
        assert_eq!(order, vec![0, 1, 2]);
    }

    #[test]
    fn test_raising_alpha_favours_semantic_candidate() {
        // 0: semantically closest, lexically weak; 1: the opposite
        let distances = [0.1, 0.9, 0.5];
        let lexical = [0.2, 5.0, 1.0];

        let mut previous_gap = f32::NEG_INFINITY;
        for alpha in [0.0, 0.25, 0.5, 0.75, 1.0] {
            let fused = ScoreFusion::new(alpha).unwrap().fuse(&distances, &lexical).unwrap();
            let score = |i: usize| fused.iter().find(|f| f.index == i).map(|f| f.fused).unwrap();
            let gap = score(0) - score(1);
            assert!(gap >= previous_gap);
            previous_gap = gap;
        }

        let semantic_only = ScoreFusion::new(1.0).unwrap().fuse(&distances, &lexical).unwrap();
        assert_eq!(semantic_only[0].index, 0);
        let lexical_only = ScoreFusion::new(0.0).unwrap().fuse(&distances, &lexical).unwrap();
        assert_eq!(lexical_only[0].index, 1);
    }

    #[test]
    fn test_length_mismatch_rejected() {
        assert!(ScoreFusion::default().fuse(&[0.1], &[1.0, 2.0]).is_err());
    }
}
