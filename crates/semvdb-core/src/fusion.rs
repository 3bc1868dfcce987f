//! Relative score fusion of dense and sparse rankings.
//!
//! Each modality's scores are min-max normalized within their own list, then
//! the two normalized scores of an id are averaged. An id missing from one
//! list gets `0.0` from that modality.

use std::collections::{HashMap, HashSet};

use crate::{Candidate, PointId, Score};

/// Normalized score given to every candidate of a list whose scores are all equal.
pub const DEGENERATE_SCORE: Score = 1.0;

/// Min-max normalizes the scores of one modality into `[0, 1]`.
///
/// When the list has a single candidate, or all scores tie, every candidate
/// gets [`DEGENERATE_SCORE`]. An empty list yields an empty map.
pub fn normalize(candidates: &[Candidate]) -> HashMap<PointId, Score> {
    let (min, max) = candidates
        .iter()
        .fold((Score::INFINITY, Score::NEG_INFINITY), |(lo, hi), c| {
            (lo.min(c.score), hi.max(c.score))
        });
    let range = max - min;

    candidates
        .iter()
        .map(|c| {
            let norm = if range > 0.0 {
                ((c.score - min) / range).clamp(0.0, 1.0)
            } else {
                DEGENERATE_SCORE
            };
            (c.id.clone(), norm)
        })
        .collect()
}

/// Fuses a dense and a sparse ranking into one list sorted by descending score.
///
/// Ties keep first-seen order: dense ids in dense order, then sparse-only ids
/// in sparse order.
pub fn fuse(dense: &[Candidate], sparse: &[Candidate]) -> Vec<Candidate> {
    let norm_dense = normalize(dense);
    let norm_sparse = normalize(sparse);

    let mut seen = HashSet::with_capacity(dense.len() + sparse.len());
    let mut fused: Vec<Candidate> = dense
        .iter()
        .chain(sparse.iter())
        .filter(|c| seen.insert(c.id.clone()))
        .map(|c| {
            let d = norm_dense.get(&c.id).copied().unwrap_or(0.0);
            let s = norm_sparse.get(&c.id).copied().unwrap_or(0.0);
            Candidate {
                id: c.id.clone(),
                score: (d + s) / 2.0,
            }
        })
        .collect();

    // Sort DESCENDING by score; stable sort keeps first-seen order on ties
    fused.sort_by(|a, b| b.score.total_cmp(&a.score));
    fused
}

/// Ranking used when fusion is disabled: the single modality's hits, unchanged.
pub fn passthrough(candidates: Vec<Candidate>) -> Vec<Candidate> {
    candidates
}

#[cfg(test)]
mod tests {
    use super::*;

    fn c(id: u64, score: Score) -> Candidate {
        Candidate::new(id, score)
    }

    #[test]
    fn test_normalize_spreads_to_unit_interval() {
        let norm = normalize(&[c(1, 0.9), c(2, 0.5), c(3, 0.7)]);
        assert!((norm[&PointId::Num(1)] - 1.0).abs() < 1e-12);
        assert!(norm[&PointId::Num(2)].abs() < 1e-12);
        assert!((norm[&PointId::Num(3)] - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_normalize_single_candidate_is_degenerate() {
        let norm = normalize(&[c(7, 0.42)]);
        assert_eq!(norm[&PointId::Num(7)], DEGENERATE_SCORE);
    }

    #[test]
    fn test_normalize_all_tied() {
        let norm = normalize(&[c(1, 3.0), c(2, 3.0)]);
        assert!(norm.values().all(|&v| v == DEGENERATE_SCORE));
    }

    #[test]
    fn test_normalize_empty() {
        assert!(normalize(&[]).is_empty());
    }

    #[test]
    fn test_fuse_top_in_both_scores_one() {
        let dense = [c(1, 0.95), c(2, 0.80), c(3, 0.60)];
        let sparse = [c(1, 12.0), c(3, 4.0), c(4, 1.0)];
        let fused = fuse(&dense, &sparse);

        assert_eq!(fused[0].id, PointId::Num(1));
        assert!((fused[0].score - 1.0).abs() < 1e-12);
        assert_eq!(fused.len(), 4);
    }

    #[test]
    fn test_fuse_dense_only_id_is_halved() {
        let dense = [c(1, 0.9), c(2, 0.1)];
        let sparse = [c(3, 5.0), c(4, 2.0)];
        let fused = fuse(&dense, &sparse);

        let one = fused.iter().find(|f| f.id == PointId::Num(1)).unwrap();
        assert!((one.score - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_fuse_sorted_descending() {
        let dense = [c(1, 0.3), c(2, 0.9), c(3, 0.5)];
        let sparse = [c(3, 9.0), c(1, 1.0)];
        let fused = fuse(&dense, &sparse);
        assert!(fused.windows(2).all(|w| w[0].score >= w[1].score));
    }

    #[test]
    fn test_fuse_ties_keep_first_seen_order() {
        // Both single-candidate lists are degenerate: each id scores 0.5
        let fused = fuse(&[c(10, 0.2)], &[c(20, 0.8)]);
        assert_eq!(fused[0].id, PointId::Num(10));
        assert_eq!(fused[1].id, PointId::Num(20));
        assert!((fused[0].score - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_fuse_empty_sparse() {
        let fused = fuse(&[c(1, 0.9), c(2, 0.4)], &[]);
        assert_eq!(fused.len(), 2);
        assert!((fused[0].score - 0.5).abs() < 1e-12);
        assert!(fused[1].score.abs() < 1e-12);
    }
}
