//! Overlap and semantic deduplication of scored candidates.

use super::types::{
    Candidate, MAX_OVERLAP_RATIO, MAX_SUGGESTIONS, SEMANTIC_DEDUPE_MAX,
    SEMANTIC_DEDUPE_SIMILARITY,
};
use crate::embedding::cosine_similarity;

/// Sort by score descending; ties break by start_ms then end_ms so
/// re-running the task yields a stable set.
pub fn sort_by_score_desc(candidates: &mut [Candidate]) {
    candidates.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.start_ms.cmp(&b.start_ms))
            .then(a.end_ms.cmp(&b.end_ms))
    });
}

/// Overlap between two ranges relative to the shorter one.
pub fn overlap_ratio(a: &Candidate, b: &Candidate) -> f64 {
    let overlap = a.end_ms.min(b.end_ms) - a.start_ms.max(b.start_ms);
    if overlap <= 0 {
        return 0.0;
    }

    let shorter = a.duration_ms().min(b.duration_ms());
    if shorter <= 0 {
        return 0.0;
    }

    overlap as f64 / shorter as f64
}

/// Greedily keep the best candidates whose overlap with everything already
/// kept stays at or below the cap.
pub fn dedupe_by_overlap(mut candidates: Vec<Candidate>) -> Vec<Candidate> {
    sort_by_score_desc(&mut candidates);

    let mut kept: Vec<Candidate> = Vec::new();
    for candidate in candidates {
        let overlaps = kept
            .iter()
            .any(|accepted| overlap_ratio(accepted, &candidate) > MAX_OVERLAP_RATIO);
        if !overlaps {
            kept.push(candidate);
        }
    }

    kept
}

/// Drop near-duplicate content: walk the best SEMANTIC_DEDUPE_MAX
/// candidates and reject any whose centroid is too similar to one already
/// kept. Candidates without a centroid bypass the check. The survivors are
/// capped at MAX_SUGGESTIONS.
pub fn dedupe_by_centroid(mut candidates: Vec<Candidate>) -> Vec<Candidate> {
    sort_by_score_desc(&mut candidates);

    let mut kept: Vec<Candidate> = Vec::new();
    let mut kept_centroids: Vec<Vec<f32>> = Vec::new();

    for (walked, candidate) in candidates.into_iter().enumerate() {
        if walked < SEMANTIC_DEDUPE_MAX {
            if let Some(centroid) = candidate.centroid.as_ref() {
                let duplicate = kept_centroids.iter().any(|retained| {
                    cosine_similarity(retained, centroid) >= SEMANTIC_DEDUPE_SIMILARITY
                });
                if duplicate {
                    continue;
                }
            }
        }

        if let Some(centroid) = candidate.centroid.clone() {
            kept_centroids.push(centroid);
        }
        kept.push(candidate);
    }

    kept.truncate(MAX_SUGGESTIONS);
    kept
}
