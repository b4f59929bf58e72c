//! Blending heuristic and LLM scores.

use super::types::{Candidate, HEURISTIC_FUSE_WEIGHT, LLM_FUSE_WEIGHT};

/// Linearly rescale a score set to [0, 100]; a degenerate range collapses
/// to a constant 50.
pub fn rescale_to_100(scores: &[f64]) -> Vec<f64> {
    if scores.is_empty() {
        return Vec::new();
    }

    let min = scores.iter().cloned().fold(f64::INFINITY, f64::min);
    let max = scores.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let range = max - min;

    if range.abs() < 1e-9 {
        return vec![50.0; scores.len()];
    }

    scores.iter().map(|s| (s - min) / range * 100.0).collect()
}

/// Fuse scores across the LLM-evaluated set: 30% rescaled heuristic, 70%
/// LLM. The LLM reason replaces the heuristic rationale when non-empty.
/// Every candidate passed here must carry an LLM score.
pub fn fuse_llm_scores(candidates: &mut [Candidate]) {
    let working: Vec<f64> = candidates.iter().map(|c| c.score).collect();
    let scaled = rescale_to_100(&working);

    for (candidate, heuristic_scaled) in candidates.iter_mut().zip(scaled) {
        let llm_score = candidate.llm_score.unwrap_or(0.0);
        candidate.score =
            HEURISTIC_FUSE_WEIGHT * heuristic_scaled + LLM_FUSE_WEIGHT * llm_score;

        if let Some(reason) = candidate.llm_reason.as_deref() {
            if !reason.is_empty() {
                candidate.rationale = reason.to_string();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(score: f64, llm_score: f64, llm_reason: Option<&str>) -> Candidate {
        Candidate {
            start_idx: 0,
            end_idx: 0,
            start_ms: 0,
            end_ms: 60_000,
            gap_ms: 0,
            start_clean: true,
            end_clean: true,
            text: "texto".to_string(),
            hook_score: 0.0,
            heuristic_score: score,
            rationale: "words=30 gap_ms=0".to_string(),
            semantic_type: None,
            type_score: None,
            centroid: None,
            llm_score: Some(llm_score),
            llm_reason: llm_reason.map(str::to_string),
            llm_trim: None,
            llm_trim_confidence: None,
            trim_applied: false,
            score,
        }
    }

    #[test]
    fn test_rescale_spreads_scores() {
        assert_eq!(rescale_to_100(&[1.0, 2.0, 3.0]), vec![0.0, 50.0, 100.0]);
    }

    #[test]
    fn test_rescale_degenerate_range() {
        assert_eq!(rescale_to_100(&[4.2, 4.2]), vec![50.0, 50.0]);
        assert!(rescale_to_100(&[]).is_empty());
    }

    #[test]
    fn test_fusion_weights() {
        let mut candidates = vec![
            candidate(1.0, 90.0, Some("gancho fuerte y mensaje claro")),
            candidate(3.0, 40.0, None),
        ];

        fuse_llm_scores(&mut candidates);

        // Heuristics rescale to 0 and 100.
        assert!((candidates[0].score - (0.3 * 0.0 + 0.7 * 90.0)).abs() < 1e-9);
        assert!((candidates[1].score - (0.3 * 100.0 + 0.7 * 40.0)).abs() < 1e-9);

        assert_eq!(candidates[0].rationale, "gancho fuerte y mensaje claro");
        assert_eq!(candidates[1].rationale, "words=30 gap_ms=0");

        for c in &candidates {
            assert!((0.0..=100.0).contains(&c.score));
        }
    }
}
