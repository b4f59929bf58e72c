//! Applying LLM trim suggestions, snapped to segment boundaries.

use tracing::debug;

use super::types::{
    AttachedSegment, Candidate, LLM_TRIM_MIN_CONFIDENCE, MAX_CLIP_MS, MIN_CLIP_MS,
};

/// Try to apply the candidate's trim suggestion in place.
///
/// The trim is honoured only when its confidence reaches the gate and at
/// least one offset is positive. The shifted bounds are snapped outward to
/// real segment boundaries; if snapping fails or the snapped duration
/// leaves the clip bounds, the candidate is left untouched.
pub fn apply_trim(candidate: &mut Candidate, segments: &[AttachedSegment]) -> bool {
    let Some(trim) = candidate.llm_trim.clone() else {
        return false;
    };

    let confidence = candidate
        .llm_trim_confidence
        .or(trim.confidence)
        .unwrap_or(0.0);
    if confidence < LLM_TRIM_MIN_CONFIDENCE {
        return false;
    }

    let start_offset = trim.start_offset_sec.max(0.0);
    let end_offset = trim.end_offset_sec.max(0.0);
    if start_offset <= 0.0 && end_offset <= 0.0 {
        return false;
    }

    let new_start_ms = candidate.start_ms + (start_offset * 1000.0).round() as i64;
    let new_end_ms = candidate.end_ms - (end_offset * 1000.0).round() as i64;

    // Snap inward to the segment grid.
    let Some(new_start_idx) = (candidate.start_idx..=candidate.end_idx)
        .find(|&i| segments[i].segment.end_ms >= new_start_ms)
    else {
        return false;
    };
    let Some(new_end_idx) = (new_start_idx..=candidate.end_idx)
        .rev()
        .find(|&j| segments[j].segment.start_ms <= new_end_ms)
    else {
        return false;
    };

    let snapped_start = segments[new_start_idx].segment.start_ms;
    let snapped_end = segments[new_end_idx].segment.end_ms;
    let duration = snapped_end - snapped_start;
    if !(MIN_CLIP_MS..=MAX_CLIP_MS).contains(&duration) {
        debug!(
            duration_ms = duration,
            "trim rejected: snapped duration out of bounds"
        );
        return false;
    }

    candidate.start_idx = new_start_idx;
    candidate.end_idx = new_end_idx;
    candidate.start_ms = snapped_start;
    candidate.end_ms = snapped_end;
    candidate.trim_applied = true;
    true
}
