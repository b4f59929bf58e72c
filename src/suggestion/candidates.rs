//! Enumeration of clip candidates within transcript windows.

use tracing::debug;

use super::types::{
    AttachedSegment, Candidate, END_GAP_MS, LONG_GAP_MS, MAX_CLIP_MS, MIN_CLIP_MS, START_GAP_MS,
};

/// Emit every (start, end) segment range inside a single window whose
/// duration lands in [MIN_CLIP_MS, MAX_CLIP_MS]. When `strict_end` is set,
/// ranges without a clean ending are rejected.
pub fn build_candidates(
    segments: &[AttachedSegment],
    breakpoints: &[usize],
    strict_end: bool,
) -> Vec<Candidate> {
    let mut candidates = Vec::new();

    for window in breakpoints.windows(2) {
        let (window_start, window_end) = (window[0], window[1]);

        for start_idx in window_start..window_end {
            let start_clean = is_start_clean(segments, start_idx);
            let mut text = String::new();
            let mut gap_ms = 0i64;

            for end_idx in start_idx..window_end {
                if end_idx > start_idx {
                    let gap = segments[end_idx].segment.start_ms
                        - segments[end_idx - 1].segment.end_ms;
                    if gap > LONG_GAP_MS {
                        gap_ms += gap;
                    }
                    text.push(' ');
                }
                text.push_str(segments[end_idx].segment.text.trim());

                let duration =
                    segments[end_idx].segment.end_ms - segments[start_idx].segment.start_ms;
                if duration < MIN_CLIP_MS {
                    continue;
                }
                if duration > MAX_CLIP_MS {
                    break;
                }

                let end_clean = is_end_clean(segments, end_idx);
                if strict_end && !end_clean {
                    continue;
                }

                candidates.push(Candidate {
                    start_idx,
                    end_idx,
                    start_ms: segments[start_idx].segment.start_ms,
                    end_ms: segments[end_idx].segment.end_ms,
                    gap_ms,
                    start_clean,
                    end_clean,
                    text: text.clone(),
                    hook_score: 0.0,
                    heuristic_score: 0.0,
                    rationale: String::new(),
                    semantic_type: None,
                    type_score: None,
                    centroid: None,
                    llm_score: None,
                    llm_reason: None,
                    llm_trim: None,
                    llm_trim_confidence: None,
                    trim_applied: false,
                    score: 0.0,
                });
            }
        }
    }

    candidates
}

/// Apply the fallback chain: strict ends within windows, then lenient ends,
/// then the same two passes ignoring the windows. Returns the first
/// non-empty result; empty means no candidate exists at all.
pub fn build_with_fallback(segments: &[AttachedSegment], breakpoints: &[usize]) -> Vec<Candidate> {
    let whole: [usize; 2] = [0, segments.len()];
    let stages: [(bool, &[usize]); 4] = [
        (true, breakpoints),
        (false, breakpoints),
        (true, &whole),
        (false, &whole),
    ];

    for (stage, (strict_end, bps)) in stages.into_iter().enumerate() {
        let candidates = build_candidates(segments, bps, strict_end);
        if !candidates.is_empty() {
            if stage > 0 {
                debug!(stage, "candidate builder used fallback stage");
            }
            return candidates;
        }
    }

    Vec::new()
}

/// A range starts clean when it opens the transcript, follows a real pause,
/// or begins with an uppercase letter or digit.
fn is_start_clean(segments: &[AttachedSegment], start_idx: usize) -> bool {
    if start_idx == 0 {
        return true;
    }

    let gap =
        segments[start_idx].segment.start_ms - segments[start_idx - 1].segment.end_ms;
    if gap >= START_GAP_MS {
        return true;
    }

    segments[start_idx]
        .segment
        .text
        .trim_start()
        .chars()
        .next()
        .map(|c| c.is_uppercase() || c.is_ascii_digit())
        .unwrap_or(false)
}

/// A range ends clean on sentence-final punctuation, before a real pause,
/// or at the end of the transcript.
fn is_end_clean(segments: &[AttachedSegment], end_idx: usize) -> bool {
    let text = segments[end_idx].segment.text.trim_end();
    if text.ends_with('.') || text.ends_with('!') || text.ends_with('?') || text.ends_with("...") {
        return true;
    }

    match segments.get(end_idx + 1) {
        Some(next) => next.segment.start_ms - segments[end_idx].segment.end_ms >= END_GAP_MS,
        None => true,
    }
}
