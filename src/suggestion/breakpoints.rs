//! Splitting the transcript into coherent windows.

use super::types::{AttachedSegment, LONG_GAP_MS, SEMANTIC_BREAKPOINT_SIMILARITY};
use crate::embedding::cosine_similarity;

/// Detect window boundaries in a non-empty segment sequence.
///
/// A boundary lands between segments i-1 and i when the silence between
/// them exceeds LONG_GAP_MS, or, failing that, when both carry embeddings
/// and their cosine similarity drops below the semantic threshold. The
/// result always starts with 0, ends with `segments.len()`, and is strictly
/// increasing.
pub fn detect_breakpoints(segments: &[AttachedSegment]) -> Vec<usize> {
    let mut breakpoints = vec![0];

    for i in 1..segments.len() {
        let gap = segments[i].segment.start_ms - segments[i - 1].segment.end_ms;
        if gap > LONG_GAP_MS {
            breakpoints.push(i);
            continue;
        }

        if let (Some(prev), Some(curr)) = (&segments[i - 1].embedding, &segments[i].embedding) {
            if cosine_similarity(prev, curr) < SEMANTIC_BREAKPOINT_SIMILARITY {
                breakpoints.push(i);
            }
        }
    }

    breakpoints.push(segments.len());
    breakpoints
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TranscriptSegment;

    fn attached(
        id: i64,
        start_ms: i64,
        end_ms: i64,
        embedding: Option<Vec<f32>>,
    ) -> AttachedSegment {
        AttachedSegment {
            segment: TranscriptSegment {
                id,
                sermon_id: 1,
                start_ms,
                end_ms,
                text: "texto".to_string(),
                deleted_at: None,
            },
            embedding,
        }
    }

    #[test]
    fn test_contiguous_segments_form_one_window() {
        let segments = vec![
            attached(1, 0, 10_000, None),
            attached(2, 10_200, 20_000, None),
            attached(3, 20_500, 30_000, None),
        ];

        assert_eq!(detect_breakpoints(&segments), vec![0, 3]);
    }

    #[test]
    fn test_long_gap_splits() {
        let segments = vec![
            attached(1, 0, 10_000, None),
            attached(2, 12_000, 20_000, None),
            attached(3, 20_400, 30_000, None),
        ];

        assert_eq!(detect_breakpoints(&segments), vec![0, 1, 3]);
    }

    #[test]
    fn test_semantic_shift_splits() {
        let segments = vec![
            attached(1, 0, 10_000, Some(vec![1.0, 0.0])),
            attached(2, 10_200, 20_000, Some(vec![0.0, 1.0])),
            attached(3, 20_400, 30_000, Some(vec![0.0, 1.0])),
        ];

        assert_eq!(detect_breakpoints(&segments), vec![0, 1, 3]);
    }

    #[test]
    fn test_missing_embeddings_fall_back_to_gap_rule() {
        let segments = vec![
            attached(1, 0, 10_000, Some(vec![1.0, 0.0])),
            attached(2, 10_200, 20_000, None),
        ];

        assert_eq!(detect_breakpoints(&segments), vec![0, 2]);
    }

    #[test]
    fn test_every_gap_long_isolates_each_segment() {
        let segments = vec![
            attached(1, 0, 10_000, None),
            attached(2, 20_000, 30_000, None),
            attached(3, 40_000, 80_000, None),
        ];

        assert_eq!(detect_breakpoints(&segments), vec![0, 1, 2, 3]);
    }
}
