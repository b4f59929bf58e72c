//! Pairing transcript segments with their stored embeddings.

use std::collections::HashMap;

use super::types::AttachedSegment;
use crate::models::TranscriptSegment;

/// Attach embeddings to segments by id.
///
/// Returns the attached sequence and whether every segment received an
/// embedding. Partial attachment is fine; downstream stages that need
/// complete coverage check the flag and degrade.
pub fn attach_embeddings(
    segments: Vec<TranscriptSegment>,
    mut embeddings: HashMap<i64, Vec<f32>>,
) -> (Vec<AttachedSegment>, bool) {
    let mut complete = true;
    let attached = segments
        .into_iter()
        .map(|segment| {
            let embedding = embeddings.remove(&segment.id);
            if embedding.is_none() {
                complete = false;
            }
            AttachedSegment { segment, embedding }
        })
        .collect();

    (attached, complete)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segment(id: i64, start_ms: i64, end_ms: i64) -> TranscriptSegment {
        TranscriptSegment {
            id,
            sermon_id: 1,
            start_ms,
            end_ms,
            text: format!("segmento {id}"),
            deleted_at: None,
        }
    }

    #[test]
    fn test_complete_attachment() {
        let segments = vec![segment(1, 0, 1000), segment(2, 1000, 2000)];
        let embeddings =
            HashMap::from([(1, vec![1.0, 0.0]), (2, vec![0.0, 1.0]), (3, vec![1.0, 1.0])]);

        let (attached, complete) = attach_embeddings(segments, embeddings);
        assert!(complete);
        assert_eq!(attached.len(), 2);
        assert_eq!(attached[0].embedding.as_deref(), Some(&[1.0, 0.0][..]));
    }

    #[test]
    fn test_partial_attachment_reports_incomplete() {
        let segments = vec![segment(1, 0, 1000), segment(2, 1000, 2000)];
        let embeddings = HashMap::from([(2, vec![0.0, 1.0])]);

        let (attached, complete) = attach_embeddings(segments, embeddings);
        assert!(!complete);
        assert!(attached[0].embedding.is_none());
        assert!(attached[1].embedding.is_some());
    }
}
