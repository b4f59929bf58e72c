//! Types and tuning constants for the clip suggestion pipeline.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::{LlmTrim, TranscriptSegment};

/// Clip duration bounds, in milliseconds.
pub const MIN_CLIP_MS: i64 = 30_000;
pub const MAX_CLIP_MS: i64 = 120_000;

/// A silence longer than this always splits the transcript.
pub const LONG_GAP_MS: i64 = 1_500;

/// Minimum preceding/following silence for a boundary to count as clean.
pub const START_GAP_MS: i64 = 500;
pub const END_GAP_MS: i64 = 700;

/// Adjacent segments less similar than this start a new window.
pub const SEMANTIC_BREAKPOINT_SIMILARITY: f32 = 0.5;

/// Hook signal sum at or above this qualifies as a hook.
pub const HOOK_MIN_SCORE: f64 = 0.30;

/// Only the best candidates are type-classified, to bound cost.
pub const SEMANTIC_TYPE_MAX: usize = 200;

/// Batch size for the remote scorer.
pub const LLM_MAX_CANDIDATES: usize = 15;

/// Trims below this confidence are ignored.
pub const LLM_TRIM_MIN_CONFIDENCE: f64 = 0.8;

/// Score fusion weights when the LLM path succeeded.
pub const HEURISTIC_FUSE_WEIGHT: f64 = 0.3;
pub const LLM_FUSE_WEIGHT: f64 = 0.7;

/// Candidates overlapping an accepted one beyond this ratio are dropped.
pub const MAX_OVERLAP_RATIO: f64 = 0.6;

/// Only the best candidates are centroid-deduped, to bound cost.
pub const SEMANTIC_DEDUPE_MAX: usize = 200;

/// Centroids at least this similar are considered duplicates.
pub const SEMANTIC_DEDUPE_SIMILARITY: f32 = 0.86;

/// Size cap of the persisted suggestion set.
pub const MAX_SUGGESTIONS: usize = 15;

/// Terminal input failures of the suggestion task.
#[derive(Error, Debug)]
pub enum SuggestionError {
    #[error("Sermon {0} not found")]
    SermonNotFound(i64),

    #[error("Sermon {0} has no transcript segments")]
    EmptyTranscript(i64),

    #[error("No clip candidates could be built for sermon {0}")]
    NoCandidates(i64),
}

/// A transcript segment paired with its stored embedding, when present.
#[derive(Debug, Clone)]
pub struct AttachedSegment {
    pub segment: TranscriptSegment,
    pub embedding: Option<Vec<f32>>,
}

/// Narrative role of a candidate, decided by embedding similarity against
/// fixed exemplar sentences.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SemanticType {
    Exposition,
    Illustration,
    Application,
    Conclusion,
}

impl SemanticType {
    pub fn label(&self) -> &'static str {
        match self {
            SemanticType::Exposition => "exposition",
            SemanticType::Illustration => "illustration",
            SemanticType::Application => "application",
            SemanticType::Conclusion => "conclusion",
        }
    }

    /// Score multiplier: applicable moments clip best, dense exposition
    /// worst.
    pub fn multiplier(&self) -> f64 {
        match self {
            SemanticType::Application => 1.5,
            SemanticType::Illustration => 1.2,
            SemanticType::Conclusion => 1.0,
            SemanticType::Exposition => 0.7,
        }
    }
}

/// A proposed clip over a contiguous run of segments. Built by the
/// candidate builder, enriched in place by every later stage, never
/// persisted as-is.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub start_idx: usize,
    pub end_idx: usize,
    pub start_ms: i64,
    pub end_ms: i64,
    /// Sum of the internal silences longer than LONG_GAP_MS.
    pub gap_ms: i64,
    pub start_clean: bool,
    pub end_clean: bool,
    pub text: String,
    pub hook_score: f64,
    pub heuristic_score: f64,
    pub rationale: String,
    pub semantic_type: Option<SemanticType>,
    pub type_score: Option<f64>,
    pub centroid: Option<Vec<f32>>,
    pub llm_score: Option<f64>,
    pub llm_reason: Option<String>,
    pub llm_trim: Option<LlmTrim>,
    pub llm_trim_confidence: Option<f64>,
    pub trim_applied: bool,
    /// Working score: heuristic at first, then type-adjusted, then fused.
    pub score: f64,
}

impl Candidate {
    pub fn duration_ms(&self) -> i64 {
        self.end_ms - self.start_ms
    }
}
