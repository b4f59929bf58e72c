//! The clip suggestion pipeline.
//!
//! One batch task per sermon: load the transcript, split it into coherent
//! windows, enumerate duration-bounded candidates, score them with
//! heuristics and optional LLM signals, dedupe, and atomically replace the
//! persisted suggestion set.

pub mod attach;
pub mod breakpoints;
pub mod candidates;
pub mod dedupe;
pub mod fuse;
pub mod heuristics;
pub mod semantic;
pub mod trim;
pub mod types;

pub use types::*;

use anyhow::Result;
use chrono::Utc;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::Settings;
use crate::llm::{ClipScorer, LlmClientError, ScoreRequest, ScoredClip};
use crate::models::{ClipDraft, TokenUsage};
use crate::storage::SermonStore;
use attach::attach_embeddings;
use breakpoints::detect_breakpoints;
use candidates::build_with_fallback;
use dedupe::{dedupe_by_centroid, dedupe_by_overlap, sort_by_score_desc};
use fuse::fuse_llm_scores;
use heuristics::score_candidates;
use semantic::{apply_semantic_types, attach_centroids, CentroidIndex, SemanticClassifier};
use trim::apply_trim;

/// Capabilities the task consumes. Everything here is shared read-only
/// across concurrent tasks.
pub struct SuggestDeps {
    pub store: SermonStore,
    pub settings: Settings,
    pub scorer: Option<Arc<dyn ClipScorer>>,
    pub classifier: Option<Arc<SemanticClassifier>>,
}

#[derive(Debug, Clone, Default)]
pub struct SuggestOptions {
    /// Overrides `Settings::use_llm_for_clip_suggestions` when set.
    pub use_llm: Option<bool>,
    /// Free-form label recorded on the persisted clips.
    pub llm_method: Option<String>,
}

/// Task result surfaced to the scheduler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SuggestReport {
    Completed { sermon_id: i64, suggestions: usize },
    /// The sermon was soft-deleted before or during the run; nothing was
    /// written.
    Deleted { sermon_id: i64 },
}

impl SuggestReport {
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            SuggestReport::Completed {
                sermon_id,
                suggestions,
            } => json!({"sermon_id": sermon_id, "suggestions": suggestions}),
            SuggestReport::Deleted { sermon_id } => {
                json!({"sermon_id": sermon_id, "status": "deleted"})
            }
        }
    }
}

const DEFAULT_LLM_METHOD: &str = "candidate_scoring";

/// Produce and persist the auto suggestion set for one sermon.
pub async fn suggest_clips(
    deps: &SuggestDeps,
    sermon_id: i64,
    options: SuggestOptions,
) -> Result<SuggestReport> {
    let run_start = Utc::now();

    let sermon = deps
        .store
        .get_sermon(sermon_id)
        .await?
        .ok_or(SuggestionError::SermonNotFound(sermon_id))?;
    if sermon.is_deleted() {
        info!(sermon_id, "sermon already deleted, skipping");
        return Ok(SuggestReport::Deleted { sermon_id });
    }

    deps.store.clear_error(sermon_id).await?;
    deps.store.set_progress(sermon_id, 10).await?;

    let segments = deps.store.load_segments(sermon_id).await?;
    if segments.is_empty() {
        return Err(SuggestionError::EmptyTranscript(sermon_id).into());
    }

    let embeddings = deps
        .store
        .load_embeddings(sermon_id, deps.settings.embedding_dimension)
        .await?;
    let (attached, embeddings_complete) = attach_embeddings(segments, embeddings);
    if !embeddings_complete {
        info!(
            sermon_id,
            "embeddings incomplete, semantic stages disabled"
        );
    }

    let breakpoints = detect_breakpoints(&attached);
    let mut pool = build_with_fallback(&attached, &breakpoints);
    if pool.is_empty() {
        return Err(SuggestionError::NoCandidates(sermon_id).into());
    }
    info!(
        sermon_id,
        windows = breakpoints.len() - 1,
        candidates = pool.len(),
        "candidate pool built"
    );
    deps.store.set_progress(sermon_id, 40).await?;

    score_candidates(&mut pool);

    let centroid_index = if embeddings_complete {
        CentroidIndex::build(&attached, deps.settings.embedding_dimension)
    } else {
        None
    };
    if let Some(index) = &centroid_index {
        attach_centroids(&mut pool, index);
        if let Some(classifier) = &deps.classifier {
            apply_semantic_types(&mut pool, classifier);
        }
    }
    deps.store.set_progress(sermon_id, 60).await?;

    let use_llm = options
        .use_llm
        .unwrap_or(deps.settings.use_llm_for_clip_suggestions);
    let mut llm_used = false;
    let mut token_usage: Option<TokenUsage> = None;

    if use_llm {
        match &deps.scorer {
            Some(scorer) => match run_llm_scoring(scorer.as_ref(), &mut pool).await {
                Ok(usage) => {
                    llm_used = true;
                    token_usage = Some(usage);

                    for candidate in pool.iter_mut() {
                        if apply_trim(candidate, &attached) {
                            if let Some(index) = &centroid_index {
                                candidate.centroid = Some(
                                    index.centroid(candidate.start_idx, candidate.end_idx),
                                );
                            }
                        }
                    }
                    fuse_llm_scores(&mut pool);
                }
                Err(error) => {
                    warn!(sermon_id, %error, "LLM scoring failed, downgrading to heuristics");
                }
            },
            None => {
                warn!(sermon_id, "LLM requested but scorer not configured");
            }
        }
    }
    deps.store.set_progress(sermon_id, 80).await?;

    let survivors = dedupe_by_centroid(dedupe_by_overlap(pool));

    // The sermon may have been deleted while we were scoring; re-read
    // before writing anything.
    let sermon = deps
        .store
        .get_sermon(sermon_id)
        .await?
        .ok_or(SuggestionError::SermonNotFound(sermon_id))?;
    if sermon.is_deleted() {
        info!(sermon_id, "sermon deleted mid-run, discarding suggestions");
        return Ok(SuggestReport::Deleted { sermon_id });
    }

    let llm_method = llm_used.then(|| {
        options
            .llm_method
            .clone()
            .unwrap_or_else(|| DEFAULT_LLM_METHOD.to_string())
    });
    let drafts: Vec<ClipDraft> = survivors
        .iter()
        .map(|candidate| ClipDraft {
            start_ms: candidate.start_ms,
            end_ms: candidate.end_ms,
            score: candidate.score.clamp(0.0, 100.0),
            rationale: candidate.rationale.clone(),
            use_llm: llm_used,
            llm_trim: candidate.llm_trim.clone(),
            llm_trim_confidence: candidate.llm_trim_confidence,
            trim_applied: candidate.trim_applied,
            token_usage: token_usage.clone(),
            llm_method: llm_method.clone(),
        })
        .collect();

    let inserted = deps
        .store
        .replace_auto_suggestions(sermon_id, drafts, run_start)
        .await?;
    deps.store.mark_suggested(sermon_id).await?;

    info!(sermon_id, suggestions = inserted, llm_used, "suggestions persisted");
    Ok(SuggestReport::Completed {
        sermon_id,
        suggestions: inserted,
    })
}

/// Send the best candidates to the scorer and fold the results in. On any
/// failure the pool is left unchanged so the heuristic path can continue.
async fn run_llm_scoring(
    scorer: &dyn ClipScorer,
    pool: &mut Vec<Candidate>,
) -> Result<TokenUsage, LlmClientError> {
    sort_by_score_desc(pool);
    let take = pool.len().min(LLM_MAX_CANDIDATES);

    let requests: Vec<ScoreRequest> = pool[..take]
        .iter()
        .enumerate()
        .map(|(i, candidate)| ScoreRequest {
            id: format!("c{i}"),
            text: candidate.text.clone(),
            approx_duration_sec: candidate.duration_ms() as f64 / 1000.0,
        })
        .collect();

    let response = scorer.score(&requests).await?;
    let mut by_id: HashMap<String, ScoredClip> = response
        .clips
        .into_iter()
        .map(|clip| (clip.id.clone(), clip))
        .collect();

    // Collect every assignment before touching the pool so a partial
    // response leaves no stale LLM fields behind.
    let mut assignments = Vec::with_capacity(take);
    for i in 0..take {
        match by_id.remove(&format!("c{i}")) {
            Some(result) => assignments.push(result),
            None => {
                return Err(LlmClientError::Incomplete {
                    expected: take,
                    got: assignments.len(),
                })
            }
        }
    }

    for (candidate, result) in pool[..take].iter_mut().zip(assignments) {
        candidate.llm_score = Some(result.score);
        candidate.llm_reason = (!result.reason.is_empty()).then_some(result.reason);
        candidate.llm_trim = result.trim;
        candidate.llm_trim_confidence = result.trim_confidence;
    }

    // Only the evaluated set continues down the LLM path; scores past this
    // point live on the fused scale.
    pool.truncate(take);
    Ok(response.token_usage)
}
