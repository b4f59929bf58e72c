//! Remote LLM scoring of clip candidates.

pub mod chat;

pub use chat::ChatCompletionsScorer;

use serde::Serialize;
use thiserror::Error;

use crate::models::{LlmTrim, TokenUsage};

/// One candidate submitted for scoring.
#[derive(Debug, Clone, Serialize)]
pub struct ScoreRequest {
    pub id: String,
    pub text: String,
    pub approx_duration_sec: f64,
}

/// One validated scoring result.
#[derive(Debug, Clone)]
pub struct ScoredClip {
    pub id: String,
    /// Clamped to [0, 100].
    pub score: f64,
    pub reason: String,
    pub trim: Option<LlmTrim>,
    pub trim_confidence: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct ScoreResponse {
    pub clips: Vec<ScoredClip>,
    pub token_usage: TokenUsage,
}

/// Any of these downgrades the run to heuristic-only scoring; none of them
/// is terminal for the task.
#[derive(Error, Debug)]
pub enum LlmClientError {
    #[error("LLM scorer not configured: {0}")]
    NotConfigured(&'static str),

    #[error("LLM request failed: {0}")]
    Request(String),

    #[error("LLM HTTP error {status}")]
    Http { status: u16 },

    #[error("LLM response invalid JSON: {0}")]
    InvalidJson(String),

    #[error("LLM response missing {0}")]
    MissingContent(&'static str),

    #[error("LLM returned {got} usable scores for {expected} candidates")]
    Incomplete { expected: usize, got: usize },
}

/// Scoring capability injected into the pipeline.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait ClipScorer: Send + Sync {
    /// Score a batch of candidates in one remote call.
    async fn score(&self, candidates: &[ScoreRequest]) -> Result<ScoreResponse, LlmClientError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scorer_contract_through_trait_object() {
        let mut mock = MockClipScorer::new();
        mock.expect_score().returning(|candidates| {
            Ok(ScoreResponse {
                clips: candidates
                    .iter()
                    .map(|request| ScoredClip {
                        id: request.id.clone(),
                        score: 50.0,
                        reason: String::new(),
                        trim: None,
                        trim_confidence: None,
                    })
                    .collect(),
                token_usage: TokenUsage::default(),
            })
        });

        let scorer: &dyn ClipScorer = &mock;
        let requests = vec![ScoreRequest {
            id: "c0".to_string(),
            text: "hola mundo".to_string(),
            approx_duration_sec: 45.0,
        }];

        let response = scorer.score(&requests).await.unwrap();
        assert_eq!(response.clips.len(), 1);
        assert_eq!(response.clips[0].id, "c0");
    }
}
