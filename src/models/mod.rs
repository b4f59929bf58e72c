//! Persistent entities shared by the API and the worker.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle of a sermon from upload to suggestion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SermonStatus {
    Pending,
    Uploaded,
    Processing,
    Transcribed,
    Suggested,
    Embedded,
    Error,
}

impl SermonStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SermonStatus::Pending => "pending",
            SermonStatus::Uploaded => "uploaded",
            SermonStatus::Processing => "processing",
            SermonStatus::Transcribed => "transcribed",
            SermonStatus::Suggested => "suggested",
            SermonStatus::Embedded => "embedded",
            SermonStatus::Error => "error",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(SermonStatus::Pending),
            "uploaded" => Some(SermonStatus::Uploaded),
            "processing" => Some(SermonStatus::Processing),
            "transcribed" => Some(SermonStatus::Transcribed),
            "suggested" => Some(SermonStatus::Suggested),
            "embedded" => Some(SermonStatus::Embedded),
            "error" => Some(SermonStatus::Error),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClipStatus {
    Pending,
    Processing,
    Done,
    Error,
}

impl ClipStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClipStatus::Pending => "pending",
            ClipStatus::Processing => "processing",
            ClipStatus::Done => "done",
            ClipStatus::Error => "error",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(ClipStatus::Pending),
            "processing" => Some(ClipStatus::Processing),
            "done" => Some(ClipStatus::Done),
            "error" => Some(ClipStatus::Error),
            _ => None,
        }
    }
}

/// Who authored a clip: a user or the suggestion engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClipSource {
    Manual,
    Auto,
}

impl ClipSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClipSource::Manual => "manual",
            ClipSource::Auto => "auto",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "manual" => Some(ClipSource::Manual),
            "auto" => Some(ClipSource::Auto),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sermon {
    pub id: i64,
    pub title: Option<String>,
    pub preacher: Option<String>,
    pub duration_sec: Option<f64>,
    pub status: SermonStatus,
    pub progress: i64,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Sermon {
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

/// A timestamped utterance from the transcript.
///
/// Within a sermon, segments are uniquely ordered by `start_ms`; overlaps
/// may exist and are treated by half-open containment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptSegment {
    pub id: i64,
    pub sermon_id: i64,
    pub start_ms: i64,
    pub end_ms: i64,
    pub text: String,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl TranscriptSegment {
    pub fn duration_ms(&self) -> i64 {
        self.end_ms - self.start_ms
    }
}

/// Trim offsets proposed by the LLM, in seconds from each end.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmTrim {
    #[serde(default)]
    pub start_offset_sec: f64,
    #[serde(default)]
    pub end_offset_sec: f64,
    #[serde(default)]
    pub confidence: Option<f64>,
}

/// Token accounting extracted from one chat-completions response envelope.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: i64,
    pub completion_tokens: i64,
    pub output_tokens: i64,
    pub cache_hit_tokens: Option<i64>,
    pub cache_miss_tokens: Option<i64>,
    pub total_tokens: i64,
    pub estimated_cost_usd: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Clip {
    pub id: i64,
    pub sermon_id: i64,
    pub start_ms: i64,
    pub end_ms: i64,
    pub source: ClipSource,
    pub score: Option<f64>,
    pub rationale: Option<String>,
    pub use_llm: bool,
    pub llm_trim: Option<LlmTrim>,
    pub llm_trim_confidence: Option<f64>,
    pub trim_applied: bool,
    pub llm_prompt_tokens: Option<i64>,
    pub llm_completion_tokens: Option<i64>,
    pub llm_total_tokens: Option<i64>,
    pub llm_cache_hit_tokens: Option<i64>,
    pub llm_cache_miss_tokens: Option<i64>,
    pub llm_estimated_cost: Option<f64>,
    pub llm_method: Option<String>,
    pub status: ClipStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

/// Row values for a suggestion about to be inserted.
#[derive(Debug, Clone)]
pub struct ClipDraft {
    pub start_ms: i64,
    pub end_ms: i64,
    pub score: f64,
    pub rationale: String,
    pub use_llm: bool,
    pub llm_trim: Option<LlmTrim>,
    pub llm_trim_confidence: Option<f64>,
    pub trim_applied: bool,
    pub token_usage: Option<TokenUsage>,
    pub llm_method: Option<String>,
}
