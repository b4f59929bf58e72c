//! sermonclip - Clip suggestion engine for long-form sermon recordings
//!
//! Given a timestamped transcript of a sermon, this worker produces a ranked,
//! deduplicated set of short clip candidates aligned to natural speech
//! boundaries, scored by a blend of linguistic heuristics and optional
//! remote LLM signals, and persisted as auto suggestions.

pub mod config;
pub mod embedding;
pub mod llm;
pub mod models;
pub mod storage;
pub mod suggestion;
pub mod worker;
