//! Worker configuration loaded from the environment.

use std::env;
use std::time::Duration;

/// Runtime settings for the suggestion worker.
///
/// Every field has a default suitable for local development; environment
/// variables (upper-cased field names) override them. `dotenv` is loaded by
/// the binary before `from_env` runs.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Path to the SQLite database file.
    pub database_path: String,

    /// Default for the `use_llm` task parameter.
    pub use_llm_for_clip_suggestions: bool,

    /// Remote chat-completions scorer endpoint.
    pub llm_api_key: Option<String>,
    pub llm_base_url: Option<String>,
    pub llm_model: Option<String>,
    /// Connect + read timeout for the scorer call, in seconds.
    pub llm_timeout_sec: u64,

    /// Remote embedding provider endpoint (reference vectors for the
    /// semantic classifier). Optional; the classifier degrades gracefully.
    pub embedding_api_key: Option<String>,
    pub embedding_base_url: Option<String>,
    pub embedding_model: Option<String>,
    /// Dimensionality of stored transcript embeddings. Rows with a
    /// different dimension are treated as missing.
    pub embedding_dimension: usize,

    /// Retry attempt cap for a single task.
    pub worker_max_retries: u32,
    /// Backoff parameters, in seconds.
    pub worker_retry_backoff_base: f64,
    pub worker_retry_backoff_max: f64,
    pub worker_retry_jitter: f64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database_path: "sermonclip.db".to_string(),
            use_llm_for_clip_suggestions: false,
            llm_api_key: None,
            llm_base_url: None,
            llm_model: None,
            llm_timeout_sec: 60,
            embedding_api_key: None,
            embedding_base_url: None,
            embedding_model: None,
            embedding_dimension: 384,
            worker_max_retries: 3,
            worker_retry_backoff_base: 2.0,
            worker_retry_backoff_max: 600.0,
            worker_retry_jitter: 1.0,
        }
    }
}

impl Settings {
    /// Build settings from the process environment, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            database_path: env_str("DATABASE_PATH").unwrap_or(defaults.database_path),
            use_llm_for_clip_suggestions: env_bool("USE_LLM_FOR_CLIP_SUGGESTIONS")
                .unwrap_or(defaults.use_llm_for_clip_suggestions),
            llm_api_key: env_str("LLM_API_KEY"),
            llm_base_url: env_str("LLM_BASE_URL"),
            llm_model: env_str("LLM_MODEL"),
            llm_timeout_sec: env_parse("LLM_TIMEOUT_SEC").unwrap_or(defaults.llm_timeout_sec),
            embedding_api_key: env_str("EMBEDDING_API_KEY"),
            embedding_base_url: env_str("EMBEDDING_BASE_URL"),
            embedding_model: env_str("EMBEDDING_MODEL"),
            embedding_dimension: env_parse("EMBEDDING_DIMENSION")
                .unwrap_or(defaults.embedding_dimension),
            worker_max_retries: env_parse("WORKER_MAX_RETRIES")
                .unwrap_or(defaults.worker_max_retries),
            worker_retry_backoff_base: env_parse("WORKER_RETRY_BACKOFF_BASE")
                .unwrap_or(defaults.worker_retry_backoff_base),
            worker_retry_backoff_max: env_parse("WORKER_RETRY_BACKOFF_MAX")
                .unwrap_or(defaults.worker_retry_backoff_max),
            worker_retry_jitter: env_parse("WORKER_RETRY_JITTER")
                .unwrap_or(defaults.worker_retry_jitter),
        }
    }

    /// True when the scorer endpoint is fully configured.
    pub fn llm_configured(&self) -> bool {
        non_blank(&self.llm_api_key) && non_blank(&self.llm_base_url) && non_blank(&self.llm_model)
    }

    /// True when the embedding provider endpoint is fully configured.
    pub fn embedding_configured(&self) -> bool {
        non_blank(&self.embedding_base_url) && non_blank(&self.embedding_model)
    }

    pub fn llm_timeout(&self) -> Duration {
        Duration::from_secs(self.llm_timeout_sec)
    }
}

fn non_blank(value: &Option<String>) -> bool {
    value.as_deref().map(|s| !s.trim().is_empty()).unwrap_or(false)
}

fn env_str(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.trim().is_empty())
}

fn env_bool(key: &str) -> Option<bool> {
    env_str(key).map(|s| matches!(s.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    env_str(key).and_then(|s| s.parse().ok())
}
