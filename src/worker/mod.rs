//! Task driver: retry classification, backoff and terminal error recording.
//!
//! The task body never raises to signal a retry; it returns an explicit
//! outcome and the surrounding scheduler decides what to do with it. The
//! bundled `run_with_retries` driver is what the CLI uses; a broker-fed
//! deployment would requeue on `Retry` instead of sleeping in place.

use rand::Rng;
use std::time::Duration;
use tracing::{error, warn};

use crate::config::Settings;
use crate::suggestion::{suggest_clips, SuggestDeps, SuggestOptions, SuggestReport, SuggestionError};

/// Outcome of one execution attempt.
#[derive(Debug)]
pub enum TaskOutcome {
    Done(SuggestReport),
    /// Transient failure; run again after the delay.
    Retry { delay: Duration, attempt: u32 },
    /// Recorded on the sermon row and surfaced for dead-lettering.
    Fatal { message: String },
}

/// Transient errors worth retrying: I/O, transport, lock contention and
/// timeouts. Input errors and anything unrecognised are terminal.
pub fn is_retryable(error: &anyhow::Error) -> bool {
    for cause in error.chain() {
        if cause.downcast_ref::<std::io::Error>().is_some() {
            return true;
        }

        if let Some(sql_error) = cause.downcast_ref::<rusqlite::Error>() {
            if matches!(
                sql_error.sqlite_error_code(),
                Some(rusqlite::ErrorCode::DatabaseBusy)
                    | Some(rusqlite::ErrorCode::DatabaseLocked)
            ) {
                return true;
            }
        }

        if let Some(http_error) = cause.downcast_ref::<reqwest::Error>() {
            if http_error.is_timeout() || http_error.is_connect() {
                return true;
            }
        }
    }

    false
}

/// Exponential backoff with uniform jitter, capped at the configured
/// maximum.
pub fn backoff_delay(settings: &Settings, retries: u32) -> Duration {
    let exponent = retries.min(16) as i32;
    let base = settings.worker_retry_backoff_base * 2f64.powi(exponent);
    let capped = base.min(settings.worker_retry_backoff_max).max(0.0);

    let jitter = if settings.worker_retry_jitter > 0.0 {
        rand::thread_rng().gen_range(0.0..settings.worker_retry_jitter)
    } else {
        0.0
    };

    Duration::from_secs_f64(capped + jitter)
}

/// Run the suggestion task once and classify the result.
pub async fn execute_once(
    deps: &SuggestDeps,
    sermon_id: i64,
    options: SuggestOptions,
    attempt: u32,
) -> TaskOutcome {
    match suggest_clips(deps, sermon_id, options).await {
        Ok(report) => TaskOutcome::Done(report),
        Err(err) => {
            if is_retryable(&err) && attempt < deps.settings.worker_max_retries {
                let delay = backoff_delay(&deps.settings, attempt);
                warn!(
                    sermon_id,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "transient failure, will retry"
                );
                return TaskOutcome::Retry {
                    delay,
                    attempt: attempt + 1,
                };
            }

            error!(sermon_id, error = ?err, "suggestion task failed");
            let message = format!("{err:#}");

            // A missing sermon row has nowhere to record the failure.
            let missing = matches!(
                err.downcast_ref::<SuggestionError>(),
                Some(SuggestionError::SermonNotFound(_))
            );
            if !missing {
                if let Err(store_err) = deps.store.record_error(sermon_id, &message).await {
                    error!(sermon_id, error = ?store_err, "failed to record task error");
                }
            }

            TaskOutcome::Fatal { message }
        }
    }
}

/// Local driver: loop over `execute_once`, sleeping through retry delays.
pub async fn run_with_retries(
    deps: &SuggestDeps,
    sermon_id: i64,
    options: SuggestOptions,
) -> TaskOutcome {
    let mut attempt = 0u32;
    loop {
        match execute_once(deps, sermon_id, options.clone(), attempt).await {
            TaskOutcome::Retry {
                delay,
                attempt: next,
            } => {
                tokio::time::sleep(delay).await;
                attempt = next;
            }
            outcome => return outcome,
        }
    }
}
