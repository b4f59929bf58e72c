use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Row};
use std::collections::HashMap;

use crate::models::{
    Clip, ClipDraft, ClipSource, ClipStatus, LlmTrim, Sermon, SermonStatus, TranscriptSegment,
};
use crate::storage::{blob_to_vector, vector_to_blob, Database};

/// Storage operations for sermons, transcripts and clip suggestions.
pub struct SermonStore {
    db: Database,
}

impl SermonStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Fetch a sermon row, deleted or not. Callers decide how to treat
    /// `deleted_at`.
    pub async fn get_sermon(&self, sermon_id: i64) -> Result<Option<Sermon>> {
        self.db
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, title, preacher, duration_sec, status, progress,
                            error_message, created_at, updated_at, deleted_at
                     FROM sermons WHERE id = ?1",
                )?;

                let sermon = stmt.query_row([sermon_id], row_to_sermon);
                match sermon {
                    Ok(s) => Ok(Some(s)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
    }

    /// Load all non-deleted segments for a sermon, ordered by start_ms.
    pub async fn load_segments(&self, sermon_id: i64) -> Result<Vec<TranscriptSegment>> {
        self.db
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, sermon_id, start_ms, end_ms, text, deleted_at
                     FROM transcript_segments
                     WHERE sermon_id = ?1 AND deleted_at IS NULL
                     ORDER BY start_ms ASC",
                )?;

                let segments = stmt
                    .query_map([sermon_id], |row| {
                        Ok(TranscriptSegment {
                            id: row.get(0)?,
                            sermon_id: row.get(1)?,
                            start_ms: row.get(2)?,
                            end_ms: row.get(3)?,
                            text: row.get(4)?,
                            deleted_at: row.get(5)?,
                        })
                    })?
                    .collect::<std::result::Result<Vec<_>, _>>()?;

                Ok(segments)
            })
            .await
    }

    /// Load stored embeddings keyed by segment id.
    ///
    /// Rows whose vector does not match `dimension` are dropped, so stale
    /// rows written before a model migration behave as missing.
    pub async fn load_embeddings(
        &self,
        sermon_id: i64,
        dimension: usize,
    ) -> Result<HashMap<i64, Vec<f32>>> {
        self.db
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT segment_id, embedding
                     FROM transcript_embeddings
                     WHERE sermon_id = ?1 AND deleted_at IS NULL",
                )?;

                let mut embeddings = HashMap::new();
                let rows = stmt.query_map([sermon_id], |row| {
                    Ok((row.get::<_, i64>(0)?, row.get::<_, Vec<u8>>(1)?))
                })?;

                for row in rows {
                    let (segment_id, blob) = row?;
                    let vector = blob_to_vector(&blob)
                        .with_context(|| format!("Corrupt embedding for segment {segment_id}"))?;
                    if vector.len() == dimension {
                        embeddings.insert(segment_id, vector);
                    }
                }

                Ok(embeddings)
            })
            .await
    }

    /// Store one embedding per segment, replacing any previous row.
    pub async fn save_embedding(
        &self,
        sermon_id: i64,
        segment_id: i64,
        text: String,
        vector: Vec<f32>,
    ) -> Result<()> {
        let now = Utc::now();
        self.db
            .call(move |conn| {
                let tx = conn.transaction()?;
                tx.execute(
                    "UPDATE transcript_embeddings
                     SET deleted_at = ?1, updated_at = ?1
                     WHERE segment_id = ?2 AND deleted_at IS NULL",
                    params![now, segment_id],
                )?;
                tx.execute(
                    "INSERT INTO transcript_embeddings
                        (sermon_id, segment_id, text, embedding, created_at, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
                    params![sermon_id, segment_id, text, vector_to_blob(&vector), now],
                )?;
                tx.commit().context("Failed to commit embedding")?;
                Ok(())
            })
            .await
    }

    /// Advance the progress indicator; leaves status untouched.
    pub async fn set_progress(&self, sermon_id: i64, progress: i64) -> Result<()> {
        let now = Utc::now();
        self.db
            .execute(
                "UPDATE sermons SET progress = ?1, updated_at = ?2 WHERE id = ?3",
                (progress.clamp(0, 100), now, sermon_id),
            )
            .await?;
        Ok(())
    }

    /// Clear any stale error from a previous failed run.
    pub async fn clear_error(&self, sermon_id: i64) -> Result<()> {
        let now = Utc::now();
        self.db
            .execute(
                "UPDATE sermons SET error_message = NULL, updated_at = ?1 WHERE id = ?2",
                (now, sermon_id),
            )
            .await?;
        Ok(())
    }

    /// Record a terminal failure: status flips to error and the message is
    /// truncated to 1000 characters.
    pub async fn record_error(&self, sermon_id: i64, message: &str) -> Result<()> {
        let truncated: String = message.chars().take(1000).collect();
        let now = Utc::now();
        self.db
            .execute(
                "UPDATE sermons
                 SET status = ?1, error_message = ?2, updated_at = ?3
                 WHERE id = ?4",
                (SermonStatus::Error.as_str(), truncated, now, sermon_id),
            )
            .await?;
        Ok(())
    }

    /// Mark a successful run: status = suggested, progress = 100, error
    /// cleared.
    pub async fn mark_suggested(&self, sermon_id: i64) -> Result<()> {
        let now = Utc::now();
        self.db
            .execute(
                "UPDATE sermons
                 SET status = ?1, progress = 100, error_message = NULL, updated_at = ?2
                 WHERE id = ?3",
                (SermonStatus::Suggested.as_str(), now, sermon_id),
            )
            .await?;
        Ok(())
    }

    /// Atomically replace the auto suggestion set for a sermon.
    ///
    /// The prior non-deleted auto clips are soft-deleted and the new set is
    /// inserted inside one transaction; every stamp uses the single
    /// `run_start` snapshot so observers never see the sets interleaved.
    pub async fn replace_auto_suggestions(
        &self,
        sermon_id: i64,
        drafts: Vec<ClipDraft>,
        run_start: DateTime<Utc>,
    ) -> Result<usize> {
        self.db
            .call(move |conn| {
                let tx = conn.transaction()?;

                tx.execute(
                    "UPDATE clips
                     SET deleted_at = ?1, updated_at = ?1
                     WHERE sermon_id = ?2 AND source = ?3 AND deleted_at IS NULL",
                    params![run_start, sermon_id, ClipSource::Auto.as_str()],
                )?;

                let mut inserted = 0usize;
                for draft in &drafts {
                    let llm_trim_json = draft
                        .llm_trim
                        .as_ref()
                        .map(serde_json::to_string)
                        .transpose()
                        .context("Failed to serialize llm_trim")?;
                    let usage = draft.token_usage.as_ref();

                    tx.execute(
                        "INSERT INTO clips
                            (sermon_id, start_ms, end_ms, source, score, rationale,
                             use_llm, llm_trim, llm_trim_confidence, trim_applied,
                             llm_prompt_tokens, llm_completion_tokens, llm_total_tokens,
                             llm_cache_hit_tokens, llm_cache_miss_tokens,
                             llm_estimated_cost, llm_method, status,
                             created_at, updated_at)
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10,
                                 ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?19)",
                        params![
                            sermon_id,
                            draft.start_ms,
                            draft.end_ms,
                            ClipSource::Auto.as_str(),
                            draft.score,
                            draft.rationale,
                            draft.use_llm,
                            llm_trim_json,
                            draft.llm_trim_confidence,
                            draft.trim_applied,
                            usage.map(|u| u.prompt_tokens),
                            usage.map(|u| u.completion_tokens),
                            usage.map(|u| u.total_tokens),
                            usage.and_then(|u| u.cache_hit_tokens),
                            usage.and_then(|u| u.cache_miss_tokens),
                            usage.map(|u| u.estimated_cost_usd),
                            draft.llm_method,
                            ClipStatus::Pending.as_str(),
                            run_start,
                        ],
                    )?;
                    inserted += 1;
                }

                tx.commit().context("Failed to commit suggestion set")?;
                Ok(inserted)
            })
            .await
    }

    /// The current (non-deleted) auto suggestion set, best score first.
    pub async fn active_auto_clips(&self, sermon_id: i64) -> Result<Vec<Clip>> {
        self.db
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, sermon_id, start_ms, end_ms, source, score, rationale,
                            use_llm, llm_trim, llm_trim_confidence, trim_applied,
                            llm_prompt_tokens, llm_completion_tokens, llm_total_tokens,
                            llm_cache_hit_tokens, llm_cache_miss_tokens,
                            llm_estimated_cost, llm_method, status,
                            created_at, updated_at, deleted_at
                     FROM clips
                     WHERE sermon_id = ?1 AND source = ?2 AND deleted_at IS NULL
                     ORDER BY score DESC, start_ms ASC",
                )?;

                let clips = stmt
                    .query_map(params![sermon_id, ClipSource::Auto.as_str()], row_to_clip)?
                    .collect::<std::result::Result<Vec<_>, _>>()?;

                Ok(clips)
            })
            .await
    }
}

fn row_to_sermon(row: &Row<'_>) -> rusqlite::Result<Sermon> {
    let status_raw: String = row.get(4)?;
    Ok(Sermon {
        id: row.get(0)?,
        title: row.get(1)?,
        preacher: row.get(2)?,
        duration_sec: row.get(3)?,
        status: SermonStatus::parse(&status_raw).unwrap_or(SermonStatus::Error),
        progress: row.get(5)?,
        error_message: row.get(6)?,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
        deleted_at: row.get(9)?,
    })
}

fn row_to_clip(row: &Row<'_>) -> rusqlite::Result<Clip> {
    let source_raw: String = row.get(4)?;
    let trim_raw: Option<String> = row.get(8)?;
    let status_raw: String = row.get(18)?;
    Ok(Clip {
        id: row.get(0)?,
        sermon_id: row.get(1)?,
        start_ms: row.get(2)?,
        end_ms: row.get(3)?,
        source: ClipSource::parse(&source_raw).unwrap_or(ClipSource::Manual),
        score: row.get(5)?,
        rationale: row.get(6)?,
        use_llm: row.get(7)?,
        llm_trim: trim_raw.and_then(|raw| serde_json::from_str::<LlmTrim>(&raw).ok()),
        llm_trim_confidence: row.get(9)?,
        trim_applied: row.get(10)?,
        llm_prompt_tokens: row.get(11)?,
        llm_completion_tokens: row.get(12)?,
        llm_total_tokens: row.get(13)?,
        llm_cache_hit_tokens: row.get(14)?,
        llm_cache_miss_tokens: row.get(15)?,
        llm_estimated_cost: row.get(16)?,
        llm_method: row.get(17)?,
        status: ClipStatus::parse(&status_raw).unwrap_or(ClipStatus::Pending),
        created_at: row.get(19)?,
        updated_at: row.get(20)?,
        deleted_at: row.get(21)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    async fn store_with_sermon() -> (SermonStore, i64, NamedTempFile) {
        let temp_file = NamedTempFile::new().unwrap();
        let db = Database::new(temp_file.path()).await.unwrap();
        db.migrate().await.unwrap();

        let now = Utc::now();
        db.execute(
            "INSERT INTO sermons (title, status, progress, created_at, updated_at)
             VALUES ('Test sermon', 'transcribed', 0, ?1, ?1)",
            (now,),
        )
        .await
        .unwrap();

        (SermonStore::new(db), 1, temp_file)
    }

    fn draft(start_ms: i64, end_ms: i64, score: f64) -> ClipDraft {
        ClipDraft {
            start_ms,
            end_ms,
            score,
            rationale: "words=40 gap_ms=0 hook=0.35 start_clean=true end_clean=true".to_string(),
            use_llm: false,
            llm_trim: None,
            llm_trim_confidence: None,
            trim_applied: false,
            token_usage: None,
            llm_method: None,
        }
    }

    #[tokio::test]
    async fn test_get_sermon_missing() {
        let (store, _, _file) = store_with_sermon().await;
        assert!(store.get_sermon(99).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_segments_are_ordered_and_filtered() {
        let (store, sermon_id, _file) = store_with_sermon().await;
        let now = Utc::now();

        store
            .db
            .execute(
                "INSERT INTO transcript_segments
                    (sermon_id, start_ms, end_ms, text, created_at, updated_at, deleted_at)
                 VALUES
                    (?1, 40000, 80000, 'segundo', ?2, ?2, NULL),
                    (?1, 0, 39000, 'primero', ?2, ?2, NULL),
                    (?1, 80000, 90000, 'borrado', ?2, ?2, ?2)",
                (sermon_id, now),
            )
            .await
            .unwrap();

        let segments = store.load_segments(sermon_id).await.unwrap();
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].text, "primero");
        assert_eq!(segments[1].text, "segundo");
    }

    #[tokio::test]
    async fn test_embedding_dimension_filter() {
        let (store, sermon_id, _file) = store_with_sermon().await;

        store
            .save_embedding(sermon_id, 1, "a".to_string(), vec![1.0, 0.0, 0.0])
            .await
            .unwrap();
        store
            .save_embedding(sermon_id, 2, "b".to_string(), vec![1.0, 0.0])
            .await
            .unwrap();

        let embeddings = store.load_embeddings(sermon_id, 3).await.unwrap();
        assert!(embeddings.contains_key(&1));
        assert!(!embeddings.contains_key(&2));
    }

    #[tokio::test]
    async fn test_replace_auto_suggestions_soft_deletes_prior_set() {
        let (store, sermon_id, _file) = store_with_sermon().await;

        let first_run = Utc::now();
        let inserted = store
            .replace_auto_suggestions(
                sermon_id,
                vec![draft(0, 45000, 80.0), draft(60000, 100000, 61.5)],
                first_run,
            )
            .await
            .unwrap();
        assert_eq!(inserted, 2);

        let second_run = Utc::now();
        store
            .replace_auto_suggestions(sermon_id, vec![draft(10000, 50000, 72.0)], second_run)
            .await
            .unwrap();

        let active = store.active_auto_clips(sermon_id).await.unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].start_ms, 10000);
        assert_eq!(active[0].created_at, second_run);

        let shadowed: i64 = store
            .db
            .call(move |conn| {
                let count = conn.query_row(
                    "SELECT COUNT(*) FROM clips
                     WHERE sermon_id = ?1 AND deleted_at IS NOT NULL
                       AND deleted_at = updated_at",
                    [sermon_id],
                    |row| row.get(0),
                )?;
                Ok(count)
            })
            .await
            .unwrap();
        assert_eq!(shadowed, 2);
    }

    #[tokio::test]
    async fn test_record_error_truncates_message() {
        let (store, sermon_id, _file) = store_with_sermon().await;

        let long_message = "x".repeat(1500);
        store.record_error(sermon_id, &long_message).await.unwrap();

        let sermon = store.get_sermon(sermon_id).await.unwrap().unwrap();
        assert_eq!(sermon.status, SermonStatus::Error);
        assert_eq!(sermon.error_message.unwrap().len(), 1000);
    }

    #[tokio::test]
    async fn test_mark_suggested_clears_error() {
        let (store, sermon_id, _file) = store_with_sermon().await;

        store.record_error(sermon_id, "boom").await.unwrap();
        store.mark_suggested(sermon_id).await.unwrap();

        let sermon = store.get_sermon(sermon_id).await.unwrap().unwrap();
        assert_eq!(sermon.status, SermonStatus::Suggested);
        assert_eq!(sermon.progress, 100);
        assert!(sermon.error_message.is_none());
    }
}
