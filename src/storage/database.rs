use anyhow::{Context, Result};
use rusqlite::{Connection, OpenFlags};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tokio::task;

/// Database connection manager for the suggestion worker.
///
/// One connection guarded by a mutex; each task owns the handle for its
/// lifetime and all blocking SQLite work runs on the blocking pool.
#[derive(Clone)]
pub struct Database {
    pub connection: Arc<Mutex<Connection>>,
}

impl Database {
    /// Create a new database connection
    pub async fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let path = db_path.as_ref().to_path_buf();

        let connection = task::spawn_blocking(move || -> Result<Connection> {
            let conn = Connection::open_with_flags(
                &path,
                OpenFlags::SQLITE_OPEN_CREATE | OpenFlags::SQLITE_OPEN_READ_WRITE,
            )
            .context("Failed to open SQLite database")?;

            // Enable foreign key constraints
            conn.execute_batch("PRAGMA foreign_keys = ON;")
                .context("Failed to enable foreign keys")?;

            // WAL mode so concurrent workers read while one writes
            conn.pragma_update(None, "journal_mode", "WAL")
                .context("Failed to set WAL mode")?;

            conn.execute_batch("PRAGMA synchronous = NORMAL;")
                .context("Failed to set synchronous mode")?;

            // Wait for competing writers instead of failing immediately
            conn.busy_timeout(std::time::Duration::from_secs(5))
                .context("Failed to set busy timeout")?;

            Ok(conn)
        })
        .await??;

        Ok(Self {
            connection: Arc::new(Mutex::new(connection)),
        })
    }

    /// Run database migrations
    pub async fn migrate(&self) -> Result<()> {
        self.call(|conn| {
            let migration_sql = include_str!("../../migrations/001_init.up.sql");
            conn.execute_batch(migration_sql)
                .context("Failed to execute migration")?;
            Ok(())
        })
        .await
    }

    /// Run a closure against the connection on the blocking pool.
    pub async fn call<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let connection = Arc::clone(&self.connection);

        task::spawn_blocking(move || -> Result<T> {
            let mut conn = connection.lock().unwrap();
            f(&mut conn)
        })
        .await?
    }

    /// Execute a statement with parameters
    pub async fn execute<P>(&self, sql: &str, params: P) -> Result<usize>
    where
        P: rusqlite::Params + Send + 'static,
    {
        let sql = sql.to_string();
        self.call(move |conn| {
            let rows_affected = conn.execute(&sql, params).context("Failed to execute SQL")?;
            Ok(rows_affected)
        })
        .await
    }

    /// Check if the database is healthy
    pub async fn health_check(&self) -> Result<bool> {
        self.call(|conn| {
            let mut stmt = conn.prepare("SELECT 1;")?;
            let result: i32 = stmt.query_row([], |row| row.get(0))?;
            Ok(result == 1)
        })
        .await
    }
}

/// Convert Vec<f32> to BLOB for storage
pub fn vector_to_blob(vector: &[f32]) -> Vec<u8> {
    let mut blob = Vec::with_capacity(vector.len() * 4);
    for &value in vector {
        blob.extend_from_slice(&value.to_le_bytes());
    }
    blob
}

/// Convert BLOB back to Vec<f32>
pub fn blob_to_vector(blob: &[u8]) -> Result<Vec<f32>> {
    if blob.len() % 4 != 0 {
        anyhow::bail!("Invalid blob size for float vector");
    }

    let mut vector = Vec::with_capacity(blob.len() / 4);
    for chunk in blob.chunks_exact(4) {
        let bytes = [chunk[0], chunk[1], chunk[2], chunk[3]];
        vector.push(f32::from_le_bytes(bytes));
    }

    Ok(vector)
}
