//! SQLite-backed batch checkpoints.
//!
//! A checkpoint is keyed by the SHA-256 of the input file's bytes, so
//! re-running the same file resumes it while an edited file starts fresh.

use anyhow::{Context, Result};
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use sqlx::SqlitePool;
use std::path::Path;

use title_genie_core::checkpoint::CheckpointStore;
use title_genie_core::models::BatchProgress;

/// Hex SHA-256 of the file contents.
pub fn fingerprint(path: &Path) -> Result<String> {
    let bytes = std::fs::read(path)
        .with_context(|| format!("Failed to read input file: {}", path.display()))?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Ok(hex::encode(hasher.finalize()))
}

pub struct SqliteCheckpointStore {
    pool: SqlitePool,
    batch_key: String,
}

impl SqliteCheckpointStore {
    pub fn new(pool: SqlitePool, batch_key: impl Into<String>) -> Self {
        Self {
            pool,
            batch_key: batch_key.into(),
        }
    }

    pub fn batch_key(&self) -> &str {
        &self.batch_key
    }
}

#[async_trait]
impl CheckpointStore for SqliteCheckpointStore {
    async fn load(&self) -> Result<Option<BatchProgress>> {
        let row: Option<(i64, String)> = sqlx::query_as(
            "SELECT total_rows, progress_json FROM batch_checkpoints WHERE batch_key = ?",
        )
        .bind(&self.batch_key)
        .fetch_optional(&self.pool)
        .await?;

        let Some((total_rows, json)) = row else {
            return Ok(None);
        };
        let mut progress: BatchProgress =
            serde_json::from_str(&json).context("Corrupt checkpoint JSON")?;
        if progress.total_rows() as i64 != total_rows {
            anyhow::bail!(
                "Checkpoint row count mismatch: {} recorded, {} in progress",
                total_rows,
                progress.total_rows()
            );
        }
        progress.sanitize();
        Ok(Some(progress))
    }

    async fn save(&self, progress: &BatchProgress) -> Result<()> {
        let json = serde_json::to_string(progress)?;
        let now = chrono::Utc::now().timestamp();
        sqlx::query(
            r#"
            INSERT INTO batch_checkpoints (batch_key, total_rows, progress_json, updated_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(batch_key) DO UPDATE SET
                total_rows = excluded.total_rows,
                progress_json = excluded.progress_json,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&self.batch_key)
        .bind(progress.total_rows() as i64)
        .bind(json)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        sqlx::query("DELETE FROM batch_checkpoints WHERE batch_key = ?")
            .bind(&self.batch_key)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
