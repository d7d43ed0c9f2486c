use anyhow::Result;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::db;

/// Connect and create the schema. Safe to run repeatedly.
pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    create_schema(&pool).await?;
    pool.close().await;
    tracing::info!(path = %config.db.path.display(), "schema ready");
    Ok(())
}

pub async fn create_schema(pool: &SqlitePool) -> Result<()> {
    // Key-value rows; the sqlite history backend lives under "title_history"
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS kv_store (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL,
            updated_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // One resumable cursor per input file fingerprint
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS batch_checkpoints (
            batch_key TEXT PRIMARY KEY,
            total_rows INTEGER NOT NULL,
            progress_json TEXT NOT NULL,
            updated_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}
