//! Native persistence for the title history.
//!
//! | Backend | Storage |
//! |---------|---------|
//! | [`FileBackend`] | pretty JSON file, one file per key |
//! | [`SqliteKvBackend`] | row in `kv_store` |
//!
//! Both implement [`HistoryBackend`]; the store swallows their errors.

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::SqlitePool;
use std::path::{Path, PathBuf};

use title_genie_core::history::{HistoryBackend, HistoryStore};

use crate::config::Config;
use crate::db;
use crate::migrate::create_schema;

/// Open the history store configured in `[history]`, loading persisted titles.
pub async fn open_history(config: &Config) -> Result<HistoryStore> {
    let backend: Box<dyn HistoryBackend> = match config.history.backend.as_str() {
        "sqlite" => {
            let pool = db::connect(config).await?;
            create_schema(&pool).await?;
            Box::new(SqliteKvBackend::new(pool))
        }
        _ => Box::new(FileBackend::new(&config.history.path)),
    };
    Ok(HistoryStore::open(backend).await)
}

// ============ JSON file ============

/// Stores the snapshot as a JSON file. The key is ignored; one file holds one value.
pub struct FileBackend {
    path: PathBuf,
}

impl FileBackend {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

#[async_trait]
impl HistoryBackend for FileBackend {
    fn describe(&self) -> String {
        format!("file:{}", self.path.display())
    }

    async fn get(&self, _key: &str) -> Result<Option<String>> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(text) => Ok(Some(text)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| format!("Failed to read {}", self.path.display())),
        }
    }

    async fn set(&self, _key: &str, value: &str) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        tokio::fs::write(&self.path, value)
            .await
            .with_context(|| format!("Failed to write {}", self.path.display()))
    }
}

// ============ SQLite key-value ============

pub struct SqliteKvBackend {
    pool: SqlitePool,
}

impl SqliteKvBackend {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl HistoryBackend for SqliteKvBackend {
    fn describe(&self) -> String {
        "sqlite:kv_store".to_string()
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        let value: Option<String> = sqlx::query_scalar("SELECT value FROM kv_store WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        let now = chrono::Utc::now().timestamp();
        sqlx::query(
            r#"
            INSERT INTO kv_store (key, value, updated_at) VALUES (?, ?, ?)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
            "#,
        )
        .bind(key)
        .bind(value)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
