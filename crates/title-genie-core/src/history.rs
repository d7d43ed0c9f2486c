//! Cross-session title history.
//!
//! [`HistoryStore`] is an append-only, in-memory list of accepted titles with
//! a similarity lookup. Durability is delegated to a [`HistoryBackend`]: a
//! get/set pair keyed by a single logical name that stores the JSON snapshot
//!
//! ```json
//! { "last_updated": "...", "total_count": 2, "titles": [ { "title": "...", ... } ] }
//! ```
//!
//! Persistence is best-effort. Backend failures are logged and swallowed; the
//! in-memory list stays authoritative for the current run.
//!
//! Loading is lenient per record: entries that cannot be read as a
//! [`HistoryRecord`] are kept verbatim and written back on the next persist.
//! A snapshot that exists but cannot be read at all is never overwritten,
//! except after an explicit [`HistoryStore::clear`].
//!
//! Lookups are a linear scan over every record. That is fine for thousands
//! of titles; a much larger history would need sharding by brand first.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{timestamp, HistoryRecord};
use crate::similarity::similarity;

/// Logical key the snapshot is stored under.
pub const HISTORY_KEY: &str = "title_history";

/// Durable storage for the history snapshot.
#[async_trait]
pub trait HistoryBackend: Send + Sync {
    /// Human-readable description, e.g. `"file:./data/title_history.json"`.
    fn describe(&self) -> String;

    /// Read the stored value, `None` if nothing was stored yet.
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Replace the stored value.
    async fn set(&self, key: &str, value: &str) -> Result<()>;
}

#[async_trait]
impl<T: HistoryBackend + ?Sized> HistoryBackend for Arc<T> {
    fn describe(&self) -> String {
        (**self).describe()
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        (**self).get(key).await
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        (**self).set(key, value).await
    }
}

/// Backend that keeps the snapshot in process memory.
#[derive(Default)]
pub struct MemoryBackend {
    values: RwLock<HashMap<String, String>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl HistoryBackend for MemoryBackend {
    fn describe(&self) -> String {
        "memory".to_string()
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        let values = self
            .values
            .read()
            .map_err(|_| anyhow::anyhow!("history memory backend lock poisoned"))?;
        Ok(values.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut values = self
            .values
            .write()
            .map_err(|_| anyhow::anyhow!("history memory backend lock poisoned"))?;
        values.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Serialized form of the whole history.
#[derive(Debug, Serialize, Deserialize)]
pub struct HistorySnapshot {
    #[serde(
        alias = "lastUpdated",
        deserialize_with = "timestamp::deserialize",
        default = "Utc::now"
    )]
    pub last_updated: DateTime<Utc>,
    #[serde(alias = "totalCount", default)]
    pub total_count: usize,
    #[serde(default)]
    pub titles: Vec<serde_json::Value>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum StoredTitle<'a> {
    Record(&'a HistoryRecord),
    Unreadable(&'a serde_json::Value),
}

#[derive(Serialize)]
struct SnapshotRef<'a> {
    last_updated: DateTime<Utc>,
    total_count: usize,
    titles: Vec<StoredTitle<'a>>,
}

/// Result of [`HistoryStore::check_similarity`].
#[derive(Debug, Clone, PartialEq)]
pub struct SimilarityMatch {
    /// `best_score > threshold`.
    pub is_match: bool,
    pub best_score: f64,
    pub best_title: Option<String>,
}

/// Summary for `genie history stats`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryStats {
    pub total_titles: usize,
    pub backend: String,
}

/// Append-only store of accepted titles.
pub struct HistoryStore {
    records: Vec<HistoryRecord>,
    /// Stored entries that did not parse; preserved on persist.
    unreadable: Vec<serde_json::Value>,
    /// Set when the backend held a snapshot that could not be read.
    write_blocked: bool,
    backend: Box<dyn HistoryBackend>,
}

impl HistoryStore {
    /// An empty store. Call [`load`](Self::load) to read persisted titles.
    pub fn new(backend: Box<dyn HistoryBackend>) -> Self {
        Self {
            records: Vec::new(),
            unreadable: Vec::new(),
            write_blocked: false,
            backend,
        }
    }

    /// Construct and load in one step.
    pub async fn open(backend: Box<dyn HistoryBackend>) -> Self {
        let mut store = Self::new(backend);
        store.load().await;
        store
    }

    /// Append a title unconditionally. Dedup is the caller's decision.
    pub fn add(&mut self, title: &str, brand: &str, product_id: &str) {
        self.records
            .push(HistoryRecord::new(title, brand, product_id, Utc::now()));
    }

    /// Append many titles without brand or product metadata. Blank entries are skipped.
    pub fn import_titles<I, S>(&mut self, titles: I) -> usize
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut count = 0;
        for title in titles {
            let title = title.as_ref().trim();
            if title.is_empty() {
                continue;
            }
            self.add(title, "", "");
            count += 1;
        }
        count
    }

    /// Best match of `title` against every stored title.
    ///
    /// An empty store yields `(false, 0.0, None)`.
    pub fn check_similarity(&self, title: &str, threshold: f64) -> SimilarityMatch {
        let lower = title.to_lowercase();
        let mut best_score = 0.0;
        let mut best_title: Option<&str> = None;
        for record in &self.records {
            let score = similarity(&lower, &record.title_lower);
            if score > best_score {
                best_score = score;
                best_title = Some(record.title.as_str());
            }
        }
        SimilarityMatch {
            is_match: best_score > threshold,
            best_score,
            best_title: best_title.map(str::to_string),
        }
    }

    pub fn records(&self) -> &[HistoryRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn stats(&self) -> HistoryStats {
        HistoryStats {
            total_titles: self.records.len(),
            backend: self.backend.describe(),
        }
    }

    /// Empty the in-memory store. Does not persist, but allows the next
    /// persist to replace a snapshot that failed to load.
    pub fn clear(&mut self) {
        self.records.clear();
        self.unreadable.clear();
        self.write_blocked = false;
    }

    /// Write the snapshot to the backend. Returns `false` if that failed.
    pub async fn persist(&self) -> bool {
        if self.write_blocked {
            tracing::warn!(
                backend = %self.backend.describe(),
                "stored title history could not be read; not overwriting it"
            );
            return false;
        }
        let titles: Vec<StoredTitle<'_>> = self
            .records
            .iter()
            .map(StoredTitle::Record)
            .chain(self.unreadable.iter().map(StoredTitle::Unreadable))
            .collect();
        let snapshot = SnapshotRef {
            last_updated: Utc::now(),
            total_count: titles.len(),
            titles,
        };
        let json = match serde_json::to_string_pretty(&snapshot) {
            Ok(j) => j,
            Err(e) => {
                tracing::warn!("could not serialize title history: {}", e);
                return false;
            }
        };
        match self.backend.set(HISTORY_KEY, &json).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(
                    backend = %self.backend.describe(),
                    "title history not persisted, continuing in memory: {:#}",
                    e
                );
                false
            }
        }
    }

    /// Replace the in-memory records with the persisted snapshot.
    ///
    /// A missing snapshot leaves the store empty. An unreadable one also
    /// leaves it empty and blocks [`persist`](Self::persist) until
    /// [`clear`](Self::clear). Returns `false` when the backend or the JSON failed.
    pub async fn load(&mut self) -> bool {
        self.records.clear();
        self.unreadable.clear();
        self.write_blocked = false;
        let raw = match self.backend.get(HISTORY_KEY).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return true,
            Err(e) => {
                tracing::warn!(
                    backend = %self.backend.describe(),
                    "title history could not be read, starting empty: {:#}",
                    e
                );
                self.write_blocked = true;
                return false;
            }
        };
        let snapshot = match serde_json::from_str::<HistorySnapshot>(&raw) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                tracing::warn!(
                    backend = %self.backend.describe(),
                    "title history is malformed, starting empty and leaving it untouched: {}",
                    e
                );
                self.write_blocked = true;
                return false;
            }
        };

        for value in snapshot.titles {
            match serde_json::from_value::<HistoryRecord>(value.clone()) {
                Ok(mut record) => {
                    if record.title_lower.is_empty() {
                        record.title_lower = record.title.to_lowercase();
                    }
                    self.records.push(record);
                }
                Err(e) => {
                    tracing::debug!("unreadable history entry kept as is: {}", e);
                    self.unreadable.push(value);
                }
            }
        }
        if !self.unreadable.is_empty() {
            tracing::warn!(
                skipped = self.unreadable.len(),
                loaded = self.records.len(),
                "some title history entries could not be read"
            );
        }
        tracing::debug!(titles = self.records.len(), "title history loaded");
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct BrokenBackend;

    #[async_trait]
    impl HistoryBackend for BrokenBackend {
        fn describe(&self) -> String {
            "broken".to_string()
        }
        async fn get(&self, _key: &str) -> Result<Option<String>> {
            anyhow::bail!("permission denied")
        }
        async fn set(&self, _key: &str, _value: &str) -> Result<()> {
            anyhow::bail!("read-only file system")
        }
    }

    #[test]
    fn empty_store_never_matches() {
        let store = HistoryStore::new(Box::new(MemoryBackend::new()));
        let m = store.check_similarity("TechNova Wireless Earbuds", 0.0);
        assert_eq!(
            m,
            SimilarityMatch {
                is_match: false,
                best_score: 0.0,
                best_title: None
            }
        );
    }

    #[test]
    fn add_precomputes_lowercase_and_never_dedups() {
        let mut store = HistoryStore::new(Box::new(MemoryBackend::new()));
        store.add("TechNova USB Hub", "TechNova", "Row-1");
        store.add("TechNova USB Hub", "TechNova", "Row-2");
        assert_eq!(store.len(), 2);
        assert_eq!(store.records()[0].title_lower, "technova usb hub");
    }

    #[test]
    fn check_similarity_reports_best_match() {
        let mut store = HistoryStore::new(Box::new(MemoryBackend::new()));
        store.add("EcoLife Bamboo Toothbrush Pack of 4", "EcoLife", "Row-1");
        store.add("TechNova Wireless Earbuds Bluetooth Headphones", "TechNova", "Row-2");
        let m = store.check_similarity("technova wireless earbuds bluetooth headphones", 0.8);
        assert!(m.is_match);
        assert_eq!(m.best_score, 1.0);
        assert_eq!(
            m.best_title.as_deref(),
            Some("TechNova Wireless Earbuds Bluetooth Headphones")
        );
        let m = store.check_similarity("Industrial RFID Reader", 0.8);
        assert!(!m.is_match);
    }

    #[tokio::test]
    async fn persist_and_load_round_trip() {
        let backend = Arc::new(MemoryBackend::new());
        let mut store = HistoryStore::new(Box::new(backend.clone()));
        store.add("First Title For History", "Brand", "Row-1");
        assert!(store.persist().await);

        let raw = backend.get(HISTORY_KEY).await.unwrap().unwrap();
        let snapshot: HistorySnapshot = serde_json::from_str(&raw).unwrap();
        assert_eq!(snapshot.total_count, 1);

        let reopened = HistoryStore::open(Box::new(backend)).await;
        assert_eq!(reopened.len(), 1);
        assert_eq!(reopened.records()[0].product_id, "Row-1");
    }

    #[tokio::test]
    async fn clear_does_not_persist() {
        let backend = Arc::new(MemoryBackend::new());
        let mut store = HistoryStore::new(Box::new(backend.clone()));
        store.add("Kept On Disk", "", "");
        store.persist().await;
        store.clear();
        assert!(store.is_empty());
        let reopened = HistoryStore::open(Box::new(backend)).await;
        assert_eq!(reopened.len(), 1);
    }

    #[tokio::test]
    async fn backend_failures_are_swallowed() {
        let mut store = HistoryStore::new(Box::new(BrokenBackend));
        store.add("Still In Memory", "", "");
        assert!(!store.persist().await);
        assert_eq!(store.len(), 1);
        assert!(!store.load().await);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn loads_legacy_snapshot_without_lowercase_cache() {
        let backend = MemoryBackend::new();
        backend
            .set(
                HISTORY_KEY,
                r#"{"last_updated":"2024-05-01T10:00:00.5","total_count":1,
                    "titles":[{"title":"Legacy Title","brand":"","product_id":"","created_at":"2024-05-01T10:00:00"}]}"#,
            )
            .await
            .unwrap();
        let store = HistoryStore::open(Box::new(backend)).await;
        assert_eq!(store.records()[0].title_lower, "legacy title");
    }

    #[tokio::test]
    async fn odd_records_are_coerced_or_preserved() {
        let backend = Arc::new(MemoryBackend::new());
        backend
            .set(
                HISTORY_KEY,
                r#"{"last_updated":"2024-05-01T10:00:00","total_count":3,"titles":[
                    {"title":"Good Legacy Title","brand":"TechNova","product_id":"Row-1","created_at":"2024-05-01T10:00:00"},
                    {"title":"Numeric Brand Title","brand":12345,"product_id":"Row-2","created_at":"2024-05-01T10:00:00"},
                    {"title":{"text":"nested"},"brand":"X"}]}"#,
            )
            .await
            .unwrap();
        let mut store = HistoryStore::open(Box::new(backend.clone())).await;
        assert_eq!(store.len(), 2);
        assert_eq!(store.records()[1].brand, "12345");

        store.add("Fresh Title", "TechNova", "Row-3");
        assert!(store.persist().await);

        let raw = backend.get(HISTORY_KEY).await.unwrap().unwrap();
        assert!(raw.contains("Good Legacy Title"));
        assert!(raw.contains("nested"));
        let snapshot: HistorySnapshot = serde_json::from_str(&raw).unwrap();
        assert_eq!(snapshot.total_count, 4);

        let reopened = HistoryStore::open(Box::new(backend)).await;
        assert_eq!(reopened.len(), 3);
    }

    #[tokio::test]
    async fn unparseable_snapshot_is_not_overwritten() {
        let backend = Arc::new(MemoryBackend::new());
        let original = r#"{"titles":[{"title":"Kept Title","brand":NaN}]}"#;
        backend.set(HISTORY_KEY, original).await.unwrap();

        let mut store = HistoryStore::new(Box::new(backend.clone()));
        assert!(!store.load().await);
        assert!(store.is_empty());

        store.add("New Title", "", "");
        assert!(!store.persist().await);
        assert_eq!(backend.get(HISTORY_KEY).await.unwrap().as_deref(), Some(original));

        // An explicit clear is a deliberate reset.
        store.clear();
        assert!(store.persist().await);
        let raw = backend.get(HISTORY_KEY).await.unwrap().unwrap();
        assert!(!raw.contains("Kept Title"));
    }

    #[test]
    fn import_skips_blank_titles() {
        let mut store = HistoryStore::new(Box::new(MemoryBackend::new()));
        assert_eq!(store.import_titles(["One Title", "  ", "Two Title"]), 2);
        assert_eq!(store.stats().total_titles, 2);
        assert_eq!(store.stats().backend, "memory");
    }
}
