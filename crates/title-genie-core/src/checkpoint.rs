//! Durable batch cursor.
//!
//! The orchestrator saves [`BatchProgress`] after every row so an interrupted
//! run can resume. Results and the processed set travel together in one
//! value, so a restored checkpoint is always self-consistent.

use std::sync::Mutex;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::BatchProgress;

#[async_trait]
pub trait CheckpointStore: Send + Sync {
    async fn load(&self) -> Result<Option<BatchProgress>>;
    async fn save(&self, progress: &BatchProgress) -> Result<()>;
    async fn clear(&self) -> Result<()>;
}

/// Keeps the last saved checkpoint in memory.
#[derive(Default)]
pub struct InMemoryCheckpoint {
    slot: Mutex<Option<BatchProgress>>,
}

impl InMemoryCheckpoint {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of saved rows in the stored checkpoint, if any.
    pub fn saved_rows(&self) -> Option<usize> {
        self.slot
            .lock()
            .ok()
            .and_then(|s| s.as_ref().map(BatchProgress::processed_count))
    }
}

#[async_trait]
impl CheckpointStore for InMemoryCheckpoint {
    async fn load(&self) -> Result<Option<BatchProgress>> {
        let slot = self
            .slot
            .lock()
            .map_err(|_| anyhow::anyhow!("checkpoint lock poisoned"))?;
        Ok(slot.clone())
    }

    async fn save(&self, progress: &BatchProgress) -> Result<()> {
        let mut slot = self
            .slot
            .lock()
            .map_err(|_| anyhow::anyhow!("checkpoint lock poisoned"))?;
        *slot = Some(progress.clone());
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        let mut slot = self
            .slot
            .lock()
            .map_err(|_| anyhow::anyhow!("checkpoint lock poisoned"))?;
        *slot = None;
        Ok(())
    }
}
