//! Per-run configuration consumed by the pipeline.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::models::{GenerationMode, PositionRules, MANDATORY_COLUMNS};

pub const MIN_TITLES_PER_ROW: usize = 1;
pub const MAX_TITLES_PER_ROW: usize = 10;
pub const MAX_STARRED_FIELDS: usize = 2;

/// Similarity thresholds for batch-local and history dedup.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DedupThresholds {
    /// Reject a candidate this similar to one already accepted for its row.
    #[serde(default = "default_batch_threshold")]
    pub batch_threshold: f64,
    /// Annotate a candidate this similar to a history title.
    #[serde(default = "default_history_threshold")]
    pub history_threshold: f64,
    /// Reject a candidate this similar to a history title.
    #[serde(default = "default_history_reject_threshold")]
    pub history_reject_threshold: f64,
}

fn default_batch_threshold() -> f64 {
    0.8
}
fn default_history_threshold() -> f64 {
    0.8
}
fn default_history_reject_threshold() -> f64 {
    0.95
}

impl Default for DedupThresholds {
    fn default() -> Self {
        Self {
            batch_threshold: default_batch_threshold(),
            history_threshold: default_history_threshold(),
            history_reject_threshold: default_history_reject_threshold(),
        }
    }
}

impl DedupThresholds {
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [
            ("batch_threshold", self.batch_threshold),
            ("history_threshold", self.history_threshold),
            ("history_reject_threshold", self.history_reject_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::Threshold { name, value });
            }
        }
        if self.history_threshold > self.history_reject_threshold {
            return Err(ConfigError::ThresholdOrder {
                warn: self.history_threshold,
                reject: self.history_reject_threshold,
            });
        }
        Ok(())
    }
}

/// Everything the orchestrator needs to know about a run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSettings {
    pub mode: GenerationMode,
    pub titles_per_row: usize,
    pub positions: PositionRules,
    /// Extra columns whose content must survive into the title.
    pub starred_fields: Vec<String>,
    /// Performance insights prepended to the prompt context.
    pub external_context: Option<String>,
    pub thresholds: DedupThresholds,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            mode: GenerationMode::default(),
            titles_per_row: 5,
            positions: PositionRules::default(),
            starred_fields: Vec::new(),
            external_context: None,
            thresholds: DedupThresholds::default(),
        }
    }
}

impl RunSettings {
    /// Check the settings against the input header.
    pub fn validate(&self, columns: &[String]) -> Result<(), ConfigError> {
        let missing: Vec<String> = MANDATORY_COLUMNS
            .iter()
            .filter(|m| !columns.iter().any(|c| c == *m))
            .map(|m| m.to_string())
            .collect();
        if !missing.is_empty() {
            return Err(ConfigError::MissingColumns(missing));
        }

        if !(MIN_TITLES_PER_ROW..=MAX_TITLES_PER_ROW).contains(&self.titles_per_row) {
            return Err(ConfigError::TitlesPerRow(self.titles_per_row));
        }

        if self.starred_fields.len() > MAX_STARRED_FIELDS {
            return Err(ConfigError::TooManyStarred(self.starred_fields.len()));
        }
        if let Some(unknown) = self
            .starred_fields
            .iter()
            .find(|f| !columns.iter().any(|c| c == *f))
        {
            return Err(ConfigError::UnknownStarredField(unknown.clone()));
        }

        self.thresholds.validate()
    }
}
