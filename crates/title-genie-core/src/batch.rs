//! Batch orchestration.
//!
//! Rows are processed strictly in order. Each pending row goes through:
//!
//! ```text
//! compose prompt ─▶ generate ─▶ parse lines ─▶ drop short ─▶ normalize
//!   ─▶ enforce brand ─▶ row dedup ─▶ history check ─▶ score ─▶ refine
//!   ─▶ result record + history insert
//! ```
//!
//! After a row its index is marked processed, the history is persisted and
//! the checkpoint saved. Titles accepted for a row are inserted into the
//! history before the next candidate is checked, so later candidates and
//! later rows see them.
//!
//! Cancellation is observed only between rows.

use std::sync::atomic::{AtomicBool, Ordering};

use crate::checkpoint::CheckpointStore;
use crate::error::{ConfigError, RowError};
use crate::generate::{error_text, TextGenerator};
use crate::history::HistoryStore;
use crate::models::{BatchProgress, CandidateTitle, ProductRow, ResultRecord, RowSet};
use crate::normalize::normalize;
use crate::progress::{BatchProgressEvent, BatchProgressReporter, NoProgress};
use crate::prompt::{compose, with_title_request, PromptOptions};
use crate::refine::{refine, Keywords};
use crate::settings::RunSettings;
use crate::validate::{check_duplication, enforce_brand, parse_candidates, MIN_CANDIDATE_CHARS};

static NO_PROGRESS: NoProgress = NoProgress;

/// Counters for one invocation of [`BatchOrchestrator::run`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub rows_processed: usize,
    pub rows_failed: usize,
    /// Rows already processed by an earlier run.
    pub rows_skipped: usize,
    pub titles_accepted: usize,
    pub rejected_short: usize,
    /// Candidates rejected by row-local dedup or as near-identical history repeats.
    pub rejected_duplicates: usize,
    pub self_corrected: usize,
    pub cancelled: bool,
}

#[derive(Debug, Default)]
struct RowOutcome {
    records: Vec<ResultRecord>,
    rejected_short: usize,
    rejected_duplicates: usize,
    self_corrected: usize,
}

/// The full prompt sent for a row, including the numbered-list request.
pub fn row_prompt(row: &ProductRow, settings: &RunSettings) -> String {
    let options = PromptOptions::from_settings(settings);
    with_title_request(&compose(row, &options), settings.titles_per_row)
}

/// Drives a batch over a [`RowSet`], owning the history for the run.
pub struct BatchOrchestrator<'a> {
    generator: &'a dyn TextGenerator,
    history: &'a mut HistoryStore,
    settings: RunSettings,
    checkpoint: Option<&'a dyn CheckpointStore>,
    reporter: &'a dyn BatchProgressReporter,
    cancel: Option<&'a AtomicBool>,
}

impl<'a> BatchOrchestrator<'a> {
    pub fn new(
        generator: &'a dyn TextGenerator,
        history: &'a mut HistoryStore,
        settings: RunSettings,
    ) -> Self {
        Self {
            generator,
            history,
            settings,
            checkpoint: None,
            reporter: &NO_PROGRESS,
            cancel: None,
        }
    }

    /// Save progress to `store` after every row.
    pub fn with_checkpoint(mut self, store: &'a dyn CheckpointStore) -> Self {
        self.checkpoint = Some(store);
        self
    }

    pub fn with_reporter(mut self, reporter: &'a dyn BatchProgressReporter) -> Self {
        self.reporter = reporter;
        self
    }

    /// Stop before the next row once `flag` is set.
    pub fn with_cancel(mut self, flag: &'a AtomicBool) -> Self {
        self.cancel = Some(flag);
        self
    }

    pub fn settings(&self) -> &RunSettings {
        &self.settings
    }

    /// Process every row of `rows` not yet in `progress`.
    ///
    /// Configuration problems are reported before any row runs. A row with
    /// malformed data is left pending and the batch continues.
    pub async fn run(
        &mut self,
        rows: &RowSet,
        progress: &mut BatchProgress,
    ) -> Result<BatchSummary, ConfigError> {
        self.settings.validate(&rows.columns)?;
        if progress.total_rows() != rows.len() {
            return Err(ConfigError::ProgressMismatch {
                progress: progress.total_rows(),
                input: rows.len(),
            });
        }
        progress.sanitize();

        let total = rows.len();
        let mut summary = BatchSummary {
            rows_skipped: progress.processed_count(),
            ..BatchSummary::default()
        };
        tracing::info!(
            total,
            pending = total - summary.rows_skipped,
            model = self.generator.model_name(),
            mode = %self.settings.mode,
            "starting batch"
        );

        let pending: Vec<usize> = progress.pending().collect();
        for index in pending {
            if self.cancel.is_some_and(|c| c.load(Ordering::SeqCst)) {
                tracing::info!(row = index + 1, "batch cancelled at row boundary");
                summary.cancelled = true;
                break;
            }

            let row = &rows.rows[index];
            self.reporter.report(BatchProgressEvent::RowStarted {
                row: index + 1,
                done: progress.processed_count(),
                total,
            });

            match self.process_row(index, row).await {
                Ok(outcome) => {
                    let accepted = outcome.records.len();
                    summary.rows_processed += 1;
                    summary.titles_accepted += accepted;
                    summary.rejected_short += outcome.rejected_short;
                    summary.rejected_duplicates += outcome.rejected_duplicates;
                    summary.self_corrected += outcome.self_corrected;

                    progress.record_row(index, outcome.records);
                    self.history.persist().await;
                    self.save_checkpoint(progress).await;

                    tracing::info!(row = index + 1, accepted, "row finished");
                    self.reporter.report(BatchProgressEvent::RowFinished {
                        row: index + 1,
                        accepted,
                        done: progress.processed_count(),
                        total,
                    });
                }
                Err(e) => {
                    summary.rows_failed += 1;
                    tracing::warn!("{}; row left pending", e);
                    self.reporter.report(BatchProgressEvent::RowFailed {
                        row: index + 1,
                        reason: e.to_string(),
                        done: progress.processed_count(),
                        total,
                    });
                }
            }
        }

        tracing::info!(
            processed = summary.rows_processed,
            failed = summary.rows_failed,
            accepted = summary.titles_accepted,
            "batch finished"
        );
        Ok(summary)
    }

    async fn save_checkpoint(&self, progress: &BatchProgress) {
        if let Some(store) = self.checkpoint {
            if let Err(e) = store.save(progress).await {
                tracing::warn!("checkpoint not saved: {:#}", e);
            }
        }
    }

    async fn process_row(&mut self, index: usize, row: &ProductRow) -> Result<RowOutcome, RowError> {
        row.validate(index)?;
        let row_number = index + 1;
        let product_id = format!("Row-{}", row_number);
        let keywords = Keywords {
            brand: row.brand(),
            main_keyword: row.main_keyword(),
            core_keyword: row.core_keyword(),
        };
        let thresholds = self.settings.thresholds;

        let prompt = row_prompt(row, &self.settings);
        let response = match self.generator.generate(&prompt).await {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(row = row_number, "generation failed: {:#}", e);
                error_text(&e)
            }
        };

        let mut outcome = RowOutcome::default();
        let mut accepted: Vec<CandidateTitle> = Vec::new();

        for raw in parse_candidates(&response) {
            if raw.chars().count() < MIN_CANDIDATE_CHARS {
                tracing::debug!(row = row_number, line = %raw, "dropped short line");
                outcome.rejected_short += 1;
                continue;
            }

            let cleaned = normalize(&raw);
            let (title, brand_fixed) = enforce_brand(&cleaned, keywords.brand);
            let candidate = CandidateTitle::new(title);

            let dup = check_duplication(&candidate, &accepted, thresholds.batch_threshold);
            if dup.is_duplicate {
                tracing::debug!(row = row_number, score = dup.score, title = candidate.as_str(), "row duplicate");
                outcome.rejected_duplicates += 1;
                continue;
            }

            let seen = self
                .history
                .check_similarity(candidate.as_str(), thresholds.history_threshold);
            if seen.best_score > thresholds.history_reject_threshold {
                tracing::debug!(
                    row = row_number,
                    score = seen.best_score,
                    previous = seen.best_title.as_deref().unwrap_or(""),
                    "history repeat"
                );
                outcome.rejected_duplicates += 1;
                continue;
            }
            let history_note = seen
                .is_match
                .then(|| format!("history similarity {:.0}%", seen.best_score * 100.0));

            accepted.push(candidate.clone());

            let initial = keywords.score(candidate.as_str());
            let initial_score = initial.score;
            let refined = refine(candidate.into_string(), initial, keywords, self.generator).await;

            let mut notes = refined.score.reasons.clone();
            if brand_fixed {
                notes.push("brand prepended".to_string());
            }
            if refined.improved {
                outcome.self_corrected += 1;
                notes.push(format!("self-corrected from {}", initial_score));
            }
            if let Some(note) = history_note {
                notes.push(note);
            }

            self.history.add(&refined.title, keywords.brand, &product_id);
            outcome.records.push(ResultRecord {
                row_number,
                brand: keywords.brand.to_string(),
                main_keyword: keywords.main_keyword.to_string(),
                core_keyword: keywords.core_keyword.to_string(),
                title: refined.title,
                seo_score: refined.score.score,
                notes: notes.join(", "),
            });
        }

        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generate::ScriptedGenerator;
    use crate::history::MemoryBackend;
    use crate::refine::MAX_REFINE_ATTEMPTS;

    const PERFECT_A: &str =
        "TechNova Wireless Earbuds Bluetooth Headphones with Noise Cancelling and 24h Battery";
    const PERFECT_B: &str =
        "TechNova Wireless Earbuds Sport Headphones Sweatproof Design for Running Gym and Travel";

    fn rows() -> RowSet {
        RowSet::from_rows(vec![ProductRow::from_pairs([
            ("Brand", "TechNova"),
            ("Main Keyword", "Wireless Earbuds"),
            ("Core Keyword", "Headphones"),
        ])])
    }

    fn history() -> HistoryStore {
        HistoryStore::new(Box::new(MemoryBackend::new()))
    }

    #[tokio::test]
    async fn accepts_distinct_candidates_and_records_history() {
        let g = ScriptedGenerator::new().respond(format!("1. {}\n2. {}\n3. short", PERFECT_A, PERFECT_B));
        let mut h = history();
        let rows = rows();
        let mut progress = BatchProgress::new(rows.len());
        let summary = BatchOrchestrator::new(&g, &mut h, RunSettings::default())
            .run(&rows, &mut progress)
            .await
            .unwrap();

        assert_eq!(summary.rows_processed, 1);
        assert_eq!(summary.titles_accepted, 2);
        assert_eq!(summary.rejected_short, 1);
        assert_eq!(progress.results()[0].title, PERFECT_A);
        assert_eq!(progress.results()[0].seo_score, 100);
        assert_eq!(progress.results()[0].notes, "");
        assert_eq!(h.len(), 2);
        assert_eq!(h.records()[0].product_id, "Row-1");
        assert!(progress.is_complete());
    }

    #[tokio::test]
    async fn generation_error_flows_through_as_text() {
        let g = ScriptedGenerator::new().fail("connection refused");
        let mut h = history();
        let rows = rows();
        let mut progress = BatchProgress::new(1);
        let summary = BatchOrchestrator::new(&g, &mut h, RunSettings::default())
            .run(&rows, &mut progress)
            .await
            .unwrap();
        // "Error: connection refused" is long enough to be a candidate, so it
        // is scored and refined like any other line; refinement calls fail too.
        assert_eq!(summary.rows_processed, 1);
        assert_eq!(summary.rows_failed, 0);
        assert_eq!(summary.titles_accepted, 1);
        assert_eq!(summary.self_corrected, 0);
        assert!(progress.is_processed(0));

        let record = &progress.results()[0];
        assert_eq!(record.title, "TechNova Error connection refused");
        assert_eq!(record.seo_score, 45);
        assert!(record.notes.contains("missing main keyword"));
        assert!(record.notes.ends_with("brand prepended"));
        assert_eq!(g.calls(), 1 + MAX_REFINE_ATTEMPTS);
    }

    #[tokio::test]
    async fn echoed_revision_is_not_noted_as_self_correction() {
        let start = "TechNova Wireless Earbuds Headphones";
        let g = ScriptedGenerator::new()
            .respond(format!("1. {}", start))
            .respond(start)
            .respond(start);
        let mut h = history();
        let rows = rows();
        let mut progress = BatchProgress::new(1);
        let summary = BatchOrchestrator::new(&g, &mut h, RunSettings::default())
            .run(&rows, &mut progress)
            .await
            .unwrap();
        assert_eq!(summary.self_corrected, 0);
        let record = &progress.results()[0];
        assert_eq!(record.title, start);
        assert!(!record.notes.contains("self-corrected"));
    }

    #[tokio::test]
    async fn row_duplicates_are_rejected() {
        let g = ScriptedGenerator::new().respond(format!("1. {}\n2. {}", PERFECT_A, PERFECT_A));
        let mut h = history();
        let rows = rows();
        let mut progress = BatchProgress::new(1);
        let summary = BatchOrchestrator::new(&g, &mut h, RunSettings::default())
            .run(&rows, &mut progress)
            .await
            .unwrap();
        assert_eq!(summary.titles_accepted, 1);
        assert_eq!(summary.rejected_duplicates, 1);
    }

    #[tokio::test]
    async fn brand_is_prepended_and_noted() {
        let title = "Wireless Earbuds Bluetooth Headphones with Noise Cancelling and 24h Battery Life";
        let g = ScriptedGenerator::new().respond(title);
        let mut h = history();
        let rows = rows();
        let mut progress = BatchProgress::new(1);
        BatchOrchestrator::new(&g, &mut h, RunSettings::default())
            .run(&rows, &mut progress)
            .await
            .unwrap();
        let record = &progress.results()[0];
        assert!(record.title.starts_with("TechNova Wireless Earbuds"));
        assert!(record.notes.contains("brand prepended"));
    }

    #[tokio::test]
    async fn blank_mandatory_field_leaves_row_pending() {
        let rows = RowSet::from_rows(vec![ProductRow::from_pairs([
            ("Brand", "TechNova"),
            ("Main Keyword", " "),
            ("Core Keyword", "Headphones"),
        ])]);
        let g = ScriptedGenerator::new();
        let mut h = history();
        let mut progress = BatchProgress::new(1);
        let summary = BatchOrchestrator::new(&g, &mut h, RunSettings::default())
            .run(&rows, &mut progress)
            .await
            .unwrap();
        assert_eq!(summary.rows_failed, 1);
        assert!(!progress.is_processed(0));
        assert_eq!(g.calls(), 0);
    }

    #[tokio::test]
    async fn config_errors_stop_before_any_row() {
        let g = ScriptedGenerator::new();
        let mut h = history();
        let rows = rows();
        let mut progress = BatchProgress::new(5);
        let err = BatchOrchestrator::new(&g, &mut h, RunSettings::default())
            .run(&rows, &mut progress)
            .await
            .unwrap_err();
        assert_eq!(err, ConfigError::ProgressMismatch { progress: 5, input: 1 });

        let settings = RunSettings {
            titles_per_row: 0,
            ..RunSettings::default()
        };
        let mut progress = BatchProgress::new(1);
        let err = BatchOrchestrator::new(&g, &mut h, settings)
            .run(&rows, &mut progress)
            .await
            .unwrap_err();
        assert_eq!(err, ConfigError::TitlesPerRow(0));
        assert_eq!(g.calls(), 0);
    }

    #[tokio::test]
    async fn cancellation_is_checked_before_rows() {
        let flag = AtomicBool::new(true);
        let g = ScriptedGenerator::new();
        let mut h = history();
        let rows = rows();
        let mut progress = BatchProgress::new(1);
        let summary = BatchOrchestrator::new(&g, &mut h, RunSettings::default())
            .with_cancel(&flag)
            .run(&rows, &mut progress)
            .await
            .unwrap();
        assert!(summary.cancelled);
        assert_eq!(summary.rows_processed, 0);
        assert_eq!(g.calls(), 0);
    }
}
