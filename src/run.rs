//! Batch commands: `genie run`, `genie status`, `genie reset`.
//!
//! `run` wires the native pieces into the core orchestrator:
//!
//! ```text
//! input.csv ──▶ rows ──▶ BatchOrchestrator ──▶ results.csv
//!                          │        │
//!              generator ──┘        ├──▶ history backend (file | sqlite)
//!                                   └──▶ batch_checkpoints (sha256 of input)
//! ```
//!
//! The checkpoint and the result file are written even when the run is
//! interrupted, so the same command resumes where it stopped.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;

use title_genie_core::batch::{row_prompt, BatchOrchestrator, BatchSummary};
use title_genie_core::checkpoint::CheckpointStore;
use title_genie_core::models::{BatchProgress, GenerationMode, KeywordPosition, Slot};
use title_genie_core::settings::RunSettings;

use crate::analyzer::analyze_performance;
use crate::checkpoint::{fingerprint, SqliteCheckpointStore};
use crate::config::Config;
use crate::db;
use crate::generation::create_generator;
use crate::history_backend::open_history;
use crate::migrate::create_schema;
use crate::progress::ProgressMode;
use crate::rows::{load_rows, write_rows};

/// Command-line options for one `genie run`.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub input: PathBuf,
    pub output: PathBuf,
    pub mode: Option<GenerationMode>,
    pub titles: Option<usize>,
    /// Replaces the configured starred fields when non-empty.
    pub starred: Vec<String>,
    pub positions: Vec<(Slot, KeywordPosition)>,
    pub performance: Option<PathBuf>,
    pub fresh: bool,
    pub dry_run: bool,
    pub progress: ProgressMode,
}

/// Parse a `slot=position` override such as `brand=front`.
pub fn parse_position(s: &str) -> Result<(Slot, KeywordPosition), String> {
    let (slot, position) = s
        .split_once('=')
        .ok_or_else(|| format!("expected slot=position, got '{}'", s))?;
    Ok((slot.parse()?, position.parse()?))
}

/// Merge config-file settings with command-line overrides.
pub fn resolve_settings(config: &Config, opts: &RunOptions) -> Result<RunSettings> {
    let mut settings = config.run_settings();
    if let Some(mode) = opts.mode {
        settings.mode = mode;
    }
    if let Some(titles) = opts.titles {
        settings.titles_per_row = titles;
    }
    if !opts.starred.is_empty() {
        settings.starred_fields = opts.starred.clone();
    }
    for (slot, position) in &opts.positions {
        settings.positions.set(*slot, Some(*position));
    }

    settings.external_context = match (&opts.performance, &config.batch.external_context_file) {
        (Some(report), _) => Some(analyze_performance(report)?),
        (None, Some(path)) => Some(
            std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read external context: {}", path.display()))?,
        ),
        (None, None) => None,
    };
    Ok(settings)
}

async fn checkpoint_store(config: &Config, input: &Path) -> Result<SqliteCheckpointStore> {
    let pool = db::connect(config).await?;
    create_schema(&pool).await?;
    Ok(SqliteCheckpointStore::new(pool, fingerprint(input)?))
}

/// Restore saved progress, or start a fresh cursor when none fits `total_rows`.
async fn restore_progress(store: &SqliteCheckpointStore, total_rows: usize) -> BatchProgress {
    match store.load().await {
        Ok(Some(progress)) if progress.total_rows() == total_rows => {
            tracing::info!(
                processed = progress.processed_count(),
                total = total_rows,
                "resuming from checkpoint"
            );
            progress
        }
        Ok(Some(progress)) => {
            tracing::warn!(
                saved = progress.total_rows(),
                input = total_rows,
                "discarding checkpoint with a different row count"
            );
            BatchProgress::new(total_rows)
        }
        Ok(None) => BatchProgress::new(total_rows),
        Err(e) => {
            tracing::warn!("ignoring unreadable checkpoint: {:#}", e);
            BatchProgress::new(total_rows)
        }
    }
}

/// Run (or resume) a batch. Returns `None` for a dry run.
pub async fn run_batch(
    config: &Config,
    opts: &RunOptions,
    cancel: &AtomicBool,
) -> Result<Option<BatchSummary>> {
    let rows = load_rows(&opts.input)?;
    let settings = resolve_settings(config, opts)?;
    settings
        .validate(&rows.columns)
        .context("Invalid run configuration")?;

    let store = checkpoint_store(config, &opts.input).await?;
    if opts.fresh {
        store.clear().await?;
    }
    let mut progress = restore_progress(&store, rows.len()).await;

    if opts.dry_run {
        match progress.pending().next() {
            Some(index) => println!("{}", row_prompt(&rows.rows[index], &settings)),
            None => println!("No pending rows."),
        }
        return Ok(None);
    }

    let generator = create_generator(&config.generation)?;
    let mut history = open_history(config).await?;
    let reporter = opts.progress.reporter();

    let summary = BatchOrchestrator::new(generator.as_ref(), &mut history, settings)
        .with_checkpoint(&store)
        .with_reporter(reporter.as_ref())
        .with_cancel(cancel)
        .run(&rows, &mut progress)
        .await
        .context("Batch aborted before processing")?;

    write_rows(&opts.output, progress.results())?;
    tracing::info!(
        output = %opts.output.display(),
        results = progress.results().len(),
        "results written"
    );
    Ok(Some(summary))
}

pub fn print_summary(summary: &BatchSummary) {
    println!("rows processed: {}", summary.rows_processed);
    if summary.rows_skipped > 0 {
        println!("rows resumed past: {}", summary.rows_skipped);
    }
    println!("rows failed: {}", summary.rows_failed);
    println!("titles accepted: {}", summary.titles_accepted);
    println!("rejected duplicates: {}", summary.rejected_duplicates);
    println!("self-corrected: {}", summary.self_corrected);
    if summary.cancelled {
        println!("cancelled: rerun the same command to resume");
    } else {
        println!("ok");
    }
}

/// Print stored progress for `input`.
pub async fn run_status(config: &Config, input: &Path) -> Result<()> {
    let store = checkpoint_store(config, input).await?;
    match store.load().await? {
        Some(progress) => {
            println!(
                "processed {} / {} rows",
                progress.processed_count(),
                progress.total_rows()
            );
            println!("results {}", progress.results().len());
        }
        None => println!("No checkpoint for {}", input.display()),
    }
    Ok(())
}

/// Delete the stored checkpoint for `input`.
pub async fn run_reset(config: &Config, input: &Path) -> Result<()> {
    let store = checkpoint_store(config, input).await?;
    store.clear().await?;
    println!("Checkpoint cleared for {}", input.display());
    Ok(())
}
