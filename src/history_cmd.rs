//! `genie history` subcommands.

use anyhow::{bail, Result};
use std::path::Path;

use crate::config::Config;
use crate::history_backend::open_history;
use crate::rows::read_table;

/// Columns tried, in order, when `--column` is not found.
pub const TITLE_COLUMN_FALLBACKS: [&str; 4] = ["title", "product name", "product title", "标题"];

pub async fn run_stats(config: &Config) -> Result<()> {
    let history = open_history(config).await?;
    let stats = history.stats();
    println!("titles: {}", stats.total_titles);
    println!("backend: {}", stats.backend);
    Ok(())
}

pub async fn run_clear(config: &Config) -> Result<()> {
    let mut history = open_history(config).await?;
    let removed = history.len();
    history.clear();
    if !history.persist().await {
        bail!("History cleared in memory but could not be persisted");
    }
    println!("Cleared {} titles.", removed);
    Ok(())
}

/// Import titles from a CSV column into the history.
pub async fn run_import(config: &Config, file: &Path, column: &str) -> Result<()> {
    let table = read_table(file)?;
    let Some(col) = std::iter::once(column)
        .chain(TITLE_COLUMN_FALLBACKS)
        .find_map(|name| table.column_index(name))
    else {
        bail!(
            "No title column found in {} (tried '{}', {})",
            file.display(),
            column,
            TITLE_COLUMN_FALLBACKS
                .iter()
                .map(|c| format!("'{}'", c))
                .collect::<Vec<_>>()
                .join(", ")
        );
    };

    let mut history = open_history(config).await?;
    let imported =
        history.import_titles((0..table.records.len()).map(|r| table.cell(r, col).to_string()));
    if !history.persist().await {
        bail!("Imported {} titles but the history could not be persisted", imported);
    }
    tracing::info!(imported, total = history.len(), "history import finished");
    println!("Imported {} titles ({} total).", imported, history.len());
    Ok(())
}
