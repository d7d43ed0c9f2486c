//! # Title Genie CLI (`genie`)
//!
//! ## Usage
//!
//! ```bash
//! genie --config ./config/genie.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `genie init` | Create the SQLite database and schema |
//! | `genie run <input> --output <file>` | Generate titles for every pending row |
//! | `genie status <input>` | Show stored progress for an input file |
//! | `genie reset <input>` | Delete stored progress for an input file |
//! | `genie analyze <report>` | Extract high-CTR keywords from a performance export |
//! | `genie history stats` | Count stored titles |
//! | `genie history clear` | Remove every stored title |
//! | `genie history import <csv>` | Add titles from a CSV column |
//!
//! ## Examples
//!
//! ```bash
//! # Strict structure, three titles per product, brand forced to the end
//! genie run products.csv --output titles.csv --mode strict --titles 3 --position brand=end
//!
//! # Feed last quarter's CTR winners into the prompt
//! genie run products.csv --output titles.csv --performance q3_report.csv
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use title_genie::config;
use title_genie::history_cmd;
use title_genie::migrate;
use title_genie::progress::ProgressMode;
use title_genie::run::{self, RunOptions};
use title_genie_core::models::{GenerationMode, KeywordPosition, Slot};

/// Title Genie: batch marketplace title generation with deduplication,
/// SEO scoring, and self-correction.
#[derive(Parser)]
#[command(name = "genie", version, about)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/genie.toml`. See `config/genie.example.toml`.
    #[arg(long, global = true, default_value = "./config/genie.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema. Safe to run more than once.
    Init,

    /// Generate titles for an input CSV, resuming any stored progress.
    Run {
        /// Input CSV with Brand, Main Keyword and Core Keyword columns.
        input: PathBuf,

        /// Result CSV to write.
        #[arg(long, short)]
        output: PathBuf,

        /// Prompt strategy: strict or marketing.
        #[arg(long, value_parser = parse_mode)]
        mode: Option<GenerationMode>,

        /// Titles to request per row (1-10).
        #[arg(long)]
        titles: Option<usize>,

        /// Column whose content must survive into the title (repeatable, at most 2).
        #[arg(long = "star")]
        star: Vec<String>,

        /// Keyword placement, e.g. `brand=front` or `core_keyword=end` (repeatable).
        #[arg(long = "position", value_parser = run::parse_position)]
        position: Vec<(Slot, KeywordPosition)>,

        /// Performance export whose high-CTR keywords are added to every prompt.
        #[arg(long)]
        performance: Option<PathBuf>,

        /// Discard stored progress and start over.
        #[arg(long)]
        fresh: bool,

        /// Print the prompt for the first pending row and exit.
        #[arg(long)]
        dry_run: bool,

        /// Progress output on stderr. Defaults to human on a TTY, otherwise off.
        #[arg(long, value_enum)]
        progress: Option<ProgressMode>,
    },

    /// Show stored progress for an input file.
    Status { input: PathBuf },

    /// Delete stored progress for an input file.
    Reset { input: PathBuf },

    /// Print the high-CTR keyword summary for a performance export.
    Analyze { report: PathBuf },

    /// Inspect or edit the title history.
    History {
        #[command(subcommand)]
        action: HistoryAction,
    },
}

#[derive(Subcommand)]
enum HistoryAction {
    /// Number of stored titles and the backend in use.
    Stats,
    /// Remove every stored title.
    Clear,
    /// Add titles from a CSV column.
    Import {
        file: PathBuf,
        /// Column holding the titles; common title headers are tried when absent.
        #[arg(long, default_value = "title")]
        column: String,
    },
}

fn parse_mode(s: &str) -> Result<GenerationMode, String> {
    s.parse()
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("title_genie=info,title_genie_core=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing();

    // Commands that don't require config
    if let Commands::Analyze { report } = &cli.command {
        println!("{}", title_genie::analyzer::analyze_performance(report)?);
        return Ok(());
    }

    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Run {
            input,
            output,
            mode,
            titles,
            star,
            position,
            performance,
            fresh,
            dry_run,
            progress,
        } => {
            let opts = RunOptions {
                input,
                output,
                mode,
                titles,
                starred: star,
                positions: position,
                performance,
                fresh,
                dry_run,
                progress: progress.unwrap_or_else(ProgressMode::default_for_tty),
            };

            let cancel = Arc::new(AtomicBool::new(false));
            let flag = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::warn!("interrupt received, stopping after the current row");
                    flag.store(true, Ordering::SeqCst);
                }
            });

            if let Some(summary) = run::run_batch(&cfg, &opts, &cancel).await? {
                run::print_summary(&summary);
            }
        }
        Commands::Status { input } => run::run_status(&cfg, &input).await?,
        Commands::Reset { input } => run::run_reset(&cfg, &input).await?,
        Commands::Analyze { .. } => {}
        Commands::History { action } => match action {
            HistoryAction::Stats => history_cmd::run_stats(&cfg).await?,
            HistoryAction::Clear => history_cmd::run_clear(&cfg).await?,
            HistoryAction::Import { file, column } => {
                history_cmd::run_import(&cfg, &file, &column).await?
            }
        },
    }

    Ok(())
}
