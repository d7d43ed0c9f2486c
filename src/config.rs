use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use title_genie_core::models::{GenerationMode, PositionRules};
use title_genie_core::settings::{
    DedupThresholds, RunSettings, MAX_STARRED_FIELDS, MAX_TITLES_PER_ROW, MIN_TITLES_PER_ROW,
};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub batch: BatchConfig,
    #[serde(default)]
    pub history: HistoryConfig,
    #[serde(default)]
    pub dedup: DedupThresholds,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct GenerationConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_model")]
    pub model: String,
    /// Base URL override for OpenAI-compatible endpoints.
    #[serde(default)]
    pub url: Option<String>,
    /// Environment variable holding the API key.
    #[serde(default)]
    pub api_key_env: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            url: None,
            api_key_env: None,
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
        }
    }
}

fn default_provider() -> String {
    "dashscope".to_string()
}
fn default_model() -> String {
    "qwen-flash".to_string()
}
fn default_timeout_secs() -> u64 {
    60
}
fn default_max_retries() -> u32 {
    3
}

impl GenerationConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }

    /// Environment variable consulted for the API key.
    pub fn key_env(&self) -> &str {
        match (&self.api_key_env, self.provider.as_str()) {
            (Some(name), _) => name,
            (None, "openai") => "OPENAI_API_KEY",
            (None, _) => "DASHSCOPE_API_KEY",
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct BatchConfig {
    #[serde(default)]
    pub mode: GenerationMode,
    #[serde(default = "default_titles_per_row")]
    pub titles_per_row: usize,
    #[serde(default)]
    pub starred_fields: Vec<String>,
    #[serde(default)]
    pub positions: PositionRules,
    /// Text file prepended to every prompt as performance context.
    #[serde(default)]
    pub external_context_file: Option<PathBuf>,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            mode: GenerationMode::default(),
            titles_per_row: default_titles_per_row(),
            starred_fields: Vec::new(),
            positions: PositionRules::default(),
            external_context_file: None,
        }
    }
}

fn default_titles_per_row() -> usize {
    5
}

#[derive(Debug, Deserialize, Clone)]
pub struct HistoryConfig {
    #[serde(default = "default_history_backend")]
    pub backend: String,
    #[serde(default = "default_history_path")]
    pub path: PathBuf,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            backend: default_history_backend(),
            path: default_history_path(),
        }
    }
}

fn default_history_backend() -> String {
    "file".to_string()
}
fn default_history_path() -> PathBuf {
    PathBuf::from("./data/title_history.json")
}

impl Config {
    /// Run settings from the `[batch]` and `[dedup]` sections.
    ///
    /// External context is attached by the caller once the file is read.
    pub fn run_settings(&self) -> RunSettings {
        RunSettings {
            mode: self.batch.mode,
            titles_per_row: self.batch.titles_per_row,
            positions: self.batch.positions,
            starred_fields: self.batch.starred_fields.clone(),
            external_context: None,
            thresholds: self.dedup,
        }
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    // Validate batch
    if !(MIN_TITLES_PER_ROW..=MAX_TITLES_PER_ROW).contains(&config.batch.titles_per_row) {
        anyhow::bail!(
            "batch.titles_per_row must be in [{}, {}]",
            MIN_TITLES_PER_ROW,
            MAX_TITLES_PER_ROW
        );
    }
    if config.batch.starred_fields.len() > MAX_STARRED_FIELDS {
        anyhow::bail!(
            "batch.starred_fields allows at most {} columns",
            MAX_STARRED_FIELDS
        );
    }

    // Validate dedup
    config.dedup.validate().context("Invalid [dedup] section")?;

    match config.generation.provider.as_str() {
        "disabled" | "dashscope" | "openai" => {}
        other => anyhow::bail!(
            "Unknown generation provider: '{}'. Must be disabled, dashscope, or openai.",
            other
        ),
    }
    if config.generation.is_enabled() && config.generation.model.trim().is_empty() {
        anyhow::bail!(
            "generation.model must be specified when provider is '{}'",
            config.generation.provider
        );
    }

    match config.history.backend.as_str() {
        "file" | "sqlite" => {}
        other => anyhow::bail!(
            "Unknown history backend: '{}'. Must be file or sqlite.",
            other
        ),
    }

    Ok(config)
}
