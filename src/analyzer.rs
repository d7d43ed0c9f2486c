//! Historical performance analysis.
//!
//! Reads a CSV performance export and extracts the words that recur in the
//! titles of above-average CTR products. The rendered summary is injected
//! into prompts as external context (`genie run --performance`).
//!
//! Accepted columns:
//!
//! | Column | Meaning |
//! |--------|---------|
//! | `Product Name` | listing title (required) |
//! | `CTR` | fraction (`0.034`) or percentage (`3.4%`) |
//! | `Clicks`, `Impressions` | used when `CTR` is absent; zero impressions count as 0 |

use anyhow::{bail, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;
use std::path::Path;

use crate::rows::{read_table, Table};

pub const TOP_KEYWORDS: usize = 10;

const STOPWORDS: [&str; 11] = [
    "with", "for", "and", "the", "new", "hot", "sale", "wholesale", "china", "high", "quality",
];

static WORD_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b[a-zA-Z]{3,}\b").expect("word pattern is valid"));

#[derive(Debug, Clone, PartialEq)]
pub struct PerformanceReport {
    /// Every data row in the report, readable CTR or not.
    pub products: usize,
    pub high_performers: usize,
    /// Mean CTR, as a fraction.
    pub threshold: f64,
    /// Most frequent words in high-performer titles, ties in first-seen order.
    pub keywords: Vec<(String, usize)>,
}

impl PerformanceReport {
    /// Render as a prompt context block.
    pub fn to_context(&self) -> String {
        if self.high_performers == 0 {
            return format!(
                "[Historical performance analysis]\n- Analyzed {} products. No high-CTR products found (CTR above the mean).",
                self.products
            );
        }
        let mut lines = vec![
            "[Historical performance analysis]".to_string(),
            format!(
                "- Analyzed {} products. Found {} high performers (CTR > {:.2}%).",
                self.products,
                self.high_performers,
                self.threshold * 100.0
            ),
            "- Keywords that recur in high-CTR titles:".to_string(),
        ];
        for (word, count) in &self.keywords {
            lines.push(format!(
                "  * '{}' (appears {} times in top titles)",
                capitalize(word),
                count
            ));
        }
        lines.join("\n")
    }
}

/// Analyze a CSV performance export and render the context block.
pub fn analyze_performance(path: &Path) -> Result<String> {
    let table = read_table(path)?;
    Ok(analyze_table(&table)?.to_context())
}

pub fn analyze_table(table: &Table) -> Result<PerformanceReport> {
    let Some(name_col) = table.column_index("Product Name") else {
        bail!("Performance file missing 'Product Name' column");
    };

    let ctr_source = match (
        table.column_index("CTR"),
        table.column_index("Clicks"),
        table.column_index("Impressions"),
    ) {
        (Some(ctr), _, _) => CtrSource::Column(ctr),
        (None, Some(clicks), Some(impressions)) => CtrSource::Computed { clicks, impressions },
        _ => bail!("Could not determine CTR: need a 'CTR' column or 'Clicks' and 'Impressions'"),
    };

    let mut rows: Vec<(&str, f64)> = Vec::with_capacity(table.records.len());
    for r in 0..table.records.len() {
        match ctr_source.read(table, r) {
            Some(ctr) => rows.push((table.cell(r, name_col), ctr)),
            None => tracing::debug!(row = r + 1, "skipping row with unreadable CTR"),
        }
    }

    let threshold = if rows.is_empty() {
        0.0
    } else {
        rows.iter().map(|(_, c)| c).sum::<f64>() / rows.len() as f64
    };
    let winners: Vec<&str> = rows
        .iter()
        .filter(|(_, ctr)| *ctr > threshold)
        .map(|(name, _)| *name)
        .collect();

    Ok(PerformanceReport {
        products: table.records.len(),
        high_performers: winners.len(),
        threshold,
        keywords: top_words(&winners, TOP_KEYWORDS),
    })
}

enum CtrSource {
    Column(usize),
    Computed { clicks: usize, impressions: usize },
}

impl CtrSource {
    fn read(&self, table: &Table, row: usize) -> Option<f64> {
        match self {
            CtrSource::Column(col) => parse_ctr(table.cell(row, *col)),
            CtrSource::Computed {
                clicks,
                impressions,
            } => {
                let clicks = parse_number(table.cell(row, *clicks))?;
                let impressions = parse_number(table.cell(row, *impressions))?;
                if impressions == 0.0 {
                    Some(0.0)
                } else {
                    Some(clicks / impressions)
                }
            }
        }
    }
}

fn parse_ctr(raw: &str) -> Option<f64> {
    let raw = raw.trim();
    match raw.strip_suffix('%') {
        Some(pct) => parse_number(pct).map(|v| v / 100.0),
        None => parse_number(raw),
    }
}

fn parse_number(raw: &str) -> Option<f64> {
    raw.trim().replace(',', "").parse::<f64>().ok().filter(|v| v.is_finite())
}

fn top_words(titles: &[&str], limit: usize) -> Vec<(String, usize)> {
    let text = titles.join(" ").to_lowercase();
    let mut order: Vec<String> = Vec::new();
    let mut counts: HashMap<String, usize> = HashMap::new();
    for m in WORD_RE.find_iter(&text) {
        let w = m.as_str();
        if STOPWORDS.contains(&w) {
            continue;
        }
        let count = counts.entry(w.to_string()).or_insert(0);
        if *count == 0 {
            order.push(w.to_string());
        }
        *count += 1;
    }
    let mut ranked: Vec<(String, usize)> = order
        .into_iter()
        .map(|w| {
            let c = counts.get(&w).copied().unwrap_or(0);
            (w, c)
        })
        .collect();
    // Stable sort keeps first-seen order among ties.
    ranked.sort_by(|a, b| b.1.cmp(&a.1));
    ranked.truncate(limit);
    ranked
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
