//! Core data models used throughout Title Genie.
//!
//! These types represent the product rows, candidate titles, scores, history
//! records, and resumable batch progress that flow through the generation
//! and quality-control pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use crate::error::RowError;

/// Column holding the brand name.
pub const BRAND: &str = "Brand";
/// Column holding the main keyword.
pub const MAIN_KEYWORD: &str = "Main Keyword";
/// Column holding the core keyword.
pub const CORE_KEYWORD: &str = "Core Keyword";

/// Columns every input must carry.
pub const MANDATORY_COLUMNS: [&str; 3] = [BRAND, MAIN_KEYWORD, CORE_KEYWORD];

/// Bookkeeping columns that may appear in re-imported result sheets and are
/// never treated as product context.
pub const RESERVED_COLUMNS: [&str; 2] = ["Generated Titles", "Original Row ID"];

// ═══════════════════════════════════════════════════════════════════════
// Product rows
// ═══════════════════════════════════════════════════════════════════════

/// One product record: an ordered mapping from column name to cell text.
///
/// Column order is preserved so that prompt context renders in the same
/// order as the source sheet.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProductRow {
    columns: Vec<(String, String)>,
}

impl ProductRow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a row from `(column, value)` pairs, keeping their order.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut row = Self::new();
        for (k, v) in pairs {
            row.insert(k, v);
        }
        row
    }

    /// Set a column value, replacing an existing value in place.
    pub fn insert(&mut self, column: impl Into<String>, value: impl Into<String>) {
        let column = column.into();
        let value = value.into();
        match self.columns.iter_mut().find(|(k, _)| *k == column) {
            Some(slot) => slot.1 = value,
            None => self.columns.push((column, value)),
        }
    }

    pub fn get(&self, column: &str) -> Option<&str> {
        self.columns
            .iter()
            .find(|(k, _)| k == column)
            .map(|(_, v)| v.as_str())
    }

    /// Trimmed value of a column, or `""` when absent.
    pub fn value(&self, column: &str) -> &str {
        self.get(column).map(str::trim).unwrap_or("")
    }

    pub fn brand(&self) -> &str {
        self.value(BRAND)
    }

    pub fn main_keyword(&self) -> &str {
        self.value(MAIN_KEYWORD)
    }

    pub fn core_keyword(&self) -> &str {
        self.value(CORE_KEYWORD)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.columns.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Reject rows whose mandatory slots are blank after trimming.
    ///
    /// `index` is the 0-based position of the row in its input.
    pub fn validate(&self, index: usize) -> Result<(), RowError> {
        for column in MANDATORY_COLUMNS {
            if self.value(column).is_empty() {
                return Err(RowError::MissingField {
                    row: index + 1,
                    column,
                });
            }
        }
        Ok(())
    }
}

/// An ordered batch of rows plus the header they were read with.
#[derive(Debug, Clone, Default)]
pub struct RowSet {
    pub columns: Vec<String>,
    pub rows: Vec<ProductRow>,
}

impl RowSet {
    pub fn new(columns: Vec<String>, rows: Vec<ProductRow>) -> Self {
        Self { columns, rows }
    }

    /// Derive the header from the first row. Useful for in-memory inputs.
    pub fn from_rows(rows: Vec<ProductRow>) -> Self {
        let columns = rows
            .first()
            .map(|r| r.iter().map(|(k, _)| k.to_string()).collect())
            .unwrap_or_default();
        Self { columns, rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Generation modes and keyword slots
// ═══════════════════════════════════════════════════════════════════════

/// How strictly the prompt constrains title structure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GenerationMode {
    /// Fixed slot ordering.
    Strict,
    /// Positional rules plus stylistic diversity across candidates.
    #[default]
    Marketing,
}

impl FromStr for GenerationMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "strict" | "a" => Ok(Self::Strict),
            "marketing" | "b" => Ok(Self::Marketing),
            other => Err(format!(
                "unknown generation mode '{}': expected strict or marketing",
                other
            )),
        }
    }
}

impl fmt::Display for GenerationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Strict => f.write_str("strict"),
            Self::Marketing => f.write_str("marketing"),
        }
    }
}

/// One of the three mandatory keyword roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Slot {
    Brand,
    MainKeyword,
    CoreKeyword,
}

impl Slot {
    pub const ALL: [Slot; 3] = [Slot::Brand, Slot::MainKeyword, Slot::CoreKeyword];

    /// Input column backing this slot.
    pub fn column(self) -> &'static str {
        match self {
            Slot::Brand => BRAND,
            Slot::MainKeyword => MAIN_KEYWORD,
            Slot::CoreKeyword => CORE_KEYWORD,
        }
    }
}

impl FromStr for Slot {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key: String = s
            .trim()
            .to_ascii_lowercase()
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect();
        match key.as_str() {
            "brand" => Ok(Slot::Brand),
            "main" | "mainkeyword" => Ok(Slot::MainKeyword),
            "core" | "corekeyword" => Ok(Slot::CoreKeyword),
            _ => Err(format!(
                "unknown keyword slot '{}': expected brand, main_keyword or core_keyword",
                s
            )),
        }
    }
}

/// Where a keyword must appear in the generated title.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeywordPosition {
    Front,
    Middle,
    End,
}

impl KeywordPosition {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Front => "front",
            Self::Middle => "middle",
            Self::End => "end",
        }
    }
}

impl FromStr for KeywordPosition {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "front" | "start" => Ok(Self::Front),
            "middle" => Ok(Self::Middle),
            "end" => Ok(Self::End),
            other => Err(format!(
                "unknown keyword position '{}': expected front, middle or end",
                other
            )),
        }
    }
}

/// Per-slot positional rules. `None` means no positional constraint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionRules {
    #[serde(default)]
    pub brand: Option<KeywordPosition>,
    #[serde(default)]
    pub main_keyword: Option<KeywordPosition>,
    #[serde(default)]
    pub core_keyword: Option<KeywordPosition>,
}

impl PositionRules {
    pub fn get(&self, slot: Slot) -> Option<KeywordPosition> {
        match slot {
            Slot::Brand => self.brand,
            Slot::MainKeyword => self.main_keyword,
            Slot::CoreKeyword => self.core_keyword,
        }
    }

    pub fn set(&mut self, slot: Slot, position: Option<KeywordPosition>) {
        match slot {
            Slot::Brand => self.brand = position,
            Slot::MainKeyword => self.main_keyword = position,
            Slot::CoreKeyword => self.core_keyword = position,
        }
    }

    pub fn is_empty(&self) -> bool {
        Slot::ALL.iter().all(|s| self.get(*s).is_none())
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Candidates and scores
// ═══════════════════════════════════════════════════════════════════════

/// A candidate title with its lowercase form cached once for similarity checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateTitle {
    text: String,
    lower: String,
}

impl CandidateTitle {
    pub fn new(text: impl Into<String>) -> Self {
        let text = text.into();
        let lower = text.to_lowercase();
        Self { text, lower }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn lower(&self) -> &str {
        &self.lower
    }

    pub fn into_string(self) -> String {
        self.text
    }
}

/// SEO health score in `[0, 100]` with deduction reasons in evaluation order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreResult {
    pub score: u32,
    pub reasons: Vec<String>,
}

impl ScoreResult {
    pub fn is_perfect(&self) -> bool {
        self.score >= 100
    }
}

// ═══════════════════════════════════════════════════════════════════════
// History and results
// ═══════════════════════════════════════════════════════════════════════

/// An accepted title stored in the cross-session history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub title: String,
    /// Lowercase of `title`, computed when the record entered the store.
    #[serde(default, deserialize_with = "lenient::string")]
    pub title_lower: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub brand: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub product_id: String,
    #[serde(deserialize_with = "timestamp::deserialize_or_now", default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl HistoryRecord {
    pub fn new(
        title: impl Into<String>,
        brand: impl Into<String>,
        product_id: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        let title = title.into();
        let title_lower = title.to_lowercase();
        Self {
            title,
            title_lower,
            brand: brand.into(),
            product_id: product_id.into(),
            created_at,
        }
    }
}

/// One output row handed to the result sink.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRecord {
    /// 1-based row number in the input.
    pub row_number: usize,
    pub brand: String,
    pub main_keyword: String,
    pub core_keyword: String,
    pub title: String,
    pub seo_score: u32,
    pub notes: String,
}

/// Resumable batch state: processed row indices plus accumulated results.
///
/// `processed` is always a subset of `[0, total_rows)`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchProgress {
    total_rows: usize,
    processed: BTreeSet<usize>,
    results: Vec<ResultRecord>,
}

impl BatchProgress {
    pub fn new(total_rows: usize) -> Self {
        Self {
            total_rows,
            processed: BTreeSet::new(),
            results: Vec::new(),
        }
    }

    pub fn total_rows(&self) -> usize {
        self.total_rows
    }

    pub fn is_processed(&self, index: usize) -> bool {
        self.processed.contains(&index)
    }

    pub fn processed(&self) -> &BTreeSet<usize> {
        &self.processed
    }

    pub fn processed_count(&self) -> usize {
        self.processed.len()
    }

    pub fn is_complete(&self) -> bool {
        self.processed.len() == self.total_rows
    }

    /// Indices not yet processed, ascending.
    pub fn pending(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.total_rows).filter(move |i| !self.processed.contains(i))
    }

    pub fn results(&self) -> &[ResultRecord] {
        &self.results
    }

    /// Append a finished row's results and mark it processed.
    ///
    /// Returns `false` without changing anything when `index` is out of range
    /// or was already recorded.
    pub fn record_row(&mut self, index: usize, records: Vec<ResultRecord>) -> bool {
        if index >= self.total_rows || self.processed.contains(&index) {
            return false;
        }
        self.results.extend(records);
        self.processed.insert(index);
        true
    }

    /// Drop any indices outside `[0, total_rows)`, e.g. from a hand-edited checkpoint.
    pub fn sanitize(&mut self) {
        let total = self.total_rows;
        self.processed.retain(|i| *i < total);
    }
}

/// Lenient timestamp parsing for history files written by older tools,
/// which stored naive local ISO-8601 strings without an offset.
pub(crate) mod timestamp {
    use chrono::{DateTime, NaiveDateTime, Utc};
    use serde::{de, Deserialize, Deserializer};

    pub fn parse(raw: &str) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(raw)
            .map(|dt| dt.with_timezone(&Utc))
            .ok()
            .or_else(|| {
                NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
                    .ok()
                    .map(|n| n.and_utc())
            })
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        parse(&raw).ok_or_else(|| de::Error::custom(format!("invalid timestamp: {}", raw)))
    }

    /// Any unparseable value becomes the current time.
    pub fn deserialize_or_now<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = serde_json::Value::deserialize(deserializer)?;
        Ok(value.as_str().and_then(parse).unwrap_or_else(Utc::now))
    }
}

/// Metadata fields in old history files were written from spreadsheet cells,
/// so they may hold numbers or nulls instead of strings.
pub(crate) mod lenient {
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    pub fn string<'de, D>(deserializer: D) -> Result<String, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(match Value::deserialize(deserializer)? {
            Value::String(s) => s,
            Value::Number(n) => n.to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Null | Value::Array(_) | Value::Object(_) => String::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row() -> ProductRow {
        ProductRow::from_pairs([
            ("Brand", " TechNova "),
            ("Main Keyword", "Wireless Earbuds"),
            ("Core Keyword", "Headphones"),
            ("Color", "Black"),
        ])
    }

    #[test]
    fn row_preserves_column_order_and_trims_values() {
        let r = row();
        let cols: Vec<&str> = r.iter().map(|(k, _)| k).collect();
        assert_eq!(cols, vec!["Brand", "Main Keyword", "Core Keyword", "Color"]);
        assert_eq!(r.brand(), "TechNova");
        assert_eq!(r.get("Brand"), Some(" TechNova "));
    }

    #[test]
    fn row_validation_rejects_blank_mandatory_field() {
        let mut r = row();
        assert!(r.validate(0).is_ok());
        r.insert("Core Keyword", "   ");
        let err = r.validate(4).unwrap_err();
        assert_eq!(
            err,
            RowError::MissingField {
                row: 5,
                column: CORE_KEYWORD
            }
        );
    }

    #[test]
    fn candidate_caches_lowercase() {
        let c = CandidateTitle::new("TechNova USB Hub");
        assert_eq!(c.lower(), "technova usb hub");
        assert_eq!(c.as_str(), "TechNova USB Hub");
    }

    #[test]
    fn progress_rejects_out_of_range_and_repeat_indices() {
        let mut p = BatchProgress::new(2);
        assert!(p.record_row(1, vec![]));
        assert!(!p.record_row(1, vec![]));
        assert!(!p.record_row(2, vec![]));
        assert_eq!(p.pending().collect::<Vec<_>>(), vec![0]);
        assert!(!p.is_complete());
    }

    #[test]
    fn mode_and_position_parse() {
        assert_eq!("Strict".parse::<GenerationMode>(), Ok(GenerationMode::Strict));
        assert_eq!("end".parse::<KeywordPosition>(), Ok(KeywordPosition::End));
        assert_eq!("main_keyword".parse::<Slot>(), Ok(Slot::MainKeyword));
        assert!("sideways".parse::<KeywordPosition>().is_err());
    }

    #[test]
    fn history_record_reads_legacy_naive_timestamp() {
        let json = r#"{"title":"A Title","brand":"X","product_id":"Row-1","created_at":"2024-05-01T10:20:30.123456"}"#;
        let rec: HistoryRecord = serde_json::from_str(json).unwrap();
        assert_eq!(rec.created_at.timestamp(), 1714558830);
        assert_eq!(rec.title_lower, "");
    }

    #[test]
    fn history_record_coerces_spreadsheet_metadata() {
        let json = r#"{"title":"A Title","brand":12345,"product_id":null,"created_at":"yesterday"}"#;
        let rec: HistoryRecord = serde_json::from_str(json).unwrap();
        assert_eq!(rec.brand, "12345");
        assert_eq!(rec.product_id, "");
        assert_eq!(rec.title, "A Title");
    }
}
