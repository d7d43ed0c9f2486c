//! CSV row source and result sink.
//!
//! Input files need a header row containing at least `Brand`,
//! `Main Keyword` and `Core Keyword`. Every other column is carried along
//! as prompt context, in file order. Header names and cells are trimmed.

use anyhow::{Context, Result};
use std::path::Path;

use title_genie_core::error::ConfigError;
use title_genie_core::models::{ProductRow, ResultRecord, RowSet, MANDATORY_COLUMNS};

pub const RESULT_HEADER: [&str; 7] = [
    "Row",
    "Brand",
    "Main Keyword",
    "Core Keyword",
    "Generated Title",
    "SEO Score",
    "Notes",
];

/// A header plus raw string records, with no schema expectations.
#[derive(Debug, Clone, Default)]
pub struct Table {
    pub headers: Vec<String>,
    pub records: Vec<Vec<String>>,
}

impl Table {
    /// Position of the first header matching `name`, ignoring ASCII case.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers
            .iter()
            .position(|h| h.eq_ignore_ascii_case(name.trim()))
    }

    /// Cell at (`row`, `col`), or `""` for short records.
    pub fn cell(&self, row: usize, col: usize) -> &str {
        self.records
            .get(row)
            .and_then(|r| r.get(col))
            .map(String::as_str)
            .unwrap_or("")
    }
}

/// Read any headed CSV file, trimming headers and cells.
pub fn read_table(path: &Path) -> Result<Table> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .with_context(|| format!("Failed to open CSV file: {}", path.display()))?;

    let headers: Vec<String> = reader
        .headers()
        .with_context(|| format!("Failed to read CSV header: {}", path.display()))?
        .iter()
        .map(|h| h.trim_start_matches('\u{feff}').trim().to_string())
        .collect();

    let mut records = Vec::new();
    for (i, record) in reader.records().enumerate() {
        let record = record
            .with_context(|| format!("Malformed CSV record {} in {}", i + 1, path.display()))?;
        records.push(record.iter().map(str::to_string).collect());
    }

    Ok(Table { headers, records })
}

/// Load product rows for a batch.
pub fn load_rows(path: &Path) -> Result<RowSet> {
    let table = read_table(path)?;

    let missing: Vec<String> = MANDATORY_COLUMNS
        .iter()
        .filter(|m| !table.headers.iter().any(|h| h == *m))
        .map(|m| m.to_string())
        .collect();
    if !missing.is_empty() {
        return Err(ConfigError::MissingColumns(missing))
            .with_context(|| format!("Invalid input file: {}", path.display()));
    }

    let rows = (0..table.records.len())
        .map(|r| {
            ProductRow::from_pairs(
                table
                    .headers
                    .iter()
                    .enumerate()
                    .filter(|(_, h)| !h.is_empty())
                    .map(|(c, h)| (h.clone(), table.cell(r, c).to_string())),
            )
        })
        .collect();

    tracing::debug!(path = %path.display(), columns = table.headers.len(), "rows loaded");
    Ok(RowSet::new(table.headers, rows))
}

/// Write result records, one line per accepted title.
pub fn write_rows(path: &Path, results: &[ResultRecord]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create output file: {}", path.display()))?;

    writer.write_record(RESULT_HEADER)?;
    for r in results {
        writer.write_record([
            r.row_number.to_string(),
            r.brand.clone(),
            r.main_keyword.clone(),
            r.core_keyword.clone(),
            r.title.clone(),
            r.seo_score.to_string(),
            r.notes.clone(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(dir: &tempfile::TempDir, name: &str, body: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn loads_rows_with_trimmed_headers_and_cells() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = write(
            &dir,
            "in.csv",
            " Brand ,Main Keyword,Core Keyword,Color\nTechNova , Wireless Earbuds,Headphones,Black\nEcoLife,Toothbrush,Bamboo\n",
        );
        let set = load_rows(&path).unwrap();
        assert_eq!(set.columns, vec!["Brand", "Main Keyword", "Core Keyword", "Color"]);
        assert_eq!(set.len(), 2);
        assert_eq!(set.rows[0].brand(), "TechNova");
        assert_eq!(set.rows[0].main_keyword(), "Wireless Earbuds");
        assert_eq!(set.rows[0].get("Color"), Some("Black"));
        assert_eq!(set.rows[1].get("Color"), Some(""));
    }

    #[test]
    fn missing_mandatory_header_is_config_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = write(&dir, "in.csv", "Brand,Color\nX,Y\n");
        let err = load_rows(&path).unwrap_err();
        assert_eq!(
            err.downcast_ref::<ConfigError>(),
            Some(&ConfigError::MissingColumns(vec![
                "Main Keyword".into(),
                "Core Keyword".into()
            ]))
        );
    }

    #[test]
    fn writes_result_header_and_rows() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("out/results.csv");
        write_rows(
            &path,
            &[ResultRecord {
                row_number: 1,
                brand: "TechNova".into(),
                main_keyword: "Wireless Earbuds".into(),
                core_keyword: "Headphones".into(),
                title: "TechNova Wireless Earbuds".into(),
                seo_score: 80,
                notes: "too short (25/80) (-20), brand prepended".into(),
            }],
        )
        .unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next(),
            Some("Row,Brand,Main Keyword,Core Keyword,Generated Title,SEO Score,Notes")
        );
        assert_eq!(
            lines.next(),
            Some("1,TechNova,Wireless Earbuds,Headphones,TechNova Wireless Earbuds,80,\"too short (25/80) (-20), brand prepended\"")
        );
    }

    #[test]
    fn column_lookup_ignores_case() {
        let table = Table {
            headers: vec!["Product Name".into(), "CTR".into()],
            records: vec![vec!["A".into()]],
        };
        assert_eq!(table.column_index("product name"), Some(0));
        assert_eq!(table.cell(0, 1), "");
    }
}
