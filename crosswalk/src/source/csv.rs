//! CSV rows and column extraction.
//!
//! Rows keep their cells as text; header lookup happens through the compiled
//! column, never by re-parsing.

use serde_json::Value;
use std::sync::Arc;

use super::Extractor;
use crate::error::{ConfigError, ConfigResult, ReaderError, ReaderResult};

/// One data row with a shared header list.
#[derive(Debug, Clone, PartialEq)]
pub struct CsvRow {
    headers: Arc<Vec<String>>,
    values: Vec<String>,
}

impl CsvRow {
    pub fn new(headers: Arc<Vec<String>>, values: Vec<String>) -> Self {
        Self { headers, values }
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    /// Trimmed cell under `column`; empty cells and unknown columns yield `None`.
    pub fn get(&self, column: &str) -> Option<&str> {
        let idx = self.headers.iter().position(|h| h == column)?;
        self.values
            .get(idx)
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
    }
}

/// A compiled column reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsvColumn {
    pub name: String,
}

/// Extractor for CSV rows, optionally splitting multi-valued cells.
#[derive(Debug, Clone, Default)]
pub struct CsvExtractor {
    multi_value_separator: Option<String>,
}

impl CsvExtractor {
    pub fn new(multi_value_separator: Option<String>) -> Self {
        Self {
            multi_value_separator: multi_value_separator.filter(|s| !s.is_empty()),
        }
    }
}

impl Extractor for CsvExtractor {
    type Record = CsvRow;
    type Query = CsvColumn;

    fn name(&self) -> &'static str {
        "csv"
    }

    fn compile(&self, path: &str) -> ConfigResult<CsvColumn> {
        let name = path.trim();
        if name.is_empty() {
            return Err(ConfigError::InvalidPath {
                path: path.to_string(),
                reason: "column name is empty".to_string(),
            });
        }
        Ok(CsvColumn {
            name: name.to_string(),
        })
    }

    fn extract(&self, record: &CsvRow, query: &CsvColumn) -> Vec<Value> {
        let Some(cell) = record.get(&query.name) else {
            return Vec::new();
        };
        match &self.multi_value_separator {
            Some(sep) => cell
                .split(sep.as_str())
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(|s| Value::String(s.to_string()))
                .collect(),
            None => vec![Value::String(cell.to_string())],
        }
    }
}

/// Detect the delimiter by counting candidates in the header line.
pub fn detect_delimiter(content: &str) -> u8 {
    let first_line = content.lines().next().unwrap_or("");

    let mut best = b',';
    let mut best_count = 0;
    for sep in [b',', b';', b'\t', b'|'] {
        let count = first_line.bytes().filter(|b| *b == sep).count();
        if count > best_count {
            best_count = count;
            best = sep;
        }
    }
    best
}

/// Read CSV text into rows. Without an explicit delimiter it is detected from
/// the header line. Rows with no non-empty cell are skipped.
pub fn read_csv(text: &str, delimiter: Option<u8>) -> ReaderResult<Vec<CsvRow>> {
    if text.trim().is_empty() {
        return Err(ReaderError::Empty);
    }
    let delimiter = delimiter.unwrap_or_else(|| detect_delimiter(text));

    let mut reader = ::csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .delimiter(delimiter)
        .from_reader(text.as_bytes());

    let headers: Vec<String> = reader
        .headers()?
        .iter()
        .map(|h| h.trim().trim_start_matches('\u{feff}').to_string())
        .collect();
    if headers.iter().all(String::is_empty) {
        return Err(ReaderError::Empty);
    }
    let headers = Arc::new(headers);

    let mut rows = Vec::new();
    for result in reader.records() {
        let record = result?;
        if record.iter().all(|cell| cell.trim().is_empty()) {
            continue;
        }
        let values = record.iter().map(str::to_string).collect();
        rows.push(CsvRow::new(Arc::clone(&headers), values));
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_simple_csv() {
        let rows = read_csv("name;date\nDirham;1301-1305\nDinar;c. 1850", None).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].get("name"), Some("Dirham"));
        assert_eq!(rows[1].get("date"), Some("c. 1850"));
    }

    #[test]
    fn test_quoted_values_with_delimiter() {
        let rows = read_csv("title,place\n\"Kitab, vol. 2\",\"Cairo\"", Some(b',')).unwrap();
        assert_eq!(rows[0].get("title"), Some("Kitab, vol. 2"));
    }

    #[test]
    fn test_short_rows_and_blank_lines() {
        let rows = read_csv("a;b;c\n1;;3\n\n;;\n4", None).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].get("b"), None);
        assert_eq!(rows[1].get("a"), Some("4"));
        assert_eq!(rows[1].get("c"), None);
    }

    #[test]
    fn test_empty_input() {
        assert!(matches!(read_csv("", None), Err(ReaderError::Empty)));
    }

    #[test]
    fn test_detect_delimiter() {
        assert_eq!(detect_delimiter("a;b;c\n1;2;3"), b';');
        assert_eq!(detect_delimiter("a,b,c"), b',');
        assert_eq!(detect_delimiter("a\tb\tc"), b'\t');
        assert_eq!(detect_delimiter("a|b|c"), b'|');
    }

    #[test]
    fn test_extract_column() {
        let rows = read_csv("Title,Subjects\nDirham,Coins | Numismatics\n", Some(b',')).unwrap();
        let plain = CsvExtractor::default();
        let query = plain.compile("Subjects").unwrap();
        assert_eq!(plain.extract(&rows[0], &query), vec![json!("Coins | Numismatics")]);

        let split = CsvExtractor::new(Some("|".to_string()));
        assert_eq!(
            split.extract(&rows[0], &query),
            vec![json!("Coins"), json!("Numismatics")]
        );
    }

    #[test]
    fn test_missing_column_is_empty() {
        let rows = read_csv("Title\nDirham\n", None).unwrap();
        let extractor = CsvExtractor::default();
        let query = extractor.compile("Creator").unwrap();
        assert!(extractor.extract(&rows[0], &query).is_empty());
        assert!(extractor.compile("  ").is_err());
    }
}
