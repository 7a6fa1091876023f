//! In-memory CSV tables with encoding detection.
//!
//! Everything is read into strings; numeric coercion happens where a caller
//! needs it. Files are always written back as UTF-8 with a BOM so spreadsheet
//! tools open the Korean headers correctly.

mod encoding;

pub use encoding::{detect, encode_utf8_sig, header_score, DetectionStrategy, SourceEncoding};

use crate::error::{PrepError, Result};
use csv::{ReaderBuilder, WriterBuilder};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;
use tracing::debug;

/// A parsed CSV file
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
    pub encoding: SourceEncoding,
}

impl Table {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self {
            headers,
            rows,
            encoding: SourceEncoding::Utf8Sig,
        }
    }

    /// Parse decoded CSV text. Short rows are padded with empty cells and
    /// long rows truncated to the header width. Repeated header names get a
    /// `.N` suffix so every column stays addressable by name.
    pub fn parse(text: &str, encoding: SourceEncoding) -> Result<Self> {
        let mut reader = ReaderBuilder::new()
            .flexible(true)
            .from_reader(text.as_bytes());

        let headers = dedupe_headers(reader.headers()?.iter().map(str::to_string));
        let width = headers.len();

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record?;
            let mut row: Vec<String> = record.iter().take(width).map(str::to_string).collect();
            row.resize(width, String::new());
            rows.push(row);
        }

        Ok(Self { headers, rows, encoding })
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    /// Borrow every cell of a column
    pub fn column(&self, index: usize) -> impl Iterator<Item = &str> + '_ {
        self.rows.iter().map(move |row| row.get(index).map(String::as_str).unwrap_or(""))
    }

    /// Non-missing cells of a column (empty or whitespace-only cells are missing)
    pub fn present_values(&self, index: usize) -> Vec<&str> {
        self.column(index).filter(|v| !is_missing(v)).collect()
    }

    /// Replace an existing column or append a new one
    pub fn set_column(&mut self, name: &str, values: Vec<String>) {
        match self.column_index(name) {
            Some(index) => {
                for (row, value) in self.rows.iter_mut().zip(values) {
                    row[index] = value;
                }
            }
            None => {
                self.headers.push(name.to_string());
                for (row, value) in self.rows.iter_mut().zip(values) {
                    row.push(value);
                }
            }
        }
    }

    /// Keep only the named columns, in the given order. Unknown names are ignored.
    pub fn select(&self, names: &[String]) -> Table {
        let indices: Vec<usize> = names.iter().filter_map(|n| self.column_index(n)).collect();
        Table {
            headers: indices.iter().map(|&i| self.headers[i].clone()).collect(),
            rows: self
                .rows
                .iter()
                .map(|row| indices.iter().map(|&i| row[i].clone()).collect())
                .collect(),
            encoding: self.encoding,
        }
    }

    pub fn to_csv_string(&self) -> Result<String> {
        let mut writer = WriterBuilder::new().from_writer(Vec::new());
        writer.write_record(&self.headers)?;
        for row in &self.rows {
            writer.write_record(row)?;
        }
        let bytes = writer
            .into_inner()
            .map_err(|e| PrepError::Io(e.into_error()))?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

/// Rename repeated headers pandas-style: `값`, `값.1`, `값.2`
fn dedupe_headers(headers: impl Iterator<Item = String>) -> Vec<String> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut suffixes: HashMap<String, usize> = HashMap::new();
    headers
        .map(|name| {
            if seen.insert(name.clone()) {
                return name;
            }
            let suffix = suffixes.entry(name.clone()).or_insert(0);
            loop {
                *suffix += 1;
                let candidate = format!("{}.{}", name, suffix);
                if seen.insert(candidate.clone()) {
                    return candidate;
                }
            }
        })
        .collect()
}

/// Whether a cell counts as missing
pub fn is_missing(value: &str) -> bool {
    value.trim().is_empty()
}

/// Keep only the ASCII digits of a value
pub fn digits_only(value: &str) -> String {
    value.chars().filter(|c| c.is_ascii_digit()).collect()
}

/// Parse a cell as a number, tolerating thousands separators
pub fn parse_number(value: &str) -> Option<f64> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed
        .parse::<f64>()
        .ok()
        .or_else(|| trimmed.replace(',', "").parse::<f64>().ok())
        .filter(|v| v.is_finite())
}

/// Parse a cell as an integer; integral floats such as `2020.0` are accepted
pub fn parse_integer(value: &str) -> Option<i64> {
    let number = parse_number(value)?;
    (number.fract() == 0.0).then_some(number as i64)
}

/// Read and decode a CSV file
pub fn read_table(path: &Path, strategy: DetectionStrategy) -> Result<Table> {
    let bytes = fs::read(path)?;
    let (encoding, text) = detect(&bytes, strategy).ok_or_else(|| PrepError::Encoding {
        path: path.to_path_buf(),
    })?;
    debug!(path = %path.display(), %encoding, "decoded csv");
    Table::parse(&text, encoding)
}

/// Write a table as UTF-8 with BOM, replacing any existing file
pub fn write_table(path: &Path, table: &Table) -> Result<()> {
    let text = table.to_csv_string()?;
    fs::write(path, encode_utf8_sig(&text))?;
    Ok(())
}

/// Sorted list of `*.csv` files directly inside `dir`
pub fn csv_files_in(dir: &Path) -> Result<Vec<std::path::PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && has_csv_extension(&path) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Sorted list of `*.csv` files anywhere below `dir`
pub fn csv_files_recursive(dir: &Path) -> Result<Vec<std::path::PathBuf>> {
    let mut files = Vec::new();
    let mut pending = vec![dir.to_path_buf()];
    while let Some(current) = pending.pop() {
        for entry in fs::read_dir(&current)? {
            let path = entry?.path();
            if path.is_dir() {
                pending.push(path);
            } else if has_csv_extension(&path) {
                files.push(path);
            }
        }
    }
    files.sort();
    Ok(files)
}

fn has_csv_extension(path: &Path) -> bool {
    path.extension().and_then(|e| e.to_str()) == Some("csv")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_pads_short_rows() {
        let table = Table::parse("a,b,c\n1,2\n3,4,5,6\n", SourceEncoding::Utf8).unwrap();
        assert_eq!(table.rows[0], vec!["1", "2", ""]);
        assert_eq!(table.rows[1], vec!["3", "4", "5"]);
    }

    #[test]
    fn test_repeated_headers_get_suffixes() {
        let table = Table::parse("값,값,x,값.1\n10,99,a,7\n", SourceEncoding::Utf8).unwrap();
        assert_eq!(table.headers, vec!["값", "값.1", "x", "값.1.1"]);
        assert_eq!(table.rows[0], vec!["10", "99", "a", "7"]);
    }

    #[test]
    fn test_set_column_replaces_and_appends() {
        let mut table = Table::parse("year,x\n1,a\n2,b\n", SourceEncoding::Utf8).unwrap();
        table.set_column("year", vec!["2020".into(), "2021".into()]);
        table.set_column("month", vec!["1".into(), "2".into()]);
        assert_eq!(table.headers, vec!["year", "x", "month"]);
        assert_eq!(table.rows[1], vec!["2021", "b", "2"]);
    }

    #[test]
    fn test_select_reorders() {
        let table = Table::parse("a,b,c\n1,2,3\n", SourceEncoding::Utf8).unwrap();
        let selected = table.select(&["c".to_string(), "a".to_string(), "zz".to_string()]);
        assert_eq!(selected.headers, vec!["c", "a"]);
        assert_eq!(selected.rows[0], vec!["3", "1"]);
    }

    #[test]
    fn test_parse_integer() {
        assert_eq!(parse_integer("2020"), Some(2020));
        assert_eq!(parse_integer("2020.0"), Some(2020));
        assert_eq!(parse_integer("1,234"), Some(1234));
        assert_eq!(parse_integer("2020.5"), None);
        assert_eq!(parse_integer("2020년"), None);
        assert_eq!(parse_integer(""), None);
    }

    #[test]
    fn test_csv_string_quotes_commas() {
        let table = Table::new(vec!["name".into()], vec![vec!["a,b".into()]]);
        assert_eq!(table.to_csv_string().unwrap(), "name\n\"a,b\"\n");
    }
}
