//! Dataset catalog: the raw data source collaborator.
//!
//! Each logical dataset name ("sponsored_display", "sponsored_brands") maps to
//! a CSV export on disk. Tables are read lazily on first access and cached for
//! the remainder of the run; the cache is read-only after population.

pub mod columns;

use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Logical name of the Sponsored Display product report.
pub const SPONSORED_DISPLAY: &str = "sponsored_display";

/// Logical name of the Sponsored Brands search-term report.
pub const SPONSORED_BRANDS: &str = "sponsored_brands";

/// Errors raised by the dataset catalog.
#[derive(Debug, Error)]
pub enum DataError {
    /// The requested name was never registered.
    #[error("unknown dataset '{0}'; ensure it is registered in the catalog")]
    UnknownDataset(String),

    /// The backing file is missing or unreadable.
    #[error("failed to read dataset source {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The backing file exists but is not parseable CSV.
    #[error("malformed CSV in {path}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
}

/// An in-memory table of raw records with named columns.
///
/// Cells are kept as raw strings; numeric interpretation happens at
/// aggregation time via [`Table::numeric`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Table {
    /// Build a table, padding or truncating each row to the header width.
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        let width = headers.len();
        let rows = rows
            .into_iter()
            .map(|mut row| {
                row.resize(width, String::new());
                row
            })
            .collect();
        Self { headers, rows }
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn column_index(&self, column: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == column)
    }

    /// The trimmed cell value, or `None` for a missing column or blank cell.
    pub fn cell(&self, row: usize, column: &str) -> Option<&str> {
        let idx = self.column_index(column)?;
        let value = self.rows.get(row)?.get(idx)?.trim();
        if value.is_empty() {
            None
        } else {
            Some(value)
        }
    }

    /// The cell parsed as a number, or `None` if blank or unparseable.
    pub fn numeric(&self, row: usize, column: &str) -> Option<f64> {
        parse_number(self.cell(row, column)?)
    }
}

/// Lenient numeric parsing for report cells.
///
/// Strips thousands separators, currency symbols, and percent signs before
/// parsing, so "₹1,234.50" and "1234.5" both resolve to 1234.5.
pub fn parse_number(raw: &str) -> Option<f64> {
    let cleaned: String = raw
        .chars()
        .filter(|c| !matches!(c, ',' | '₹' | '$' | '€' | '£' | '%') && !c.is_whitespace())
        .collect();
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse::<f64>().ok()
}

/// Coarse column type used by [`DatasetCatalog::schema`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    Numeric,
    Text,
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnType::Numeric => write!(f, "numeric"),
            ColumnType::Text => write!(f, "text"),
        }
    }
}

/// Shape description of a loaded table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableSchema {
    pub columns: Vec<(String, ColumnType)>,
    pub row_count: usize,
}

/// Registry of dataset name -> CSV path, with a per-run table cache.
///
/// Constructed once per run and passed by reference; single-threaded use only
/// (the cache has no interior locking).
pub struct DatasetCatalog {
    entries: HashMap<String, PathBuf>,
    cache: HashMap<String, Table>,
}

impl DatasetCatalog {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
            cache: HashMap::new(),
        }
    }

    /// Catalog with the two standard report entries rooted at `data_dir`.
    pub fn standard(data_dir: &Path, sd_file: &str, sb_file: &str) -> Self {
        let mut catalog = Self::new();
        catalog.register(SPONSORED_DISPLAY, data_dir.join(sd_file));
        catalog.register(SPONSORED_BRANDS, data_dir.join(sb_file));
        catalog
    }

    pub fn register(&mut self, name: &str, path: PathBuf) {
        self.entries.insert(name.to_string(), path);
    }

    /// Registered dataset names in a stable order.
    pub fn dataset_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.entries.keys().cloned().collect();
        names.sort();
        names
    }

    /// Load (or fetch from cache) the table for `name`.
    pub fn load(&mut self, name: &str) -> Result<&Table, DataError> {
        let path = self
            .entries
            .get(name)
            .ok_or_else(|| DataError::UnknownDataset(name.to_string()))?
            .clone();

        match self.cache.entry(name.to_string()) {
            std::collections::hash_map::Entry::Occupied(entry) => Ok(entry.into_mut()),
            std::collections::hash_map::Entry::Vacant(entry) => {
                debug!("Loading dataset '{}' from {}", name, path.display());
                let table = read_csv_table(&path)?;
                Ok(entry.insert(table))
            }
        }
    }

    /// Column names, inferred types, and row count for `name`.
    pub fn schema(&mut self, name: &str) -> Result<TableSchema, DataError> {
        let table = self.load(name)?;
        let row_count = table.row_count();
        let columns = table
            .headers()
            .iter()
            .map(|header| {
                let kind = (0..row_count)
                    .find_map(|row| table.cell(row, header))
                    .map_or(ColumnType::Text, |cell| {
                        if parse_number(cell).is_some() {
                            ColumnType::Numeric
                        } else {
                            ColumnType::Text
                        }
                    });
                (header.clone(), kind)
            })
            .collect();
        Ok(TableSchema { columns, row_count })
    }

    /// The first `n` rows of `name` as field-name -> value maps.
    pub fn sample(&mut self, name: &str, n: usize) -> Result<Vec<BTreeMap<String, String>>, DataError> {
        let table = self.load(name)?;
        let take = n.min(table.row_count());
        let mut records = Vec::with_capacity(take);
        for row in 0..take {
            let record = table
                .headers()
                .iter()
                .map(|header| {
                    let value = table.cell(row, header).unwrap_or("").to_string();
                    (header.clone(), value)
                })
                .collect();
            records.push(record);
        }
        Ok(records)
    }
}

impl Default for DatasetCatalog {
    fn default() -> Self {
        Self::new()
    }
}

/// Read a CSV file into a [`Table`], trimming header whitespace.
fn read_csv_table(path: &Path) -> Result<Table, DataError> {
    let content = std::fs::read_to_string(path).map_err(|source| DataError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(content.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .map_err(|source| DataError::Csv {
            path: path.to_path_buf(),
            source,
        })?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|source| DataError::Csv {
            path: path.to_path_buf(),
            source,
        })?;
        rows.push(record.iter().map(|cell| cell.to_string()).collect());
    }

    Ok(Table::new(headers, rows))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_csv(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_parse_number_lenient() {
        assert_eq!(parse_number("1234.5"), Some(1234.5));
        assert_eq!(parse_number("₹1,234.50"), Some(1234.5));
        assert_eq!(parse_number(" 42 "), Some(42.0));
        assert_eq!(parse_number("n/a"), None);
        assert_eq!(parse_number(""), None);
    }

    #[test]
    fn test_table_cell_and_numeric() {
        let table = Table::new(
            vec!["Spend".to_string(), "Campaign".to_string()],
            vec![
                vec!["10.5".to_string(), "C1".to_string()],
                vec![String::new(), "C2".to_string()],
            ],
        );
        assert_eq!(table.cell(0, "Campaign"), Some("C1"));
        assert_eq!(table.numeric(0, "Spend"), Some(10.5));
        assert_eq!(table.cell(1, "Spend"), None);
        assert_eq!(table.cell(0, "Missing"), None);
    }

    #[test]
    fn test_table_pads_short_rows() {
        let table = Table::new(
            vec!["A".to_string(), "B".to_string()],
            vec![vec!["1".to_string()]],
        );
        assert_eq!(table.cell(0, "A"), Some("1"));
        assert_eq!(table.cell(0, "B"), None);
    }

    #[test]
    fn test_load_unknown_dataset() {
        let mut catalog = DatasetCatalog::new();
        let err = catalog.load("nope").unwrap_err();
        assert!(matches!(err, DataError::UnknownDataset(name) if name == "nope"));
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut catalog = DatasetCatalog::new();
        catalog.register("ghost", dir.path().join("ghost.csv"));
        assert!(matches!(
            catalog.load("ghost").unwrap_err(),
            DataError::Io { .. }
        ));
    }

    #[test]
    fn test_load_parses_and_caches() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_csv(
            dir.path(),
            "sd.csv",
            "Spend , Clicks\n10.0,5\n20.0,2\n",
        );
        let mut catalog = DatasetCatalog::new();
        catalog.register(SPONSORED_DISPLAY, path.clone());

        let table = catalog.load(SPONSORED_DISPLAY).unwrap();
        assert_eq!(table.headers(), &["Spend".to_string(), "Clicks".to_string()]);
        assert_eq!(table.row_count(), 2);

        // Deleting the file does not affect subsequent loads: cache hit.
        std::fs::remove_file(path).unwrap();
        assert_eq!(catalog.load(SPONSORED_DISPLAY).unwrap().row_count(), 2);
    }

    #[test]
    fn test_schema_infers_types() {
        let dir = tempfile::tempdir().unwrap();
        write_csv(
            dir.path(),
            "sb.csv",
            "Spend,Search Term\n1.5,shoes\n2.0,socks\n",
        );
        let mut catalog = DatasetCatalog::new();
        catalog.register(SPONSORED_BRANDS, dir.path().join("sb.csv"));

        let schema = catalog.schema(SPONSORED_BRANDS).unwrap();
        assert_eq!(schema.row_count, 2);
        assert_eq!(
            schema.columns,
            vec![
                ("Spend".to_string(), ColumnType::Numeric),
                ("Search Term".to_string(), ColumnType::Text),
            ]
        );
    }

    #[test]
    fn test_sample_returns_first_n_records() {
        let dir = tempfile::tempdir().unwrap();
        write_csv(dir.path(), "t.csv", "A,B\n1,x\n2,y\n3,z\n");
        let mut catalog = DatasetCatalog::new();
        catalog.register("t", dir.path().join("t.csv"));

        let sample = catalog.sample("t", 2).unwrap();
        assert_eq!(sample.len(), 2);
        assert_eq!(sample[0]["A"], "1");
        assert_eq!(sample[1]["B"], "y");

        // Asking for more rows than exist is not an error.
        assert_eq!(catalog.sample("t", 10).unwrap().len(), 3);
    }

    #[test]
    fn test_standard_catalog_names() {
        let catalog = DatasetCatalog::standard(Path::new("/data"), "sd.csv", "sb.csv");
        assert_eq!(
            catalog.dataset_names(),
            vec![SPONSORED_BRANDS.to_string(), SPONSORED_DISPLAY.to_string()]
        );
    }
}
