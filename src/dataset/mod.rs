//! Datasets the assistant answers questions about.
//!
//! A dataset is either uploaded with a request (parsed fresh every time) or
//! the bundled default, loaded once per process through [`DefaultDataset`].

pub mod cache;
pub mod csv_parser;
pub mod routes;
pub mod source;

pub use cache::DefaultDataset;
pub use csv_parser::parse;
pub use routes::router;
pub use source::{configured_source, DatasetSource, FileDatasetSource, HttpDatasetSource, StaticDatasetSource};

use serde::Serialize;

/// A single cell value
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Text(String),
    Integer(i64),
    Null,
}

impl std::fmt::Display for FieldValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FieldValue::Text(s) => write!(f, "{}", s),
            FieldValue::Integer(n) => write!(f, "{}", n),
            FieldValue::Null => write!(f, "null"),
        }
    }
}

/// One data row, keeping the header order of its columns
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DatasetRow {
    fields: Vec<(String, FieldValue)>,
}

impl DatasetRow {
    pub fn from_fields(fields: Vec<(String, FieldValue)>) -> Self {
        Self { fields }
    }

    pub fn get(&self, column: &str) -> Option<&FieldValue> {
        self.fields.iter().find(|(name, _)| name == column).map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.fields.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl Serialize for DatasetRow {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeMap;
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (name, value) in &self.fields {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

/// Parsed tabular data: header columns plus rows
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Dataset {
    columns: Vec<String>,
    rows: Vec<DatasetRow>,
}

impl Dataset {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_csv(text: &str) -> Self {
        let (columns, rows) = csv_parser::parse_with_headers(text);
        Self { columns, rows }
    }

    /// Parse an uploaded CSV, rejecting input the assistant could not use.
    pub fn from_upload(text: &str) -> Result<Self, DatasetError> {
        if text.trim().is_empty() {
            return Err(DatasetError::Missing);
        }

        let dataset = Self::from_csv(text);
        if dataset.columns.iter().all(|c| c.is_empty()) {
            return Err(DatasetError::MissingHeader);
        }
        if dataset.rows.is_empty() {
            return Err(DatasetError::NoRows);
        }
        Ok(dataset)
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[DatasetRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn summary(&self, preview_rows: usize) -> DatasetSummary {
        DatasetSummary {
            columns: self.columns.clone(),
            row_count: self.rows.len(),
            preview: self.rows.iter().take(preview_rows).cloned().collect(),
        }
    }
}

/// Shape of a dataset as reported to the client
#[derive(Debug, Clone, Serialize)]
pub struct DatasetSummary {
    pub columns: Vec<String>,
    pub row_count: usize,
    pub preview: Vec<DatasetRow>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DatasetError {
    #[error("No dataset provided: the uploaded CSV is empty. Upload a CSV file to start chatting.")]
    Missing,

    #[error("The uploaded CSV could not be parsed: the first line must contain column headers.")]
    MissingHeader,

    #[error("The uploaded CSV could not be parsed: it has a header row but no data rows.")]
    NoRows,
}
