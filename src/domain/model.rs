use crate::utils::error::{Result, UploaderError};
use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};
use std::fmt;

/// A single CSV cell after type inference.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Cell {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Null => f.write_str("null"),
            Cell::Bool(b) => write!(f, "{}", b),
            Cell::Int(i) => write!(f, "{}", i),
            Cell::Float(x) => write!(f, "{}", x),
            Cell::Text(s) => f.write_str(s),
        }
    }
}

/// An immutable, parsed CSV file: a shared column list and one row of
/// cells per record. Every row has exactly `columns.len()` cells.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    columns: Vec<String>,
    rows: Vec<Vec<Cell>>,
}

impl Batch {
    pub fn from_rows(columns: Vec<String>, rows: Vec<Vec<Cell>>) -> Result<Self> {
        if let Some((index, row)) = rows
            .iter()
            .enumerate()
            .find(|(_, row)| row.len() != columns.len())
        {
            return Err(UploaderError::parse(format!(
                "record {} has {} fields, expected {}",
                index + 1,
                row.len(),
                columns.len()
            )));
        }
        Ok(Self { columns, rows })
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn records(&self) -> impl ExactSizeIterator<Item = Record<'_>> + '_ {
        self.rows.iter().map(move |cells| Record {
            columns: &self.columns,
            cells,
        })
    }

    /// First `n` records, for previews.
    pub fn head(&self, n: usize) -> impl Iterator<Item = Record<'_>> + '_ {
        self.records().take(n)
    }

    /// The document written to the store: an array of record objects whose
    /// keys follow the file's column order.
    pub fn to_document(&self) -> Result<serde_json::Value> {
        Ok(serde_json::to_value(self)?)
    }
}

impl Serialize for Batch {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.rows.len()))?;
        for record in self.records() {
            seq.serialize_element(&record)?;
        }
        seq.end()
    }
}

/// Borrowed view of one row of a [`Batch`].
#[derive(Debug, Clone, Copy)]
pub struct Record<'a> {
    columns: &'a [String],
    cells: &'a [Cell],
}

impl<'a> Record<'a> {
    pub fn get(&self, column: &str) -> Option<&'a Cell> {
        let cells = self.cells;
        self.columns
            .iter()
            .position(|c| c == column)
            .map(move |i| &cells[i])
    }

    pub fn cells(&self) -> &'a [Cell] {
        self.cells
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'a str, &'a Cell)> + 'a {
        let (columns, cells) = (self.columns, self.cells);
        columns.iter().map(String::as_str).zip(cells.iter())
    }
}

impl Serialize for Record<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.cells.len()))?;
        for (column, cell) in self.iter() {
            map.serialize_entry(column, cell)?;
        }
        map.end()
    }
}

/// Slash-delimited location in the document store. Always has at least one
/// segment, so it can never address the database root.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DestinationPath {
    segments: Vec<String>,
}

// Characters the Realtime Database rejects in keys.
const FORBIDDEN_KEY_CHARS: [char; 5] = ['.', '#', '$', '[', ']'];

impl DestinationPath {
    pub fn parse(raw: &str) -> Result<Self> {
        let segments: Vec<String> = raw
            .trim()
            .split('/')
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();

        if segments.is_empty() {
            return Err(UploaderError::validation(
                "Destination path cannot be empty",
            ));
        }

        for segment in &segments {
            if let Some(c) = segment
                .chars()
                .find(|c| FORBIDDEN_KEY_CHARS.contains(c) || c.is_control())
            {
                return Err(UploaderError::validation(format!(
                    "Destination path segment '{}' contains forbidden character {:?}",
                    segment, c
                )));
            }
        }

        Ok(Self { segments })
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }
}

impl fmt::Display for DestinationPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.segments.join("/"))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum UploadResult {
    Success { count: usize },
    Failure { message: String },
}

impl UploadResult {
    pub fn is_success(&self) -> bool {
        matches!(self, UploadResult::Success { .. })
    }

    /// Text shown to the user after an upload attempt.
    pub fn display_message(&self) -> String {
        match self {
            UploadResult::Success { count } => {
                format!("Successfully uploaded {} records to Firebase", count)
            }
            UploadResult::Failure { message } => {
                format!("Error uploading to Firebase: {}", message)
            }
        }
    }
}

/// Summary metrics shown next to the preview.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DatasetInfo {
    pub rows: usize,
    pub columns: usize,
    pub size_bytes: usize,
}

impl DatasetInfo {
    pub fn new(batch: &Batch, size_bytes: usize) -> Self {
        Self {
            rows: batch.len(),
            columns: batch.column_count(),
            size_bytes,
        }
    }

    /// Size in KB rounded to two decimals.
    pub fn size_kb(&self) -> f64 {
        (self.size_bytes as f64 / 1024.0 * 100.0).round() / 100.0
    }
}
