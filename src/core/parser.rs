use crate::domain::model::{Batch, Cell};
use crate::utils::error::{Result, UploaderError};
use std::collections::HashSet;

/// Cell values treated as missing, in addition to the empty string.
const MISSING_MARKERS: &[&str] = &[
    "NA", "N/A", "n/a", "NaN", "nan", "-NaN", "-nan", "null", "NULL", "None", "<NA>", "#N/A",
    "#NA",
];

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ColumnKind {
    Int,
    Float,
    Bool,
    Text,
}

/// Parses comma-delimited bytes with a header row into a [`Batch`].
///
/// Column types are inferred over every non-missing cell of a column; a
/// column that does not agree on a single numeric or boolean type keeps its
/// raw strings.
pub fn parse_csv(bytes: &[u8]) -> Result<Batch> {
    let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Err(UploaderError::parse("No columns to parse from file"));
    }

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(bytes);

    let columns = normalize_headers(reader.headers().map_err(csv_error)?);
    let width = columns.len();
    tracing::debug!("CSV header has {} columns: {:?}", width, columns);

    let mut raw_rows: Vec<Vec<Option<String>>> = Vec::new();
    for result in reader.records() {
        let record = result.map_err(csv_error)?;

        // 只有空白的行視為空行，不論欄數
        if record.len() == 1 && record[0].trim().is_empty() {
            continue;
        }

        if record.len() > width {
            let line = record.position().map(|p| p.line()).unwrap_or(0);
            return Err(UploaderError::parse(format!(
                "Expected {} fields in line {}, saw {}",
                width,
                line,
                record.len()
            )));
        }

        let mut row: Vec<Option<String>> = record.iter().map(missing_to_none).collect();
        row.resize(width, None);
        raw_rows.push(row);
    }

    let kinds: Vec<ColumnKind> = (0..width)
        .map(|col| infer_kind(raw_rows.iter().filter_map(|row| row[col].as_deref())))
        .collect();
    tracing::debug!("Inferred column kinds: {:?}", kinds);

    let rows = raw_rows
        .into_iter()
        .map(|row| {
            row.into_iter()
                .zip(&kinds)
                .map(|(value, kind)| to_cell(value, *kind))
                .collect()
        })
        .collect();

    Batch::from_rows(columns, rows)
}

fn csv_error(err: csv::Error) -> UploaderError {
    let line = err.position().map(|p| p.line());
    let message = match err.kind() {
        csv::ErrorKind::Utf8 { .. } => "file is not valid UTF-8".to_string(),
        _ => err.to_string(),
    };
    match line {
        Some(line) => UploaderError::parse(format!("{} (line {})", message, line)),
        None => UploaderError::parse(message),
    }
}

/// Fills blank header names and de-duplicates repeated ones with `.N`
/// suffixes, in order of appearance.
fn normalize_headers(headers: &csv::StringRecord) -> Vec<String> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut columns = Vec::with_capacity(headers.len());

    for (index, raw) in headers.iter().enumerate() {
        let base = if raw.trim().is_empty() {
            format!("Unnamed: {}", index)
        } else {
            raw.to_string()
        };

        let mut name = base.clone();
        let mut suffix = 1;
        while seen.contains(&name) {
            name = format!("{}.{}", base, suffix);
            suffix += 1;
        }
        seen.insert(name.clone());
        columns.push(name);
    }

    columns
}

fn missing_to_none(value: &str) -> Option<String> {
    if value.is_empty() || MISSING_MARKERS.contains(&value.trim()) {
        None
    } else {
        Some(value.to_string())
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value {
        "True" | "TRUE" | "true" => Some(true),
        "False" | "FALSE" | "false" => Some(false),
        _ => None,
    }
}

fn parse_float(value: &str) -> Option<f64> {
    value.parse::<f64>().ok().filter(|x| x.is_finite())
}

fn infer_kind<'a>(values: impl Iterator<Item = &'a str> + Clone) -> ColumnKind {
    let mut values = values.map(str::trim).peekable();
    if values.peek().is_none() {
        return ColumnKind::Text;
    }

    if values.clone().all(|v| v.parse::<i64>().is_ok()) {
        ColumnKind::Int
    } else if values.clone().all(|v| parse_float(v).is_some()) {
        ColumnKind::Float
    } else if values.all(|v| parse_bool(v).is_some()) {
        ColumnKind::Bool
    } else {
        ColumnKind::Text
    }
}

fn to_cell(value: Option<String>, kind: ColumnKind) -> Cell {
    let Some(value) = value else {
        return Cell::Null;
    };

    let trimmed = value.trim();
    let typed = match kind {
        ColumnKind::Int => trimmed.parse::<i64>().ok().map(Cell::Int),
        ColumnKind::Float => parse_float(trimmed).map(Cell::Float),
        ColumnKind::Bool => parse_bool(trimmed).map(Cell::Bool),
        ColumnKind::Text => None,
    };
    typed.unwrap_or(Cell::Text(value))
}
