//! Uploaded CSV/XLSX tables with typed columns.
//!
//! Cells are read as optional strings and each column is then classified as
//! numeric, boolean or text. Empty cells and the usual NA markers are
//! missing values.

use std::io::Cursor;

use calamine::{Data, Reader, Xlsx};
use serde::Serialize;

use crate::error::AnalysisError;

pub const CSV_MIME: &str = "text/csv";
pub const XLSX_MIME: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

/// Cell texts read as missing values.
const NA_MARKERS: &[&str] = &[
    "", "NA", "N/A", "n/a", "NaN", "nan", "-NaN", "NULL", "null", "None", "<NA>", "#N/A",
];

// =============================================================================
// UploadKind
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadKind {
    Csv,
    Xlsx,
}

impl UploadKind {
    /// Map a declared MIME type (parameters such as `charset` are ignored).
    pub fn from_mime(mime: &str) -> Result<Self, AnalysisError> {
        let essence = mime.split(';').next().unwrap_or_default().trim();
        if essence.eq_ignore_ascii_case(CSV_MIME) {
            Ok(UploadKind::Csv)
        } else if essence.eq_ignore_ascii_case(XLSX_MIME) {
            Ok(UploadKind::Xlsx)
        } else {
            Err(AnalysisError::UnsupportedFormat(mime.to_string()))
        }
    }
}

// =============================================================================
// Columns
// =============================================================================

/// Values of one column. Vectors hold one entry per row.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnData {
    Numeric(Vec<Option<f64>>),
    Text(Vec<Option<String>>),
    Boolean(Vec<Option<bool>>),
}

impl ColumnData {
    fn classify(cells: Vec<Option<String>>) -> Self {
        let present: Vec<&str> = cells.iter().flatten().map(|s| s.as_str()).collect();
        if present.is_empty() {
            return ColumnData::Text(cells);
        }
        if present.iter().all(|s| s.parse::<f64>().is_ok()) {
            return ColumnData::Numeric(
                cells
                    .iter()
                    .map(|c| c.as_deref().and_then(|s| s.parse().ok()))
                    .collect(),
            );
        }
        if present.iter().all(|s| parse_bool(s).is_some()) {
            return ColumnData::Boolean(
                cells.iter().map(|c| c.as_deref().and_then(parse_bool)).collect(),
            );
        }
        ColumnData::Text(cells)
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            ColumnData::Numeric(_) => "numeric",
            ColumnData::Text(_) => "text",
            ColumnData::Boolean(_) => "boolean",
        }
    }

    fn display(&self, row: usize) -> String {
        match self {
            ColumnData::Numeric(values) => match values.get(row).copied().flatten() {
                Some(v) => format_number(v),
                None => "NaN".to_string(),
            },
            ColumnData::Text(values) => values
                .get(row)
                .cloned()
                .flatten()
                .unwrap_or_else(|| "NaN".to_string()),
            ColumnData::Boolean(values) => match values.get(row).copied().flatten() {
                Some(true) => "True".to_string(),
                Some(false) => "False".to_string(),
                None => "NaN".to_string(),
            },
        }
    }
}

fn parse_bool(s: &str) -> Option<bool> {
    if s.eq_ignore_ascii_case("true") {
        Some(true)
    } else if s.eq_ignore_ascii_case("false") {
        Some(false)
    } else {
        None
    }
}

fn format_number(v: f64) -> String {
    if v.fract() == 0.0 && v.abs() < 1e15 {
        format!("{}", v as i64)
    } else {
        format!("{}", v)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TableColumn {
    pub name: String,
    pub data: ColumnData,
}

// =============================================================================
// UploadedTable
// =============================================================================

/// A parsed upload: named, typed columns of equal length.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadedTable {
    columns: Vec<TableColumn>,
    row_count: usize,
}

impl UploadedTable {
    pub fn parse(kind: UploadKind, bytes: &[u8]) -> Result<Self, AnalysisError> {
        match kind {
            UploadKind::Csv => Self::from_csv(bytes),
            UploadKind::Xlsx => Self::from_xlsx(bytes),
        }
    }

    /// Parse UTF-8 CSV with a header row.
    pub fn from_csv(bytes: &[u8]) -> Result<Self, AnalysisError> {
        let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(bytes);

        let headers: Vec<String> = reader.headers()?.iter().map(|h| h.to_string()).collect();
        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record?;
            rows.push(record.iter().map(cell_value).collect());
        }
        Self::from_rows(headers, rows)
    }

    /// Parse the first worksheet of an XLSX workbook; its first row is the
    /// header.
    pub fn from_xlsx(bytes: &[u8]) -> Result<Self, AnalysisError> {
        let mut workbook: Xlsx<_> = Xlsx::new(Cursor::new(bytes.to_vec()))?;
        let range = workbook
            .worksheet_range_at(0)
            .ok_or_else(|| AnalysisError::Parse("workbook has no worksheets".to_string()))??;

        let mut rows = range.rows();
        let headers: Vec<String> = rows
            .next()
            .map(|r| r.iter().map(|c| xlsx_cell(c).unwrap_or_default()).collect())
            .unwrap_or_default();
        let rows = rows.map(|r| r.iter().map(xlsx_cell).collect()).collect();
        Self::from_rows(headers, rows)
    }

    /// Build a table from header names and raw cell rows. Short rows are
    /// padded with missing values; extra cells are dropped.
    pub fn from_rows(
        headers: Vec<String>,
        rows: Vec<Vec<Option<String>>>,
    ) -> Result<Self, AnalysisError> {
        if headers.is_empty() {
            return Err(AnalysisError::Parse("file has no header row".to_string()));
        }
        let names = unique_names(&headers);
        let row_count = rows.len();

        let mut cells: Vec<Vec<Option<String>>> = vec![Vec::with_capacity(row_count); names.len()];
        for row in rows {
            let mut row = row.into_iter();
            for column in cells.iter_mut() {
                column.push(row.next().flatten());
            }
        }

        let columns = names
            .into_iter()
            .zip(cells)
            .map(|(name, values)| TableColumn {
                name,
                data: ColumnData::classify(values),
            })
            .collect();
        Ok(Self { columns, row_count })
    }

    pub fn columns(&self) -> &[TableColumn] {
        &self.columns
    }

    pub fn row_count(&self) -> usize {
        self.row_count
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn numeric_columns(&self) -> Vec<(&str, &[Option<f64>])> {
        self.columns
            .iter()
            .filter_map(|c| match &c.data {
                ColumnData::Numeric(v) => Some((c.name.as_str(), v.as_slice())),
                _ => None,
            })
            .collect()
    }

    pub fn text_columns(&self) -> Vec<(&str, &[Option<String>])> {
        self.columns
            .iter()
            .filter_map(|c| match &c.data {
                ColumnData::Text(v) => Some((c.name.as_str(), v.as_slice())),
                _ => None,
            })
            .collect()
    }

    /// Fixed-width text rendering of the first `rows` rows with a leading
    /// row index. Values are right-aligned under their headers.
    pub fn render_preview(&self, rows: usize) -> String {
        let shown = rows.min(self.row_count);
        let index: Vec<String> = (0..shown).map(|i| i.to_string()).collect();
        let index_width = index.iter().map(|s| s.len()).max().unwrap_or(0);

        let rendered: Vec<(String, Vec<String>, usize)> = self
            .columns
            .iter()
            .map(|c| {
                let values: Vec<String> = (0..shown).map(|r| c.data.display(r)).collect();
                let width = values
                    .iter()
                    .map(|v| v.chars().count())
                    .chain(std::iter::once(c.name.chars().count()))
                    .max()
                    .unwrap_or(0);
                (c.name.clone(), values, width)
            })
            .collect();

        let mut lines = Vec::with_capacity(shown + 1);
        let mut header = " ".repeat(index_width);
        for (name, _, width) in &rendered {
            header.push_str(&format!("  {:>width$}", name, width = *width));
        }
        lines.push(header);

        for (r, label) in index.iter().enumerate() {
            let mut line = format!("{:<width$}", label, width = index_width);
            for (_, values, width) in &rendered {
                line.push_str(&format!("  {:>width$}", values[r], width = *width));
            }
            lines.push(line);
        }
        lines.join("\n")
    }
}

/// The analysis request sent to the model for an uploaded table.
pub fn analysis_prompt(preview: &str) -> String {
    format!(
        "Analyze the following data:\n\n{}\n\nProvide insights based on this data.",
        preview
    )
}

fn cell_value(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if NA_MARKERS.contains(&trimmed) {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn xlsx_cell(cell: &Data) -> Option<String> {
    match cell {
        Data::Empty | Data::Error(_) => None,
        Data::String(s) => cell_value(s),
        Data::Int(i) => Some(i.to_string()),
        Data::Float(f) => Some(f.to_string()),
        Data::Bool(b) => Some(b.to_string()),
        Data::DateTime(dt) => Some(dt.to_string()),
        Data::DateTimeIso(s) | Data::DurationIso(s) => Some(s.clone()),
    }
}

/// Name blank headers `Unnamed: {i}` and suffix repeats with `.1`, `.2`, ...
fn unique_names(headers: &[String]) -> Vec<String> {
    let mut names: Vec<String> = Vec::with_capacity(headers.len());
    for (i, header) in headers.iter().enumerate() {
        let base = match header.trim() {
            "" => format!("Unnamed: {}", i),
            h => h.to_string(),
        };
        let mut name = base.clone();
        let mut n = 1;
        while names.contains(&name) {
            name = format!("{}.{}", base, n);
            n += 1;
        }
        names.push(name);
    }
    names
}

// =============================================================================
// Tests
// =============================================================================
