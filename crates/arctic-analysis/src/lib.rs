//! Analysis of uploaded CSV and XLSX tables.
//!
//! Parses the upload into typed columns, asks the model for a narrative,
//! renders charts and exports PDF reports.

pub mod analyzer;
pub mod charts;
pub mod error;
pub mod report;
pub mod stats;
pub mod table;

pub use analyzer::{AnalysisOutcome, ChartSummary, FileAnalyzer};
pub use charts::{ChartArtifact, ChartKind, ChartRenderer};
pub use error::AnalysisError;
pub use report::{ReportExporter, RESPONSE_PDF, RESULTS_PDF};
pub use stats::{correlation_matrix, describe, ColumnSummary, CorrelationMatrix};
pub use table::{UploadKind, UploadedTable, CSV_MIME, XLSX_MIME};
