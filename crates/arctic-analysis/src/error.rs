//! Error types for upload analysis and PDF export.

use arctic_chat::ChatError;

/// Errors from the analysis pipeline.
#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    /// The upload's MIME type is neither CSV nor XLSX. Carries the type.
    #[error("Unsupported file type. Please upload a CSV or XLSX file.")]
    UnsupportedFormat(String),
    #[error("could not read uploaded table: {0}")]
    Parse(String),
    #[error("chart rendering failed: {0}")]
    Chart(String),
    #[error("PDF export failed: {0}")]
    Export(String),
    #[error(transparent)]
    Chat(#[from] ChatError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<csv::Error> for AnalysisError {
    fn from(err: csv::Error) -> Self {
        AnalysisError::Parse(err.to_string())
    }
}

impl From<calamine::XlsxError> for AnalysisError {
    fn from(err: calamine::XlsxError) -> Self {
        AnalysisError::Parse(err.to_string())
    }
}

impl From<printpdf::Error> for AnalysisError {
    fn from(err: printpdf::Error) -> Self {
        AnalysisError::Export(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unsupported_format_message() {
        let err = AnalysisError::UnsupportedFormat("application/pdf".into());
        assert_eq!(
            err.to_string(),
            "Unsupported file type. Please upload a CSV or XLSX file."
        );
    }

    #[test]
    fn test_chat_error_is_transparent() {
        let err: AnalysisError = ChatError::SessionAborted.into();
        assert_eq!(err.to_string(), ChatError::SessionAborted.to_string());
    }

    #[test]
    fn test_display() {
        assert_eq!(
            AnalysisError::Export("missing chart".into()).to_string(),
            "PDF export failed: missing chart"
        );
        assert_eq!(
            AnalysisError::Parse("bad row".into()).to_string(),
            "could not read uploaded table: bad row"
        );
    }
}
