//! The upload analysis pipeline: parse, ask the model, chart, export.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::mpsc;

use arctic_chat::{ChatError, ChatOrchestrator, ChatSession, TurnOutcome};
use arctic_core::config::{AnalysisConfig, ExportConfig};
use arctic_core::types::ExportedDocument;

use crate::charts::{ChartArtifact, ChartKind, ChartRenderer};
use crate::error::AnalysisError;
use crate::report::ReportExporter;
use crate::stats::{describe, ColumnSummary};
use crate::table::{analysis_prompt, UploadKind, UploadedTable};

/// A chart as reported to clients.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartSummary {
    pub kind: ChartKind,
    pub title: String,
    pub filename: String,
}

impl From<&ChartArtifact> for ChartSummary {
    fn from(chart: &ChartArtifact) -> Self {
        Self {
            kind: chart.kind,
            title: chart.title.clone(),
            filename: chart.filename(),
        }
    }
}

/// Result of analysing one upload.
#[derive(Debug, Clone)]
pub struct AnalysisOutcome {
    pub preview: String,
    pub rows: usize,
    pub columns: usize,
    pub summary: Vec<ColumnSummary>,
    pub narrative: String,
    pub charts: Vec<ChartSummary>,
    pub report: ExportedDocument,
}

pub struct FileAnalyzer {
    preview_rows: usize,
    renderer: Arc<ChartRenderer>,
    exporter: Arc<ReportExporter>,
}

impl FileAnalyzer {
    pub fn new(analysis: &AnalysisConfig, export: &ExportConfig) -> Self {
        Self {
            preview_rows: analysis.preview_rows,
            renderer: Arc::new(ChartRenderer::new(analysis)),
            exporter: Arc::new(ReportExporter::from_config(export)),
        }
    }

    pub fn exporter(&self) -> &ReportExporter {
        &self.exporter
    }

    /// Analyse an uploaded file within `session`.
    ///
    /// The table preview becomes a user turn and the model's reply is the
    /// narrative. Charts and the results report are stored on the session.
    /// A rejected upload leaves the session unchanged.
    pub async fn analyze(
        &self,
        orchestrator: &ChatOrchestrator,
        session: &mut ChatSession,
        mime: &str,
        bytes: &[u8],
        sink: Option<&mpsc::Sender<String>>,
    ) -> Result<AnalysisOutcome, AnalysisError> {
        let kind = UploadKind::from_mime(mime)?;
        if session.is_aborted() {
            return Err(ChatError::SessionAborted.into());
        }
        let table = UploadedTable::parse(kind, bytes)?;
        let preview = table.render_preview(self.preview_rows);
        tracing::info!(
            session_id = %session.id,
            ?kind,
            rows = table.row_count(),
            columns = table.column_count(),
            "Analysing upload"
        );

        let narrative = match orchestrator
            .submit_user_message(session, &analysis_prompt(&preview), sink)
            .await?
        {
            TurnOutcome::Completed { content } => content,
            TurnOutcome::Aborted {
                tokens, ceiling, ..
            } => return Err(ChatError::BudgetExceeded { tokens, ceiling }.into()),
        };

        let summary = describe(&table);
        let (rows, columns) = (table.row_count(), table.column_count());
        let renderer = Arc::clone(&self.renderer);
        let exporter = Arc::clone(&self.exporter);
        let text = narrative.clone();

        let (charts, images, report) = tokio::task::spawn_blocking(move || {
            let workdir = tempfile::tempdir()?;
            let charts = renderer.render_all(&table, workdir.path())?;
            let report = exporter.results_pdf(&text, &charts)?;
            let images = charts
                .iter()
                .map(|chart| {
                    Ok(ExportedDocument {
                        filename: chart.filename(),
                        bytes: std::fs::read(&chart.path)?,
                    })
                })
                .collect::<Result<Vec<_>, AnalysisError>>()?;
            let charts: Vec<ChartSummary> = charts.iter().map(ChartSummary::from).collect();
            Ok::<_, AnalysisError>((charts, images, report))
        })
        .await
        .map_err(|e| AnalysisError::Chart(format!("chart task failed: {}", e)))??;

        session.analysis_report = Some(report.clone());
        session.analysis_charts = images;
        tracing::info!(
            session_id = %session.id,
            charts = charts.len(),
            report_bytes = report.bytes.len(),
            "Analysis complete"
        );

        Ok(AnalysisOutcome {
            preview,
            rows,
            columns,
            summary,
            narrative,
            charts,
            report,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arctic_chat::{ApproximateTokenCounter, MockInferenceClient, TokenBudgetGuard};
    use arctic_core::config::ModelConfig;
    use arctic_core::types::{Role, SessionControls};
    use crate::table::{CSV_MIME, XLSX_MIME};

    fn orchestrator(client: MockInferenceClient, ceiling: usize) -> ChatOrchestrator {
        ChatOrchestrator::new(
            Arc::new(client),
            TokenBudgetGuard::new(Arc::new(ApproximateTokenCounter), ceiling),
            ModelConfig::default(),
        )
    }

    fn small_analyzer() -> FileAnalyzer {
        FileAnalyzer::new(
            &AnalysisConfig {
                chart_width: 200,
                chart_height: 150,
                ..AnalysisConfig::default()
            },
            &ExportConfig::default(),
        )
    }

    fn session() -> ChatSession {
        ChatSession::new("Hi", SessionControls::default())
    }

    #[tokio::test]
    async fn test_analyze_csv() {
        let orch = orchestrator(MockInferenceClient::new(&["Ages ", "vary."]), 1500);
        let mut session = session();
        let outcome = small_analyzer()
            .analyze(&orch, &mut session, CSV_MIME, b"age,city\n30,Paris\n41,Rome\n", None)
            .await
            .unwrap();

        assert_eq!(outcome.narrative, "Ages vary.");
        assert_eq!(outcome.rows, 2);
        assert_eq!(outcome.columns, 2);
        assert_eq!(outcome.summary.len(), 1);
        let files: Vec<&str> = outcome.charts.iter().map(|c| c.filename.as_str()).collect();
        assert_eq!(files, vec!["distribution_age.png", "pie_chart_city.png"]);
        assert_eq!(outcome.report.filename, "results.pdf");

        let prompt = &session.messages()[1];
        assert_eq!(prompt.role, Role::User);
        assert!(prompt.content.starts_with("Analyze the following data:\n\n"));
        assert!(prompt.content.contains("Paris"));
        assert_eq!(session.last_assistant_content(), Some("Ages vary."));
        assert_eq!(session.analysis_report.as_ref(), Some(&outcome.report));
        assert_eq!(session.analysis_charts.len(), 2);
        assert_eq!(session.analysis_charts[1].filename, "pie_chart_city.png");
    }

    #[tokio::test]
    async fn test_unsupported_mime_leaves_session_untouched() {
        let orch = orchestrator(MockInferenceClient::new(&["x"]), 1500);
        let mut session = session();
        let err = small_analyzer()
            .analyze(&orch, &mut session, "application/pdf", b"%PDF", None)
            .await
            .unwrap_err();
        assert!(matches!(err, AnalysisError::UnsupportedFormat(_)));
        assert_eq!(session.messages().len(), 1);
        assert!(session.analysis_report.is_none());
    }

    #[tokio::test]
    async fn test_malformed_xlsx_is_parse_error() {
        let orch = orchestrator(MockInferenceClient::new(&["x"]), 1500);
        let mut session = session();
        let err = small_analyzer()
            .analyze(&orch, &mut session, XLSX_MIME, b"not a workbook", None)
            .await
            .unwrap_err();
        assert!(matches!(err, AnalysisError::Parse(_)));
        assert_eq!(session.messages().len(), 1);
    }

    #[tokio::test]
    async fn test_budget_exhaustion_skips_charts() {
        let orch = orchestrator(MockInferenceClient::new(&["never"]), 5);
        let mut session = session();
        let err = small_analyzer()
            .analyze(&orch, &mut session, CSV_MIME, b"a,b\n1,2\n3,4\n", None)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AnalysisError::Chat(ChatError::BudgetExceeded { ceiling: 5, .. })
        ));
        assert!(session.is_aborted());
        assert!(session.analysis_report.is_none());
        assert!(session.analysis_charts.is_empty());
    }

    #[tokio::test]
    async fn test_aborted_session_rejects_upload() {
        let orch = orchestrator(MockInferenceClient::new(&["x"]), 1500);
        let mut session = session();
        session.annotate_abort("too long");
        let err = small_analyzer()
            .analyze(&orch, &mut session, CSV_MIME, b"a\n1\n", None)
            .await
            .unwrap_err();
        assert!(matches!(err, AnalysisError::Chat(ChatError::SessionAborted)));
    }

    #[tokio::test]
    async fn test_narrative_fragments_reach_sink() {
        let orch = orchestrator(MockInferenceClient::new(&["one ", "two"]), 1500);
        let mut session = session();
        let (tx, mut rx) = mpsc::channel(8);
        small_analyzer()
            .analyze(&orch, &mut session, CSV_MIME, b"a\n1\n2\n", Some(&tx))
            .await
            .unwrap();
        drop(tx);
        let mut received = String::new();
        while let Some(fragment) = rx.recv().await {
            received.push_str(&fragment);
        }
        assert_eq!(received, "one two");
    }
}
