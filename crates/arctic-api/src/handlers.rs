//! Route handler functions for all API endpoints.
//!
//! Each handler resolves the session from the path, locks it for the
//! duration of the interaction and returns JSON, a document download or an
//! SSE reply stream.

use std::convert::Infallible;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::multipart::MultipartError;
use axum::extract::{Multipart, Path, State};
use axum::http::{header, StatusCode};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{Html, IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, OwnedMutexGuard};
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::StreamExt;
use uuid::Uuid;

use arctic_analysis::{ChartKind, ColumnSummary, CSV_MIME, XLSX_MIME};
use arctic_chat::{ChatError, ChatSession, TurnOutcome};
use arctic_core::types::{ExportedDocument, Message, SessionControls};

use crate::error::ApiError;
use crate::state::AppState;

const EVENT_BUFFER: usize = 64;

// =============================================================================
// Request and response types
// =============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
    pub active_sessions: usize,
}

/// Client-facing snapshot of a session.
#[derive(Debug, Serialize, Deserialize)]
pub struct SessionView {
    pub id: Uuid,
    pub messages: Vec<Message>,
    pub controls: SessionControls,
    pub aborted: bool,
    pub has_report: bool,
    pub charts: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl From<&ChatSession> for SessionView {
    fn from(session: &ChatSession) -> Self {
        Self {
            id: session.id,
            messages: session.messages().to_vec(),
            controls: session.controls,
            aborted: session.is_aborted(),
            has_report: session.analysis_report.is_some(),
            charts: session
                .analysis_charts
                .iter()
                .map(|c| c.filename.clone())
                .collect(),
            created_at: session.created_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct MessageRequest {
    pub content: String,
}

#[derive(Debug, Serialize)]
pub struct ChartView {
    pub kind: ChartKind,
    pub title: String,
    pub filename: String,
    pub url: String,
}

#[derive(Debug, Serialize)]
pub struct AnalysisResponse {
    pub preview: String,
    pub rows: usize,
    pub columns: usize,
    pub summary: Vec<ColumnSummary>,
    pub narrative: String,
    pub charts: Vec<ChartView>,
    pub report_url: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct VoiceResponse {
    pub transcript: String,
    pub session: SessionView,
}

// =============================================================================
// Service endpoints
// =============================================================================

/// GET /health - liveness and session count.
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
        active_sessions: state.sessions.len(),
    })
}

/// GET / and GET /ui - serve the self-contained chat page.
pub async fn ui() -> impl IntoResponse {
    Html(arctic_ui::CHAT_HTML)
}

// =============================================================================
// Session lifecycle
// =============================================================================

async fn lock_session(
    state: &AppState,
    id: Uuid,
) -> Result<OwnedMutexGuard<ChatSession>, ApiError> {
    let shared = state.sessions.get(id)?;
    Ok(shared.lock_owned().await)
}

/// POST /sessions - start a conversation holding only the greeting.
pub async fn create_session(
    State(state): State<AppState>,
) -> Result<(StatusCode, Json<SessionView>), ApiError> {
    let (_, shared) = state.sessions.create()?;
    let session = shared.lock().await;
    Ok((StatusCode::CREATED, Json(SessionView::from(&*session))))
}

/// GET /sessions/{id}
pub async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionView>, ApiError> {
    let session = lock_session(&state, id).await?;
    Ok(Json(SessionView::from(&*session)))
}

/// DELETE /sessions/{id}
pub async fn delete_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    state.sessions.remove(id)?;
    tracing::debug!(session_id = %id, "Chat session deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// PUT /sessions/{id}/controls - set temperature and top_p.
pub async fn update_controls(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(controls): Json<SessionControls>,
) -> Result<Json<SessionView>, ApiError> {
    let mut session = lock_session(&state, id).await?;
    session.set_controls(controls)?;
    Ok(Json(SessionView::from(&*session)))
}

/// POST /sessions/{id}/clear - reset the transcript to the greeting.
pub async fn clear_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionView>, ApiError> {
    let mut session = lock_session(&state, id).await?;
    session.clear_history();
    tracing::info!(session_id = %id, "Chat history cleared");
    Ok(Json(SessionView::from(&*session)))
}

// =============================================================================
// Chat turns (SSE)
// =============================================================================

fn sse_event(name: &str, text: &str) -> Event {
    Event::default()
        .event(name)
        .json_data(text)
        .unwrap_or_else(|_| Event::default().event(name))
}

/// Generate the reply in a task that owns the session lock and relay it as
/// `fragment` events followed by one of `done`, `aborted` or `error`.
///
/// The task runs to completion even if the client disconnects.
fn stream_reply(
    state: AppState,
    mut session: OwnedMutexGuard<ChatSession>,
) -> Sse<impl tokio_stream::Stream<Item = Result<Event, Infallible>>> {
    let (event_tx, event_rx) = mpsc::channel::<Event>(EVENT_BUFFER);

    tokio::spawn(async move {
        let (fragment_tx, mut fragment_rx) = mpsc::channel::<String>(EVENT_BUFFER);
        let relay_tx = event_tx.clone();
        let relay = tokio::spawn(async move {
            while let Some(fragment) = fragment_rx.recv().await {
                let _ = relay_tx.send(sse_event("fragment", &fragment)).await;
            }
        });

        let result = state
            .orchestrator
            .respond(&mut session, Some(&fragment_tx))
            .await;
        drop(fragment_tx);
        let _ = relay.await;

        let last = match result {
            Ok(TurnOutcome::Completed { content }) => sse_event("done", &content),
            Ok(TurnOutcome::Aborted { message, .. }) => sse_event("aborted", &message),
            Err(e) => {
                tracing::warn!(session_id = %session.id, error = %e, "Reply failed");
                sse_event("error", &e.to_string())
            }
        };
        let _ = event_tx.send(last).await;
    });

    Sse::new(ReceiverStream::new(event_rx).map(Ok))
        .keep_alive(KeepAlive::new().interval(Duration::from_secs(15)))
}

/// POST /sessions/{id}/messages - add a user turn and stream the reply.
pub async fn post_message(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<MessageRequest>,
) -> Result<Response, ApiError> {
    if body.content.trim().is_empty() {
        return Err(ChatError::EmptyMessage.into());
    }
    let mut session = lock_session(&state, id).await?;
    if session.is_aborted() {
        return Err(ChatError::SessionAborted.into());
    }
    session.push_user(&body.content);
    Ok(stream_reply(state, session).into_response())
}

/// POST /sessions/{id}/respond - stream the reply to a pending user turn,
/// such as one added by voice input.
pub async fn respond(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Response, ApiError> {
    let session = lock_session(&state, id).await?;
    if session.is_aborted() {
        return Err(ChatError::SessionAborted.into());
    }
    if !session.needs_response() {
        return Err(ChatError::NoPendingTurn.into());
    }
    Ok(stream_reply(state, session).into_response())
}

// =============================================================================
// Upload analysis
// =============================================================================

fn multipart_error(err: MultipartError) -> ApiError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::PayloadTooLarge(err.body_text())
    } else {
        ApiError::BadRequest(err.body_text())
    }
}

/// Declared MIME type of an upload, falling back to the file extension when
/// the client sent none.
fn upload_mime(content_type: Option<&str>, file_name: Option<&str>) -> String {
    match content_type {
        Some(mime) if !mime.is_empty() && mime != "application/octet-stream" => mime.to_string(),
        _ => {
            let name = file_name.unwrap_or_default().to_ascii_lowercase();
            if name.ends_with(".csv") {
                CSV_MIME.to_string()
            } else if name.ends_with(".xlsx") {
                XLSX_MIME.to_string()
            } else {
                content_type.unwrap_or("application/octet-stream").to_string()
            }
        }
    }
}

/// POST /sessions/{id}/upload - analyse a CSV or XLSX file (multipart `file`).
pub async fn upload(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    mut multipart: Multipart,
) -> Result<Json<AnalysisResponse>, ApiError> {
    let mut upload = None;
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() == Some("file") {
            let mime = upload_mime(field.content_type(), field.file_name());
            let bytes = field.bytes().await.map_err(multipart_error)?;
            upload = Some((mime, bytes));
            break;
        }
    }
    let (mime, bytes) =
        upload.ok_or_else(|| ApiError::BadRequest("missing multipart field 'file'".to_string()))?;

    let mut session = lock_session(&state, id).await?;
    let outcome = state
        .analyzer
        .analyze(&state.orchestrator, &mut session, &mime, &bytes, None)
        .await?;

    let charts = outcome
        .charts
        .into_iter()
        .map(|chart| ChartView {
            url: format!("/sessions/{}/charts/{}", id, chart.filename),
            kind: chart.kind,
            title: chart.title,
            filename: chart.filename,
        })
        .collect();

    Ok(Json(AnalysisResponse {
        preview: outcome.preview,
        rows: outcome.rows,
        columns: outcome.columns,
        summary: outcome.summary,
        narrative: outcome.narrative,
        charts,
        report_url: format!("/sessions/{}/exports/results.pdf", id),
    }))
}

// =============================================================================
// Downloads
// =============================================================================

fn attachment(document: ExportedDocument, content_type: &str) -> Response {
    (
        [
            (header::CONTENT_TYPE, content_type.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", document.filename),
            ),
        ],
        document.bytes,
    )
        .into_response()
}

/// GET /sessions/{id}/exports/response.pdf - the latest assistant reply.
pub async fn export_response(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Response, ApiError> {
    let text = {
        let session = lock_session(&state, id).await?;
        session.last_assistant_content().unwrap_or_default().to_string()
    };
    let document = state.analyzer.exporter().response_pdf(&text)?;
    Ok(attachment(document, "application/pdf"))
}

/// GET /sessions/{id}/exports/results.pdf - the latest analysis report.
pub async fn export_results(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Response, ApiError> {
    let session = lock_session(&state, id).await?;
    let document = session
        .analysis_report
        .clone()
        .ok_or_else(|| ApiError::NotFound("no analysis report for this session".to_string()))?;
    Ok(attachment(document, "application/pdf"))
}

/// GET /sessions/{id}/charts/{filename} - a chart image of the latest
/// analysis.
pub async fn chart_image(
    State(state): State<AppState>,
    Path((id, filename)): Path<(Uuid, String)>,
) -> Result<Response, ApiError> {
    let session = lock_session(&state, id).await?;
    let chart = session
        .analysis_charts
        .iter()
        .find(|c| c.filename == filename)
        .cloned()
        .ok_or_else(|| ApiError::NotFound(format!("chart not found: {}", filename)))?;
    Ok(([(header::CONTENT_TYPE, "image/png")], chart.bytes).into_response())
}

// =============================================================================
// Voice input
// =============================================================================

/// POST /sessions/{id}/voice - transcribe a WAV recording into a user turn.
///
/// The reply is requested separately through `/respond`.
pub async fn voice(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    body: Bytes,
) -> Result<Json<VoiceResponse>, ApiError> {
    if body.is_empty() {
        return Err(ApiError::BadRequest("empty audio body".to_string()));
    }
    let mut session = lock_session(&state, id).await?;
    let transcript = state.voice.capture_and_submit(&mut session, &body).await?;
    Ok(Json(VoiceResponse {
        transcript,
        session: SessionView::from(&*session),
    }))
}
