//! Integration tests for the Arctic API.
//!
//! Every route is exercised through the full router with mock inference and
//! speech services. Each test builds its own state.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use serde_json::Value;
use tower::ServiceExt;
use uuid::Uuid;

use arctic_api::create_router;
use arctic_api::error::ErrorBody;
use arctic_api::handlers::{HealthResponse, SessionView, VoiceResponse};
use arctic_api::state::AppState;
use arctic_chat::{ApproximateTokenCounter, MockInferenceClient};
use arctic_core::config::ArcticConfig;
use arctic_core::types::Role;
use arctic_speech::{encode_wav, MockSpeechReply, MockSpeechService, PcmAudio};

// =============================================================================
// Helpers
// =============================================================================

const REPLY: [&str; 3] = ["Snowflake ", "is a ", "data cloud."];

fn make_state_with(
    config: ArcticConfig,
    client: MockInferenceClient,
    speech: MockSpeechService,
) -> AppState {
    AppState::new(
        config,
        Arc::new(client),
        Arc::new(ApproximateTokenCounter),
        Arc::new(speech),
    )
}

fn make_app() -> Router {
    create_router(make_state_with(
        ArcticConfig::default(),
        MockInferenceClient::new(&REPLY),
        MockSpeechService::with_text("What is Snowflake?"),
    ))
}

async fn body_bytes(resp: axum::response::Response) -> Vec<u8> {
    axum::body::to_bytes(resp.into_body(), 16 * 1024 * 1024)
        .await
        .unwrap()
        .to_vec()
}

async fn send(app: &Router, req: Request<Body>) -> axum::response::Response {
    app.clone().oneshot(req).await.unwrap()
}

async fn create_session(app: &Router) -> SessionView {
    let resp = send(app, Request::post("/sessions").body(Body::empty()).unwrap()).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    serde_json::from_slice(&body_bytes(resp).await).unwrap()
}

async fn get_session(app: &Router, id: Uuid) -> SessionView {
    let resp = send(
        app,
        Request::get(format!("/sessions/{}", id))
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    serde_json::from_slice(&body_bytes(resp).await).unwrap()
}

fn json_post(uri: String, body: Value) -> Request<Body> {
    Request::post(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn post_message(app: &Router, id: Uuid, content: &str) -> axum::response::Response {
    send(
        app,
        json_post(
            format!("/sessions/{}/messages", id),
            serde_json::json!({ "content": content }),
        ),
    )
    .await
}

/// Split an SSE body into (event, decoded data) pairs.
fn parse_sse(body: &[u8]) -> Vec<(String, String)> {
    let text = String::from_utf8_lossy(body);
    text.split("\n\n")
        .filter_map(|block| {
            let mut name = None;
            let mut data = Vec::new();
            for line in block.lines() {
                if let Some(rest) = line.strip_prefix("event:") {
                    name = Some(rest.trim().to_string());
                } else if let Some(rest) = line.strip_prefix("data:") {
                    data.push(rest.trim_start().to_string());
                }
            }
            let name = name?;
            let data: String = serde_json::from_str(&data.join("\n")).unwrap();
            Some((name, data))
        })
        .collect()
}

fn multipart_upload(file_name: &str, mime: &str, content: &[u8]) -> (String, Vec<u8>) {
    let boundary = "arcticboundary";
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{}\r\n", boundary).as_bytes());
    body.extend_from_slice(
        format!(
            "Content-Disposition: form-data; name=\"file\"; filename=\"{}\"\r\n",
            file_name
        )
        .as_bytes(),
    );
    body.extend_from_slice(format!("Content-Type: {}\r\n\r\n", mime).as_bytes());
    body.extend_from_slice(content);
    body.extend_from_slice(format!("\r\n--{}--\r\n", boundary).as_bytes());
    (format!("multipart/form-data; boundary={}", boundary), body)
}

async fn upload(app: &Router, id: Uuid, file_name: &str, mime: &str, content: &[u8]) -> axum::response::Response {
    let (content_type, body) = multipart_upload(file_name, mime, content);
    send(
        app,
        Request::post(format!("/sessions/{}/upload", id))
            .header(header::CONTENT_TYPE, content_type)
            .body(Body::from(body))
            .unwrap(),
    )
    .await
}

fn spoken_wav() -> Vec<u8> {
    let mut samples = vec![0.0f32; 8_000];
    samples.extend((0..16_000).map(|i| if i % 2 == 0 { 0.4 } else { -0.4 }));
    samples.extend(vec![0.0f32; 24_000]);
    encode_wav(&PcmAudio {
        samples,
        sample_rate: 16_000,
    })
}

fn voice_request(id: Uuid, wav: Vec<u8>) -> Request<Body> {
    Request::post(format!("/sessions/{}/voice", id))
        .header(header::CONTENT_TYPE, "audio/wav")
        .body(Body::from(wav))
        .unwrap()
}

async fn error_body(resp: axum::response::Response) -> ErrorBody {
    serde_json::from_slice(&body_bytes(resp).await).unwrap()
}

// =============================================================================
// Service endpoints
// =============================================================================

#[tokio::test]
async fn test_health() {
    let app = make_app();
    create_session(&app).await;
    let resp = send(&app, Request::get("/health").body(Body::empty()).unwrap()).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let health: HealthResponse = serde_json::from_slice(&body_bytes(resp).await).unwrap();
    assert_eq!(health.status, "healthy");
    assert_eq!(health.active_sessions, 1);
}

#[tokio::test]
async fn test_ui_served_at_root_and_ui() {
    let app = make_app();
    for path in ["/", "/ui"] {
        let resp = send(&app, Request::get(path).body(Body::empty()).unwrap()).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let html = String::from_utf8(body_bytes(resp).await).unwrap();
        assert!(html.starts_with("<!DOCTYPE html>"));
    }
}

// =============================================================================
// Session lifecycle
// =============================================================================

#[tokio::test]
async fn test_new_session_holds_greeting() {
    let app = make_app();
    let view = create_session(&app).await;
    assert_eq!(view.messages.len(), 1);
    assert_eq!(view.messages[0].role, Role::Assistant);
    assert_eq!(view.messages[0].content, ArcticConfig::default().chat.greeting);
    assert!(!view.aborted);
    assert!(!view.has_report);
    assert_eq!(view.controls.temperature, 0.3);
    assert_eq!(view.controls.top_p, 0.9);
}

#[tokio::test]
async fn test_unknown_session_is_404() {
    let app = make_app();
    let resp = send(
        &app,
        Request::get(format!("/sessions/{}", Uuid::new_v4()))
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    assert_eq!(error_body(resp).await.error, "not_found");
}

#[tokio::test]
async fn test_delete_session() {
    let app = make_app();
    let view = create_session(&app).await;
    let resp = send(
        &app,
        Request::delete(format!("/sessions/{}", view.id))
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);

    let resp = send(
        &app,
        Request::get(format!("/sessions/{}", view.id))
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_update_controls() {
    let app = make_app();
    let view = create_session(&app).await;
    let resp = send(
        &app,
        Request::put(format!("/sessions/{}/controls", view.id))
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(r#"{"temperature":1.5,"top_p":0.5}"#))
            .unwrap(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let updated: SessionView = serde_json::from_slice(&body_bytes(resp).await).unwrap();
    assert_eq!(updated.controls.temperature, 1.5);
    assert_eq!(updated.controls.top_p, 0.5);
}

#[tokio::test]
async fn test_out_of_range_controls_are_422() {
    let app = make_app();
    let view = create_session(&app).await;
    let resp = send(
        &app,
        Request::put(format!("/sessions/{}/controls", view.id))
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(r#"{"temperature":0.3,"top_p":1.5}"#))
            .unwrap(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(get_session(&app, view.id).await.controls.top_p, 0.9);
}

// =============================================================================
// Chat turns
// =============================================================================

#[tokio::test]
async fn test_message_streams_reply() {
    let app = make_app();
    let view = create_session(&app).await;

    let resp = post_message(&app, view.id, "What is Snowflake?").await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(resp.headers()[header::CONTENT_TYPE]
        .to_str()
        .unwrap()
        .starts_with("text/event-stream"));

    let events = parse_sse(&body_bytes(resp).await);
    let fragments: String = events
        .iter()
        .filter(|(name, _)| name == "fragment")
        .map(|(_, data)| data.as_str())
        .collect();
    assert_eq!(fragments, "Snowflake is a data cloud.");
    assert_eq!(
        events.last(),
        Some(&("done".to_string(), "Snowflake is a data cloud.".to_string()))
    );

    let after = get_session(&app, view.id).await;
    assert_eq!(after.messages.len(), 3);
    assert_eq!(after.messages[1].content, "What is Snowflake?");
    assert_eq!(after.messages[2].content, "Snowflake is a data cloud.");
}

#[tokio::test]
async fn test_empty_message_is_400() {
    let app = make_app();
    let view = create_session(&app).await;
    let resp = post_message(&app, view.id, "   ").await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(get_session(&app, view.id).await.messages.len(), 1);
}

#[tokio::test]
async fn test_budget_abort_then_clear() {
    let mut config = ArcticConfig::default();
    config.chat.max_prompt_tokens = 100;
    let app = create_router(make_state_with(
        config,
        MockInferenceClient::new(&REPLY),
        MockSpeechService::with_text("unused"),
    ));
    let view = create_session(&app).await;

    let long = "tell me everything about warehouses ".repeat(10);
    let resp = post_message(&app, view.id, &long).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let events = parse_sse(&body_bytes(resp).await);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].0, "aborted");
    assert!(events[0].1.contains("100 tokens"));

    let aborted = get_session(&app, view.id).await;
    assert!(aborted.aborted);

    let resp = post_message(&app, view.id, "hello?").await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);

    let resp = send(
        &app,
        Request::post(format!("/sessions/{}/clear", view.id))
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let cleared: SessionView = serde_json::from_slice(&body_bytes(resp).await).unwrap();
    assert!(!cleared.aborted);
    assert_eq!(cleared.messages.len(), 1);

    let resp = post_message(&app, view.id, "hi").await;
    let events = parse_sse(&body_bytes(resp).await);
    assert_eq!(events.last().map(|e| e.0.as_str()), Some("done"));
}

#[tokio::test]
async fn test_inference_failure_is_error_event() {
    let app = create_router(make_state_with(
        ArcticConfig::default(),
        MockInferenceClient::refusing("401 Unauthorized"),
        MockSpeechService::with_text("unused"),
    ));
    let view = create_session(&app).await;
    let resp = post_message(&app, view.id, "hello").await;
    let events = parse_sse(&body_bytes(resp).await);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].0, "error");
    assert!(events[0].1.contains("401 Unauthorized"));
}

#[tokio::test]
async fn test_respond_without_pending_turn_is_409() {
    let app = make_app();
    let view = create_session(&app).await;
    let resp = send(
        &app,
        Request::post(format!("/sessions/{}/respond", view.id))
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);
}

// =============================================================================
// Upload analysis and downloads
// =============================================================================

#[tokio::test]
async fn test_upload_csv() {
    let app = make_app();
    let view = create_session(&app).await;

    let resp = upload(&app, view.id, "people.csv", "text/csv", b"age,city\n30,Paris\n41,Rome\n").await;
    assert_eq!(resp.status(), StatusCode::OK);
    let result: Value = serde_json::from_slice(&body_bytes(resp).await).unwrap();
    assert_eq!(result["rows"], 2);
    assert_eq!(result["narrative"], "Snowflake is a data cloud.");
    assert_eq!(result["summary"][0]["column"], "age");
    let charts = result["charts"].as_array().unwrap();
    assert_eq!(charts.len(), 2);
    assert_eq!(charts[0]["kind"], "distribution");
    assert_eq!(charts[1]["title"], "Pie Chart of city");

    let chart_url = charts[1]["url"].as_str().unwrap().to_string();
    let resp = send(&app, Request::get(chart_url).body(Body::empty()).unwrap()).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers()[header::CONTENT_TYPE], "image/png");

    let report_url = result["report_url"].as_str().unwrap().to_string();
    let resp = send(&app, Request::get(report_url).body(Body::empty()).unwrap()).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers()[header::CONTENT_TYPE], "application/pdf");
    assert!(resp.headers()[header::CONTENT_DISPOSITION]
        .to_str()
        .unwrap()
        .contains("results.pdf"));
    assert!(body_bytes(resp).await.starts_with(b"%PDF"));

    let after = get_session(&app, view.id).await;
    assert!(after.has_report);
    assert_eq!(after.messages.len(), 3);
}

#[tokio::test]
async fn test_unsupported_upload_is_415() {
    let app = make_app();
    let view = create_session(&app).await;
    let resp = upload(&app, view.id, "report.pdf", "application/pdf", b"%PDF-1.4").await;
    assert_eq!(resp.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
    assert_eq!(
        error_body(resp).await.message,
        "Unsupported file type. Please upload a CSV or XLSX file."
    );
    assert_eq!(get_session(&app, view.id).await.messages.len(), 1);
}

#[tokio::test]
async fn test_upload_without_file_field_is_400() {
    let app = make_app();
    let view = create_session(&app).await;
    let (content_type, body) = multipart_upload("x.csv", "text/csv", b"a\n1\n");
    let body = String::from_utf8(body)
        .unwrap()
        .replace("name=\"file\"", "name=\"attachment\"");
    let resp = send(
        &app,
        Request::post(format!("/sessions/{}/upload", view.id))
            .header(header::CONTENT_TYPE, content_type)
            .body(Body::from(body))
            .unwrap(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_results_pdf_missing_before_upload() {
    let app = make_app();
    let view = create_session(&app).await;
    let resp = send(
        &app,
        Request::get(format!("/sessions/{}/exports/results.pdf", view.id))
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_response_pdf_download() {
    let app = make_app();
    let view = create_session(&app).await;
    let resp = send(
        &app,
        Request::get(format!("/sessions/{}/exports/response.pdf", view.id))
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(resp.headers()[header::CONTENT_DISPOSITION]
        .to_str()
        .unwrap()
        .contains("response.pdf"));
    assert!(body_bytes(resp).await.starts_with(b"%PDF"));
}

#[tokio::test]
async fn test_unknown_chart_is_404() {
    let app = make_app();
    let view = create_session(&app).await;
    let resp = send(
        &app,
        Request::get(format!("/sessions/{}/charts/pair_plot.png", view.id))
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

// =============================================================================
// Voice input
// =============================================================================

#[tokio::test]
async fn test_voice_then_respond() {
    let app = make_app();
    let view = create_session(&app).await;

    let resp = send(&app, voice_request(view.id, spoken_wav())).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let voice: VoiceResponse = serde_json::from_slice(&body_bytes(resp).await).unwrap();
    assert_eq!(voice.transcript, "What is Snowflake?");
    assert_eq!(voice.session.messages.len(), 2);
    assert_eq!(voice.session.messages[1].role, Role::User);

    let resp = send(
        &app,
        Request::post(format!("/sessions/{}/respond", view.id))
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let events = parse_sse(&body_bytes(resp).await);
    assert_eq!(events.last().map(|e| e.0.as_str()), Some("done"));
}

#[tokio::test]
async fn test_silent_recording_is_422() {
    let app = make_app();
    let view = create_session(&app).await;
    let silence = encode_wav(&PcmAudio {
        samples: vec![0.0; 16_000],
        sample_rate: 16_000,
    });
    let resp = send(&app, voice_request(view.id, silence)).await;
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(get_session(&app, view.id).await.messages.len(), 1);
}

#[tokio::test]
async fn test_unreachable_speech_service_is_503() {
    let app = create_router(make_state_with(
        ArcticConfig::default(),
        MockInferenceClient::new(&REPLY),
        MockSpeechService::new(MockSpeechReply::Unreachable),
    ));
    let view = create_session(&app).await;
    let resp = send(&app, voice_request(view.id, spoken_wav())).await;
    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(get_session(&app, view.id).await.messages.len(), 1);
}

#[tokio::test]
async fn test_voice_disabled_is_503() {
    let mut config = ArcticConfig::default();
    config.voice.enabled = false;
    let app = create_router(make_state_with(
        config,
        MockInferenceClient::new(&REPLY),
        MockSpeechService::with_text("unused"),
    ));
    let view = create_session(&app).await;
    let resp = send(&app, voice_request(view.id, spoken_wav())).await;
    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
}
