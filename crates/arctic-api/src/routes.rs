//! Router setup with all API routes and middleware.
//!
//! Configures the axum Router with CORS, tracing, the upload body limit
//! and all endpoint handlers.

use axum::extract::DefaultBodyLimit;
use axum::http::{header, HeaderValue, Method};
use axum::routing::{get, post, put};
use axum::Router;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use arctic_core::error::ArcticError;

use crate::handlers;
use crate::state::AppState;

/// Create the axum Router with all routes and middleware.
pub fn create_router(state: AppState) -> Router {
    let port = state.config.server.port;
    let origins: Vec<HeaderValue> = [
        format!("http://127.0.0.1:{}", port),
        format!("http://localhost:{}", port),
    ]
    .iter()
    .filter_map(|origin| origin.parse().ok())
    .collect();
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT]);

    let upload_limit = state.config.server.max_upload_mb.max(1) * 1024 * 1024;

    Router::new()
        .route("/", get(handlers::ui))
        .route("/ui", get(handlers::ui))
        .route("/health", get(handlers::health))
        .route("/sessions", post(handlers::create_session))
        .route(
            "/sessions/{id}",
            get(handlers::get_session).delete(handlers::delete_session),
        )
        .route("/sessions/{id}/controls", put(handlers::update_controls))
        .route("/sessions/{id}/clear", post(handlers::clear_session))
        .route("/sessions/{id}/messages", post(handlers::post_message))
        .route("/sessions/{id}/respond", post(handlers::respond))
        .route("/sessions/{id}/upload", post(handlers::upload))
        .route("/sessions/{id}/voice", post(handlers::voice))
        .route(
            "/sessions/{id}/exports/response.pdf",
            get(handlers::export_response),
        )
        .route(
            "/sessions/{id}/exports/results.pdf",
            get(handlers::export_results),
        )
        .route("/sessions/{id}/charts/{filename}", get(handlers::chart_image))
        .layer(DefaultBodyLimit::max(upload_limit))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Start the HTTP server on the configured host and port.
pub async fn start_server(state: AppState) -> Result<(), ArcticError> {
    let addr = format!("{}:{}", state.config.server.host, state.config.server.port);
    let router = create_router(state);

    tracing::info!("Starting API server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| ArcticError::Config(format!("Failed to bind {}: {}", addr, e)))?;

    axum::serve(listener, router)
        .await
        .map_err(|e| ArcticError::Config(format!("Server error: {}", e)))?;

    Ok(())
}
