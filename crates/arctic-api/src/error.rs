//! API error types and JSON error response formatting.
//!
//! ApiError provides a consistent JSON error response format across all
//! endpoints, mapping chat, analysis and speech errors to HTTP status codes.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use arctic_analysis::AnalysisError;
use arctic_chat::ChatError;
use arctic_speech::SpeechError;

/// JSON error response body.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Machine-readable error code (e.g., "bad_request", "not_found").
    pub error: String,
    /// Human-readable error message.
    pub message: String,
}

/// API error type that maps to HTTP status codes and JSON responses.
#[derive(Debug)]
pub enum ApiError {
    /// 400 Bad Request - missing or invalid parameters.
    BadRequest(String),
    /// 404 Not Found - session or export does not exist.
    NotFound(String),
    /// 409 Conflict - the session was stopped by the token budget.
    Conflict(String),
    /// 413 Payload Too Large - upload exceeds the configured limit.
    PayloadTooLarge(String),
    /// 415 Unsupported Media Type - upload is neither CSV nor XLSX.
    UnsupportedMediaType(String),
    /// 422 Unprocessable Entity - out-of-range controls, unreadable tables,
    /// inaudible speech.
    UnprocessableEntity(String),
    /// 500 Internal Server Error - unexpected server error.
    Internal(String),
    /// 502 Bad Gateway - the inference service failed.
    BadGateway(String),
    /// 503 Service Unavailable - speech service unreachable or voice disabled.
    ServiceUnavailable(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::UnsupportedMediaType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            ApiError::UnprocessableEntity(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::BadGateway(_) => StatusCode::BAD_GATEWAY,
            ApiError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            ApiError::BadRequest(msg)
            | ApiError::NotFound(msg)
            | ApiError::Conflict(msg)
            | ApiError::PayloadTooLarge(msg)
            | ApiError::UnsupportedMediaType(msg)
            | ApiError::UnprocessableEntity(msg)
            | ApiError::Internal(msg)
            | ApiError::BadGateway(msg)
            | ApiError::ServiceUnavailable(msg) => msg,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "bad_request",
            ApiError::NotFound(_) => "not_found",
            ApiError::Conflict(_) => "conflict",
            ApiError::PayloadTooLarge(_) => "payload_too_large",
            ApiError::UnsupportedMediaType(_) => "unsupported_media_type",
            ApiError::UnprocessableEntity(_) => "unprocessable_entity",
            ApiError::Internal(_) => "internal_error",
            ApiError::BadGateway(_) => "bad_gateway",
            ApiError::ServiceUnavailable(_) => "service_unavailable",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), error = %self.message(), "Request failed");
        }
        let body = ErrorBody {
            error: self.code().to_string(),
            message: self.message().to_string(),
        };
        (status, Json(body)).into_response()
    }
}

impl From<ChatError> for ApiError {
    fn from(err: ChatError) -> Self {
        match err {
            ChatError::EmptyMessage => ApiError::BadRequest(err.to_string()),
            ChatError::SessionAborted
            | ChatError::BudgetExceeded { .. }
            | ChatError::NoPendingTurn => ApiError::Conflict(err.to_string()),
            ChatError::SessionNotFound(_) => ApiError::NotFound(err.to_string()),
            ChatError::Inference(_) => ApiError::BadGateway(err.to_string()),
            ChatError::Config(_) => ApiError::UnprocessableEntity(err.to_string()),
            ChatError::Voice(speech) => speech.into(),
            ChatError::Tokenizer(_) | ChatError::Internal(_) => ApiError::Internal(err.to_string()),
        }
    }
}

impl From<SpeechError> for ApiError {
    fn from(err: SpeechError) -> Self {
        match err {
            SpeechError::Inaudible => ApiError::UnprocessableEntity(err.to_string()),
            SpeechError::InvalidAudio(_) => ApiError::BadRequest(err.to_string()),
            SpeechError::Unreachable(_) | SpeechError::Disabled => {
                ApiError::ServiceUnavailable(err.to_string())
            }
        }
    }
}

impl From<AnalysisError> for ApiError {
    fn from(err: AnalysisError) -> Self {
        match err {
            AnalysisError::UnsupportedFormat(_) => ApiError::UnsupportedMediaType(err.to_string()),
            AnalysisError::Parse(_) => ApiError::UnprocessableEntity(err.to_string()),
            AnalysisError::Chat(chat) => chat.into(),
            AnalysisError::Chart(_) | AnalysisError::Export(_) | AnalysisError::Io(_) => {
                ApiError::Internal(err.to_string())
            }
        }
    }
}
