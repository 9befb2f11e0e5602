//! JSON error bodies and the error-kind → HTTP status mapping.

use axum::Json;
use axum::extract::multipart::MultipartError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use leafdx_ai::{ErrorKind, PredictError};
use serde::Serialize;

/// Message returned when `/predict` receives no usable `file` part.
pub const NO_FILE_SELECTED: &str = "No file selected.";

/// Error body: `{"error": message, "kind": kind}`.
#[derive(Debug, Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
    kind: &'a str,
}

/// A failed request, rendered as a JSON error body.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    kind: &'static str,
    message: String,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            kind: "bad_request",
            message: message.into(),
        }
    }

    pub fn no_file_selected() -> Self {
        Self::bad_request(NO_FILE_SELECTED)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            kind: ErrorKind::Internal.as_str(),
            message: message.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

/// HTTP status for a pipeline error class.
pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::NotReady => StatusCode::SERVICE_UNAVAILABLE,
        ErrorKind::BadImage => StatusCode::BAD_REQUEST,
        ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl From<PredictError> for ApiError {
    fn from(err: PredictError) -> Self {
        let kind = err.kind();
        Self {
            status: status_for(kind),
            kind: kind.as_str(),
            message: err.to_string(),
        }
    }
}

impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        Self {
            status: err.status(),
            kind: "bad_request",
            message: err.body_text(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: &self.message,
            kind: self.kind,
        };
        (self.status, Json(body)).into_response()
    }
}
