//! Helper types and traits for cleaner route handlers.
//!
//! Every failure leaves a handler as an [`ApiError`], which renders as
//! `{"error": <message>, "code": <MACHINE_CODE>}` with a matching status.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use pdf_splitter_core::ErrorKind;
use serde::Serialize;
use tracing::error;

/// Standard result type for route handlers.
pub type RouteResult<T> = Result<T, ApiError>;

/// An error response with a stable machine-readable code.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
    code: &'a str,
}

impl ApiError {
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
        }
    }

    pub fn bad_request(code: &'static str, message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, code, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            ErrorKind::IoFailure.code(),
            message,
        )
    }
}

const fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::InvalidFormat
        | ErrorKind::PayloadTooLarge
        | ErrorKind::EmptyUpload
        | ErrorKind::InvalidPageRange
        | ErrorKind::EmptySelection => StatusCode::BAD_REQUEST,
        ErrorKind::DocumentNotFound => StatusCode::NOT_FOUND,
        ErrorKind::IoFailure | ErrorKind::Config => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl From<pdf_splitter_core::Error> for ApiError {
    fn from(err: pdf_splitter_core::Error) -> Self {
        let kind = err.kind();
        Self::new(status_for(kind), kind.code(), err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            error!("{} ({})", self.message, self.code);
        }

        let body = Json(ErrorBody {
            error: &self.message,
            code: self.code,
        });
        (self.status, body).into_response()
    }
}

/// Extension trait for converting `Result<T, E>` to `RouteResult<T>`.
pub trait ResultExt<T, E: std::fmt::Display> {
    /// Converts the error to 500 Internal Server Error.
    fn or_internal_error(self) -> RouteResult<T>;

    /// Converts the error to 400 Bad Request with the given code.
    fn or_bad_request(self, code: &'static str) -> RouteResult<T>;
}

impl<T, E: std::fmt::Display> ResultExt<T, E> for Result<T, E> {
    fn or_internal_error(self) -> RouteResult<T> {
        self.map_err(|e| ApiError::internal(e.to_string()))
    }

    fn or_bad_request(self, code: &'static str) -> RouteResult<T> {
        self.map_err(|e| ApiError::bad_request(code, e.to_string()))
    }
}
