//! Split route - composes page ranges into a downloadable PDF.

use axum::{
    Json,
    body::Body,
    extract::{State, rejection::JsonRejection},
    http::{StatusCode, header},
    response::Response,
};
use pdf_splitter_core::RangeSpec;
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;

use crate::helpers::{ApiError, ResultExt, RouteResult};
use crate::state::AppState;

const DEFAULT_FILENAME: &str = "split.pdf";

#[derive(Debug, Deserialize)]
pub struct SplitRequest {
    /// Download name suggested to the client
    #[serde(default)]
    pub filename: Option<String>,
    pub documents: Vec<RangeSpec>,
}

/// Compose the requested ranges and return the result as an attachment.
pub async fn split_pdf(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<SplitRequest>, JsonRejection>,
) -> RouteResult<Response> {
    let Json(request) =
        payload.map_err(|e| ApiError::bad_request("INVALID_REQUEST", e.body_text()))?;

    let artifact = state.splitter.split(request.documents).await?;
    let data = tokio::fs::read(&artifact.path).await.or_internal_error()?;

    let filename = download_name(request.filename.as_deref());
    info!(
        "Serving {} ({} pages) as {}",
        artifact.id, artifact.page_count, filename
    );

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "application/pdf")
        .header(header::CONTENT_DISPOSITION, content_disposition(&filename))
        .body(Body::from(data))
        .or_internal_error()
}

/// Client-supplied name reduced to something safe for a header, with a
/// `.pdf` extension.
fn download_name(requested: Option<&str>) -> String {
    let cleaned: String = requested
        .unwrap_or_default()
        .chars()
        .filter(|c| !c.is_control() && !matches!(c, '"' | '\\' | '/'))
        .collect();
    let cleaned = cleaned.trim();

    if cleaned.is_empty() {
        return DEFAULT_FILENAME.to_string();
    }
    if cleaned.to_ascii_lowercase().ends_with(".pdf") {
        cleaned.to_string()
    } else {
        format!("{cleaned}.pdf")
    }
}

/// `attachment` with an ASCII fallback and the exact name as RFC 5987
/// `filename*`.
fn content_disposition(filename: &str) -> String {
    let fallback: String = filename
        .chars()
        .map(|c| if c.is_ascii() { c } else { '_' })
        .collect();
    format!(
        "attachment; filename=\"{fallback}\"; filename*=UTF-8''{}",
        urlencoding::encode(filename)
    )
}
