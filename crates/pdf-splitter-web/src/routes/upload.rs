//! Upload route - streams a multipart file field into the document store.

use axum::{Json, extract::State};
use axum_extra::extract::Multipart;
use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

use crate::helpers::{ApiError, ResultExt, RouteResult};
use crate::state::AppState;

/// Name of the multipart field carrying the PDF
const FILE_FIELD: &str = "file";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub document_id: String,
    pub pages: usize,
    pub size: u64,
}

/// Accept a PDF upload.
///
/// The `file` field is never buffered whole: its chunks go straight to the
/// ingestor, which validates and commits it. Other fields are skipped.
pub async fn upload_pdf(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> RouteResult<Json<UploadResponse>> {
    while let Some(field) = multipart.next_field().await.or_bad_request("INVALID_MULTIPART")? {
        if field.name() != Some(FILE_FIELD) {
            debug!("Skipping multipart field {:?}", field.name());
            continue;
        }

        debug!("Receiving upload {:?}", field.file_name());
        let uploaded = state.splitter.upload(field).await?;

        return Ok(Json(UploadResponse {
            document_id: uploaded.id.to_string(),
            pages: uploaded.pages,
            size: uploaded.size,
        }));
    }

    Err(ApiError::bad_request("MISSING_FILE", "No file uploaded"))
}
