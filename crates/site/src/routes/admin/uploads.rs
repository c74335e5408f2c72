//! JSON upload API used by the admin image fields.

use axum::{
    Json,
    extract::{Multipart, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use tracing::{instrument, warn};

use crate::middleware::RequireAdmin;
use crate::services::upload::{DeleteResult, UploadFile, UploadResult};
use crate::state::AppState;

/// Multipart field carrying the file.
const FILE_FIELD: &str = "file";
/// Optional multipart field naming the image being replaced.
const PREVIOUS_URL_FIELD: &str = "previous_url";

/// Body of the bulk delete endpoint.
#[derive(Debug, Deserialize)]
pub struct DeleteRequest {
    #[serde(default)]
    pub urls: Vec<String>,
}

const fn status_for(success: bool) -> StatusCode {
    if success {
        StatusCode::OK
    } else {
        StatusCode::BAD_REQUEST
    }
}

struct UploadRequest {
    file: Option<UploadFile>,
    previous_url: Option<String>,
}

async fn read_multipart(mut multipart: Multipart) -> Result<UploadRequest, String> {
    let mut request = UploadRequest {
        file: None,
        previous_url: None,
    };

    while let Some(field) = multipart.next_field().await.map_err(|e| e.body_text())? {
        match field.name() {
            Some(FILE_FIELD) => {
                let file_name = field.file_name().unwrap_or("upload").to_owned();
                let content_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_owned();
                let bytes = field.bytes().await.map_err(|e| e.body_text())?;
                request.file = Some(UploadFile {
                    file_name,
                    content_type,
                    bytes,
                });
            }
            Some(PREVIOUS_URL_FIELD) => {
                let url = field.text().await.map_err(|e| e.body_text())?;
                request.previous_url = Some(url).filter(|u| !u.trim().is_empty());
            }
            _ => {}
        }
    }

    Ok(request)
}

/// Upload one image, replacing `previous_url` when given.
///
/// Responds with `{success, url?, error?}`; replacements add
/// `previous_removed`.
#[instrument(skip_all)]
pub async fn upload(
    _admin: RequireAdmin,
    State(state): State<AppState>,
    multipart: Multipart,
) -> Response {
    let request = match read_multipart(multipart).await {
        Ok(request) => request,
        Err(e) => {
            warn!(error = %e, "Unreadable upload body");
            let result = UploadResult::failed("Could not read the uploaded file");
            return (StatusCode::BAD_REQUEST, Json(result)).into_response();
        }
    };

    let Some(file) = request.file else {
        let result = UploadResult::failed("No file provided");
        return (StatusCode::BAD_REQUEST, Json(result)).into_response();
    };

    match request.previous_url {
        Some(previous) => {
            let outcome = state.uploads().replace(file, Some(&previous)).await;
            (status_for(outcome.upload.success), Json(outcome)).into_response()
        }
        None => {
            let result = state.uploads().upload(file).await;
            (status_for(result.success), Json(result)).into_response()
        }
    }
}

/// Delete previously uploaded images by public URL.
#[instrument(skip_all)]
pub async fn delete(
    _admin: RequireAdmin,
    State(state): State<AppState>,
    Json(request): Json<DeleteRequest>,
) -> (StatusCode, Json<DeleteResult>) {
    let result = state.uploads().delete_urls(&request.urls).await;
    (status_for(result.success), Json(result))
}
