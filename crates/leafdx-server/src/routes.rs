//! Route handlers. Each one is a thin shim over [`DiagnosisService`].

use std::sync::Arc;

use axum::Json;
use axum::extract::{Multipart, State};
use leafdx_ai::DiagnosisService;
use leafdx_core::Diagnosis;
use serde::Serialize;
use tracing::{debug, error};

use crate::error::ApiError;

pub type SharedService = Arc<DiagnosisService>;

/// Multipart part carrying the image.
pub const FILE_FIELD: &str = "file";

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub model_loaded: bool,
    pub classes: usize,
    pub version: &'static str,
}

/// GET /health
pub async fn health(State(service): State<SharedService>) -> Json<HealthResponse> {
    let model_loaded = service.is_ready();
    Json(HealthResponse {
        status: if model_loaded { "ok" } else { "not_ready" },
        model_loaded,
        classes: service.labels().map_or(0, |labels| labels.len()),
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// GET /labels - category labels in classifier output order.
pub async fn labels(State(service): State<SharedService>) -> Result<Json<Vec<String>>, ApiError> {
    service.ensure_ready()?;
    let labels = service
        .labels()
        .map(|labels| labels.as_slice().to_vec())
        .unwrap_or_default();
    Ok(Json(labels))
}

/// POST /predict - diagnose the image in the `file` part.
pub async fn predict(
    State(service): State<SharedService>,
    mut multipart: Multipart,
) -> Result<Json<Diagnosis>, ApiError> {
    service.ensure_ready()?;

    let image = read_file_field(&mut multipart)
        .await?
        .ok_or_else(ApiError::no_file_selected)?;
    debug!(bytes = image.len(), "received upload");

    let worker = Arc::clone(&service);
    let diagnosis = tokio::task::spawn_blocking(move || worker.diagnose(&image))
        .await
        .map_err(|e| {
            error!(error = %e, "prediction task failed");
            ApiError::internal(format!("prediction task failed: {e}"))
        })??;

    Ok(Json(diagnosis))
}

/// Bytes of the first `file` part that carries a non-empty filename.
async fn read_file_field(multipart: &mut Multipart) -> Result<Option<Vec<u8>>, ApiError> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }
        if field.file_name().is_none_or(str::is_empty) {
            return Ok(None);
        }
        let bytes = field.bytes().await?;
        return Ok(Some(bytes.to_vec()));
    }
    Ok(None)
}
