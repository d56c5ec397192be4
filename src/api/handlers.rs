//! Request handlers for the four public routes plus `/metrics`.

use axum::{
    body::Bytes,
    extract::{Multipart, Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

use crate::core::errors::{ApiError, ApiResult, ProcessingFailure, ValidationError};
use crate::core::types::{
    AppState, BatchStatusResponse, BatchSubmitResponse, FileStatus, QueueEntry,
};
use crate::queue::{all_completed, new_batch_id};
use crate::utils::upload::{nobg_filename, sanitize_filename, validate, validate_type};

/// GET /health
pub async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    state.metrics.record_endpoint_request("/health");
    Json(serde_json::json!({ "status": "healthy" }))
}

/// GET /metrics - Prometheus text exposition
pub async fn metrics_endpoint(State(state): State<AppState>) -> impl IntoResponse {
    state.metrics.record_endpoint_request("/metrics");
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.to_prometheus(),
    )
}

/// POST /remove-bg
///
/// # Request Format:
/// - multipart/form-data
/// - Field "image": one image file (png, jpg, jpeg or webp, at most 10 MiB)
///
/// # Response:
/// - 200 with the PNG cutout as an attachment named `<stem>-nobg.png`
pub async fn remove_background(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> ApiResult<Response> {
    state.metrics.record_endpoint_request("/remove-bg");

    let (filename, data) = match read_image_field(&mut multipart).await? {
        Some(upload) => upload,
        None => return Err(reject(&state, ValidationError::MissingImage)),
    };

    if let Err(reason) = validate(&filename, data.len()) {
        return Err(reject(&state, reason));
    }

    info!("Removing background from {} ({} bytes)", filename, data.len());

    let start = Instant::now();
    let result = run_processor(&state, data).await;
    state.metrics.record_processing(result.is_ok(), start.elapsed());

    let output = result.map_err(|failure| {
        error!("Error processing image {}: {}", filename, failure);
        ApiError::Processing(failure)
    })?;

    let download_name = nobg_filename(&filename);
    info!(
        "Processed {} in {:.2}s -> {}",
        filename,
        start.elapsed().as_secs_f64(),
        download_name
    );

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "image/png".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", download_name),
            ),
        ],
        output,
    )
        .into_response())
}

/// POST /remove-bg/batch
///
/// Stores every `images` file with an allowed extension and queues it under a
/// new batch id. Files with a bad name or type are dropped without comment;
/// size is not checked here.
pub async fn submit_batch(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> ApiResult<(StatusCode, Json<BatchSubmitResponse>)> {
    state.metrics.record_endpoint_request("/remove-bg/batch");

    let batch_id = new_batch_id();
    let mut saw_images = false;
    let mut dropped = 0usize;
    let mut entries = Vec::new();

    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some("images") {
            continue;
        }
        // Parts without a filename are form values, not files
        let Some(filename) = field.file_name().map(str::to_string) else {
            continue;
        };
        saw_images = true;

        if let Err(reason) = validate_type(&filename) {
            debug!("Dropping batch file {:?}: {}", filename, reason);
            dropped += 1;
            continue;
        }

        let safe_name = sanitize_filename(&filename);
        if safe_name.is_empty() {
            warn!("Dropping batch file {:?}: nothing left after sanitizing", filename);
            dropped += 1;
            continue;
        }

        let data = field.bytes().await?;
        let stored_path = state.scratch.persist(&batch_id, &safe_name, &data).await?;
        entries.push(QueueEntry::queued(&batch_id, safe_name, stored_path));
    }

    if entries.is_empty() {
        let reason = if saw_images {
            ValidationError::NoValidFiles
        } else {
            ValidationError::MissingImages
        };
        return Err(reject(&state, reason));
    }

    let queued_files: Vec<String> = entries.iter().map(|e| e.original_name.clone()).collect();
    state.store.append(entries);
    state
        .metrics
        .record_batch_submitted(queued_files.len(), dropped);

    info!(
        "Batch {} queued {} files ({} dropped)",
        batch_id,
        queued_files.len(),
        dropped
    );

    Ok((
        StatusCode::ACCEPTED,
        Json(BatchSubmitResponse {
            message: format!("Added {} files to processing queue", queued_files.len()),
            batch_id,
            queued_files,
        }),
    ))
}

/// GET /queue-status/:batch_id
pub async fn queue_status(
    State(state): State<AppState>,
    Path(batch_id): Path<String>,
) -> ApiResult<Json<BatchStatusResponse>> {
    state.metrics.record_endpoint_request("/queue-status");

    let entries = state
        .store
        .query_by_batch(&batch_id)
        .ok_or_else(|| ApiError::BatchNotFound(batch_id.clone()))?;

    Ok(Json(BatchStatusResponse {
        completed: all_completed(&entries),
        files: entries.iter().map(FileStatus::from).collect(),
        batch_id,
    }))
}

/// Read the first `image` file part, returning its filename and bytes
async fn read_image_field(multipart: &mut Multipart) -> ApiResult<Option<(String, Bytes)>> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some("image") {
            continue;
        }
        let Some(filename) = field.file_name().map(str::to_string) else {
            continue;
        };
        let data = field.bytes().await?;
        return Ok(Some((filename, data)));
    }
    Ok(None)
}

/// Run the processor on the blocking pool, bounded by the configured timeout
async fn run_processor(state: &AppState, data: Bytes) -> Result<Vec<u8>, ProcessingFailure> {
    let processor = Arc::clone(&state.processor);
    let task = tokio::task::spawn_blocking(move || processor.process(&data));

    let joined = match state.config.processing_timeout() {
        Some(limit) => tokio::time::timeout(limit, task).await.map_err(|_| {
            ProcessingFailure(format!("timed out after {}s", limit.as_secs_f64()))
        })?,
        None => task.await,
    };

    joined.map_err(|e| ProcessingFailure(format!("processing task failed: {}", e)))?
}

fn reject(state: &AppState, reason: ValidationError) -> ApiError {
    state.metrics.record_validation_rejection();
    debug!("Rejected upload: {}", reason);
    ApiError::Validation(reason)
}
