use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use uuid::Uuid;

use crate::{
    config::AppConfig,
    middleware::error_handling::{AppError, Result},
    models::pdf_import::{
        JobStatusResponse, UploadAcceptedResponse, UploadParsedResponse, UploadQuery,
    },
    services::PdfExtractionService,
};

pub const MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

/// POST /api/pdf/upload?mode=
///
/// Synchronous by default: the response carries the extracted records.
/// With `mode=async` the upload is accepted immediately and extraction runs
/// in a background task whose progress is polled via the jobs endpoint.
pub async fn upload_pdf(
    State(config): State<AppConfig>,
    Query(query): Query<UploadQuery>,
    mut multipart: Multipart,
) -> Result<Response> {
    let mut file_data: Option<Vec<u8>> = None;
    let mut file_name = String::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::InvalidInput(format!("Invalid multipart data: {}", e)))?
    {
        if field.name() == Some("pdf") {
            file_name = field.file_name().unwrap_or("upload.pdf").to_string();
            let bytes = field
                .bytes()
                .await
                .map_err(|e| AppError::InvalidInput(format!("Failed to read file: {}", e)))?;
            file_data = Some(bytes.to_vec());
        }
    }

    let Some(file_data) = file_data else {
        return Err(AppError::InvalidInput("No file uploaded".to_string()));
    };

    if file_data.is_empty() {
        return Err(AppError::InvalidInput("Uploaded file is empty".to_string()));
    }

    if file_data.len() > MAX_UPLOAD_BYTES {
        return Err(AppError::InvalidInput(
            "File exceeds the 50MB upload limit".to_string(),
        ));
    }

    tracing::info!("Received PDF upload: {} ({} bytes)", file_name, file_data.len());

    let extraction = PdfExtractionService::from_env()?;

    if query.mode.as_deref() == Some("async") {
        let job_id = config.job_store.create();
        let job_store = config.job_store.clone();

        tokio::spawn(async move {
            let progress = |percent: u8, message: &str| {
                job_store.set_progress(job_id, percent, message);
            };

            match extraction.extract(&file_data, &progress).await {
                Ok(records) => job_store.complete(job_id, records),
                Err(e) => {
                    tracing::error!("PDF extraction job {} failed: {}", job_id, e);
                    job_store.fail(job_id, e.to_string());
                }
            }
        });

        return Ok((
            StatusCode::ACCEPTED,
            Json(UploadAcceptedResponse {
                message: "File accepted for processing".to_string(),
                job_id,
            }),
        )
            .into_response());
    }

    let records = extraction
        .extract(&file_data, &|percent, message| {
            tracing::debug!("Extraction progress {}%: {}", percent, message);
        })
        .await?;

    Ok(Json(UploadParsedResponse {
        message: "File uploaded and parsed successfully".to_string(),
        records,
    })
    .into_response())
}

/// GET /api/pdf/jobs/:id
pub async fn get_job_status(
    State(config): State<AppConfig>,
    Path(job_id): Path<Uuid>,
) -> Result<Json<JobStatusResponse>> {
    let status = config
        .job_store
        .get(job_id)
        .ok_or_else(|| AppError::NotFound("Job not found".to_string()))?;

    Ok(Json(status))
}
