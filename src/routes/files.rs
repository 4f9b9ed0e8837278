//! Upload-and-sign and download endpoints
//!
//! - POST /upload-zip - two document archives plus a signature image
//! - GET /download/{folder_name} - zip of a job's signed documents

use axum::{
    extract::{Multipart, Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use bytes::Bytes;
use std::path::PathBuf;
use tracing::{debug, info};

use crate::archive::{self, ArchiveError};
use crate::batch::{self, BatchConfig, BatchError, BatchReport};
use crate::document::image_content_type;
use crate::models::{AppState, UploadResponse};
use crate::storage::{job_output_dir, JobWorkspace};
use crate::types::{AppError, AppResult};
use crate::utils::{is_safe_name, safe_extension};

const ARCHIVE_FIELDS: [&str; 2] = ["file1", "file2"];
const IMAGE_FIELD: &str = "signature_image";

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/upload-zip", post(upload_zip))
        .route("/download/{folder_name}", get(download_folder))
        .with_state(state)
}

/// The three required parts of an upload, read fully before any disk work.
struct UploadForm {
    archives: Vec<(&'static str, Bytes)>,
    image: Bytes,
    image_extension: String,
}

impl UploadForm {
    async fn read(multipart: &mut Multipart) -> AppResult<Self> {
        let mut file1 = None;
        let mut file2 = None;
        let mut image = None;

        while let Some(field) = multipart.next_field().await? {
            let name = field.name().unwrap_or_default().to_string();
            match name.as_str() {
                "file1" => file1 = Some(field.bytes().await?),
                "file2" => file2 = Some(field.bytes().await?),
                IMAGE_FIELD => {
                    let extension = field
                        .file_name()
                        .and_then(safe_extension)
                        .or_else(|| field.content_type().and_then(extension_for_mime));
                    image = Some((field.bytes().await?, extension));
                }
                other => debug!(field = other, "Ignoring unknown multipart field"),
            }
        }

        let file1 = file1.ok_or_else(|| AppError::MissingField(ARCHIVE_FIELDS[0].to_string()))?;
        let file2 = file2.ok_or_else(|| AppError::MissingField(ARCHIVE_FIELDS[1].to_string()))?;
        let (image, extension) =
            image.ok_or_else(|| AppError::MissingField(IMAGE_FIELD.to_string()))?;

        let image_extension = extension
            .filter(|ext| image_content_type(ext).is_some())
            .ok_or_else(|| {
                AppError::InvalidRequest(format!(
                    "{} must be a PNG, JPEG, GIF, BMP or TIFF image",
                    IMAGE_FIELD
                ))
            })?;

        Ok(Self {
            archives: vec![(ARCHIVE_FIELDS[0], file1), (ARCHIVE_FIELDS[1], file2)],
            image,
            image_extension,
        })
    }
}

fn extension_for_mime(content_type: &str) -> Option<String> {
    let extensions = mime_guess::get_mime_extensions_str(content_type)?;
    extensions
        .iter()
        .find(|ext| image_content_type(ext).is_some())
        .map(|ext| ext.to_string())
}

/// POST /upload-zip - extract both archives, sign every document, keep the
/// result for download.
async fn upload_zip(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> AppResult<Json<UploadResponse>> {
    let form = UploadForm::read(&mut multipart).await?;
    info!(
        file1_bytes = form.archives[0].1.len(),
        file2_bytes = form.archives[1].1.len(),
        image_bytes = form.image.len(),
        "Upload received"
    );

    // The job moves straight into the blocking task, so its directory is
    // removed there on failure, and only once processing has stopped.
    let job = JobWorkspace::create(&state.config.storage.work_root).await?;
    let config = state.config.signing.batch_config();
    let (job_id, report) =
        tokio::task::spawn_blocking(move || run_job(job, form, &config)).await??;

    info!(
        job_id = %job_id,
        signed = report.summary.signed,
        skipped = report.summary.skipped,
        failed = report.summary.failed,
        "Job completed"
    );
    Ok(Json(UploadResponse::new(job_id, report)))
}

/// Store the uploads, sign them and keep the job for download.
fn run_job(
    job: JobWorkspace,
    form: UploadForm,
    config: &BatchConfig,
) -> AppResult<(String, BatchReport)> {
    let uploads = job.uploads_dir();

    let mut archives = Vec::with_capacity(form.archives.len());
    for (field, data) in &form.archives {
        let path = uploads.join(format!("{}.zip", field));
        std::fs::write(&path, data)?;
        archives.push((*field, path));
    }
    let image = uploads.join(format!("signature.{}", form.image_extension));
    std::fs::write(&image, &form.image)?;

    let report = sign_uploads(&archives, &image, &job.output_dir(), config)?;
    let job_id = job.persist()?;
    Ok((job_id, report))
}

/// Extract every archive into `output`, then run the batch over it.
fn sign_uploads(
    archives: &[(&'static str, PathBuf)],
    image: &std::path::Path,
    output: &std::path::Path,
    config: &BatchConfig,
) -> AppResult<BatchReport> {
    for (field, archive) in archives {
        archive::extract_archive(archive, output).map_err(|e| match e {
            ArchiveError::Format(_) => {
                AppError::InvalidArchive(format!("{} is not a valid zip archive", field))
            }
            ArchiveError::Io(e) => AppError::from(e),
        })?;
    }

    batch::process_folder(output, image, config).map_err(|e| match e {
        BatchError::Image(e) => AppError::InvalidRequest(format!("{}: {}", IMAGE_FIELD, e)),
        other => AppError::Internal(other.to_string()),
    })
}

/// GET /download/{folder_name} - zip of the job's signed documents
async fn download_folder(
    State(state): State<AppState>,
    Path(folder_name): Path<String>,
) -> AppResult<Response> {
    if !is_safe_name(&folder_name) {
        return Err(AppError::InvalidName(
            "folder name may only contain letters, digits, '-' and '_'".to_string(),
        ));
    }

    let dir = job_output_dir(&state.config.storage.work_root, &folder_name)
        .await
        .ok_or_else(|| AppError::NotFound(format!("Folder '{}' not found", folder_name)))?;

    let bytes = tokio::task::spawn_blocking(move || archive::build_archive(&dir)).await??;
    let file_name = format!("{}.zip", folder_name);
    info!(folder = %folder_name, bytes = bytes.len(), "Serving archive");

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "application/zip".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", file_name),
            ),
        ],
        bytes,
    )
        .into_response())
}
