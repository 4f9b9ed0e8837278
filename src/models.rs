use crate::batch::{BatchReport, BatchSummary, DocumentOutcome};
use crate::config::Config;

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        Self { config }
    }
}

// API Response types

#[derive(Debug, serde::Serialize)]
pub struct UploadResponse {
    pub status: String,
    pub message: String,
    pub job_id: String,
    /// Relative URL of the signed archive
    pub download_url: String,
    pub summary: BatchSummary,
    pub documents: Vec<DocumentOutcome>,
}

impl UploadResponse {
    pub fn new(job_id: String, report: BatchReport) -> Self {
        Self {
            status: "success".to_string(),
            message: "Files unzipped and processed successfully".to_string(),
            download_url: format!("/download/{}", job_id),
            job_id,
            summary: report.summary,
            documents: report.documents,
        }
    }
}

#[derive(Debug, serde::Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
    pub version: String,
}
