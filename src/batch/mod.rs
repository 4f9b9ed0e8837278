//! Batch signing of a directory of documents
//!
//! Every `.docx` directly inside a directory is scanned for the marker
//! paragraph; matches get the signature image inserted `offset` paragraphs
//! away from the marker. A document that fails is recorded in the report and
//! the batch moves on.

use crate::document::{self, DocumentError, SignatureImage, DOCX_EXTENSION};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

pub const DEFAULT_MARKER: &str = "Adewale, Adedotun and Olufunso Odugbesan.";

/// How and where the signature is placed
#[derive(Debug, Clone, PartialEq)]
pub struct BatchConfig {
    /// Exact (trimmed) text of the anchor paragraph
    pub marker: String,
    /// Target paragraph relative to the marker; -1 is the paragraph above it
    pub offset: i64,
    pub width_in: f64,
    pub height_in: f64,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            marker: DEFAULT_MARKER.to_string(),
            offset: -1,
            width_in: 0.5,
            height_in: 0.5,
        }
    }
}

#[derive(Error, Debug)]
pub enum BatchError {
    #[error("Failed to read directory {}: {source}", .path.display())]
    ReadDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Signature image rejected: {0}")]
    Image(#[from] DocumentError),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    Signed {
        marker_paragraph: usize,
        paragraph: usize,
    },
    Skipped {
        reason: String,
    },
    Failed {
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentOutcome {
    pub file: String,
    #[serde(flatten)]
    pub outcome: Outcome,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub total: usize,
    pub signed: usize,
    pub skipped: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchReport {
    pub summary: BatchSummary,
    pub documents: Vec<DocumentOutcome>,
}

impl BatchReport {
    fn push(&mut self, file: String, outcome: Outcome) {
        self.summary.total += 1;
        match &outcome {
            Outcome::Signed { .. } => self.summary.signed += 1,
            Outcome::Skipped { .. } => self.summary.skipped += 1,
            Outcome::Failed { .. } => self.summary.failed += 1,
        }
        self.documents.push(DocumentOutcome { file, outcome });
    }

    /// Append another report's outcomes, e.g. from a second directory.
    pub fn merge(&mut self, other: BatchReport) {
        for doc in other.documents {
            self.push(doc.file, doc.outcome);
        }
    }
}

/// Sign every `.docx` directly inside `dir` with the image at `image`.
pub fn process_folder(
    dir: &Path,
    image: &Path,
    config: &BatchConfig,
) -> Result<BatchReport, BatchError> {
    let image = SignatureImage::load(image)?;
    let mut report = BatchReport::default();

    for (name, path) in list_documents(dir)? {
        let outcome = match sign_document(&path, &image, config) {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(document = %name, error = %e, "Failed to sign document");
                Outcome::Failed { reason: e.to_string() }
            }
        };
        if let Outcome::Signed { paragraph, .. } = &outcome {
            info!(document = %name, paragraph, "Document signed");
        }
        report.push(name, outcome);
    }

    info!(
        dir = %dir.display(),
        total = report.summary.total,
        signed = report.summary.signed,
        skipped = report.summary.skipped,
        failed = report.summary.failed,
        "Batch finished"
    );
    Ok(report)
}

fn sign_document(
    path: &Path,
    image: &SignatureImage,
    config: &BatchConfig,
) -> Result<Outcome, DocumentError> {
    let Some(marker_paragraph) = document::find_marker(path, &config.marker)? else {
        return Ok(Outcome::Skipped {
            reason: "marker not found".to_string(),
        });
    };

    // Anything below 1 is rejected by the inserter as an invalid index
    let paragraph = (marker_paragraph as i64)
        .checked_add(config.offset)
        .and_then(|index| usize::try_from(index).ok())
        .unwrap_or(0);
    document::insert_signature(path, image, paragraph, config.width_in, config.height_in)?;

    Ok(Outcome::Signed {
        marker_paragraph,
        paragraph,
    })
}

/// `.docx` files directly in `dir`, sorted by name.
fn list_documents(dir: &Path) -> Result<Vec<(String, PathBuf)>, BatchError> {
    let read_err = |source| BatchError::ReadDir {
        path: dir.to_path_buf(),
        source,
    };

    let mut documents = Vec::new();
    for entry in fs::read_dir(dir).map_err(read_err)? {
        let entry = entry.map_err(read_err)?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if !name.ends_with(DOCX_EXTENSION) {
            continue;
        }
        if entry.file_type().map_err(read_err)?.is_file() {
            documents.push((name, entry.path()));
        }
    }
    documents.sort();
    Ok(documents)
}
