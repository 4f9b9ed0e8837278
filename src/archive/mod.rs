//! Zip archive plumbing
//!
//! - [`extract_archive`] unpacks an uploaded archive into a directory
//! - [`build_archive`] packs a directory tree into a single zip for download

pub mod build;
pub mod extract;

pub use build::build_archive;
pub use extract::extract_archive;

use thiserror::Error;

/// Errors that can occur while reading or writing zip archives
#[derive(Error, Debug)]
pub enum ArchiveError {
    /// The input is not a readable zip archive
    #[error("Invalid zip archive: {0}")]
    Format(String),

    /// IO error while extracting or building
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<zip::result::ZipError> for ArchiveError {
    fn from(err: zip::result::ZipError) -> Self {
        match err {
            zip::result::ZipError::Io(e) => ArchiveError::Io(e),
            other => ArchiveError::Format(other.to_string()),
        }
    }
}
