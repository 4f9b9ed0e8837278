//! Marker paragraph lookup

use super::body::parse_body;
use super::{DocumentError, DocxPackage, Paragraph};
use std::path::Path;
use tracing::debug;

/// All body paragraphs of the document at `path`, in order.
pub fn read_paragraphs(path: &Path) -> Result<Vec<Paragraph>, DocumentError> {
    let package = DocxPackage::open(path)?;
    let layout = parse_body(package.main_document()?)?;
    Ok(layout.paragraphs())
}

/// 1-based index of the first paragraph whose trimmed text equals `marker`.
///
/// Returns `Ok(None)` when no paragraph matches.
pub fn find_marker(path: &Path, marker: &str) -> Result<Option<usize>, DocumentError> {
    let package = DocxPackage::open(path)?;
    let layout = parse_body(package.main_document()?)?;
    let found = layout.find(marker);

    debug!(
        document = %path.display(),
        paragraphs = layout.paragraphs.len(),
        marker_paragraph = ?found,
        "Scanned document for marker"
    );
    Ok(found)
}
