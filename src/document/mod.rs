//! Word document (`.docx`) handling
//!
//! A `.docx` file is a zip package of XML parts. The paragraph list used here
//! is the list of `w:p` elements directly under `w:body` in
//! `word/document.xml`, numbered from 1 in document order.

pub mod body;
pub mod inserter;
pub mod package;
pub mod scanner;

#[cfg(test)]
pub(crate) mod fixtures;

pub use inserter::{image_content_type, insert_image, insert_signature, SignatureImage};
pub use package::DocxPackage;
pub use scanner::{find_marker, read_paragraphs};

use thiserror::Error;

/// File extension of documents processed by the batch driver
pub const DOCX_EXTENSION: &str = ".docx";

/// One body paragraph as read from a document
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct Paragraph {
    /// 1-based position in the document body
    pub position: usize,
    pub text: String,
    /// Number of runs directly inside the paragraph
    pub runs: usize,
}

#[derive(Error, Debug)]
pub enum DocumentError {
    #[error("Not a valid word-processing document: {0}")]
    Format(String),

    #[error("Invalid paragraph index {index}: document has {count} paragraphs")]
    InvalidParagraphIndex { index: usize, count: usize },

    #[error("Unsupported signature image type: {0}")]
    UnsupportedImage(String),

    #[error("Invalid image size: {width_in} x {height_in} inches")]
    InvalidImageSize { width_in: f64, height_in: f64 },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<zip::result::ZipError> for DocumentError {
    fn from(err: zip::result::ZipError) -> Self {
        match err {
            zip::result::ZipError::Io(e) => DocumentError::Io(e),
            other => DocumentError::Format(other.to_string()),
        }
    }
}

impl From<quick_xml::Error> for DocumentError {
    fn from(err: quick_xml::Error) -> Self {
        DocumentError::Format(format!("XML error: {}", err))
    }
}

impl From<quick_xml::events::attributes::AttrError> for DocumentError {
    fn from(err: quick_xml::events::attributes::AttrError) -> Self {
        DocumentError::Format(format!("XML attribute error: {}", err))
    }
}
