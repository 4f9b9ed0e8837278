//! In-memory `.docx` package

use super::DocumentError;
use std::fs::{self, File};
use std::io::{BufReader, Read, Seek, Write};
use std::path::{Path, PathBuf};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

pub const MAIN_DOCUMENT_PART: &str = "word/document.xml";
pub const DOCUMENT_RELS_PART: &str = "word/_rels/document.xml.rels";
pub const CONTENT_TYPES_PART: &str = "[Content_Types].xml";

/// Upper bound on the buffer reserved from an entry's declared size; the
/// declared size comes from the archive and is not trusted.
const MAX_PREALLOC: u64 = 16 * 1024 * 1024;

/// Every part of a `.docx` zip, kept in archive order.
#[derive(Debug, Clone, Default)]
pub struct DocxPackage {
    parts: Vec<(String, Vec<u8>)>,
}

impl DocxPackage {
    pub fn open(path: &Path) -> Result<Self, DocumentError> {
        let file = File::open(path)?;
        Self::from_reader(BufReader::new(file))
    }

    pub fn from_reader<R: Read + Seek>(reader: R) -> Result<Self, DocumentError> {
        let mut archive = ZipArchive::new(reader)?;
        let mut parts = Vec::with_capacity(archive.len());
        for i in 0..archive.len() {
            let mut entry = archive.by_index(i)?;
            let name = entry.name().to_string();
            let mut data = Vec::with_capacity(entry.size().min(MAX_PREALLOC) as usize);
            entry.read_to_end(&mut data)?;
            parts.push((name, data));
        }

        let package = Self { parts };
        if !package.contains(MAIN_DOCUMENT_PART) {
            return Err(DocumentError::Format(format!("missing {}", MAIN_DOCUMENT_PART)));
        }
        Ok(package)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.parts.iter().any(|(n, _)| n == name)
    }

    pub fn part(&self, name: &str) -> Option<&[u8]> {
        self.parts
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, data)| data.as_slice())
    }

    /// A part decoded as UTF-8 XML, or `None` when the part is absent.
    pub fn xml_part(&self, name: &str) -> Result<Option<&str>, DocumentError> {
        match self.part(name) {
            Some(data) => std::str::from_utf8(data)
                .map(Some)
                .map_err(|e| DocumentError::Format(format!("{} is not UTF-8: {}", name, e))),
            None => Ok(None),
        }
    }

    pub fn main_document(&self) -> Result<&str, DocumentError> {
        self.xml_part(MAIN_DOCUMENT_PART)?
            .ok_or_else(|| DocumentError::Format(format!("missing {}", MAIN_DOCUMENT_PART)))
    }

    /// Replace a part in place, or append it when new.
    pub fn set_part(&mut self, name: &str, data: Vec<u8>) {
        match self.parts.iter_mut().find(|(n, _)| n == name) {
            Some((_, existing)) => *existing = data,
            None => self.parts.push((name.to_string(), data)),
        }
    }

    /// First `{prefix}{n}.{extension}` (n >= 1) that is not already a part.
    pub fn unused_part_name(&self, prefix: &str, extension: &str) -> String {
        (1..)
            .map(|n| format!("{}{}.{}", prefix, n, extension))
            .find(|name| !self.contains(name))
            .unwrap_or_else(|| format!("{}.{}", prefix, extension))
    }

    pub fn write_to<W: Write + Seek>(&self, writer: W) -> Result<W, DocumentError> {
        let mut zip = ZipWriter::new(writer);
        let deflated = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
        let stored = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);

        for (name, data) in &self.parts {
            if name.ends_with('/') {
                zip.add_directory(name.as_str(), deflated)?;
                continue;
            }
            let options = if name.starts_with("word/media/") { stored } else { deflated };
            zip.start_file(name.as_str(), options)?;
            zip.write_all(data)?;
        }
        Ok(zip.finish()?)
    }

    /// Write the package to `path`, replacing any existing file.
    ///
    /// The archive is written to a sibling temporary file first and renamed
    /// over the destination once complete.
    pub fn save(&self, path: &Path) -> Result<(), DocumentError> {
        let tmp = temp_sibling(path);
        let result = File::create(&tmp)
            .map_err(DocumentError::from)
            .and_then(|file| self.write_to(file))
            .and_then(|file| file.sync_all().map_err(DocumentError::from))
            .and_then(|_| fs::rename(&tmp, path).map_err(DocumentError::from));

        if result.is_err() {
            let _ = fs::remove_file(&tmp);
        }
        result
    }
}

fn temp_sibling(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document".to_string());
    path.with_file_name(format!(".{}.tmp", name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::fixtures;
    use std::io::Cursor;
    use tempfile::TempDir;

    #[test]
    fn test_open_and_save_keeps_parts() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("letter.docx");
        fixtures::write_docx(&path, &["Dear Sir,", "Regards"]);

        let package = DocxPackage::open(&path).unwrap();
        let before = package.main_document().unwrap().to_string();
        package.save(&path).unwrap();

        let reopened = DocxPackage::open(&path).unwrap();
        assert_eq!(reopened.main_document().unwrap(), before);
        assert!(reopened.contains(CONTENT_TYPES_PART));
        assert!(!temp.path().join(".letter.docx.tmp").exists());
    }

    #[test]
    fn test_missing_main_document_is_format_error() {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        zip.start_file("hello.txt", SimpleFileOptions::default()).unwrap();
        zip.write_all(b"hi").unwrap();
        let bytes = zip.finish().unwrap().into_inner();

        let result = DocxPackage::from_reader(Cursor::new(bytes));
        assert!(matches!(result, Err(DocumentError::Format(_))));
    }

    #[test]
    fn test_non_zip_is_format_error() {
        let result = DocxPackage::from_reader(Cursor::new(b"not a zip at all".to_vec()));
        assert!(matches!(result, Err(DocumentError::Format(_))));
    }

    /// Rewrite the uncompressed size of the first central directory entry.
    fn declare_uncompressed_size(bytes: &mut [u8], size: u64) {
        let header = bytes
            .windows(4)
            .position(|w| w == b"PK\x01\x02")
            .unwrap();
        let field = |at: usize| u16::from_le_bytes([bytes[at], bytes[at + 1]]) as usize;
        let name_len = field(header + 28);
        let extra_len = field(header + 30);
        let declared = u32::from_le_bytes(bytes[header + 24..header + 28].try_into().unwrap());

        if declared == u32::MAX {
            // Sizes live in the zip64 extra field, uncompressed size first
            let mut at = header + 46 + name_len;
            let end = at + extra_len;
            while at + 4 <= end {
                let (id, len) = (field(at), field(at + 2));
                if id == 0x0001 {
                    bytes[at + 4..at + 12].copy_from_slice(&size.to_le_bytes());
                    return;
                }
                at += 4 + len;
            }
            panic!("no zip64 extra field");
        }
        let size = size.min(u32::MAX as u64 - 1) as u32;
        bytes[header + 24..header + 28].copy_from_slice(&size.to_le_bytes());
    }

    #[test]
    fn test_huge_declared_size_does_not_preallocate() {
        let xml = fixtures::document_xml(&["Dear Sir,"]);
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default()
            .compression_method(CompressionMethod::Stored)
            .large_file(true);
        zip.start_file(MAIN_DOCUMENT_PART, options).unwrap();
        zip.write_all(xml.as_bytes()).unwrap();
        let mut bytes = zip.finish().unwrap().into_inner();
        declare_uncompressed_size(&mut bytes, 1 << 46);

        match DocxPackage::from_reader(Cursor::new(bytes)) {
            Ok(package) => assert_eq!(package.main_document().unwrap(), xml),
            Err(e) => assert!(
                matches!(e, DocumentError::Format(_) | DocumentError::Io(_)),
                "unexpected error: {:?}",
                e
            ),
        }
    }

    #[test]
    fn test_unused_part_name_skips_existing() {
        let mut package = DocxPackage::default();
        package.set_part("word/media/signature1.png", vec![1]);
        assert_eq!(
            package.unused_part_name("word/media/signature", "png"),
            "word/media/signature2.png"
        );
    }
}
