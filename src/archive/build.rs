//! Archive building for downloads

use super::ArchiveError;
use std::fs::{self, File};
use std::io::{self, Cursor};
use std::path::{Path, PathBuf};
use tracing::debug;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Pack every file under `source` into an in-memory deflate zip.
///
/// Entry names are `/`-separated paths relative to `source`, written in
/// sorted order. Empty directories are not recorded.
pub fn build_archive(source: &Path) -> Result<Vec<u8>, ArchiveError> {
    let mut files = Vec::new();
    collect_files(source, &mut files)?;
    files.sort();

    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));

    for path in &files {
        let name = entry_name(source, path)?;
        zip.start_file(name, options)?;
        let mut input = File::open(path)?;
        io::copy(&mut input, &mut zip)?;
    }

    let bytes = zip.finish()?.into_inner();
    debug!(
        source = %source.display(),
        files = files.len(),
        bytes = bytes.len(),
        "Archive built"
    );
    Ok(bytes)
}

fn collect_files(dir: &Path, files: &mut Vec<PathBuf>) -> io::Result<()> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let file_type = entry.file_type()?;
        if file_type.is_dir() {
            collect_files(&entry.path(), files)?;
        } else if file_type.is_file() {
            files.push(entry.path());
        }
    }
    Ok(())
}

fn entry_name(root: &Path, path: &Path) -> Result<String, ArchiveError> {
    let relative = path
        .strip_prefix(root)
        .map_err(|e| ArchiveError::Io(io::Error::new(io::ErrorKind::InvalidInput, e)))?;
    let parts: Vec<String> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    Ok(parts.join("/"))
}
