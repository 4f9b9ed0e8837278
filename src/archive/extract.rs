//! Archive extraction

use super::ArchiveError;
use std::fs::{self, File};
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Extract every entry of the zip at `archive_path` into `dest`.
///
/// `dest` is created if missing. Entry paths are kept relative to `dest`;
/// entries whose names would resolve outside of it (absolute paths, `..`)
/// are skipped. Returns the paths of the extracted files.
pub fn extract_archive(archive_path: &Path, dest: &Path) -> Result<Vec<PathBuf>, ArchiveError> {
    fs::create_dir_all(dest)?;

    let file = File::open(archive_path)?;
    let mut archive = zip::ZipArchive::new(BufReader::new(file))?;
    let mut extracted = Vec::with_capacity(archive.len());

    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;

        let Some(relative) = entry.enclosed_name() else {
            warn!(entry = entry.name(), "Skipping archive entry with unsafe path");
            continue;
        };
        let out_path = dest.join(relative);

        if entry.is_dir() {
            fs::create_dir_all(&out_path)?;
            continue;
        }

        if let Some(parent) = out_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut out = File::create(&out_path)?;
        io::copy(&mut entry, &mut out)?;
        extracted.push(out_path);
    }

    debug!(
        archive = %archive_path.display(),
        files = extracted.len(),
        "Archive extracted"
    );
    Ok(extracted)
}
