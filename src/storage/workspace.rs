//! Per-job working directories
//!
//! Every upload gets its own directory under the work root, named by a
//! generated job id:
//!
//! ```text
//! <work_root>/<job_id>/
//!     uploads/   raw archives and the signature image, removed after processing
//!     signed/    extracted documents, signed in place and served for download
//! ```
//!
//! A workspace that is dropped without [`JobWorkspace::persist`] deletes its
//! directory, so a failed request leaves nothing behind. Removal is blocking;
//! workspaces are handed to a blocking task right after creation. Persisted
//! jobs are removed by [`spawn_retention_sweeper`] once they are older than
//! the retention period. The sweeper only touches directories named like a
//! job id.

use crate::utils::is_safe_name;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tokio::fs;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

const UPLOADS_DIR: &str = "uploads";
const OUTPUT_DIR: &str = "signed";

#[derive(Debug)]
pub struct JobWorkspace {
    id: String,
    root: PathBuf,
    persisted: bool,
}

impl JobWorkspace {
    /// Create a fresh job directory under `work_root`.
    pub async fn create(work_root: &Path) -> io::Result<Self> {
        let id = uuid::Uuid::new_v4().simple().to_string();
        let root = work_root.join(&id);
        fs::create_dir_all(root.join(UPLOADS_DIR)).await?;
        fs::create_dir_all(root.join(OUTPUT_DIR)).await?;

        debug!(job_id = %id, "Created job workspace");
        Ok(Self {
            id,
            root,
            persisted: false,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn uploads_dir(&self) -> PathBuf {
        self.root.join(UPLOADS_DIR)
    }

    pub fn output_dir(&self) -> PathBuf {
        self.root.join(OUTPUT_DIR)
    }

    /// Keep the job directory for download and drop the raw uploads.
    pub fn persist(mut self) -> io::Result<String> {
        match std::fs::remove_dir_all(self.uploads_dir()) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e),
        }
        self.persisted = true;
        Ok(std::mem::take(&mut self.id))
    }
}

impl Drop for JobWorkspace {
    fn drop(&mut self) {
        if self.persisted {
            return;
        }
        if let Err(e) = std::fs::remove_dir_all(&self.root) {
            if e.kind() != io::ErrorKind::NotFound {
                warn!(job_id = %self.id, error = %e, "Failed to remove job workspace");
            }
        } else {
            debug!(job_id = %self.id, "Removed job workspace");
        }
    }
}

/// Output directory of a persisted job, or `None` if the name is not a valid
/// job name or no such job exists.
pub async fn job_output_dir(work_root: &Path, job_id: &str) -> Option<PathBuf> {
    if !is_safe_name(job_id) {
        return None;
    }
    let dir = work_root.join(job_id).join(OUTPUT_DIR);
    match fs::metadata(&dir).await {
        Ok(meta) if meta.is_dir() => Some(dir),
        _ => None,
    }
}

/// Job ids are simple-form uuids: 32 lowercase hex digits.
pub fn is_job_id(name: &str) -> bool {
    name.len() == 32
        && name
            .bytes()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
}

/// Remove job directories under `work_root` last modified before `now - retention`.
///
/// Entries not named like a job id are left alone. A failure on one job is
/// logged and the sweep moves on. Returns the number of removed jobs.
pub async fn sweep_expired_jobs(work_root: &Path, retention: Duration) -> io::Result<usize> {
    let cutoff = SystemTime::now()
        .checked_sub(retention)
        .unwrap_or(SystemTime::UNIX_EPOCH);

    let mut entries = match fs::read_dir(work_root).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(e),
    };

    let mut removed = 0;
    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name().to_string_lossy().into_owned();
        if !is_job_id(&name) {
            continue;
        }
        match remove_if_expired(&entry.path(), cutoff).await {
            Ok(true) => {
                debug!(job_id = %name, "Removed expired job");
                removed += 1;
            }
            Ok(false) => {}
            Err(e) => warn!(job_id = %name, error = %e, "Failed to remove expired job"),
        }
    }
    Ok(removed)
}

/// `Ok(false)` when `dir` is not an expired directory, including when it is
/// already gone.
async fn remove_if_expired(dir: &Path, cutoff: SystemTime) -> io::Result<bool> {
    let meta = match fs::symlink_metadata(dir).await {
        Ok(meta) => meta,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
        Err(e) => return Err(e),
    };
    if !meta.is_dir() {
        return Ok(false);
    }
    if !meta.modified().map(|m| m <= cutoff).unwrap_or(false) {
        return Ok(false);
    }
    match fs::remove_dir_all(dir).await {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

/// Periodically remove expired jobs in the background.
pub fn spawn_retention_sweeper(
    work_root: PathBuf,
    retention: Duration,
    interval: Duration,
) -> JoinHandle<()> {
    info!(
        work_root = %work_root.display(),
        retention_secs = retention.as_secs(),
        "Starting job retention sweeper"
    );
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            match sweep_expired_jobs(&work_root, retention).await {
                Ok(0) => {}
                Ok(removed) => info!(removed, "Removed expired jobs"),
                Err(e) => error!(error = %e, "Job sweep failed"),
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_dropped_workspace_is_removed() {
        let temp = TempDir::new().unwrap();
        let root = {
            let job = JobWorkspace::create(temp.path()).await.unwrap();
            assert!(job.uploads_dir().is_dir());
            assert!(job.output_dir().is_dir());
            job.root().to_path_buf()
        };
        assert!(!root.exists());
    }

    #[tokio::test]
    async fn test_persisted_workspace_keeps_output_only() {
        let temp = TempDir::new().unwrap();
        let job = JobWorkspace::create(temp.path()).await.unwrap();
        std::fs::write(job.output_dir().join("a.docx"), b"doc").unwrap();
        std::fs::write(job.uploads_dir().join("file1.zip"), b"zip").unwrap();
        let root = job.root().to_path_buf();

        let id = job.persist().unwrap();

        assert!(root.join("signed/a.docx").exists());
        assert!(!root.join("uploads").exists());
        assert_eq!(
            job_output_dir(temp.path(), &id).await,
            Some(root.join("signed"))
        );
    }

    #[tokio::test]
    async fn test_job_ids_are_unique() {
        let temp = TempDir::new().unwrap();
        let a = JobWorkspace::create(temp.path()).await.unwrap();
        let b = JobWorkspace::create(temp.path()).await.unwrap();
        assert_ne!(a.id(), b.id());
        assert!(is_safe_name(a.id()));
        assert!(is_job_id(a.id()));
    }

    #[tokio::test]
    async fn test_job_output_dir_rejects_unknown_and_unsafe() {
        let temp = TempDir::new().unwrap();
        assert_eq!(job_output_dir(temp.path(), "missing").await, None);
        assert_eq!(job_output_dir(temp.path(), "..").await, None);
        assert_eq!(job_output_dir(temp.path(), "../etc").await, None);
    }

    #[tokio::test]
    async fn test_sweep_removes_only_expired() {
        let temp = TempDir::new().unwrap();
        let job = JobWorkspace::create(temp.path()).await.unwrap();
        let id = job.persist().unwrap();

        let removed = sweep_expired_jobs(temp.path(), Duration::from_secs(3600))
            .await
            .unwrap();
        assert_eq!(removed, 0);
        assert!(temp.path().join(&id).exists());

        let removed = sweep_expired_jobs(temp.path(), Duration::ZERO).await.unwrap();
        assert_eq!(removed, 1);
        assert!(!temp.path().join(&id).exists());
    }

    #[tokio::test]
    async fn test_sweep_leaves_non_job_directories() {
        let temp = TempDir::new().unwrap();
        let data = temp.path().join("important-user-data");
        std::fs::create_dir_all(&data).unwrap();
        std::fs::write(data.join("thesis.docx"), b"doc").unwrap();
        let job = JobWorkspace::create(temp.path()).await.unwrap();
        let id = job.persist().unwrap();

        let removed = sweep_expired_jobs(temp.path(), Duration::ZERO).await.unwrap();

        assert_eq!(removed, 1);
        assert!(!temp.path().join(&id).exists());
        assert!(data.join("thesis.docx").exists());
    }

    #[tokio::test]
    async fn test_sweep_skips_job_named_files_and_removes_the_rest() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("0123456789abcdef0123456789abcdef"), b"x").unwrap();
        let a = JobWorkspace::create(temp.path()).await.unwrap().persist().unwrap();
        let b = JobWorkspace::create(temp.path()).await.unwrap().persist().unwrap();

        let removed = sweep_expired_jobs(temp.path(), Duration::ZERO).await.unwrap();

        assert_eq!(removed, 2);
        assert!(!temp.path().join(a).exists());
        assert!(!temp.path().join(b).exists());
        assert!(temp.path().join("0123456789abcdef0123456789abcdef").is_file());
    }

    #[tokio::test]
    async fn test_vanished_job_is_not_an_error() {
        let temp = TempDir::new().unwrap();
        let gone = temp.path().join("0123456789abcdef0123456789abcdef");
        let removed = remove_if_expired(&gone, SystemTime::now()).await.unwrap();
        assert!(!removed);
    }

    #[test]
    fn test_is_job_id() {
        assert!(is_job_id(&uuid::Uuid::new_v4().simple().to_string()));
        assert!(!is_job_id("important-user-data"));
        assert!(!is_job_id("0123456789ABCDEF0123456789ABCDEF"));
        assert!(!is_job_id("0123456789abcdef"));
    }

    #[tokio::test]
    async fn test_sweep_missing_root_is_noop() {
        let temp = TempDir::new().unwrap();
        let removed = sweep_expired_jobs(&temp.path().join("absent"), Duration::ZERO)
            .await
            .unwrap();
        assert_eq!(removed, 0);
    }
}
