use anyhow::{anyhow, Context, Result};
use std::path::{Component, Path, PathBuf};
use uuid::Uuid;

use crate::models::ResumeRef;

pub const RESUMES: &str = "resumes";
pub const PROFILE_MEDIA: &str = "profile-media";

pub trait BlobStore {
    /// Stores `bytes` at `path` inside `bucket` and returns a URL for it.
    fn upload(&self, bucket: &str, path: &str, bytes: &[u8]) -> Result<String>;
    /// Deletes everything under `prefix`. Returns how many files went.
    fn remove_prefix(&self, bucket: &str, prefix: &str) -> Result<usize>;
}

/// Blob store on the local filesystem, one directory per bucket.
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, bucket: &str, path: &str) -> Result<PathBuf> {
        let relative = Path::new(path);
        let clean = relative
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
        if !clean || bucket.is_empty() || bucket.contains(['/', '\\']) {
            return Err(anyhow!("Refusing blob path {}/{}", bucket, path));
        }
        Ok(self.root.join(bucket).join(relative))
    }
}

impl BlobStore for FsBlobStore {
    fn upload(&self, bucket: &str, path: &str, bytes: &[u8]) -> Result<String> {
        let target = self.resolve(bucket, path)?;
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&target, bytes)
            .with_context(|| format!("Failed to write blob {}", target.display()))?;
        tracing::debug!(bucket, path, size = bytes.len(), "uploaded blob");
        Ok(format!("file://{}", target.display()))
    }

    fn remove_prefix(&self, bucket: &str, prefix: &str) -> Result<usize> {
        let dir = self.resolve(bucket, prefix)?;
        if !dir.is_dir() {
            return Ok(0);
        }
        let count = count_files(&dir)?;
        std::fs::remove_dir_all(&dir)
            .with_context(|| format!("Failed to purge {}", dir.display()))?;
        Ok(count)
    }
}

fn count_files(dir: &Path) -> Result<usize> {
    let mut count = 0;
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            count += count_files(&entry.path())?;
        } else {
            count += 1;
        }
    }
    Ok(count)
}

/// `<user>/<random>.<ext>`, keeping the extension of the original file.
pub fn object_path(user_id: &str, file_name: &str) -> String {
    let ext = Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("bin");
    format!("{}/{}.{}", user_id, Uuid::new_v4(), ext)
}

/// Uploads a resume for `user_id`. A failed upload is logged and yields
/// `None` so the surrounding save can go ahead without the attachment.
pub fn upload_resume(blobs: &dyn BlobStore, user_id: &str, file_name: &str, bytes: &[u8]) -> Option<ResumeRef> {
    let path = object_path(user_id, file_name);
    match blobs.upload(RESUMES, &path, bytes) {
        Ok(url) => Some(ResumeRef {
            url,
            name: file_name.to_string(),
        }),
        Err(e) => {
            tracing::warn!(file = file_name, "Resume upload failed, saving without it: {e:#}");
            None
        }
    }
}
