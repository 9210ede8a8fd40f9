use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use shared::domain::RecordId;

pub const IMAGE_DIR_NAME: &str = "userImages";

/// Local directory holding one `<record-id>.jpg` per record with a photo.
#[derive(Debug, Clone)]
pub struct ImageStore {
    dir: PathBuf,
}

impl ImageStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, id: &RecordId) -> PathBuf {
        self.dir.join(format!("{id}.jpg"))
    }

    /// Where a replacement image waits until its record update is acknowledged.
    pub fn pending_path_for(&self, id: &RecordId) -> PathBuf {
        self.dir.join(format!("{id}.jpg.tmp"))
    }

    /// Writes the bytes for `id`, creating the directory first if needed.
    /// An existing file for the same id is overwritten.
    pub async fn save(&self, id: &RecordId, bytes: &[u8]) -> Result<PathBuf> {
        self.write_file(self.path_for(id), bytes).await
    }

    /// Writes a replacement image beside the current one without touching it.
    pub async fn save_pending(&self, id: &RecordId, bytes: &[u8]) -> Result<PathBuf> {
        self.write_file(self.pending_path_for(id), bytes).await
    }

    /// Moves the pending image for `id` over `<id>.jpg`.
    pub async fn commit_pending(&self, id: &RecordId) -> Result<PathBuf> {
        let pending = self.pending_path_for(id);
        let path = self.path_for(id);
        tokio::fs::rename(&pending, &path).await.with_context(|| {
            format!(
                "failed to move image {} to {}",
                pending.display(),
                path.display()
            )
        })?;
        Ok(path)
    }

    async fn write_file(&self, path: PathBuf, bytes: &[u8]) -> Result<PathBuf> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .with_context(|| format!("failed to create image dir {}", self.dir.display()))?;
        tokio::fs::write(&path, bytes)
            .await
            .with_context(|| format!("failed to write image {}", path.display()))?;
        Ok(path)
    }

    /// Reads an image back; `None` when the file is missing or unreadable.
    pub async fn load(path: &Path) -> Option<Vec<u8>> {
        if path.as_os_str().is_empty() {
            return None;
        }
        tokio::fs::read(path).await.ok()
    }

    pub async fn remove(path: &Path) -> Result<()> {
        tokio::fs::remove_file(path)
            .await
            .with_context(|| format!("failed to remove image {}", path.display()))
    }
}
