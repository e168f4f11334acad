use crate::error::AppResult;
use std::path::{Path, PathBuf};

const CREDENTIALS_DIR: &str = "credenciales";

/// Files under `DATA_DIR`, served publicly at `/storage`.
#[derive(Debug, Clone)]
pub struct FileStorage {
    root: PathBuf,
}

impl FileStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Writes a credential artifact and returns its public URL.
    pub async fn save_artifact(&self, bytes: &[u8], filename: &str) -> AppResult<String> {
        let dir = self.root.join(CREDENTIALS_DIR);
        tokio::fs::create_dir_all(&dir).await?;
        tokio::fs::write(dir.join(filename), bytes).await?;
        Ok(format!("/storage/{CREDENTIALS_DIR}/{filename}"))
    }

    /// Best effort; a leftover file is harmless.
    pub async fn discard_artifact(&self, filename: &str) {
        let path = self.root.join(CREDENTIALS_DIR).join(filename);
        if let Err(e) = tokio::fs::remove_file(&path).await {
            tracing::warn!(error = %e, path = %path.display(), "could not remove orphan artifact");
        }
    }

    /// Maps a stored photo reference (`/storage/..`, `/uploads/..` or a
    /// relative path) to a local file, if that file exists.
    pub async fn resolve_photo(&self, stored: &str) -> Option<PathBuf> {
        let rel = stored
            .trim_start_matches("/storage/")
            .trim_start_matches("/uploads/")
            .trim_start_matches('/');
        if rel.is_empty() || rel.split('/').any(|part| part == "..") {
            return None;
        }
        let path = self.root.join(rel);
        match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => Some(path),
            _ => None,
        }
    }
}
