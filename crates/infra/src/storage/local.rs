//! Local-directory file storage for uploaded images.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{info, warn};
use uuid::Uuid;

use bookstore_books::{validate_file_name, FileStorage, FileStorageError};

/// Stores files flat under a single root directory.
#[derive(Debug, Clone)]
pub struct LocalFileStorage {
    root: PathBuf,
}

impl LocalFileStorage {
    /// Create the root directory if needed. With `remove_all`, every regular
    /// file already in it is deleted first.
    pub async fn init(root: impl Into<PathBuf>, remove_all: bool) -> Result<Self, FileStorageError> {
        let root = root.into();
        tokio::fs::create_dir_all(&root).await.map_err(io_error)?;

        if remove_all {
            let mut entries = tokio::fs::read_dir(&root).await.map_err(io_error)?;
            let mut removed = 0usize;
            while let Some(entry) = entries.next_entry().await.map_err(io_error)? {
                if entry.file_type().await.map_err(io_error)?.is_file() {
                    tokio::fs::remove_file(entry.path()).await.map_err(io_error)?;
                    removed += 1;
                }
            }
            info!(root = %root.display(), removed, "cleared upload directory");
        }

        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, name: &str) -> Result<PathBuf, FileStorageError> {
        validate_file_name(name)?;
        Ok(self.root.join(name))
    }
}

/// Extension of the client-supplied name, kept only if it is plain ASCII
/// alphanumeric.
fn safe_extension(original_name: &str) -> Option<String> {
    let ext = Path::new(original_name).extension()?.to_str()?;
    if ext.is_empty() || ext.len() > 16 || !ext.chars().all(|c| c.is_ascii_alphanumeric()) {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

fn io_error(err: std::io::Error) -> FileStorageError {
    FileStorageError::Io(err.to_string())
}

#[async_trait]
impl FileStorage for LocalFileStorage {
    async fn save(&self, original_name: &str, bytes: &[u8]) -> Result<String, FileStorageError> {
        let stem = Uuid::now_v7();
        let name = match safe_extension(original_name) {
            Some(ext) => format!("{stem}.{ext}"),
            None => stem.to_string(),
        };
        let path = self.path_for(&name)?;
        tokio::fs::write(&path, bytes).await.map_err(io_error)?;
        info!(file = %name, size = bytes.len(), "stored upload");
        Ok(name)
    }

    async fn load(&self, name: &str) -> Result<Option<Vec<u8>>, FileStorageError> {
        let path = self.path_for(name)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(io_error(e)),
        }
    }

    async fn delete(&self, name: &str) -> Result<bool, FileStorageError> {
        let path = self.path_for(name)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                warn!(file = %name, "delete requested for missing file");
                Ok(false)
            }
            Err(e) => Err(io_error(e)),
        }
    }
}
