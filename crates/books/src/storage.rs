use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FileStorageError {
    #[error("invalid file name '{0}'")]
    InvalidName(String),

    #[error("file storage io error: {0}")]
    Io(String),
}

/// Flat, name-addressed file storage for uploaded images.
#[async_trait]
pub trait FileStorage: Send + Sync {
    /// Persist `bytes` under a fresh name that keeps the extension of
    /// `original_name`. Returns the stored name.
    async fn save(&self, original_name: &str, bytes: &[u8]) -> Result<String, FileStorageError>;

    async fn load(&self, name: &str) -> Result<Option<Vec<u8>>, FileStorageError>;

    /// Returns `false` if there was nothing to delete.
    async fn delete(&self, name: &str) -> Result<bool, FileStorageError>;
}

/// Stored names are single path components: no separators, no `..`.
pub fn validate_file_name(name: &str) -> Result<(), FileStorageError> {
    let bad = name.is_empty()
        || name.contains('/')
        || name.contains('\\')
        || name.contains("..")
        || name.chars().any(char::is_control);
    if bad {
        return Err(FileStorageError::InvalidName(name.to_string()));
    }
    Ok(())
}
