#[derive(Debug, Clone, thiserror::Error)]
pub enum StorageError {
    #[error("Storage backend rejected the request: {0}")]
    Backend(String),
    #[error("Storage I/O error: {0}")]
    Io(String),
}

#[async_trait::async_trait]
pub trait ObjectStoragePort {
    async fn upload(&self, path: &str, data: Vec<u8>, content_type: &str)
    -> Result<(), StorageError>;
    /// Deleting a missing object is not an error.
    async fn delete(&self, path: &str) -> Result<(), StorageError>;
    fn public_url(&self, path: &str) -> String;
}
