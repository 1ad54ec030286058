use scratch_app::ports::storage::{ObjectStoragePort, StorageError};

pub mod firebase;
pub mod local;

pub use firebase::FirebaseObjectStorage;
pub use local::LocalObjectStorage;

pub enum StorageAdapter {
    Local(LocalObjectStorage),
    Firebase(FirebaseObjectStorage),
}

#[async_trait::async_trait]
impl ObjectStoragePort for StorageAdapter {
    async fn upload(
        &self,
        path: &str,
        data: Vec<u8>,
        content_type: &str,
    ) -> Result<(), StorageError> {
        match self {
            Self::Local(storage) => storage.upload(path, data, content_type).await,
            Self::Firebase(storage) => storage.upload(path, data, content_type).await,
        }
    }

    async fn delete(&self, path: &str) -> Result<(), StorageError> {
        match self {
            Self::Local(storage) => storage.delete(path).await,
            Self::Firebase(storage) => storage.delete(path).await,
        }
    }

    fn public_url(&self, path: &str) -> String {
        match self {
            Self::Local(storage) => storage.public_url(path),
            Self::Firebase(storage) => storage.public_url(path),
        }
    }
}
