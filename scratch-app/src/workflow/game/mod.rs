use std::sync::Arc;

use crate::{
    domain::{
        GameId, RepoError,
        game::{Game, GameDraft},
        media::{
            IncomingFile, MediaRepository, NewUpload, UploadMetadata, format_file_size,
            screenshot_path, upload_path,
        },
    },
    ports::{
        search::{SearchDocument, SearchIndexPort},
        storage::{ObjectStoragePort, StorageError},
    },
};

pub mod create;
pub mod delete;
pub mod edit;
pub mod get;
pub mod list;

/// Form content shared by game creation and editing.
#[derive(Clone, Debug, Default)]
pub struct GameInput {
    pub title: String,
    pub tagline: Option<String>,
    pub description: Option<String>,
    pub tags: String,
    pub uploads: Vec<IncomingFile>,
    /// Flags for `uploads`, matched by position. Missing entries use the defaults.
    pub uploads_metadata: Vec<UploadMetadata>,
    pub screenshots: Vec<IncomingFile>,
    pub cover: Option<IncomingFile>,
}

impl GameInput {
    pub(crate) fn draft(&self) -> GameDraft {
        GameDraft::new(&self.title, self.tagline.clone(), self.description.clone())
    }

    /// Validates the text fields and the image files.
    pub(crate) fn validate(&self) -> Result<GameDraft, String> {
        let draft = self.draft();
        draft.validate()?;
        if let Some(file) = self
            .screenshots
            .iter()
            .chain(self.cover.iter())
            .find(|file| !file.is_allowed_screenshot())
        {
            return Err(format!(
                "{} is not an image. Allowed formats are png, jpg and jpeg",
                file.file_name
            ));
        }
        if self.uploads_metadata.len() > self.uploads.len() {
            return Err("Upload metadata does not match the uploaded files".to_string());
        }
        Ok(draft)
    }
}

#[derive(Debug, thiserror::Error)]
pub(crate) enum MediaStoreError {
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Repository(#[from] RepoError),
}

pub(crate) async fn store_uploads<S, M>(
    storage: &Arc<S>,
    media_repository: &Arc<M>,
    game_id: GameId,
    uploads: Vec<IncomingFile>,
    metadata: &[UploadMetadata],
) -> Result<(), MediaStoreError>
where
    S: ObjectStoragePort + Send + Sync + 'static,
    M: MediaRepository + Send + Sync + 'static,
{
    for (index, file) in uploads.into_iter().enumerate() {
        let meta = metadata.get(index).cloned().unwrap_or_default();
        let path = upload_path(game_id, &file.file_name);
        let size = format_file_size(file.data.len() as u64);
        storage.upload(&path, file.data, &file.content_type).await?;
        media_repository
            .add_upload(
                game_id,
                NewUpload {
                    filepath: path,
                    size,
                    is_web_build: meta.is_web_build,
                },
            )
            .await?;
    }
    Ok(())
}

/// Stores screenshots after the ones the game already has.
pub(crate) async fn store_screenshots<S, M>(
    storage: &Arc<S>,
    media_repository: &Arc<M>,
    game_id: GameId,
    screenshots: Vec<IncomingFile>,
) -> Result<(), MediaStoreError>
where
    S: ObjectStoragePort + Send + Sync + 'static,
    M: MediaRepository + Send + Sync + 'static,
{
    if screenshots.is_empty() {
        return Ok(());
    }
    let mut order = media_repository
        .list_screenshots(game_id)
        .await?
        .iter()
        .map(|s| s.order + 1)
        .max()
        .unwrap_or(0);
    for file in screenshots {
        let path = screenshot_path(game_id, &file.file_name);
        storage.upload(&path, file.data, &file.content_type).await?;
        media_repository
            .add_screenshot(game_id, path, order)
            .await?;
        order += 1;
    }
    Ok(())
}

/// Removes a stored file. Failures are only logged.
pub(crate) async fn delete_blob<S: ObjectStoragePort + Send + Sync + 'static>(
    storage: &Arc<S>,
    path: &str,
) {
    if let Err(e) = storage.delete(path).await {
        log::warn!("Failed to delete stored file {}: {}", path, e);
    }
}

/// Indexing failures are logged, not returned.
pub(crate) async fn reindex<X: SearchIndexPort + Send + Sync + 'static>(
    search: &Arc<X>,
    game: &Game,
    tags: &[String],
) {
    if let Err(e) = search
        .index_game(SearchDocument::from_game(game, tags))
        .await
    {
        log::warn!("Failed to index game {}: {}", game.id, e);
    }
}
