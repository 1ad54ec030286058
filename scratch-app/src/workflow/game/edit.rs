use std::sync::Arc;

use crate::{
    domain::{
        GameId, RepoRetrieveError, RepoUpdateError, ScreenshotId, UploadId, UserId,
        game::{Game, GameRepository},
        media::{MediaRepository, Screenshot, Upload, cover_path},
        tag::{TagRepository, parse_tags},
    },
    ports::{search::SearchIndexPort, storage::ObjectStoragePort},
    workflow::game::{GameInput, delete_blob, reindex, store_screenshots, store_uploads},
};

#[derive(Clone, Debug, Default)]
pub struct GameEdit {
    pub input: GameInput,
    pub remove_uploads: Vec<UploadId>,
    pub remove_screenshots: Vec<ScreenshotId>,
}

/// Current state of a game, for pre-filling the edit form.
#[derive(Clone, Debug)]
pub struct GameForEdit {
    pub game: Game,
    pub tags: Vec<String>,
    pub uploads: Vec<Upload>,
    pub screenshots: Vec<Screenshot>,
}

#[async_trait::async_trait]
pub trait EditGameUseCase {
    async fn get_for_edit(
        &self,
        game_id: GameId,
        user_id: UserId,
    ) -> Result<GameForEdit, EditGameError>;
    async fn edit_game(
        &self,
        game_id: GameId,
        user_id: UserId,
        edit: GameEdit,
    ) -> Result<Game, EditGameError>;
}

#[derive(Debug, PartialEq)]
pub enum EditGameError {
    NotFound,
    NotOwner,
    Invalid(String),
    Internal,
}

pub struct EditGameUseCaseImpl<
    G: GameRepository,
    M: MediaRepository,
    T: TagRepository,
    S: ObjectStoragePort,
    X: SearchIndexPort,
> {
    game_repository: Arc<G>,
    media_repository: Arc<M>,
    tag_repository: Arc<T>,
    storage: Arc<S>,
    search: Arc<X>,
}

impl<G: GameRepository, M: MediaRepository, T: TagRepository, S: ObjectStoragePort, X: SearchIndexPort>
    EditGameUseCaseImpl<G, M, T, S, X>
{
    pub fn new(
        game_repository: Arc<G>,
        media_repository: Arc<M>,
        tag_repository: Arc<T>,
        storage: Arc<S>,
        search: Arc<X>,
    ) -> Self {
        Self {
            game_repository,
            media_repository,
            tag_repository,
            storage,
            search,
        }
    }
}

impl<
    G: GameRepository + Send + Sync + 'static,
    M: MediaRepository + Send + Sync + 'static,
    T: TagRepository + Send + Sync + 'static,
    S: ObjectStoragePort + Send + Sync + 'static,
    X: SearchIndexPort + Send + Sync + 'static,
> EditGameUseCaseImpl<G, M, T, S, X>
{
    async fn owned_game(&self, game_id: GameId, user_id: UserId) -> Result<Game, EditGameError> {
        let game = match self.game_repository.get_game(game_id).await {
            Ok(game) => game,
            Err(RepoRetrieveError::NotFound) => return Err(EditGameError::NotFound),
            Err(RepoRetrieveError::StorageError(e)) => {
                log::error!("Failed to load game {}: {}", game_id, e);
                return Err(EditGameError::Internal);
            }
        };
        if !game.is_owned_by(user_id) {
            log::warn!("User {} tried to edit game {} of another user", user_id, game_id);
            return Err(EditGameError::NotOwner);
        }
        Ok(game)
    }

    async fn remove_media(&self, game_id: GameId, edit: &GameEdit) -> Result<(), EditGameError> {
        for upload_id in &edit.remove_uploads {
            match self
                .media_repository
                .delete_upload(game_id, *upload_id)
                .await
            {
                Ok(upload) => delete_blob(&self.storage, &upload.filepath).await,
                Err(RepoUpdateError::NotFound) => {
                    log::warn!("Upload {:?} is not part of game {}", upload_id, game_id);
                }
                Err(e) => {
                    log::error!("Failed to delete upload of game {}: {}", game_id, e);
                    return Err(EditGameError::Internal);
                }
            }
        }
        for screenshot_id in &edit.remove_screenshots {
            match self
                .media_repository
                .delete_screenshot(game_id, *screenshot_id)
                .await
            {
                Ok(screenshot) => delete_blob(&self.storage, &screenshot.filepath).await,
                Err(RepoUpdateError::NotFound) => {
                    log::warn!(
                        "Screenshot {:?} is not part of game {}",
                        screenshot_id,
                        game_id
                    );
                }
                Err(e) => {
                    log::error!("Failed to delete screenshot of game {}: {}", game_id, e);
                    return Err(EditGameError::Internal);
                }
            }
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl<
    G: GameRepository + Send + Sync + 'static,
    M: MediaRepository + Send + Sync + 'static,
    T: TagRepository + Send + Sync + 'static,
    S: ObjectStoragePort + Send + Sync + 'static,
    X: SearchIndexPort + Send + Sync + 'static,
> EditGameUseCase for EditGameUseCaseImpl<G, M, T, S, X>
{
    async fn get_for_edit(
        &self,
        game_id: GameId,
        user_id: UserId,
    ) -> Result<GameForEdit, EditGameError> {
        let game = self.owned_game(game_id, user_id).await?;
        let tags = self.tag_repository.get_game_tags(game_id).await;
        let uploads = self.media_repository.list_uploads(game_id).await;
        let screenshots = self.media_repository.list_screenshots(game_id).await;
        match (tags, uploads, screenshots) {
            (Ok(tags), Ok(uploads), Ok(screenshots)) => Ok(GameForEdit {
                game,
                tags,
                uploads,
                screenshots,
            }),
            (Err(e), _, _) | (_, Err(e), _) | (_, _, Err(e)) => {
                log::error!("Failed to load game {} for editing: {}", game_id, e);
                Err(EditGameError::Internal)
            }
        }
    }

    async fn edit_game(
        &self,
        game_id: GameId,
        user_id: UserId,
        edit: GameEdit,
    ) -> Result<Game, EditGameError> {
        let previous = self.owned_game(game_id, user_id).await?;
        let draft = edit.input.validate().map_err(EditGameError::Invalid)?;
        let tags = parse_tags(&edit.input.tags);

        let mut game = match self.game_repository.update_game(game_id, draft).await {
            Ok(game) => game,
            Err(RepoUpdateError::NotFound) => return Err(EditGameError::NotFound),
            Err(e) => {
                log::error!("Failed to update game {}: {}", game_id, e);
                return Err(EditGameError::Internal);
            }
        };
        self.tag_repository
            .set_game_tags(game_id, &tags)
            .await
            .map_err(|e| {
                log::error!("Failed to tag game {}: {}", game_id, e);
                EditGameError::Internal
            })?;

        self.remove_media(game_id, &edit).await?;

        let GameEdit { input, .. } = edit;
        if let Some(cover) = input.cover {
            let path = cover_path(game_id, &cover.file_name);
            if let Err(e) = self
                .storage
                .upload(&path, cover.data, &cover.content_type)
                .await
            {
                log::error!("Failed to store cover of game {}: {}", game_id, e);
                return Err(EditGameError::Internal);
            }
            if let Err(e) = self
                .game_repository
                .set_cover(game_id, Some(path.clone()))
                .await
            {
                log::error!("Failed to set cover of game {}: {}", game_id, e);
                return Err(EditGameError::Internal);
            }
            if let Some(old) = &previous.cover_filepath {
                delete_blob(&self.storage, old).await;
            }
            game.cover_filepath = Some(path);
        }

        store_uploads(
            &self.storage,
            &self.media_repository,
            game_id,
            input.uploads,
            &input.uploads_metadata,
        )
        .await
        .map_err(|e| {
            log::error!("Failed to store uploads of game {}: {}", game_id, e);
            EditGameError::Internal
        })?;
        store_screenshots(&self.storage, &self.media_repository, game_id, input.screenshots)
            .await
            .map_err(|e| {
                log::error!("Failed to store screenshots of game {}: {}", game_id, e);
                EditGameError::Internal
            })?;

        reindex(&self.search, &game, &tags).await;
        log::info!("User {} edited game {}", user_id, game_id);
        Ok(game)
    }
}
