use std::sync::Arc;

use crate::{
    domain::{
        RepoCreateError, UserId,
        game::{Game, GameRepository},
        media::{MediaRepository, cover_path},
        tag::{TagRepository, parse_tags},
    },
    ports::{search::SearchIndexPort, storage::ObjectStoragePort},
    workflow::game::{GameInput, reindex, store_screenshots, store_uploads},
};

#[async_trait::async_trait]
pub trait CreateGameUseCase {
    async fn create_game(&self, creator_id: UserId, input: GameInput)
    -> Result<Game, CreateGameError>;
}

#[derive(Debug, PartialEq)]
pub enum CreateGameError {
    Invalid(String),
    Internal,
}

pub struct CreateGameUseCaseImpl<
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
    CreateGameUseCaseImpl<G, M, T, S, X>
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

#[async_trait::async_trait]
impl<
    G: GameRepository + Send + Sync + 'static,
    M: MediaRepository + Send + Sync + 'static,
    T: TagRepository + Send + Sync + 'static,
    S: ObjectStoragePort + Send + Sync + 'static,
    X: SearchIndexPort + Send + Sync + 'static,
> CreateGameUseCase for CreateGameUseCaseImpl<G, M, T, S, X>
{
    async fn create_game(
        &self,
        creator_id: UserId,
        input: GameInput,
    ) -> Result<Game, CreateGameError> {
        let draft = input.validate().map_err(CreateGameError::Invalid)?;
        let tags = parse_tags(&input.tags);

        let mut game = match self.game_repository.create_game(draft, creator_id).await {
            Ok(game) => game,
            Err(RepoCreateError::Conflict) => {
                return Err(CreateGameError::Invalid(
                    "A game with this title already exists".to_string(),
                ));
            }
            Err(RepoCreateError::StorageError(e)) => {
                log::error!("Failed to create game for user {}: {}", creator_id, e);
                return Err(CreateGameError::Internal);
            }
        };

        self.tag_repository
            .set_game_tags(game.id, &tags)
            .await
            .map_err(|e| {
                log::error!("Failed to tag game {}: {}", game.id, e);
                CreateGameError::Internal
            })?;

        if let Some(cover) = input.cover {
            let path = cover_path(game.id, &cover.file_name);
            if let Err(e) = self
                .storage
                .upload(&path, cover.data, &cover.content_type)
                .await
            {
                log::error!("Failed to store cover of game {}: {}", game.id, e);
                return Err(CreateGameError::Internal);
            }
            if let Err(e) = self
                .game_repository
                .set_cover(game.id, Some(path.clone()))
                .await
            {
                log::error!("Failed to set cover of game {}: {}", game.id, e);
                return Err(CreateGameError::Internal);
            }
            game.cover_filepath = Some(path);
        }

        store_uploads(
            &self.storage,
            &self.media_repository,
            game.id,
            input.uploads,
            &input.uploads_metadata,
        )
        .await
        .map_err(|e| {
            log::error!("Failed to store uploads of game {}: {}", game.id, e);
            CreateGameError::Internal
        })?;
        store_screenshots(
            &self.storage,
            &self.media_repository,
            game.id,
            input.screenshots,
        )
        .await
        .map_err(|e| {
            log::error!("Failed to store screenshots of game {}: {}", game.id, e);
            CreateGameError::Internal
        })?;

        reindex(&self.search, &game, &tags).await;
        log::info!("User {} created game {} ({})", creator_id, game.id, game.slug);
        Ok(game)
    }
}
