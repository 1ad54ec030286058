use std::sync::Arc;

use crate::{
    domain::{
        GameId, RepoRetrieveError, UserId,
        game::GameRepository,
        media::MediaRepository,
    },
    ports::{search::SearchIndexPort, storage::ObjectStoragePort},
    workflow::game::delete_blob,
};

#[async_trait::async_trait]
pub trait DeleteGameUseCase {
    async fn delete_game(&self, game_id: GameId, user_id: UserId) -> Result<(), DeleteGameError>;
}

#[derive(Debug, PartialEq)]
pub enum DeleteGameError {
    NotFound,
    NotOwner,
    Internal,
}

pub struct DeleteGameUseCaseImpl<
    G: GameRepository,
    M: MediaRepository,
    S: ObjectStoragePort,
    X: SearchIndexPort,
> {
    game_repository: Arc<G>,
    media_repository: Arc<M>,
    storage: Arc<S>,
    search: Arc<X>,
}

impl<G: GameRepository, M: MediaRepository, S: ObjectStoragePort, X: SearchIndexPort>
    DeleteGameUseCaseImpl<G, M, S, X>
{
    pub fn new(
        game_repository: Arc<G>,
        media_repository: Arc<M>,
        storage: Arc<S>,
        search: Arc<X>,
    ) -> Self {
        Self {
            game_repository,
            media_repository,
            storage,
            search,
        }
    }
}

#[async_trait::async_trait]
impl<
    G: GameRepository + Send + Sync + 'static,
    M: MediaRepository + Send + Sync + 'static,
    S: ObjectStoragePort + Send + Sync + 'static,
    X: SearchIndexPort + Send + Sync + 'static,
> DeleteGameUseCase for DeleteGameUseCaseImpl<G, M, S, X>
{
    async fn delete_game(&self, game_id: GameId, user_id: UserId) -> Result<(), DeleteGameError> {
        let game = match self.game_repository.get_game(game_id).await {
            Ok(game) => game,
            Err(RepoRetrieveError::NotFound) => return Err(DeleteGameError::NotFound),
            Err(RepoRetrieveError::StorageError(e)) => {
                log::error!("Failed to load game {}: {}", game_id, e);
                return Err(DeleteGameError::Internal);
            }
        };
        if !game.is_owned_by(user_id) {
            log::warn!("User {} tried to delete game {} of another user", user_id, game_id);
            return Err(DeleteGameError::NotOwner);
        }

        let uploads = self.media_repository.list_uploads(game_id).await;
        let screenshots = self.media_repository.list_screenshots(game_id).await;
        let (uploads, screenshots) = match (uploads, screenshots) {
            (Ok(uploads), Ok(screenshots)) => (uploads, screenshots),
            (Err(e), _) | (_, Err(e)) => {
                log::error!("Failed to list media of game {}: {}", game_id, e);
                return Err(DeleteGameError::Internal);
            }
        };

        self.game_repository
            .delete_game(game_id)
            .await
            .map_err(|e| {
                log::error!("Failed to delete game {}: {}", game_id, e);
                DeleteGameError::Internal
            })?;

        let blobs = uploads
            .iter()
            .map(|u| u.filepath.as_str())
            .chain(screenshots.iter().map(|s| s.filepath.as_str()))
            .chain(game.cover_filepath.as_deref());
        for path in blobs {
            delete_blob(&self.storage, path).await;
        }
        if let Err(e) = self.search.remove_game(game_id).await {
            log::warn!("Failed to remove game {} from the index: {}", game_id, e);
        }

        log::info!("User {} deleted game {}", user_id, game_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        domain::{game::GameDraft, media::NewUpload},
        ports::search::SearchDocument,
        testing::{
            InMemoryGameRepository, InMemoryMediaRepository, InMemoryObjectStorage,
            InMemorySearchIndex,
        },
    };

    #[tokio::test]
    async fn test_owner_deletes_game_and_files() {
        let games = Arc::new(InMemoryGameRepository::default());
        let media = Arc::new(InMemoryMediaRepository::default());
        let storage = Arc::new(InMemoryObjectStorage::default());
        let search = Arc::new(InMemorySearchIndex::default());
        let game = games
            .create_game(GameDraft::new("Space Frogs", None, None), UserId(1))
            .await
            .unwrap();
        games
            .set_cover(game.id, Some("games/1/cover/c.png".to_string()))
            .await
            .unwrap();
        for path in ["games/1/cover/c.png", "games/1/uploads/u.zip", "games/1/screenshots/s.png"] {
            storage.upload(path, vec![0], "application/octet-stream").await.unwrap();
        }
        media
            .add_upload(
                game.id,
                NewUpload {
                    filepath: "games/1/uploads/u.zip".to_string(),
                    size: "1 B".to_string(),
                    is_web_build: false,
                },
            )
            .await
            .unwrap();
        media
            .add_screenshot(game.id, "games/1/screenshots/s.png".to_string(), 0)
            .await
            .unwrap();
        search
            .index_game(SearchDocument::from_game(&game, &[]))
            .await
            .unwrap();

        let use_case =
            DeleteGameUseCaseImpl::new(games.clone(), media.clone(), storage.clone(), search.clone());

        assert_eq!(
            use_case.delete_game(game.id, UserId(2)).await.unwrap_err(),
            DeleteGameError::NotOwner
        );
        assert!(games.get_game(game.id).await.is_ok());

        use_case.delete_game(game.id, UserId(1)).await.unwrap();
        assert!(matches!(
            games.get_game(game.id).await,
            Err(RepoRetrieveError::NotFound)
        ));
        assert!(storage.is_empty());
        assert!(search.is_empty());
        assert_eq!(
            use_case.delete_game(game.id, UserId(1)).await.unwrap_err(),
            DeleteGameError::NotFound
        );
    }
}
