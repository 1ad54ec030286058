use std::sync::Arc;

use crate::{
    domain::{
        GameId, RepoRetrieveError,
        comment::{CommentRepository, CommentWithAuthor},
        game::{Game, GameRepository},
        media::{MediaRepository, Screenshot, Upload},
        tag::TagRepository,
        user::UserRepository,
    },
    ports::storage::ObjectStoragePort,
};

#[derive(Clone, Debug)]
pub struct UploadView {
    pub upload: Upload,
    pub url: String,
}

#[derive(Clone, Debug)]
pub struct ScreenshotView {
    pub screenshot: Screenshot,
    pub url: String,
}

/// Everything shown on a game page.
#[derive(Clone, Debug)]
pub struct GameDetails {
    pub game: Game,
    pub creator_username: String,
    pub cover_url: Option<String>,
    pub description_html: String,
    pub uploads: Vec<UploadView>,
    pub web_build: Option<UploadView>,
    pub screenshots: Vec<ScreenshotView>,
    pub tags: Vec<String>,
    pub comments: Vec<CommentWithAuthor>,
}

#[async_trait::async_trait]
pub trait GetGameUseCase {
    async fn get_game(&self, game_id: GameId) -> Result<GameDetails, GetGameError>;
}

#[derive(Debug, PartialEq)]
pub enum GetGameError {
    NotFound,
    Internal,
}

pub struct GetGameUseCaseImpl<
    G: GameRepository,
    U: UserRepository,
    M: MediaRepository,
    T: TagRepository,
    C: CommentRepository,
    S: ObjectStoragePort,
> {
    game_repository: Arc<G>,
    user_repository: Arc<U>,
    media_repository: Arc<M>,
    tag_repository: Arc<T>,
    comment_repository: Arc<C>,
    storage: Arc<S>,
}

impl<
    G: GameRepository,
    U: UserRepository,
    M: MediaRepository,
    T: TagRepository,
    C: CommentRepository,
    S: ObjectStoragePort,
> GetGameUseCaseImpl<G, U, M, T, C, S>
{
    pub fn new(
        game_repository: Arc<G>,
        user_repository: Arc<U>,
        media_repository: Arc<M>,
        tag_repository: Arc<T>,
        comment_repository: Arc<C>,
        storage: Arc<S>,
    ) -> Self {
        Self {
            game_repository,
            user_repository,
            media_repository,
            tag_repository,
            comment_repository,
            storage,
        }
    }
}

fn internal(game_id: GameId, what: &str, e: impl std::fmt::Display) -> GetGameError {
    log::error!("Failed to load {} of game {}: {}", what, game_id, e);
    GetGameError::Internal
}

#[async_trait::async_trait]
impl<
    G: GameRepository + Send + Sync + 'static,
    U: UserRepository + Send + Sync + 'static,
    M: MediaRepository + Send + Sync + 'static,
    T: TagRepository + Send + Sync + 'static,
    C: CommentRepository + Send + Sync + 'static,
    S: ObjectStoragePort + Send + Sync + 'static,
> GetGameUseCase for GetGameUseCaseImpl<G, U, M, T, C, S>
{
    async fn get_game(&self, game_id: GameId) -> Result<GameDetails, GetGameError> {
        let game = match self.game_repository.get_game(game_id).await {
            Ok(game) => game,
            Err(RepoRetrieveError::NotFound) => return Err(GetGameError::NotFound),
            Err(RepoRetrieveError::StorageError(e)) => return Err(internal(game_id, "row", e)),
        };
        let creator = self
            .user_repository
            .get_user(game.creator_id)
            .await
            .map_err(|e| internal(game_id, "creator", e))?;
        let uploads = self
            .media_repository
            .list_uploads(game_id)
            .await
            .map_err(|e| internal(game_id, "uploads", e))?;
        let screenshots = self
            .media_repository
            .list_screenshots(game_id)
            .await
            .map_err(|e| internal(game_id, "screenshots", e))?;
        let tags = self
            .tag_repository
            .get_game_tags(game_id)
            .await
            .map_err(|e| internal(game_id, "tags", e))?;
        let comments = self
            .comment_repository
            .list_comments_for_game(game_id)
            .await
            .map_err(|e| internal(game_id, "comments", e))?;

        let uploads: Vec<UploadView> = uploads
            .into_iter()
            .map(|upload| UploadView {
                url: self.storage.public_url(&upload.filepath),
                upload,
            })
            .collect();
        let web_build = uploads.iter().find(|u| u.upload.is_web_build).cloned();
        let screenshots = screenshots
            .into_iter()
            .map(|screenshot| ScreenshotView {
                url: self.storage.public_url(&screenshot.filepath),
                screenshot,
            })
            .collect();

        Ok(GameDetails {
            cover_url: game
                .cover_filepath
                .as_deref()
                .map(|path| self.storage.public_url(path)),
            description_html: game.description_html(),
            creator_username: creator.username,
            game,
            uploads,
            web_build,
            screenshots,
            tags,
            comments,
        })
    }
}
