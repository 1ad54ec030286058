use std::sync::Arc;

use crate::{
    domain::{
        PaginatedResponse, Pagination,
        game::{Game, GameRepository},
        tag::MAX_TAG_LEN,
    },
    ports::storage::ObjectStoragePort,
};

pub const GAMES_PER_PAGE: u64 = 20;

/// A game in a listing, with its cover resolved to a URL.
#[derive(Clone, Debug)]
pub struct GameCard {
    pub game: Game,
    pub cover_url: Option<String>,
}

#[async_trait::async_trait]
pub trait ListGamesUseCase {
    async fn list_recent(
        &self,
        pagination: Pagination,
    ) -> Result<PaginatedResponse<GameCard>, ListGamesError>;
    async fn list_by_tag(
        &self,
        tag: &str,
        pagination: Pagination,
    ) -> Result<PaginatedResponse<GameCard>, ListGamesError>;
}

#[derive(Debug, PartialEq)]
pub enum ListGamesError {
    Internal,
}

pub struct ListGamesUseCaseImpl<G: GameRepository, S: ObjectStoragePort> {
    game_repository: Arc<G>,
    storage: Arc<S>,
}

impl<G: GameRepository, S: ObjectStoragePort> ListGamesUseCaseImpl<G, S> {
    pub fn new(game_repository: Arc<G>, storage: Arc<S>) -> Self {
        Self {
            game_repository,
            storage,
        }
    }

    pub(crate) fn card(&self, game: Game) -> GameCard {
        GameCard {
            cover_url: game
                .cover_filepath
                .as_deref()
                .map(|path| self.storage.public_url(path)),
            game,
        }
    }
}

#[async_trait::async_trait]
impl<G: GameRepository + Send + Sync + 'static, S: ObjectStoragePort + Send + Sync + 'static>
    ListGamesUseCase for ListGamesUseCaseImpl<G, S>
{
    async fn list_recent(
        &self,
        pagination: Pagination,
    ) -> Result<PaginatedResponse<GameCard>, ListGamesError> {
        self.game_repository
            .list_recent_games(pagination)
            .await
            .map(|page| page.map(|game| self.card(game)))
            .map_err(|e| {
                log::error!("Failed to list recent games: {}", e);
                ListGamesError::Internal
            })
    }

    async fn list_by_tag(
        &self,
        tag: &str,
        pagination: Pagination,
    ) -> Result<PaginatedResponse<GameCard>, ListGamesError> {
        let tag: String = tag.trim().to_lowercase().chars().take(MAX_TAG_LEN).collect();
        if tag.is_empty() {
            return Ok(PaginatedResponse::empty(pagination));
        }
        self.game_repository
            .list_games_by_tag(&tag, pagination)
            .await
            .map(|page| page.map(|game| self.card(game)))
            .map_err(|e| {
                log::error!("Failed to list games tagged {}: {}", tag, e);
                ListGamesError::Internal
            })
    }
}
