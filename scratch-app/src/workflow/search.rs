use std::sync::Arc;

use crate::{
    domain::{
        GameId, PaginatedResponse, Pagination,
        game::{Game, GameRepository},
    },
    ports::{search::SearchIndexPort, storage::ObjectStoragePort},
    workflow::game::list::GameCard,
};

pub const SEARCH_RESULTS_PER_PAGE: u64 = 20;

#[async_trait::async_trait]
pub trait SearchUseCase {
    async fn search(
        &self,
        query: &str,
        pagination: Pagination,
    ) -> Result<PaginatedResponse<GameCard>, SearchUseCaseError>;
}

#[derive(Debug, PartialEq)]
pub enum SearchUseCaseError {
    Unavailable,
    Internal,
}

pub struct SearchUseCaseImpl<X: SearchIndexPort, G: GameRepository, S: ObjectStoragePort> {
    search: Arc<X>,
    game_repository: Arc<G>,
    storage: Arc<S>,
}

impl<X: SearchIndexPort, G: GameRepository, S: ObjectStoragePort> SearchUseCaseImpl<X, G, S> {
    pub fn new(search: Arc<X>, game_repository: Arc<G>, storage: Arc<S>) -> Self {
        Self {
            search,
            game_repository,
            storage,
        }
    }
}

/// Orders `games` like `ids`, dropping ids without a game.
fn in_hit_order(ids: &[GameId], mut games: Vec<Game>) -> Vec<Game> {
    let mut ordered = Vec::with_capacity(games.len());
    for id in ids {
        if let Some(index) = games.iter().position(|g| g.id == *id) {
            ordered.push(games.swap_remove(index));
        }
    }
    ordered
}

#[async_trait::async_trait]
impl<
    X: SearchIndexPort + Send + Sync + 'static,
    G: GameRepository + Send + Sync + 'static,
    S: ObjectStoragePort + Send + Sync + 'static,
> SearchUseCase for SearchUseCaseImpl<X, G, S>
{
    async fn search(
        &self,
        query: &str,
        pagination: Pagination,
    ) -> Result<PaginatedResponse<GameCard>, SearchUseCaseError> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(PaginatedResponse::empty(pagination));
        }

        let hits = self
            .search
            .query_games(query, pagination.page, pagination.per_page)
            .await
            .map_err(|e| {
                log::warn!("Search for {:?} failed: {}", query, e);
                SearchUseCaseError::Unavailable
            })?;
        let games = self
            .game_repository
            .get_games_by_ids(&hits.ids)
            .await
            .map_err(|e| {
                log::error!("Failed to load search results: {}", e);
                SearchUseCaseError::Internal
            })?;

        let items = in_hit_order(&hits.ids, games)
            .into_iter()
            .map(|game| GameCard {
                cover_url: game
                    .cover_filepath
                    .as_deref()
                    .map(|path| self.storage.public_url(path)),
                game,
            })
            .collect();
        Ok(PaginatedResponse {
            items,
            total: hits.total,
            page: pagination.page,
            per_page: pagination.per_page,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        domain::{UserId, game::GameDraft},
        ports::search::SearchDocument,
        testing::{InMemoryGameRepository, InMemoryObjectStorage, InMemorySearchIndex},
    };

    async fn setup() -> (
        Arc<InMemorySearchIndex>,
        Vec<Game>,
        SearchUseCaseImpl<InMemorySearchIndex, InMemoryGameRepository, InMemoryObjectStorage>,
    ) {
        let games = Arc::new(InMemoryGameRepository::default());
        let search = Arc::new(InMemorySearchIndex::default());
        let mut created = Vec::new();
        for title in ["Frog Racer", "Space Toads", "Frog Lander"] {
            let game = games
                .create_game(GameDraft::new(title, None, None), UserId(1))
                .await
                .unwrap();
            created.push(game);
        }
        // Index in reverse so hit order differs from id order.
        for game in created.iter().rev() {
            search
                .index_game(SearchDocument::from_game(game, &[]))
                .await
                .unwrap();
        }
        let use_case = SearchUseCaseImpl::new(
            search.clone(),
            games,
            Arc::new(InMemoryObjectStorage::default()),
        );
        (search, created, use_case)
    }

    #[tokio::test]
    async fn test_results_keep_index_order() {
        let (_, created, use_case) = setup().await;
        let results = use_case.search("frog", Pagination::new(1, 10)).await.unwrap();
        assert_eq!(results.total, 2);
        assert_eq!(
            results.items.iter().map(|c| c.game.id).collect::<Vec<_>>(),
            vec![created[2].id, created[0].id]
        );
    }

    #[tokio::test]
    async fn test_empty_query_returns_nothing() {
        let (_, _, use_case) = setup().await;
        let results = use_case.search("   ", Pagination::new(1, 10)).await.unwrap();
        assert_eq!(results.total, 0);
        assert!(results.items.is_empty());
    }

    #[tokio::test]
    async fn test_backend_failure_is_unavailable() {
        let (search, _, use_case) = setup().await;
        search.fail_queries();
        assert_eq!(
            use_case
                .search("frog", Pagination::new(1, 10))
                .await
                .unwrap_err(),
            SearchUseCaseError::Unavailable
        );
    }
}
