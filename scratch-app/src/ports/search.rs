use crate::domain::{GameId, game::Game};

#[derive(Clone, Debug, PartialEq)]
pub struct SearchDocument {
    pub id: GameId,
    pub title: String,
    pub tagline: Option<String>,
    pub description: Option<String>,
    pub tags: Vec<String>,
}

impl SearchDocument {
    pub fn from_game(game: &Game, tags: &[String]) -> Self {
        Self {
            id: game.id,
            title: game.title.clone(),
            tagline: game.tagline.clone(),
            description: game.description.clone(),
            tags: tags.to_vec(),
        }
    }
}

/// Ids in relevance order, plus the total number of matches.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SearchHits {
    pub ids: Vec<GameId>,
    pub total: u64,
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum SearchError {
    #[error("Search backend error: {0}")]
    Backend(String),
}

#[async_trait::async_trait]
pub trait SearchIndexPort {
    async fn index_game(&self, document: SearchDocument) -> Result<(), SearchError>;
    async fn remove_game(&self, game_id: GameId) -> Result<(), SearchError>;
    async fn query_games(
        &self,
        query: &str,
        page: u64,
        per_page: u64,
    ) -> Result<SearchHits, SearchError>;
}
