use meilisearch_sdk::{
    client::Client,
    search::Selectors,
    settings::Settings,
};
use scratch_app::{
    domain::GameId,
    ports::search::{SearchDocument, SearchError, SearchHits, SearchIndexPort},
};
use serde::{Deserialize, Serialize};

pub const GAME_INDEX: &str = "games";
pub const GAME_ID: &str = "id";
pub const SEARCHABLE_ATTRIBUTES: [&str; 4] = ["title", "tagline", "description", "tags"];

#[derive(Debug, Serialize, Deserialize, PartialEq)]
struct MeiliGame {
    id: i32,
    title: String,
    tagline: Option<String>,
    description: Option<String>,
    tags: Vec<String>,
}

impl From<SearchDocument> for MeiliGame {
    fn from(document: SearchDocument) -> Self {
        Self {
            id: document.id.0,
            title: document.title,
            tagline: document.tagline,
            description: document.description,
            tags: document.tags,
        }
    }
}

#[derive(Debug, Deserialize)]
struct MeiliGameHit {
    id: i32,
}

fn backend_error(e: meilisearch_sdk::errors::Error) -> SearchError {
    SearchError::Backend(e.to_string())
}

fn page_offset(page: u64, per_page: u64) -> usize {
    (page.max(1) - 1).saturating_mul(per_page) as usize
}

pub struct MeiliSearchAdapter {
    client: Client,
}

impl MeiliSearchAdapter {
    pub fn new(url: &str, api_key: Option<&str>) -> Result<Self, SearchError> {
        let client = Client::new(url, api_key).map_err(backend_error)?;
        Ok(Self { client })
    }

    /// Declares which fields are searched. Safe to call on every start.
    pub async fn configure(&self) -> Result<(), SearchError> {
        let settings = Settings::new().with_searchable_attributes(SEARCHABLE_ATTRIBUTES);
        self.client
            .index(GAME_INDEX)
            .set_settings(&settings)
            .await
            .map_err(backend_error)?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl SearchIndexPort for MeiliSearchAdapter {
    async fn index_game(&self, document: SearchDocument) -> Result<(), SearchError> {
        let game = MeiliGame::from(document);
        self.client
            .index(GAME_INDEX)
            .add_or_update(&[game], Some(GAME_ID))
            .await
            .map_err(backend_error)?;
        Ok(())
    }

    async fn remove_game(&self, game_id: GameId) -> Result<(), SearchError> {
        self.client
            .index(GAME_INDEX)
            .delete_document(game_id.0)
            .await
            .map_err(backend_error)?;
        Ok(())
    }

    async fn query_games(
        &self,
        query: &str,
        page: u64,
        per_page: u64,
    ) -> Result<SearchHits, SearchError> {
        let index = self.client.index(GAME_INDEX);
        let results = index
            .search()
            .with_query(query)
            .with_offset(page_offset(page, per_page))
            .with_limit(per_page as usize)
            .with_attributes_to_retrieve(Selectors::Some(&[GAME_ID][..]))
            .execute::<MeiliGameHit>()
            .await
            .map_err(backend_error)?;

        Ok(SearchHits {
            ids: results
                .hits
                .into_iter()
                .map(|hit| GameId(hit.result.id))
                .collect(),
            total: results.estimated_total_hits.unwrap_or(0) as u64,
        })
    }
}

/// Search is optional; without a configured index nothing is indexed and
/// queries find nothing.
pub enum SearchAdapter {
    Meili(MeiliSearchAdapter),
    Disabled,
}

#[async_trait::async_trait]
impl SearchIndexPort for SearchAdapter {
    async fn index_game(&self, document: SearchDocument) -> Result<(), SearchError> {
        match self {
            Self::Meili(adapter) => adapter.index_game(document).await,
            Self::Disabled => Ok(()),
        }
    }

    async fn remove_game(&self, game_id: GameId) -> Result<(), SearchError> {
        match self {
            Self::Meili(adapter) => adapter.remove_game(game_id).await,
            Self::Disabled => Ok(()),
        }
    }

    async fn query_games(
        &self,
        query: &str,
        page: u64,
        per_page: u64,
    ) -> Result<SearchHits, SearchError> {
        match self {
            Self::Meili(adapter) => adapter.query_games(query, page, per_page).await,
            Self::Disabled => Ok(SearchHits::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_keeps_all_searchable_fields() {
        let game = MeiliGame::from(SearchDocument {
            id: GameId(3),
            title: "Space Frogs".to_string(),
            tagline: Some("Ribbit".to_string()),
            description: None,
            tags: vec!["arcade".to_string()],
        });
        assert_eq!(game.id, 3);
        assert_eq!(game.tags, vec!["arcade"]);
    }

    #[test]
    fn test_page_offset() {
        assert_eq!(page_offset(1, 20), 0);
        assert_eq!(page_offset(3, 20), 40);
        assert_eq!(page_offset(0, 20), 0);
    }

    #[tokio::test]
    async fn test_disabled_search_finds_nothing() {
        let search = SearchAdapter::Disabled;
        search
            .index_game(SearchDocument {
                id: GameId(1),
                title: "Space Frogs".to_string(),
                tagline: None,
                description: None,
                tags: Vec::new(),
            })
            .await
            .unwrap();
        let hits = search.query_games("frogs", 1, 20).await.unwrap();
        assert_eq!(hits, SearchHits::default());
        search.remove_game(GameId(1)).await.unwrap();
    }
}
