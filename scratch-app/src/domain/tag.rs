use crate::domain::{GameId, RepoError};

pub const MAX_TAG_LEN: usize = 32;

/// Turns the comma separated tag field into normalized tag names.
pub fn parse_tags(input: &str) -> Vec<String> {
    let mut tags: Vec<String> = Vec::new();
    for raw in input.split(',') {
        let tag: String = raw.trim().to_lowercase().chars().take(MAX_TAG_LEN).collect();
        let tag = tag.trim_end().to_string();
        if !tag.is_empty() && !tags.contains(&tag) {
            tags.push(tag);
        }
    }
    tags
}

#[async_trait::async_trait]
pub trait TagRepository {
    /// Replaces the tags of a game, creating missing tags.
    async fn set_game_tags(&self, game_id: GameId, tags: &[String]) -> Result<(), RepoError>;
    async fn get_game_tags(&self, game_id: GameId) -> Result<Vec<String>, RepoError>;
}
