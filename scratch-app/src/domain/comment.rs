use chrono::{DateTime, Utc};

use crate::domain::{CommentId, GameId, RepoError, RepoRetrieveError, RepoUpdateError, UserId};

pub const MAX_COMMENT_LEN: usize = 1000;

#[derive(Clone, Debug)]
pub struct Comment {
    pub id: CommentId,
    pub text: String,
    pub created_at: DateTime<Utc>,
    pub game_id: GameId,
    pub author_id: UserId,
}

#[derive(Clone, Debug)]
pub struct CommentWithAuthor {
    pub comment: Comment,
    pub author_username: String,
}

pub fn validate_comment(text: &str) -> Result<String, String> {
    let text = text.trim();
    if text.is_empty() {
        return Err("Comment cannot be empty".to_string());
    }
    if text.chars().count() > MAX_COMMENT_LEN {
        return Err(format!(
            "Comment must be at most {} characters",
            MAX_COMMENT_LEN
        ));
    }
    Ok(text.to_string())
}

#[async_trait::async_trait]
pub trait CommentRepository {
    async fn create_comment(
        &self,
        game_id: GameId,
        author_id: UserId,
        text: String,
    ) -> Result<Comment, RepoError>;
    async fn get_comment(&self, comment_id: CommentId) -> Result<Comment, RepoRetrieveError>;
    async fn delete_comment(&self, comment_id: CommentId) -> Result<(), RepoUpdateError>;
    /// Newest first.
    async fn list_comments_for_game(
        &self,
        game_id: GameId,
    ) -> Result<Vec<CommentWithAuthor>, RepoError>;
    async fn list_comments_by_author(&self, author_id: UserId) -> Result<Vec<Comment>, RepoError>;
}
