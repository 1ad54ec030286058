use std::sync::Arc;

use crate::domain::{
    CommentId, GameId, RepoRetrieveError, RepoUpdateError, UserId,
    comment::{Comment, CommentRepository, validate_comment},
    game::GameRepository,
};

#[async_trait::async_trait]
pub trait CommentUseCase {
    async fn post_comment(
        &self,
        game_id: GameId,
        author_id: UserId,
        text: &str,
    ) -> Result<Comment, CommentError>;
    /// Deletes a comment and returns the game it belonged to.
    async fn delete_comment(
        &self,
        comment_id: CommentId,
        user_id: UserId,
    ) -> Result<GameId, CommentError>;
}

#[derive(Debug, PartialEq)]
pub enum CommentError {
    GameNotFound,
    CommentNotFound,
    NotAuthor(GameId),
    Invalid(String),
    Internal,
}

pub struct CommentUseCaseImpl<C: CommentRepository, G: GameRepository> {
    comment_repository: Arc<C>,
    game_repository: Arc<G>,
}

impl<C: CommentRepository, G: GameRepository> CommentUseCaseImpl<C, G> {
    pub fn new(comment_repository: Arc<C>, game_repository: Arc<G>) -> Self {
        Self {
            comment_repository,
            game_repository,
        }
    }
}

#[async_trait::async_trait]
impl<C: CommentRepository + Send + Sync + 'static, G: GameRepository + Send + Sync + 'static>
    CommentUseCase for CommentUseCaseImpl<C, G>
{
    async fn post_comment(
        &self,
        game_id: GameId,
        author_id: UserId,
        text: &str,
    ) -> Result<Comment, CommentError> {
        match self.game_repository.get_game(game_id).await {
            Ok(_) => {}
            Err(RepoRetrieveError::NotFound) => return Err(CommentError::GameNotFound),
            Err(RepoRetrieveError::StorageError(e)) => {
                log::error!("Failed to load game {}: {}", game_id, e);
                return Err(CommentError::Internal);
            }
        }
        let text = validate_comment(text).map_err(CommentError::Invalid)?;

        self.comment_repository
            .create_comment(game_id, author_id, text)
            .await
            .map_err(|e| {
                log::error!("Failed to store comment on game {}: {}", game_id, e);
                CommentError::Internal
            })
    }

    async fn delete_comment(
        &self,
        comment_id: CommentId,
        user_id: UserId,
    ) -> Result<GameId, CommentError> {
        let comment = match self.comment_repository.get_comment(comment_id).await {
            Ok(comment) => comment,
            Err(RepoRetrieveError::NotFound) => return Err(CommentError::CommentNotFound),
            Err(RepoRetrieveError::StorageError(e)) => {
                log::error!("Failed to load comment {}: {}", comment_id, e);
                return Err(CommentError::Internal);
            }
        };
        if comment.author_id != user_id {
            log::warn!(
                "User {} tried to delete comment {} of user {}",
                user_id,
                comment_id,
                comment.author_id
            );
            return Err(CommentError::NotAuthor(comment.game_id));
        }

        match self.comment_repository.delete_comment(comment_id).await {
            Ok(()) => Ok(comment.game_id),
            Err(RepoUpdateError::NotFound) => Err(CommentError::CommentNotFound),
            Err(e) => {
                log::error!("Failed to delete comment {}: {}", comment_id, e);
                Err(CommentError::Internal)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        domain::game::GameDraft,
        testing::{InMemoryCommentRepository, InMemoryGameRepository, InMemoryUserRepository},
    };

    async fn setup() -> (
        GameId,
        UserId,
        UserId,
        CommentUseCaseImpl<InMemoryCommentRepository, InMemoryGameRepository>,
    ) {
        let users = Arc::new(InMemoryUserRepository::default());
        let alice = users.add_user("alice", "correct horse", None).await;
        let bob = users.add_user("bob", "correct horse", None).await;
        let games = Arc::new(InMemoryGameRepository::default());
        let game = games
            .create_game(GameDraft::new("Space Frogs", None, None), alice.id)
            .await
            .unwrap();
        let comments = Arc::new(InMemoryCommentRepository::new(users));
        (game.id, alice.id, bob.id, CommentUseCaseImpl::new(comments, games))
    }

    #[tokio::test]
    async fn test_post_comment() {
        let (game_id, _, bob, use_case) = setup().await;
        let comment = use_case
            .post_comment(game_id, bob, "  great game ")
            .await
            .unwrap();
        assert_eq!(comment.text, "great game");
        assert_eq!(comment.author_id, bob);

        assert!(matches!(
            use_case.post_comment(game_id, bob, "   ").await,
            Err(CommentError::Invalid(_))
        ));
        assert_eq!(
            use_case
                .post_comment(GameId(99), bob, "hello")
                .await
                .unwrap_err(),
            CommentError::GameNotFound
        );
    }

    #[tokio::test]
    async fn test_only_author_can_delete() {
        let (game_id, alice, bob, use_case) = setup().await;
        let comment = use_case
            .post_comment(game_id, bob, "great game")
            .await
            .unwrap();

        // Owning the game is not enough.
        assert_eq!(
            use_case.delete_comment(comment.id, alice).await.unwrap_err(),
            CommentError::NotAuthor(game_id)
        );
        assert_eq!(use_case.delete_comment(comment.id, bob).await.unwrap(), game_id);
        assert_eq!(
            use_case.delete_comment(comment.id, bob).await.unwrap_err(),
            CommentError::CommentNotFound
        );
    }
}
