use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
};
use scratch_app::domain::{
    CommentId, GameId, RepoError, RepoRetrieveError, RepoUpdateError, UserId,
    comment::{Comment, CommentRepository, CommentWithAuthor},
};

use crate::{
    entity::{comment, user},
    repo_error, retrieve_error, update_error,
};

pub struct CommentRepositoryImpl {
    db: DatabaseConnection,
}

impl CommentRepositoryImpl {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    fn model_to_comment(model: comment::Model) -> Comment {
        Comment {
            id: CommentId(model.id),
            text: model.text,
            created_at: model.created_at,
            game_id: GameId(model.game_id),
            author_id: UserId(model.user_id),
        }
    }
}

#[async_trait::async_trait]
impl CommentRepository for CommentRepositoryImpl {
    async fn create_comment(
        &self,
        game_id: GameId,
        author_id: UserId,
        text: String,
    ) -> Result<Comment, RepoError> {
        let model = comment::ActiveModel {
            text: Set(text),
            created_at: Set(Utc::now()),
            game_id: Set(game_id.0),
            user_id: Set(author_id.0),
            ..Default::default()
        }
        .insert(&self.db)
        .await
        .map_err(repo_error)?;
        Ok(Self::model_to_comment(model))
    }

    async fn get_comment(&self, comment_id: CommentId) -> Result<Comment, RepoRetrieveError> {
        comment::Entity::find_by_id(comment_id.0)
            .one(&self.db)
            .await
            .map_err(retrieve_error)?
            .map(Self::model_to_comment)
            .ok_or(RepoRetrieveError::NotFound)
    }

    async fn delete_comment(&self, comment_id: CommentId) -> Result<(), RepoUpdateError> {
        let res = comment::Entity::delete_by_id(comment_id.0)
            .exec(&self.db)
            .await
            .map_err(update_error)?;
        if res.rows_affected == 0 {
            return Err(RepoUpdateError::NotFound);
        }
        Ok(())
    }

    async fn list_comments_for_game(
        &self,
        game_id: GameId,
    ) -> Result<Vec<CommentWithAuthor>, RepoError> {
        let rows = comment::Entity::find()
            .filter(comment::Column::GameId.eq(game_id.0))
            .order_by_desc(comment::Column::CreatedAt)
            .order_by_desc(comment::Column::Id)
            .find_also_related(user::Entity)
            .all(&self.db)
            .await
            .map_err(repo_error)?;
        Ok(rows
            .into_iter()
            .map(|(comment, author)| CommentWithAuthor {
                author_username: author.map(|a| a.username).unwrap_or_default(),
                comment: Self::model_to_comment(comment),
            })
            .collect())
    }

    async fn list_comments_by_author(&self, author_id: UserId) -> Result<Vec<Comment>, RepoError> {
        let models = comment::Entity::find()
            .filter(comment::Column::UserId.eq(author_id.0))
            .order_by_desc(comment::Column::CreatedAt)
            .order_by_desc(comment::Column::Id)
            .all(&self.db)
            .await
            .map_err(repo_error)?;
        Ok(models.into_iter().map(Self::model_to_comment).collect())
    }
}
