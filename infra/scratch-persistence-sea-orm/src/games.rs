use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Select, Set, TransactionTrait,
};
use scratch_app::domain::{
    GameId, PaginatedResponse, Pagination, RepoCreateError, RepoError, RepoRetrieveError,
    RepoUpdateError, UserId,
    game::{Game, GameDraft, GameRepository},
};

use crate::{
    create_error,
    entity::{comment, game, game_tag, screenshot, tag, upload},
    repo_error, retrieve_error, update_error,
};

pub struct GameRepositoryImpl {
    db: DatabaseConnection,
}

impl GameRepositoryImpl {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    fn model_to_game(model: game::Model) -> Game {
        Game {
            id: GameId(model.id),
            title: model.title,
            slug: model.slug,
            tagline: model.tagline,
            description: model.description,
            cover_filepath: model.cover_filepath,
            created_at: model.created_at,
            updated_at: model.updated_at,
            creator_id: UserId(model.user_id),
        }
    }

    async fn find_model(&self, game_id: GameId) -> Result<game::Model, RepoUpdateError> {
        game::Entity::find_by_id(game_id.0)
            .one(&self.db)
            .await
            .map_err(update_error)?
            .ok_or(RepoUpdateError::NotFound)
    }

    /// Newest first.
    async fn fetch_page(
        &self,
        query: Select<game::Entity>,
        pagination: Pagination,
    ) -> Result<PaginatedResponse<Game>, DbErr> {
        let total = query.clone().count(&self.db).await?;
        let models = query
            .order_by_desc(game::Column::CreatedAt)
            .order_by_desc(game::Column::Id)
            .offset(pagination.offset())
            .limit(pagination.per_page)
            .all(&self.db)
            .await?;
        Ok(PaginatedResponse {
            items: models.into_iter().map(Self::model_to_game).collect(),
            total,
            page: pagination.page,
            per_page: pagination.per_page,
        })
    }
}

#[async_trait::async_trait]
impl GameRepository for GameRepositoryImpl {
    async fn create_game(
        &self,
        draft: GameDraft,
        creator_id: UserId,
    ) -> Result<Game, RepoCreateError> {
        let now = Utc::now();
        let title = draft.title().to_string();
        let slug = draft.slug().to_string();
        let new_game = game::ActiveModel {
            title: Set(title),
            slug: Set(slug),
            tagline: Set(draft.tagline),
            description: Set(draft.description),
            cover_filepath: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
            user_id: Set(creator_id.0),
            ..Default::default()
        };
        let model = new_game.insert(&self.db).await.map_err(create_error)?;
        Ok(Self::model_to_game(model))
    }

    async fn get_game(&self, game_id: GameId) -> Result<Game, RepoRetrieveError> {
        game::Entity::find_by_id(game_id.0)
            .one(&self.db)
            .await
            .map_err(retrieve_error)?
            .map(Self::model_to_game)
            .ok_or(RepoRetrieveError::NotFound)
    }

    async fn update_game(
        &self,
        game_id: GameId,
        draft: GameDraft,
    ) -> Result<Game, RepoUpdateError> {
        let title = draft.title().to_string();
        let slug = draft.slug().to_string();
        let mut model: game::ActiveModel = self.find_model(game_id).await?.into();
        model.title = Set(title);
        model.slug = Set(slug);
        model.tagline = Set(draft.tagline);
        model.description = Set(draft.description);
        model.updated_at = Set(Utc::now());
        let model = model.update(&self.db).await.map_err(update_error)?;
        Ok(Self::model_to_game(model))
    }

    async fn set_cover(
        &self,
        game_id: GameId,
        cover_filepath: Option<String>,
    ) -> Result<(), RepoUpdateError> {
        let mut model: game::ActiveModel = self.find_model(game_id).await?.into();
        model.cover_filepath = Set(cover_filepath);
        model.update(&self.db).await.map_err(update_error)?;
        Ok(())
    }

    async fn delete_game(&self, game_id: GameId) -> Result<(), RepoUpdateError> {
        let txn = self.db.begin().await.map_err(update_error)?;
        game_tag::Entity::delete_many()
            .filter(game_tag::Column::GameId.eq(game_id.0))
            .exec(&txn)
            .await
            .map_err(update_error)?;
        comment::Entity::delete_many()
            .filter(comment::Column::GameId.eq(game_id.0))
            .exec(&txn)
            .await
            .map_err(update_error)?;
        upload::Entity::delete_many()
            .filter(upload::Column::GameId.eq(game_id.0))
            .exec(&txn)
            .await
            .map_err(update_error)?;
        screenshot::Entity::delete_many()
            .filter(screenshot::Column::GameId.eq(game_id.0))
            .exec(&txn)
            .await
            .map_err(update_error)?;
        let res = game::Entity::delete_by_id(game_id.0)
            .exec(&txn)
            .await
            .map_err(update_error)?;
        if res.rows_affected == 0 {
            return Err(RepoUpdateError::NotFound);
        }
        txn.commit().await.map_err(update_error)
    }

    async fn get_games_by_ids(&self, game_ids: &[GameId]) -> Result<Vec<Game>, RepoError> {
        if game_ids.is_empty() {
            return Ok(Vec::new());
        }
        let models = game::Entity::find()
            .filter(game::Column::Id.is_in(game_ids.iter().map(|id| id.0)))
            .all(&self.db)
            .await
            .map_err(repo_error)?;
        Ok(models.into_iter().map(Self::model_to_game).collect())
    }

    async fn list_games_by_creator(&self, creator_id: UserId) -> Result<Vec<Game>, RepoError> {
        let models = game::Entity::find()
            .filter(game::Column::UserId.eq(creator_id.0))
            .order_by_desc(game::Column::CreatedAt)
            .order_by_desc(game::Column::Id)
            .all(&self.db)
            .await
            .map_err(repo_error)?;
        Ok(models.into_iter().map(Self::model_to_game).collect())
    }

    async fn list_recent_games(
        &self,
        pagination: Pagination,
    ) -> Result<PaginatedResponse<Game>, RepoError> {
        self.fetch_page(game::Entity::find(), pagination)
            .await
            .map_err(repo_error)
    }

    async fn list_games_by_tag(
        &self,
        tag: &str,
        pagination: Pagination,
    ) -> Result<PaginatedResponse<Game>, RepoError> {
        let Some(tag) = tag::Entity::find()
            .filter(tag::Column::Name.eq(tag))
            .one(&self.db)
            .await
            .map_err(repo_error)?
        else {
            return Ok(PaginatedResponse::empty(pagination));
        };
        let game_ids: Vec<i32> = game_tag::Entity::find()
            .filter(game_tag::Column::TagId.eq(tag.id))
            .all(&self.db)
            .await
            .map_err(repo_error)?
            .into_iter()
            .map(|link| link.game_id)
            .collect();
        if game_ids.is_empty() {
            return Ok(PaginatedResponse::empty(pagination));
        }
        self.fetch_page(
            game::Entity::find().filter(game::Column::Id.is_in(game_ids)),
            pagination,
        )
        .await
        .map_err(repo_error)
    }
}

#[cfg(test)]
mod tests {
    use scratch_app::domain::{
        comment::CommentRepository,
        media::{MediaRepository, NewUpload},
        tag::TagRepository,
        user::{NewUser, UserRepository},
    };

    use super::*;
    use crate::{
        comments::CommentRepositoryImpl, media::MediaRepositoryImpl, tags::TagRepositoryImpl,
        test_db, users::UserRepositoryImpl,
    };

    async fn setup() -> (DatabaseConnection, GameRepositoryImpl, UserId) {
        let db = test_db().await;
        let user = UserRepositoryImpl::new(db.clone())
            .create_user(NewUser {
                username: "alice".to_string(),
                email: "alice@example.com".to_string(),
                password_hash: "hash".to_string(),
            })
            .await
            .unwrap();
        (db.clone(), GameRepositoryImpl::new(db), user.id)
    }

    #[tokio::test]
    async fn test_update_regenerates_slug() {
        let (_, repo, user_id) = setup().await;
        let game = repo
            .create_game(GameDraft::new("Space Frogs", None, None), user_id)
            .await
            .unwrap();
        assert_eq!(game.slug, "space-frogs");
        assert_eq!(game.creator_id, user_id);

        let updated = repo
            .update_game(
                game.id,
                GameDraft::new("Space Frogs 2", Some("Ribbit".to_string()), None),
            )
            .await
            .unwrap();
        assert_eq!(updated.slug, "space-frogs-2");
        assert_eq!(updated.tagline.as_deref(), Some("Ribbit"));
        assert!(matches!(
            repo.update_game(GameId(999), GameDraft::new("x", None, None))
                .await,
            Err(RepoUpdateError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_recent_games_are_paginated_newest_first() {
        let (_, repo, user_id) = setup().await;
        let mut ids = Vec::new();
        for title in ["One", "Two", "Three"] {
            let game = repo
                .create_game(GameDraft::new(title, None, None), user_id)
                .await
                .unwrap();
            ids.push(game.id);
        }

        let first = repo.list_recent_games(Pagination::new(1, 2)).await.unwrap();
        assert_eq!(first.total, 3);
        assert_eq!(
            first.items.iter().map(|g| g.id).collect::<Vec<_>>(),
            vec![ids[2], ids[1]]
        );
        let second = repo.list_recent_games(Pagination::new(2, 2)).await.unwrap();
        assert_eq!(second.items.len(), 1);
        assert_eq!(second.items[0].id, ids[0]);
    }

    #[tokio::test]
    async fn test_list_by_tag() {
        let (db, repo, user_id) = setup().await;
        let tags = TagRepositoryImpl::new(db);
        let tagged = repo
            .create_game(GameDraft::new("Tagged", None, None), user_id)
            .await
            .unwrap();
        repo.create_game(GameDraft::new("Untagged", None, None), user_id)
            .await
            .unwrap();
        tags.set_game_tags(tagged.id, &["puzzle".to_string()])
            .await
            .unwrap();

        let page = repo
            .list_games_by_tag("puzzle", Pagination::new(1, 10))
            .await
            .unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.items[0].id, tagged.id);
        let none = repo
            .list_games_by_tag("unknown", Pagination::new(1, 10))
            .await
            .unwrap();
        assert_eq!(none.total, 0);
    }

    #[tokio::test]
    async fn test_delete_removes_children() {
        let (db, repo, user_id) = setup().await;
        let media = MediaRepositoryImpl::new(db.clone());
        let tags = TagRepositoryImpl::new(db.clone());
        let comments = CommentRepositoryImpl::new(db);
        let game = repo
            .create_game(GameDraft::new("Doomed", None, None), user_id)
            .await
            .unwrap();
        media
            .add_upload(
                game.id,
                NewUpload {
                    filepath: "games/1/uploads/a.zip".to_string(),
                    size: "1.0 KB".to_string(),
                    is_web_build: false,
                },
            )
            .await
            .unwrap();
        media
            .add_screenshot(game.id, "games/1/screenshots/a.png".to_string(), 0)
            .await
            .unwrap();
        tags.set_game_tags(game.id, &["arcade".to_string()])
            .await
            .unwrap();
        comments
            .create_comment(game.id, user_id, "bye".to_string())
            .await
            .unwrap();

        repo.delete_game(game.id).await.unwrap();

        assert!(matches!(
            repo.get_game(game.id).await,
            Err(RepoRetrieveError::NotFound)
        ));
        assert!(media.list_uploads(game.id).await.unwrap().is_empty());
        assert!(media.list_screenshots(game.id).await.unwrap().is_empty());
        assert!(tags.get_game_tags(game.id).await.unwrap().is_empty());
        assert!(
            comments
                .list_comments_by_author(user_id)
                .await
                .unwrap()
                .is_empty()
        );
        assert!(matches!(
            repo.delete_game(game.id).await,
            Err(RepoUpdateError::NotFound)
        ));
    }
}
