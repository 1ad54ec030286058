use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait,
    QueryFilter, QueryOrder, Set, TransactionTrait,
};
use scratch_app::domain::{GameId, RepoError, tag::TagRepository};

use crate::{
    entity::{game_tag, tag},
    repo_error,
};

pub struct TagRepositoryImpl {
    db: DatabaseConnection,
}

impl TagRepositoryImpl {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    async fn find_or_create_tag<C: ConnectionTrait>(conn: &C, name: &str) -> Result<i32, DbErr> {
        if let Some(existing) = tag::Entity::find()
            .filter(tag::Column::Name.eq(name))
            .one(conn)
            .await?
        {
            return Ok(existing.id);
        }
        let model = tag::ActiveModel {
            name: Set(name.to_string()),
            ..Default::default()
        }
        .insert(conn)
        .await?;
        Ok(model.id)
    }
}

#[async_trait::async_trait]
impl TagRepository for TagRepositoryImpl {
    async fn set_game_tags(&self, game_id: GameId, tags: &[String]) -> Result<(), RepoError> {
        let txn = self.db.begin().await.map_err(repo_error)?;
        game_tag::Entity::delete_many()
            .filter(game_tag::Column::GameId.eq(game_id.0))
            .exec(&txn)
            .await
            .map_err(repo_error)?;
        for name in tags {
            let tag_id = Self::find_or_create_tag(&txn, name)
                .await
                .map_err(repo_error)?;
            game_tag::Entity::insert(game_tag::ActiveModel {
                game_id: Set(game_id.0),
                tag_id: Set(tag_id),
            })
            .exec(&txn)
            .await
            .map_err(repo_error)?;
        }
        txn.commit().await.map_err(repo_error)
    }

    async fn get_game_tags(&self, game_id: GameId) -> Result<Vec<String>, RepoError> {
        let rows = game_tag::Entity::find()
            .filter(game_tag::Column::GameId.eq(game_id.0))
            .find_also_related(tag::Entity)
            .order_by_asc(tag::Column::Name)
            .all(&self.db)
            .await
            .map_err(repo_error)?;
        Ok(rows
            .into_iter()
            .filter_map(|(_, tag)| tag.map(|t| t.name))
            .collect())
    }
}
