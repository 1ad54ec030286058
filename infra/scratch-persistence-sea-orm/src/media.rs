use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, ModelTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait, sea_query::Expr,
};
use scratch_app::domain::{
    GameId, RepoError, RepoUpdateError, ScreenshotId, UploadId,
    media::{MediaRepository, NewUpload, Screenshot, Upload},
};

use crate::{
    entity::{screenshot, upload},
    repo_error, update_error,
};

pub struct MediaRepositoryImpl {
    db: DatabaseConnection,
}

impl MediaRepositoryImpl {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    fn model_to_upload(model: upload::Model) -> Upload {
        Upload {
            id: UploadId(model.id),
            game_id: GameId(model.game_id),
            filepath: model.filepath,
            size: model.size,
            is_web_build: model.is_web_build,
        }
    }

    fn model_to_screenshot(model: screenshot::Model) -> Screenshot {
        Screenshot {
            id: ScreenshotId(model.id),
            game_id: GameId(model.game_id),
            filepath: model.filepath,
            order: model.order,
        }
    }
}

#[async_trait::async_trait]
impl MediaRepository for MediaRepositoryImpl {
    async fn add_upload(&self, game_id: GameId, new_upload: NewUpload) -> Result<Upload, RepoError> {
        let txn = self.db.begin().await.map_err(repo_error)?;
        if new_upload.is_web_build {
            upload::Entity::update_many()
                .col_expr(upload::Column::IsWebBuild, Expr::value(false))
                .filter(upload::Column::GameId.eq(game_id.0))
                .exec(&txn)
                .await
                .map_err(repo_error)?;
        }
        let model = upload::ActiveModel {
            filepath: Set(new_upload.filepath),
            size: Set(new_upload.size),
            is_web_build: Set(new_upload.is_web_build),
            game_id: Set(game_id.0),
            ..Default::default()
        }
        .insert(&txn)
        .await
        .map_err(repo_error)?;
        txn.commit().await.map_err(repo_error)?;
        Ok(Self::model_to_upload(model))
    }

    async fn list_uploads(&self, game_id: GameId) -> Result<Vec<Upload>, RepoError> {
        let models = upload::Entity::find()
            .filter(upload::Column::GameId.eq(game_id.0))
            .order_by_asc(upload::Column::Id)
            .all(&self.db)
            .await
            .map_err(repo_error)?;
        Ok(models.into_iter().map(Self::model_to_upload).collect())
    }

    async fn delete_upload(
        &self,
        game_id: GameId,
        upload_id: UploadId,
    ) -> Result<Upload, RepoUpdateError> {
        let model = upload::Entity::find_by_id(upload_id.0)
            .filter(upload::Column::GameId.eq(game_id.0))
            .one(&self.db)
            .await
            .map_err(update_error)?
            .ok_or(RepoUpdateError::NotFound)?;
        model.clone().delete(&self.db).await.map_err(update_error)?;
        Ok(Self::model_to_upload(model))
    }

    async fn add_screenshot(
        &self,
        game_id: GameId,
        filepath: String,
        order: i32,
    ) -> Result<Screenshot, RepoError> {
        let model = screenshot::ActiveModel {
            filepath: Set(filepath),
            order: Set(order),
            game_id: Set(game_id.0),
            ..Default::default()
        }
        .insert(&self.db)
        .await
        .map_err(repo_error)?;
        Ok(Self::model_to_screenshot(model))
    }

    async fn list_screenshots(&self, game_id: GameId) -> Result<Vec<Screenshot>, RepoError> {
        let models = screenshot::Entity::find()
            .filter(screenshot::Column::GameId.eq(game_id.0))
            .order_by_asc(screenshot::Column::Order)
            .order_by_asc(screenshot::Column::Id)
            .all(&self.db)
            .await
            .map_err(repo_error)?;
        Ok(models.into_iter().map(Self::model_to_screenshot).collect())
    }

    async fn delete_screenshot(
        &self,
        game_id: GameId,
        screenshot_id: ScreenshotId,
    ) -> Result<Screenshot, RepoUpdateError> {
        let model = screenshot::Entity::find_by_id(screenshot_id.0)
            .filter(screenshot::Column::GameId.eq(game_id.0))
            .one(&self.db)
            .await
            .map_err(update_error)?
            .ok_or(RepoUpdateError::NotFound)?;
        model.clone().delete(&self.db).await.map_err(update_error)?;
        Ok(Self::model_to_screenshot(model))
    }
}

#[cfg(test)]
mod tests {
    use scratch_app::domain::{
        game::{GameDraft, GameRepository},
        user::{NewUser, UserRepository},
    };

    use super::*;
    use crate::{games::GameRepositoryImpl, test_db, users::UserRepositoryImpl};

    async fn setup() -> (MediaRepositoryImpl, GameId, GameId) {
        let db = test_db().await;
        let user = UserRepositoryImpl::new(db.clone())
            .create_user(NewUser {
                username: "alice".to_string(),
                email: "alice@example.com".to_string(),
                password_hash: "hash".to_string(),
            })
            .await
            .unwrap();
        let games = GameRepositoryImpl::new(db.clone());
        let mut ids = Vec::new();
        for title in ["First", "Second"] {
            ids.push(
                games
                    .create_game(GameDraft::new(title, None, None), user.id)
                    .await
                    .unwrap()
                    .id,
            );
        }
        (MediaRepositoryImpl::new(db), ids[0], ids[1])
    }

    fn build(name: &str, is_web_build: bool) -> NewUpload {
        NewUpload {
            filepath: format!("games/uploads/{}", name),
            size: "1.0 KB".to_string(),
            is_web_build,
        }
    }

    #[tokio::test]
    async fn test_single_web_build_per_game() {
        let (repo, game, other) = setup().await;
        repo.add_upload(game, build("a.zip", true)).await.unwrap();
        repo.add_upload(other, build("c.zip", true)).await.unwrap();
        repo.add_upload(game, build("b.zip", true)).await.unwrap();

        let uploads = repo.list_uploads(game).await.unwrap();
        let web_builds: Vec<_> = uploads.iter().filter(|u| u.is_web_build).collect();
        assert_eq!(web_builds.len(), 1);
        assert!(web_builds[0].filepath.ends_with("b.zip"));
        assert!(repo.list_uploads(other).await.unwrap()[0].is_web_build);
    }

    #[tokio::test]
    async fn test_delete_is_scoped_to_game() {
        let (repo, game, other) = setup().await;
        let upload = repo.add_upload(game, build("a.zip", false)).await.unwrap();
        assert!(matches!(
            repo.delete_upload(other, upload.id).await,
            Err(RepoUpdateError::NotFound)
        ));
        let removed = repo.delete_upload(game, upload.id).await.unwrap();
        assert_eq!(removed, upload);
        assert!(repo.list_uploads(game).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_screenshots_listed_by_order() {
        let (repo, game, _) = setup().await;
        let late = repo
            .add_screenshot(game, "late.png".to_string(), 2)
            .await
            .unwrap();
        let early = repo
            .add_screenshot(game, "early.png".to_string(), 0)
            .await
            .unwrap();

        let listed = repo.list_screenshots(game).await.unwrap();
        assert_eq!(listed, vec![early.clone(), late.clone()]);

        repo.delete_screenshot(game, early.id).await.unwrap();
        assert_eq!(repo.list_screenshots(game).await.unwrap(), vec![late]);
        assert!(matches!(
            repo.delete_screenshot(game, early.id).await,
            Err(RepoUpdateError::NotFound)
        ));
    }
}
