use std::sync::Arc;

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set,
    sea_query::Expr,
};
use scratch_app::domain::{
    RepoCreateError, RepoRetrieveError, RepoUpdateError, UserId,
    user::{NewUser, ProfileUpdate, User, UserRepository},
};

use crate::{create_error, entity::user, retrieve_error, update_error};

pub struct UserRepositoryImpl {
    db: DatabaseConnection,
    user_cache: Arc<moka::future::Cache<UserId, User>>,
}

impl UserRepositoryImpl {
    pub fn new(db: DatabaseConnection) -> Self {
        let user_cache = Arc::new(
            moka::future::Cache::builder()
                .max_capacity(10_000)
                .time_to_live(std::time::Duration::from_secs(60 * 60))
                .build(),
        );
        Self { db, user_cache }
    }

    fn model_to_user(model: user::Model) -> User {
        User {
            id: UserId(model.id),
            username: model.username,
            email: model.email,
            password_hash: model.password_hash,
            website: model.website,
            about: model.about,
            totp_secret: model.totp_secret,
            is_2fa_enabled: model.is_2fa_enabled,
            created_at: model.created_at,
        }
    }

    async fn find_model(&self, user_id: UserId) -> Result<user::Model, RepoUpdateError> {
        user::Entity::find_by_id(user_id.0)
            .one(&self.db)
            .await
            .map_err(update_error)?
            .ok_or(RepoUpdateError::NotFound)
    }

    async fn find_one(
        &self,
        column: user::Column,
        value: &str,
    ) -> Result<User, RepoRetrieveError> {
        let model = user::Entity::find()
            .filter(column.eq(value))
            .one(&self.db)
            .await
            .map_err(retrieve_error)?
            .ok_or(RepoRetrieveError::NotFound)?;
        let user = Self::model_to_user(model);
        self.user_cache.insert(user.id, user.clone()).await;
        Ok(user)
    }
}

#[async_trait::async_trait]
impl UserRepository for UserRepositoryImpl {
    async fn create_user(&self, new_user: NewUser) -> Result<User, RepoCreateError> {
        let active_model = user::ActiveModel {
            username: Set(new_user.username),
            email: Set(new_user.email),
            password_hash: Set(new_user.password_hash),
            website: Set(None),
            about: Set(None),
            totp_secret: Set(None),
            is_2fa_enabled: Set(false),
            created_at: Set(Utc::now()),
            ..Default::default()
        };
        let model = active_model.insert(&self.db).await.map_err(create_error)?;
        Ok(Self::model_to_user(model))
    }

    async fn get_user(&self, user_id: UserId) -> Result<User, RepoRetrieveError> {
        if let Some(user) = self.user_cache.get(&user_id).await {
            return Ok(user);
        }

        let model = user::Entity::find_by_id(user_id.0)
            .one(&self.db)
            .await
            .map_err(retrieve_error)?
            .ok_or(RepoRetrieveError::NotFound)?;
        let user = Self::model_to_user(model);
        self.user_cache.insert(user_id, user.clone()).await;
        Ok(user)
    }

    async fn get_user_by_username(&self, username: &str) -> Result<User, RepoRetrieveError> {
        self.find_one(user::Column::Username, username).await
    }

    async fn get_user_by_email(&self, email: &str) -> Result<User, RepoRetrieveError> {
        self.find_one(user::Column::Email, email).await
    }

    async fn update_profile(
        &self,
        user_id: UserId,
        update: ProfileUpdate,
    ) -> Result<(), RepoUpdateError> {
        let mut model: user::ActiveModel = self.find_model(user_id).await?.into();
        model.website = Set(update.website);
        model.about = Set(update.about);
        model.update(&self.db).await.map_err(update_error)?;
        self.user_cache.invalidate(&user_id).await;
        Ok(())
    }

    async fn update_password_hash(
        &self,
        user_id: UserId,
        password_hash: String,
    ) -> Result<(), RepoUpdateError> {
        let mut model: user::ActiveModel = self.find_model(user_id).await?.into();
        model.password_hash = Set(password_hash);
        model.update(&self.db).await.map_err(update_error)?;
        self.user_cache.invalidate(&user_id).await;
        Ok(())
    }

    async fn set_totp_secret_if_absent(
        &self,
        user_id: UserId,
        secret: String,
    ) -> Result<String, RepoUpdateError> {
        // Conditional update, so concurrent setups agree on a single secret.
        user::Entity::update_many()
            .col_expr(user::Column::TotpSecret, Expr::value(secret))
            .filter(user::Column::Id.eq(user_id.0))
            .filter(user::Column::TotpSecret.is_null())
            .exec(&self.db)
            .await
            .map_err(update_error)?;
        self.user_cache.invalidate(&user_id).await;

        self.find_model(user_id)
            .await?
            .totp_secret
            .ok_or_else(|| RepoUpdateError::StorageError("TOTP secret was not stored".to_string()))
    }

    async fn set_two_factor_enabled(
        &self,
        user_id: UserId,
        enabled: bool,
    ) -> Result<(), RepoUpdateError> {
        let mut model: user::ActiveModel = self.find_model(user_id).await?.into();
        model.is_2fa_enabled = Set(enabled);
        model.update(&self.db).await.map_err(update_error)?;
        self.user_cache.invalidate(&user_id).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_db;

    fn new_user(username: &str, email: &str) -> NewUser {
        NewUser {
            username: username.to_string(),
            email: email.to_string(),
            password_hash: "$2b$04$hash".to_string(),
        }
    }

    #[tokio::test]
    async fn test_create_and_lookup() {
        let repo = UserRepositoryImpl::new(test_db().await);
        let created = repo
            .create_user(new_user("alice", "alice@example.com"))
            .await
            .unwrap();
        assert!(!created.is_2fa_enabled);

        let by_id = repo.get_user(created.id).await.unwrap();
        assert_eq!(by_id.username, "alice");
        let by_name = repo.get_user_by_username("alice").await.unwrap();
        assert_eq!(by_name.id, created.id);
        let by_email = repo.get_user_by_email("alice@example.com").await.unwrap();
        assert_eq!(by_email.id, created.id);
        assert!(matches!(
            repo.get_user_by_username("bob").await,
            Err(RepoRetrieveError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_unique_username_and_email() {
        let repo = UserRepositoryImpl::new(test_db().await);
        repo.create_user(new_user("alice", "alice@example.com"))
            .await
            .unwrap();
        assert!(matches!(
            repo.create_user(new_user("alice", "other@example.com")).await,
            Err(RepoCreateError::Conflict)
        ));
        assert!(matches!(
            repo.create_user(new_user("bob", "alice@example.com")).await,
            Err(RepoCreateError::Conflict)
        ));
    }

    #[tokio::test]
    async fn test_updates_are_visible_through_cache() {
        let repo = UserRepositoryImpl::new(test_db().await);
        let user = repo
            .create_user(new_user("alice", "alice@example.com"))
            .await
            .unwrap();
        repo.get_user(user.id).await.unwrap();

        repo.update_profile(
            user.id,
            ProfileUpdate {
                website: Some("https://alice.dev".to_string()),
                about: None,
            },
        )
        .await
        .unwrap();
        repo.update_password_hash(user.id, "new-hash".to_string())
            .await
            .unwrap();

        let reloaded = repo.get_user(user.id).await.unwrap();
        assert_eq!(reloaded.website.as_deref(), Some("https://alice.dev"));
        assert_eq!(reloaded.password_hash, "new-hash");
        assert!(matches!(
            repo.update_profile(UserId(999), ProfileUpdate::default()).await,
            Err(RepoUpdateError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_totp_secret_is_set_once() {
        let repo = UserRepositoryImpl::new(test_db().await);
        let user = repo
            .create_user(new_user("alice", "alice@example.com"))
            .await
            .unwrap();

        let first = repo
            .set_totp_secret_if_absent(user.id, "FIRSTSECRET".to_string())
            .await
            .unwrap();
        let second = repo
            .set_totp_secret_if_absent(user.id, "SECONDSECRET".to_string())
            .await
            .unwrap();
        assert_eq!(first, "FIRSTSECRET");
        assert_eq!(second, "FIRSTSECRET");

        repo.set_two_factor_enabled(user.id, true).await.unwrap();
        let reloaded = repo.get_user(user.id).await.unwrap();
        assert!(reloaded.is_2fa_enabled);
        assert_eq!(reloaded.totp_secret.as_deref(), Some("FIRSTSECRET"));
    }
}
