use std::sync::Arc;

use crate::{
    domain::{
        RepoRetrieveError, UserId,
        user::{PasswordHasher, UserRepository, validate_password},
    },
    workflow::account::{hash_password, verify_password},
};

#[async_trait::async_trait]
pub trait ChangePasswordUseCase {
    async fn change_password(
        &self,
        user_id: UserId,
        current_password: &str,
        new_password: &str,
    ) -> Result<(), ChangePasswordError>;
}

#[derive(Debug, PartialEq)]
pub enum ChangePasswordError {
    IncorrectPassword,
    Invalid(String),
    Internal,
}

pub struct ChangePasswordUseCaseImpl<U: UserRepository, H: PasswordHasher> {
    user_repository: Arc<U>,
    password_hasher: Arc<H>,
}

impl<U: UserRepository, H: PasswordHasher> ChangePasswordUseCaseImpl<U, H> {
    pub fn new(user_repository: Arc<U>, password_hasher: Arc<H>) -> Self {
        Self {
            user_repository,
            password_hasher,
        }
    }
}

#[async_trait::async_trait]
impl<U: UserRepository + Send + Sync + 'static, H: PasswordHasher + Send + Sync + 'static>
    ChangePasswordUseCase for ChangePasswordUseCaseImpl<U, H>
{
    async fn change_password(
        &self,
        user_id: UserId,
        current_password: &str,
        new_password: &str,
    ) -> Result<(), ChangePasswordError> {
        let user = match self.user_repository.get_user(user_id).await {
            Ok(user) => user,
            Err(RepoRetrieveError::NotFound) => return Err(ChangePasswordError::Internal),
            Err(RepoRetrieveError::StorageError(e)) => {
                log::error!("Failed to load user {}: {}", user_id, e);
                return Err(ChangePasswordError::Internal);
            }
        };

        if !verify_password(&self.password_hasher, current_password, &user.password_hash).await {
            return Err(ChangePasswordError::IncorrectPassword);
        }
        validate_password(new_password).map_err(ChangePasswordError::Invalid)?;

        let password_hash = hash_password(&self.password_hasher, new_password)
            .await
            .map_err(|e| {
                log::error!("{}", e);
                ChangePasswordError::Internal
            })?;
        self.user_repository
            .update_password_hash(user_id, password_hash)
            .await
            .map_err(|e| {
                log::error!("Failed to store password of user {}: {}", user_id, e);
                ChangePasswordError::Internal
            })?;

        log::info!("User {} changed their password", user.username);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{InMemoryUserRepository, test_hasher};

    #[tokio::test]
    async fn test_change_password() {
        let users = Arc::new(InMemoryUserRepository::default());
        let user = users.add_user("alice", "correct horse", None).await;
        let use_case = ChangePasswordUseCaseImpl::new(users.clone(), test_hasher());

        use_case
            .change_password(user.id, "correct horse", "battery staple")
            .await
            .unwrap();
        let stored = users.get_user(user.id).await.unwrap();
        assert!(bcrypt::verify("battery staple", &stored.password_hash).unwrap());
    }

    #[tokio::test]
    async fn test_change_password_requires_current_password() {
        let users = Arc::new(InMemoryUserRepository::default());
        let user = users.add_user("alice", "correct horse", None).await;
        let use_case = ChangePasswordUseCaseImpl::new(users.clone(), test_hasher());

        assert_eq!(
            use_case
                .change_password(user.id, "wrong horse", "battery staple")
                .await
                .unwrap_err(),
            ChangePasswordError::IncorrectPassword
        );
        assert!(matches!(
            use_case
                .change_password(user.id, "correct horse", "short")
                .await,
            Err(ChangePasswordError::Invalid(_))
        ));
        let stored = users.get_user(user.id).await.unwrap();
        assert!(bcrypt::verify("correct horse", &stored.password_hash).unwrap());
    }
}
