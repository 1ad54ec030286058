use std::sync::Arc;

use crate::{
    domain::{
        RepoCreateError, RepoRetrieveError,
        user::{
            NewUser, PasswordHasher, User, UserRepository, validate_email, validate_password,
            validate_username,
        },
    },
    workflow::account::hash_password,
};

pub struct RegisterInput {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[async_trait::async_trait]
pub trait RegisterUseCase {
    async fn register(&self, input: RegisterInput) -> Result<User, RegisterError>;
}

#[derive(Debug, PartialEq)]
pub enum RegisterError {
    Invalid(String),
    UsernameTaken,
    EmailTaken,
    Internal,
}

pub struct RegisterUseCaseImpl<U: UserRepository, H: PasswordHasher> {
    user_repository: Arc<U>,
    password_hasher: Arc<H>,
}

impl<U: UserRepository, H: PasswordHasher> RegisterUseCaseImpl<U, H> {
    pub fn new(user_repository: Arc<U>, password_hasher: Arc<H>) -> Self {
        Self {
            user_repository,
            password_hasher,
        }
    }
}

impl<U: UserRepository + Send + Sync + 'static, H: PasswordHasher> RegisterUseCaseImpl<U, H> {
    async fn username_taken(&self, username: &str) -> Result<bool, RegisterError> {
        match self.user_repository.get_user_by_username(username).await {
            Ok(_) => Ok(true),
            Err(RepoRetrieveError::NotFound) => Ok(false),
            Err(RepoRetrieveError::StorageError(e)) => {
                log::error!("Failed to look up username {}: {}", username, e);
                Err(RegisterError::Internal)
            }
        }
    }

    async fn email_taken(&self, email: &str) -> Result<bool, RegisterError> {
        match self.user_repository.get_user_by_email(email).await {
            Ok(_) => Ok(true),
            Err(RepoRetrieveError::NotFound) => Ok(false),
            Err(RepoRetrieveError::StorageError(e)) => {
                log::error!("Failed to look up email: {}", e);
                Err(RegisterError::Internal)
            }
        }
    }
}

#[async_trait::async_trait]
impl<U: UserRepository + Send + Sync + 'static, H: PasswordHasher + Send + Sync + 'static>
    RegisterUseCase for RegisterUseCaseImpl<U, H>
{
    async fn register(&self, input: RegisterInput) -> Result<User, RegisterError> {
        let username = validate_username(&input.username).map_err(RegisterError::Invalid)?;
        let email = validate_email(&input.email).map_err(RegisterError::Invalid)?;
        validate_password(&input.password).map_err(RegisterError::Invalid)?;

        if self.username_taken(&username).await? {
            return Err(RegisterError::UsernameTaken);
        }
        if self.email_taken(&email).await? {
            return Err(RegisterError::EmailTaken);
        }

        let password_hash = hash_password(&self.password_hasher, &input.password)
            .await
            .map_err(|e| {
                log::error!("{}", e);
                RegisterError::Internal
            })?;

        match self
            .user_repository
            .create_user(NewUser {
                username: username.clone(),
                email: email.clone(),
                password_hash,
            })
            .await
        {
            Ok(user) => {
                log::info!("Registered user {} ({})", user.username, user.id);
                Ok(user)
            }
            // Lost a race against a concurrent registration.
            Err(RepoCreateError::Conflict) => {
                if self.username_taken(&username).await? {
                    Err(RegisterError::UsernameTaken)
                } else {
                    Err(RegisterError::EmailTaken)
                }
            }
            Err(RepoCreateError::StorageError(e)) => {
                log::error!("Failed to create user {}: {}", username, e);
                Err(RegisterError::Internal)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        domain::user::BcryptPasswordHasher,
        testing::{InMemoryUserRepository, test_hasher},
    };

    fn use_case() -> (
        Arc<InMemoryUserRepository>,
        RegisterUseCaseImpl<InMemoryUserRepository, BcryptPasswordHasher>,
    ) {
        let users = Arc::new(InMemoryUserRepository::default());
        let use_case = RegisterUseCaseImpl::new(users.clone(), test_hasher());
        (users, use_case)
    }

    fn input(username: &str, email: &str) -> RegisterInput {
        RegisterInput {
            username: username.to_string(),
            email: email.to_string(),
            password: "correct horse".to_string(),
        }
    }

    #[tokio::test]
    async fn test_register_hashes_password() {
        let (users, use_case) = use_case();
        let user = use_case
            .register(input("alice", "alice@example.com"))
            .await
            .unwrap();
        assert_eq!(user.username, "alice");
        assert_ne!(user.password_hash, "correct horse");
        assert!(bcrypt::verify("correct horse", &user.password_hash).unwrap());
        assert!(users.get_user_by_username("alice").await.is_ok());
    }

    #[tokio::test]
    async fn test_register_rejects_duplicates() {
        let (_, use_case) = use_case();
        use_case
            .register(input("alice", "alice@example.com"))
            .await
            .unwrap();
        assert_eq!(
            use_case
                .register(input("alice", "other@example.com"))
                .await
                .unwrap_err(),
            RegisterError::UsernameTaken
        );
        assert_eq!(
            use_case
                .register(input("bob", "alice@example.com"))
                .await
                .unwrap_err(),
            RegisterError::EmailTaken
        );
    }

    #[tokio::test]
    async fn test_register_validates_input() {
        let (_, use_case) = use_case();
        assert!(matches!(
            use_case.register(input("alice", "not-an-email")).await,
            Err(RegisterError::Invalid(_))
        ));
        let mut short_password = input("alice", "alice@example.com");
        short_password.password = "short".to_string();
        assert!(matches!(
            use_case.register(short_password).await,
            Err(RegisterError::Invalid(_))
        ));
    }
}
