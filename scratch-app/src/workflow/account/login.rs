use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::{
    domain::{
        RepoRetrieveError,
        login::{LoginOutcome, PendingLogin},
        user::{PasswordHasher, UserRepository},
    },
    workflow::account::verify_password,
};

pub struct LoginInput {
    pub username: String,
    pub password: String,
    pub remember: bool,
    pub next: Option<String>,
}

#[async_trait::async_trait]
pub trait LoginUseCase {
    async fn login(
        &self,
        input: LoginInput,
        now: DateTime<Utc>,
    ) -> Result<LoginOutcome, LoginError>;
}

#[derive(Debug, PartialEq)]
pub enum LoginError {
    InvalidCredentials,
    Internal,
}

pub struct LoginUseCaseImpl<U: UserRepository, H: PasswordHasher> {
    user_repository: Arc<U>,
    password_hasher: Arc<H>,
}

impl<U: UserRepository, H: PasswordHasher> LoginUseCaseImpl<U, H> {
    pub fn new(user_repository: Arc<U>, password_hasher: Arc<H>) -> Self {
        Self {
            user_repository,
            password_hasher,
        }
    }
}

#[async_trait::async_trait]
impl<U: UserRepository + Send + Sync + 'static, H: PasswordHasher + Send + Sync + 'static>
    LoginUseCase for LoginUseCaseImpl<U, H>
{
    async fn login(
        &self,
        input: LoginInput,
        now: DateTime<Utc>,
    ) -> Result<LoginOutcome, LoginError> {
        let user = match self
            .user_repository
            .get_user_by_username(input.username.trim())
            .await
        {
            Ok(user) => user,
            Err(RepoRetrieveError::NotFound) => return Err(LoginError::InvalidCredentials),
            Err(RepoRetrieveError::StorageError(e)) => {
                log::error!("Failed to load user {}: {}", input.username, e);
                return Err(LoginError::Internal);
            }
        };

        if !verify_password(&self.password_hasher, &input.password, &user.password_hash).await {
            log::info!("Failed login attempt for user {}", user.username);
            return Err(LoginError::InvalidCredentials);
        }

        if user.is_2fa_enabled {
            if user.totp_secret.is_none() {
                log::error!(
                    "User {} has two-factor auth enabled but no secret",
                    user.username
                );
                return Err(LoginError::Internal);
            }
            log::info!("User {} passed the password step", user.username);
            return Ok(LoginOutcome::TwoFactorRequired(PendingLogin::new(
                &user,
                input.remember,
                input.next,
                now,
            )));
        }

        log::info!("User {} logged in", user.username);
        Ok(LoginOutcome::Authenticated {
            user,
            remember: input.remember,
            next: input.next,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{InMemoryUserRepository, test_hasher};

    fn input(password: &str) -> LoginInput {
        LoginInput {
            username: "alice".to_string(),
            password: password.to_string(),
            remember: true,
            next: Some("/settings".to_string()),
        }
    }

    #[tokio::test]
    async fn test_login_without_two_factor() {
        let users = Arc::new(InMemoryUserRepository::default());
        users.add_user("alice", "correct horse", None).await;
        let use_case = LoginUseCaseImpl::new(users, test_hasher());

        match use_case.login(input("correct horse"), Utc::now()).await {
            Ok(LoginOutcome::Authenticated {
                user,
                remember,
                next,
            }) => {
                assert_eq!(user.username, "alice");
                assert!(remember);
                assert_eq!(next.as_deref(), Some("/settings"));
            }
            _ => panic!("expected an authenticated login"),
        }
    }

    #[tokio::test]
    async fn test_login_with_two_factor_is_pending() {
        let users = Arc::new(InMemoryUserRepository::default());
        let user = users
            .add_user("alice", "correct horse", Some("JBSWY3DPEHPK3PXPJBSWY3DPEHPK3PXP"))
            .await;
        let use_case = LoginUseCaseImpl::new(users, test_hasher());
        let now = Utc::now();

        match use_case.login(input("correct horse"), now).await {
            Ok(LoginOutcome::TwoFactorRequired(pending)) => {
                assert_eq!(pending.user_id(), user.id);
                assert_eq!(pending.username, "alice");
                assert_eq!(pending.started_at, now);
                assert!(pending.remember);
            }
            _ => panic!("expected a pending two-factor login"),
        }
    }

    #[tokio::test]
    async fn test_login_rejects_bad_credentials() {
        let users = Arc::new(InMemoryUserRepository::default());
        users.add_user("alice", "correct horse", None).await;
        let use_case = LoginUseCaseImpl::new(users, test_hasher());

        assert_eq!(
            use_case.login(input("wrong horse"), Utc::now()).await.err(),
            Some(LoginError::InvalidCredentials)
        );
        let mut unknown = input("correct horse");
        unknown.username = "mallory".to_string();
        assert_eq!(
            use_case.login(unknown, Utc::now()).await.err(),
            Some(LoginError::InvalidCredentials)
        );
    }
}
