use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::domain::{
    RepoRetrieveError,
    login::PendingLogin,
    two_factor::TwoFactorService,
    user::{User, UserRepository},
};

#[async_trait::async_trait]
pub trait VerifyTotpUseCase {
    /// Completes a pending login with a one-time code.
    async fn verify_totp(
        &self,
        pending: &PendingLogin,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<User, VerifyTotpError>;
}

#[derive(Debug, PartialEq)]
pub enum VerifyTotpError {
    Expired,
    InvalidToken,
    Internal,
}

pub struct VerifyTotpUseCaseImpl<U: UserRepository, T: TwoFactorService> {
    user_repository: Arc<U>,
    two_factor_service: Arc<T>,
}

impl<U: UserRepository, T: TwoFactorService> VerifyTotpUseCaseImpl<U, T> {
    pub fn new(user_repository: Arc<U>, two_factor_service: Arc<T>) -> Self {
        Self {
            user_repository,
            two_factor_service,
        }
    }
}

#[async_trait::async_trait]
impl<U: UserRepository + Send + Sync + 'static, T: TwoFactorService + Send + Sync + 'static>
    VerifyTotpUseCase for VerifyTotpUseCaseImpl<U, T>
{
    async fn verify_totp(
        &self,
        pending: &PendingLogin,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<User, VerifyTotpError> {
        if pending.is_expired(now) {
            return Err(VerifyTotpError::Expired);
        }

        let user = match self.user_repository.get_user(pending.user_id()).await {
            Ok(user) => user,
            Err(RepoRetrieveError::NotFound) => return Err(VerifyTotpError::Expired),
            Err(RepoRetrieveError::StorageError(e)) => {
                log::error!("Failed to load user {}: {}", pending.user_id, e);
                return Err(VerifyTotpError::Internal);
            }
        };

        // Two-factor auth was switched off after the password step.
        let Some(secret) = user.totp_secret.as_deref().filter(|_| user.is_2fa_enabled) else {
            return Ok(user);
        };

        match self
            .two_factor_service
            .verify(user.id, secret, token, now.timestamp().max(0) as u64)
        {
            Ok(true) => {
                log::info!("User {} completed two-factor login", user.username);
                Ok(user)
            }
            Ok(false) => {
                log::warn!("Invalid TOTP code submitted for user {}", user.username);
                Err(VerifyTotpError::InvalidToken)
            }
            Err(e) => {
                log::error!("Failed to verify TOTP code for {}: {}", user.username, e);
                Err(VerifyTotpError::Internal)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;
    use crate::{
        domain::{
            login::PENDING_LOGIN_TTL_SECS,
            two_factor::{TOTP_STEP_SECS, TotpTwoFactorService},
        },
        testing::{InMemoryUserRepository, totp_code},
    };

    const SECRET: &str = "JBSWY3DPEHPK3PXPJBSWY3DPEHPK3PXP";

    async fn setup() -> (
        User,
        VerifyTotpUseCaseImpl<InMemoryUserRepository, TotpTwoFactorService>,
    ) {
        let users = Arc::new(InMemoryUserRepository::default());
        let user = users.add_user("alice", "correct horse", Some(SECRET)).await;
        let use_case =
            VerifyTotpUseCaseImpl::new(users, Arc::new(TotpTwoFactorService::new("scratch")));
        (user, use_case)
    }

    #[tokio::test]
    async fn test_valid_code_completes_login() {
        let (user, use_case) = setup().await;
        let now = Utc::now();
        let pending = PendingLogin::new(&user, false, None, now);
        let code = totp_code(SECRET, now.timestamp() as u64);

        let logged_in = use_case.verify_totp(&pending, &code, now).await.unwrap();
        assert_eq!(logged_in.id, user.id);
    }

    #[tokio::test]
    async fn test_invalid_code_is_rejected() {
        let (user, use_case) = setup().await;
        let now = Utc::now();
        let pending = PendingLogin::new(&user, false, None, now);
        let code = totp_code(SECRET, now.timestamp() as u64);
        let wrong = if code == "000000" { "111111" } else { "000000" };

        assert_eq!(
            use_case.verify_totp(&pending, wrong, now).await.unwrap_err(),
            VerifyTotpError::InvalidToken
        );
    }

    #[tokio::test]
    async fn test_code_cannot_be_replayed() {
        let (user, use_case) = setup().await;
        let now = Utc::now();
        let pending = PendingLogin::new(&user, false, None, now);
        let code = totp_code(SECRET, now.timestamp() as u64);

        assert!(use_case.verify_totp(&pending, &code, now).await.is_ok());
        assert_eq!(
            use_case.verify_totp(&pending, &code, now).await.unwrap_err(),
            VerifyTotpError::InvalidToken
        );
    }

    #[tokio::test]
    async fn test_code_outside_window_is_rejected() {
        let (user, use_case) = setup().await;
        let now = Utc::now();
        let pending = PendingLogin::new(&user, false, None, now);
        let stale = totp_code(SECRET, now.timestamp() as u64 - 10 * TOTP_STEP_SECS);
        let valid: Vec<String> = [-1i64, 0, 1]
            .iter()
            .map(|offset| {
                totp_code(
                    SECRET,
                    (now.timestamp() + offset * TOTP_STEP_SECS as i64) as u64,
                )
            })
            .collect();
        if !valid.contains(&stale) {
            assert_eq!(
                use_case.verify_totp(&pending, &stale, now).await.unwrap_err(),
                VerifyTotpError::InvalidToken
            );
        }
    }

    #[tokio::test]
    async fn test_expired_pending_login() {
        let (user, use_case) = setup().await;
        let started = Utc::now() - Duration::seconds(PENDING_LOGIN_TTL_SECS + 1);
        let pending = PendingLogin::new(&user, false, None, started);
        let now = Utc::now();
        let code = totp_code(SECRET, now.timestamp() as u64);

        assert_eq!(
            use_case.verify_totp(&pending, &code, now).await.unwrap_err(),
            VerifyTotpError::Expired
        );
    }
}
