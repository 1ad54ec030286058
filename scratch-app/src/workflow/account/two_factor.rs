use std::sync::Arc;

use crate::domain::{
    RepoRetrieveError, UserId,
    two_factor::{TotpProvisioning, TwoFactorService},
    user::{User, UserRepository},
};

#[derive(Clone, Debug, PartialEq)]
pub struct TwoFactorSetup {
    pub enabled: bool,
    pub provisioning: TotpProvisioning,
}

#[async_trait::async_trait]
pub trait TwoFactorUseCase {
    /// Provisions the user's secret on first use and returns what an authenticator app needs.
    async fn get_setup(&self, user_id: UserId) -> Result<TwoFactorSetup, TwoFactorUseCaseError>;
    async fn enable(
        &self,
        user_id: UserId,
        token: &str,
        now_unix: u64,
    ) -> Result<(), TwoFactorUseCaseError>;
    async fn disable(
        &self,
        user_id: UserId,
        token: &str,
        now_unix: u64,
    ) -> Result<(), TwoFactorUseCaseError>;
}

#[derive(Debug, PartialEq)]
pub enum TwoFactorUseCaseError {
    NotProvisioned,
    InvalidToken,
    Internal,
}

pub struct TwoFactorUseCaseImpl<U: UserRepository, T: TwoFactorService> {
    user_repository: Arc<U>,
    two_factor_service: Arc<T>,
}

impl<U: UserRepository, T: TwoFactorService> TwoFactorUseCaseImpl<U, T> {
    pub fn new(user_repository: Arc<U>, two_factor_service: Arc<T>) -> Self {
        Self {
            user_repository,
            two_factor_service,
        }
    }
}

impl<U: UserRepository + Send + Sync + 'static, T: TwoFactorService + Send + Sync + 'static>
    TwoFactorUseCaseImpl<U, T>
{
    async fn load_user(&self, user_id: UserId) -> Result<User, TwoFactorUseCaseError> {
        self.user_repository.get_user(user_id).await.map_err(|e| {
            if let RepoRetrieveError::StorageError(e) = e {
                log::error!("Failed to load user {}: {}", user_id, e);
            }
            TwoFactorUseCaseError::Internal
        })
    }

    async fn check_token(
        &self,
        user: &User,
        token: &str,
        now_unix: u64,
    ) -> Result<(), TwoFactorUseCaseError> {
        let Some(secret) = user.totp_secret.as_deref() else {
            return Err(TwoFactorUseCaseError::NotProvisioned);
        };
        match self
            .two_factor_service
            .verify(user.id, secret, token, now_unix)
        {
            Ok(true) => Ok(()),
            Ok(false) => {
                log::warn!("Invalid TOTP code submitted for user {}", user.username);
                Err(TwoFactorUseCaseError::InvalidToken)
            }
            Err(e) => {
                log::error!("Failed to verify TOTP code for {}: {}", user.username, e);
                Err(TwoFactorUseCaseError::Internal)
            }
        }
    }

    async fn set_enabled(&self, user: &User, enabled: bool) -> Result<(), TwoFactorUseCaseError> {
        self.user_repository
            .set_two_factor_enabled(user.id, enabled)
            .await
            .map_err(|e| {
                log::error!(
                    "Failed to update two-factor flag of user {}: {}",
                    user.id,
                    e
                );
                TwoFactorUseCaseError::Internal
            })?;
        log::info!(
            "Two-factor auth {} for user {}",
            if enabled { "enabled" } else { "disabled" },
            user.username
        );
        Ok(())
    }
}

#[async_trait::async_trait]
impl<U: UserRepository + Send + Sync + 'static, T: TwoFactorService + Send + Sync + 'static>
    TwoFactorUseCase for TwoFactorUseCaseImpl<U, T>
{
    async fn get_setup(&self, user_id: UserId) -> Result<TwoFactorSetup, TwoFactorUseCaseError> {
        let user = self.load_user(user_id).await?;

        let secret = match user.totp_secret {
            Some(secret) => secret,
            None => {
                let generated = self.two_factor_service.generate_secret().map_err(|e| {
                    log::error!("Failed to generate TOTP secret: {}", e);
                    TwoFactorUseCaseError::Internal
                })?;
                // A concurrent request may have provisioned first; keep whichever won.
                self.user_repository
                    .set_totp_secret_if_absent(user_id, generated)
                    .await
                    .map_err(|e| {
                        log::error!("Failed to store TOTP secret of user {}: {}", user_id, e);
                        TwoFactorUseCaseError::Internal
                    })?
            }
        };

        let provisioning = self
            .two_factor_service
            .provisioning(&secret, &user.username)
            .map_err(|e| {
                log::error!("Failed to build TOTP provisioning for {}: {}", user.username, e);
                TwoFactorUseCaseError::Internal
            })?;
        Ok(TwoFactorSetup {
            enabled: user.is_2fa_enabled,
            provisioning,
        })
    }

    async fn enable(
        &self,
        user_id: UserId,
        token: &str,
        now_unix: u64,
    ) -> Result<(), TwoFactorUseCaseError> {
        let user = self.load_user(user_id).await?;
        self.check_token(&user, token, now_unix).await?;
        self.set_enabled(&user, true).await
    }

    async fn disable(
        &self,
        user_id: UserId,
        token: &str,
        now_unix: u64,
    ) -> Result<(), TwoFactorUseCaseError> {
        let user = self.load_user(user_id).await?;
        self.check_token(&user, token, now_unix).await?;
        self.set_enabled(&user, false).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        domain::two_factor::{TOTP_STEP_SECS, TotpTwoFactorService},
        testing::{InMemoryUserRepository, totp_code},
    };

    const NOW: u64 = 1_700_000_010;

    fn use_case(
        users: Arc<InMemoryUserRepository>,
    ) -> TwoFactorUseCaseImpl<InMemoryUserRepository, TotpTwoFactorService> {
        TwoFactorUseCaseImpl::new(users, Arc::new(TotpTwoFactorService::new("scratch")))
    }

    #[tokio::test]
    async fn test_secret_is_provisioned_once() {
        let users = Arc::new(InMemoryUserRepository::default());
        let user = users.add_user("alice", "correct horse", None).await;
        let use_case = use_case(users.clone());

        let first = use_case.get_setup(user.id).await.unwrap();
        let second = use_case.get_setup(user.id).await.unwrap();
        assert!(!first.enabled);
        assert_eq!(first.provisioning.secret, second.provisioning.secret);
        assert!(first.provisioning.otpauth_url.contains("alice"));
        assert_eq!(
            users.get_user(user.id).await.unwrap().totp_secret,
            Some(first.provisioning.secret)
        );
    }

    #[tokio::test]
    async fn test_enable_and_disable() {
        let users = Arc::new(InMemoryUserRepository::default());
        let user = users.add_user("alice", "correct horse", None).await;
        let use_case = use_case(users.clone());

        assert_eq!(
            use_case.enable(user.id, "123456", NOW).await.unwrap_err(),
            TwoFactorUseCaseError::NotProvisioned
        );

        let secret = use_case.get_setup(user.id).await.unwrap().provisioning.secret;
        use_case
            .enable(user.id, &totp_code(&secret, NOW), NOW)
            .await
            .unwrap();
        assert!(users.get_user(user.id).await.unwrap().is_2fa_enabled);

        let later = NOW + 2 * TOTP_STEP_SECS;
        use_case
            .disable(user.id, &totp_code(&secret, later), later)
            .await
            .unwrap();
        let stored = users.get_user(user.id).await.unwrap();
        assert!(!stored.is_2fa_enabled);
        assert_eq!(stored.totp_secret, Some(secret));
    }

    #[tokio::test]
    async fn test_enable_rejects_invalid_code() {
        let users = Arc::new(InMemoryUserRepository::default());
        let user = users.add_user("alice", "correct horse", None).await;
        let use_case = use_case(users.clone());

        let secret = use_case.get_setup(user.id).await.unwrap().provisioning.secret;
        let code = totp_code(&secret, NOW);
        let wrong = if code == "000000" { "111111" } else { "000000" };
        assert_eq!(
            use_case.enable(user.id, wrong, NOW).await.unwrap_err(),
            TwoFactorUseCaseError::InvalidToken
        );
        assert!(!users.get_user(user.id).await.unwrap().is_2fa_enabled);
    }
}
