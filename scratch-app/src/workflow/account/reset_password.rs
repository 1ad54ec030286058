use std::sync::Arc;

use crate::{
    domain::{
        RepoRetrieveError, RepoUpdateError,
        password_reset::PasswordResetTokens,
        user::{PasswordHasher, User, UserRepository, validate_email, validate_password},
    },
    ports::email::{EmailMessage, EmailPort, send_email_async},
    workflow::account::hash_password,
};

pub const RESET_PASSWORD_SUBJECT: &str = "[scratch] Reset Your Password";

#[async_trait::async_trait]
pub trait ResetPasswordUseCase {
    /// Sends a reset link when the address belongs to a user. Unknown addresses are not reported.
    async fn request_reset(&self, email: &str) -> Result<(), ResetPasswordError>;
    /// Checks a token without consuming it.
    fn check_token(&self, token: &str) -> bool;
    async fn reset_password(&self, token: &str, new_password: &str)
    -> Result<(), ResetPasswordError>;
}

#[derive(Debug, PartialEq)]
pub enum ResetPasswordError {
    InvalidToken,
    Invalid(String),
    Internal,
}

pub struct ResetPasswordUseCaseImpl<U: UserRepository, H: PasswordHasher, E: EmailPort> {
    user_repository: Arc<U>,
    password_hasher: Arc<H>,
    email_port: Arc<E>,
    tokens: PasswordResetTokens,
    base_url: String,
}

impl<U: UserRepository, H: PasswordHasher, E: EmailPort> ResetPasswordUseCaseImpl<U, H, E> {
    pub fn new(
        user_repository: Arc<U>,
        password_hasher: Arc<H>,
        email_port: Arc<E>,
        secret_key: &str,
        base_url: &str,
    ) -> Self {
        Self {
            user_repository,
            password_hasher,
            email_port,
            tokens: PasswordResetTokens::new(secret_key),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn reset_email(&self, user: &User, token: &str) -> EmailMessage {
        let link = format!("{}/reset_password/{}", self.base_url, token);
        let text_body = format!(
            "Dear {},\n\n\
             To reset your password click on the following link:\n\n\
             {}\n\n\
             If you have not requested a password reset simply ignore this message.\n\n\
             Sincerely,\n\n\
             The scratch Team\n",
            user.username, link
        );
        let html_body = format!(
            "<p>Dear {},</p>\
             <p>To reset your password <a href=\"{}\">click here</a>.</p>\
             <p>Alternatively, you can paste the following link in your browser's address bar:</p>\
             <p>{}</p>\
             <p>If you have not requested a password reset simply ignore this message.</p>\
             <p>Sincerely,</p>\
             <p>The scratch Team</p>",
            user.username, link, link
        );
        EmailMessage::new(&user.email, RESET_PASSWORD_SUBJECT, text_body).with_html(html_body)
    }
}

#[async_trait::async_trait]
impl<
    U: UserRepository + Send + Sync + 'static,
    H: PasswordHasher + Send + Sync + 'static,
    E: EmailPort + Send + Sync + 'static,
> ResetPasswordUseCase for ResetPasswordUseCaseImpl<U, H, E>
{
    async fn request_reset(&self, email: &str) -> Result<(), ResetPasswordError> {
        let email = validate_email(email).map_err(ResetPasswordError::Invalid)?;
        let user = match self.user_repository.get_user_by_email(&email).await {
            Ok(user) => user,
            Err(RepoRetrieveError::NotFound) => {
                log::info!("Password reset requested for unknown email");
                return Ok(());
            }
            Err(RepoRetrieveError::StorageError(e)) => {
                log::error!("Failed to look up user by email: {}", e);
                return Err(ResetPasswordError::Internal);
            }
        };

        let token = self
            .tokens
            .issue(user.id, chrono::Utc::now().timestamp())
            .map_err(|e| {
                log::error!("{}", e);
                ResetPasswordError::Internal
            })?;
        send_email_async(self.email_port.clone(), self.reset_email(&user, &token));
        log::info!("Password reset email queued for user {}", user.username);
        Ok(())
    }

    fn check_token(&self, token: &str) -> bool {
        self.tokens.verify(token).is_some()
    }

    async fn reset_password(
        &self,
        token: &str,
        new_password: &str,
    ) -> Result<(), ResetPasswordError> {
        let Some(user_id) = self.tokens.verify(token) else {
            return Err(ResetPasswordError::InvalidToken);
        };
        validate_password(new_password).map_err(ResetPasswordError::Invalid)?;

        let password_hash = hash_password(&self.password_hasher, new_password)
            .await
            .map_err(|e| {
                log::error!("{}", e);
                ResetPasswordError::Internal
            })?;
        match self
            .user_repository
            .update_password_hash(user_id, password_hash)
            .await
        {
            Ok(()) => {
                log::info!("Password of user {} was reset", user_id);
                Ok(())
            }
            Err(RepoUpdateError::NotFound) => Err(ResetPasswordError::InvalidToken),
            Err(e) => {
                log::error!("Failed to reset password of user {}: {}", user_id, e);
                Err(ResetPasswordError::Internal)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        domain::UserId,
        testing::{InMemoryUserRepository, RecordingEmailPort, test_hasher},
    };

    fn use_case(
        users: Arc<InMemoryUserRepository>,
        email: Arc<RecordingEmailPort>,
    ) -> ResetPasswordUseCaseImpl<
        InMemoryUserRepository,
        crate::domain::user::BcryptPasswordHasher,
        RecordingEmailPort,
    > {
        ResetPasswordUseCaseImpl::new(users, test_hasher(), email, "secret", "http://scratch.test/")
    }

    fn token_from_link(body: &str) -> String {
        let start = body
            .find("http://scratch.test/reset_password/")
            .expect("reset link in body")
            + "http://scratch.test/reset_password/".len();
        body[start..]
            .split_whitespace()
            .next()
            .unwrap()
            .to_string()
    }

    #[tokio::test]
    async fn test_reset_flow() {
        let users = Arc::new(InMemoryUserRepository::default());
        let user = users.add_user("alice", "correct horse", None).await;
        let email = Arc::new(RecordingEmailPort::default());
        let use_case = use_case(users.clone(), email.clone());

        use_case.request_reset("alice@example.com").await.unwrap();
        let sent = email.wait_for_messages(1).await;
        assert_eq!(sent[0].to, vec!["alice@example.com".to_string()]);
        assert_eq!(sent[0].subject, RESET_PASSWORD_SUBJECT);
        assert!(sent[0].html_body.is_some());

        let token = token_from_link(&sent[0].text_body);
        assert!(use_case.check_token(&token));
        use_case
            .reset_password(&token, "battery staple")
            .await
            .unwrap();
        let stored = users.get_user(user.id).await.unwrap();
        assert!(bcrypt::verify("battery staple", &stored.password_hash).unwrap());
    }

    #[tokio::test]
    async fn test_unknown_email_reports_success_without_sending() {
        let users = Arc::new(InMemoryUserRepository::default());
        let email = Arc::new(RecordingEmailPort::default());
        let use_case = use_case(users, email.clone());

        use_case.request_reset("nobody@example.com").await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert!(email.messages().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_token_is_rejected() {
        let users = Arc::new(InMemoryUserRepository::default());
        users.add_user("alice", "correct horse", None).await;
        let email = Arc::new(RecordingEmailPort::default());
        let use_case = use_case(users, email);

        assert!(!use_case.check_token("garbage"));
        assert_eq!(
            use_case
                .reset_password("garbage", "battery staple")
                .await
                .unwrap_err(),
            ResetPasswordError::InvalidToken
        );

        let foreign = PasswordResetTokens::new("other")
            .issue(UserId(1), chrono::Utc::now().timestamp())
            .unwrap();
        assert_eq!(
            use_case
                .reset_password(&foreign, "battery staple")
                .await
                .unwrap_err(),
            ResetPasswordError::InvalidToken
        );
    }
}
