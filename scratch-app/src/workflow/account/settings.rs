use std::sync::Arc;

use validator::Validate;

use crate::domain::{
    RepoRetrieveError, RepoUpdateError, UserId,
    user::{ProfileUpdate, User, UserRepository},
};

#[derive(Clone, Debug, Default, Validate)]
pub struct SettingsInput {
    #[validate(url(message = "Website must be a valid URL"))]
    pub website: Option<String>,
    #[validate(length(max = 1000, message = "About must be at most 1000 characters"))]
    pub about: Option<String>,
}

impl SettingsInput {
    /// Trims both fields and turns blanks into `None`.
    pub fn normalized(website: Option<String>, about: Option<String>) -> Self {
        let clean = |value: Option<String>| {
            value
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        Self {
            website: clean(website),
            about: clean(about),
        }
    }
}

#[async_trait::async_trait]
pub trait SettingsUseCase {
    async fn get_settings(&self, user_id: UserId) -> Result<User, SettingsError>;
    async fn update_settings(
        &self,
        user_id: UserId,
        input: SettingsInput,
    ) -> Result<User, SettingsError>;
}

#[derive(Debug, PartialEq)]
pub enum SettingsError {
    UserNotFound,
    Invalid(String),
    Internal,
}

pub struct SettingsUseCaseImpl<U: UserRepository> {
    user_repository: Arc<U>,
}

impl<U: UserRepository> SettingsUseCaseImpl<U> {
    pub fn new(user_repository: Arc<U>) -> Self {
        Self { user_repository }
    }
}

#[async_trait::async_trait]
impl<U: UserRepository + Send + Sync + 'static> SettingsUseCase for SettingsUseCaseImpl<U> {
    async fn get_settings(&self, user_id: UserId) -> Result<User, SettingsError> {
        match self.user_repository.get_user(user_id).await {
            Ok(user) => Ok(user),
            Err(RepoRetrieveError::NotFound) => Err(SettingsError::UserNotFound),
            Err(RepoRetrieveError::StorageError(e)) => {
                log::error!("Failed to load settings of user {}: {}", user_id, e);
                Err(SettingsError::Internal)
            }
        }
    }

    async fn update_settings(
        &self,
        user_id: UserId,
        input: SettingsInput,
    ) -> Result<User, SettingsError> {
        let input = SettingsInput::normalized(input.website, input.about);
        if let Err(errors) = input.validate() {
            let message = errors
                .field_errors()
                .values()
                .flat_map(|errs| errs.iter())
                .filter_map(|e| e.message.as_ref().map(|m| m.to_string()))
                .next()
                .unwrap_or_else(|| "Invalid settings".to_string());
            return Err(SettingsError::Invalid(message));
        }

        let update = ProfileUpdate {
            website: input.website,
            about: input.about,
        };
        match self.user_repository.update_profile(user_id, update).await {
            Ok(()) => {}
            Err(RepoUpdateError::NotFound) => return Err(SettingsError::UserNotFound),
            Err(e) => {
                log::error!("Failed to update settings of user {}: {}", user_id, e);
                return Err(SettingsError::Internal);
            }
        }
        self.get_settings(user_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{domain::user::MAX_ABOUT_LEN, testing::InMemoryUserRepository};

    #[tokio::test]
    async fn test_update_settings() {
        let users = Arc::new(InMemoryUserRepository::default());
        let user = users.add_user("alice", "correct horse", None).await;
        let use_case = SettingsUseCaseImpl::new(users);

        let updated = use_case
            .update_settings(
                user.id,
                SettingsInput {
                    website: Some(" https://alice.example ".to_string()),
                    about: Some("I make games".to_string()),
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.website.as_deref(), Some("https://alice.example"));
        assert_eq!(updated.about.as_deref(), Some("I make games"));

        let cleared = use_case
            .update_settings(
                user.id,
                SettingsInput {
                    website: Some("  ".to_string()),
                    about: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(cleared.website, None);
        assert_eq!(cleared.about, None);
    }

    #[tokio::test]
    async fn test_update_settings_validates() {
        let users = Arc::new(InMemoryUserRepository::default());
        let user = users.add_user("alice", "correct horse", None).await;
        let use_case = SettingsUseCaseImpl::new(users);

        assert_eq!(
            use_case
                .update_settings(
                    user.id,
                    SettingsInput {
                        website: Some("not a url".to_string()),
                        about: None,
                    },
                )
                .await
                .unwrap_err(),
            SettingsError::Invalid("Website must be a valid URL".to_string())
        );
        assert!(matches!(
            use_case
                .update_settings(
                    user.id,
                    SettingsInput {
                        website: None,
                        about: Some("a".repeat(MAX_ABOUT_LEN + 1)),
                    },
                )
                .await,
            Err(SettingsError::Invalid(_))
        ));
    }

    #[tokio::test]
    async fn test_unknown_user() {
        let use_case = SettingsUseCaseImpl::new(Arc::new(InMemoryUserRepository::default()));
        assert_eq!(
            use_case.get_settings(UserId(99)).await.unwrap_err(),
            SettingsError::UserNotFound
        );
    }
}
