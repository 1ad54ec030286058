use std::sync::Arc;

use crate::domain::{
    RepoRetrieveError,
    game::{Game, GameRepository},
    user::{User, UserRepository},
};

pub const PROFILE_AVATAR_SIZE: u32 = 128;

#[derive(Clone, Debug)]
pub struct Profile {
    pub user: User,
    pub avatar: String,
    pub games: Vec<Game>,
}

#[async_trait::async_trait]
pub trait ProfileUseCase {
    async fn get_profile(&self, username: &str) -> Result<Profile, ProfileError>;
}

#[derive(Debug, PartialEq)]
pub enum ProfileError {
    NotFound,
    Internal,
}

pub struct ProfileUseCaseImpl<U: UserRepository, G: GameRepository> {
    user_repository: Arc<U>,
    game_repository: Arc<G>,
}

impl<U: UserRepository, G: GameRepository> ProfileUseCaseImpl<U, G> {
    pub fn new(user_repository: Arc<U>, game_repository: Arc<G>) -> Self {
        Self {
            user_repository,
            game_repository,
        }
    }
}

#[async_trait::async_trait]
impl<U: UserRepository + Send + Sync + 'static, G: GameRepository + Send + Sync + 'static>
    ProfileUseCase for ProfileUseCaseImpl<U, G>
{
    async fn get_profile(&self, username: &str) -> Result<Profile, ProfileError> {
        let user = match self.user_repository.get_user_by_username(username).await {
            Ok(user) => user,
            Err(RepoRetrieveError::NotFound) => return Err(ProfileError::NotFound),
            Err(RepoRetrieveError::StorageError(e)) => {
                log::error!("Failed to load user {}: {}", username, e);
                return Err(ProfileError::Internal);
            }
        };
        let games = self
            .game_repository
            .list_games_by_creator(user.id)
            .await
            .map_err(|e| {
                log::error!("Failed to list games of user {}: {}", user.id, e);
                ProfileError::Internal
            })?;
        Ok(Profile {
            avatar: user.avatar(PROFILE_AVATAR_SIZE),
            user,
            games,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        domain::game::GameDraft,
        testing::{InMemoryGameRepository, InMemoryUserRepository},
    };

    #[tokio::test]
    async fn test_profile_lists_own_games() {
        let users = Arc::new(InMemoryUserRepository::default());
        let games = Arc::new(InMemoryGameRepository::default());
        let alice = users.add_user("alice", "correct horse", None).await;
        let bob = users.add_user("bob", "correct horse", None).await;
        games
            .create_game(GameDraft::new("Space Frogs", None, None), alice.id)
            .await
            .unwrap();
        games
            .create_game(GameDraft::new("Bob's Game", None, None), bob.id)
            .await
            .unwrap();
        let use_case = ProfileUseCaseImpl::new(users, games);

        let profile = use_case.get_profile("alice").await.unwrap();
        assert_eq!(profile.user.id, alice.id);
        assert_eq!(profile.avatar, alice.avatar(PROFILE_AVATAR_SIZE));
        assert_eq!(profile.games.len(), 1);
        assert_eq!(profile.games[0].title, "Space Frogs");

        assert_eq!(
            use_case.get_profile("nobody").await.unwrap_err(),
            ProfileError::NotFound
        );
    }
}
