use chrono::{DateTime, Utc};
use validator::Validate;

use crate::domain::{RepoCreateError, RepoRetrieveError, RepoUpdateError, UserId};

pub const MAX_USERNAME_LEN: usize = 64;
pub const MAX_EMAIL_LEN: usize = 128;
pub const MAX_ABOUT_LEN: usize = 1000;
pub const MIN_PASSWORD_LEN: usize = 8;

#[derive(Clone, Debug)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub website: Option<String>,
    pub about: Option<String>,
    pub totp_secret: Option<String>,
    pub is_2fa_enabled: bool,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn avatar(&self, size: u32) -> String {
        let digest = md5::compute(self.email.to_lowercase().as_bytes());
        format!(
            "https://www.gravatar.com/avatar/{:x}?d=identicon&s={}",
            digest, size
        )
    }
}

pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
}

#[derive(Clone, Debug, Default)]
pub struct ProfileUpdate {
    pub website: Option<String>,
    pub about: Option<String>,
}

#[async_trait::async_trait]
pub trait UserRepository {
    async fn create_user(&self, new_user: NewUser) -> Result<User, RepoCreateError>;
    async fn get_user(&self, user_id: UserId) -> Result<User, RepoRetrieveError>;
    async fn get_user_by_username(&self, username: &str) -> Result<User, RepoRetrieveError>;
    async fn get_user_by_email(&self, email: &str) -> Result<User, RepoRetrieveError>;
    async fn update_profile(
        &self,
        user_id: UserId,
        update: ProfileUpdate,
    ) -> Result<(), RepoUpdateError>;
    async fn update_password_hash(
        &self,
        user_id: UserId,
        password_hash: String,
    ) -> Result<(), RepoUpdateError>;
    /// Stores `secret` unless the user already has one and returns the secret in effect.
    async fn set_totp_secret_if_absent(
        &self,
        user_id: UserId,
        secret: String,
    ) -> Result<String, RepoUpdateError>;
    async fn set_two_factor_enabled(
        &self,
        user_id: UserId,
        enabled: bool,
    ) -> Result<(), RepoUpdateError>;
}

#[derive(Debug, thiserror::Error)]
pub enum PasswordError {
    #[error("Failed to hash password: {0}")]
    Hash(String),
}

pub trait PasswordHasher {
    fn hash_password(&self, password: &str) -> Result<String, PasswordError>;
    fn verify_password(&self, password: &str, password_hash: &str) -> bool;
}

pub const MIN_BCRYPT_COST: u32 = 4;
pub const MAX_BCRYPT_COST: u32 = 31;

pub struct BcryptPasswordHasher {
    cost: u32,
}

impl BcryptPasswordHasher {
    pub fn new(cost: u32) -> Self {
        Self {
            cost: cost.clamp(MIN_BCRYPT_COST, MAX_BCRYPT_COST),
        }
    }
}

impl Default for BcryptPasswordHasher {
    fn default() -> Self {
        Self::new(bcrypt::DEFAULT_COST)
    }
}

impl PasswordHasher for BcryptPasswordHasher {
    fn hash_password(&self, password: &str) -> Result<String, PasswordError> {
        bcrypt::hash(password, self.cost).map_err(|e| PasswordError::Hash(e.to_string()))
    }

    fn verify_password(&self, password: &str, password_hash: &str) -> bool {
        match bcrypt::verify(password, password_hash) {
            Ok(valid) => valid,
            Err(e) => {
                log::warn!("Stored password hash could not be verified: {}", e);
                false
            }
        }
    }
}

#[derive(Validate)]
struct EmailValidator {
    #[validate(email, length(max = 128))]
    email: String,
}

pub fn validate_email(email: &str) -> Result<String, String> {
    let validator = EmailValidator {
        email: email.trim().to_string(),
    };
    if validator.validate().is_err() {
        return Err("Invalid email address".to_string());
    }
    Ok(validator.email)
}

pub fn validate_username(username: &str) -> Result<String, String> {
    let username = username.trim();
    if username.is_empty() {
        return Err("Username is required".to_string());
    }
    if username.chars().count() > MAX_USERNAME_LEN {
        return Err(format!(
            "Username must be at most {} characters",
            MAX_USERNAME_LEN
        ));
    }
    if !username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '.')
    {
        return Err(
            "Username may only contain letters, digits, '.', '_' and '-'".to_string(),
        );
    }
    Ok(username.to_string())
}

pub fn validate_password(password: &str) -> Result<(), String> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LEN
        ));
    }
    Ok(())
}
