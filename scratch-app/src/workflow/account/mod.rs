use std::sync::Arc;

use crate::domain::user::{PasswordError, PasswordHasher};

pub mod change_password;
pub mod export_data;
pub mod login;
pub mod profile;
pub mod register;
pub mod reset_password;
pub mod settings;
pub mod two_factor;
pub mod verify_totp;

pub(crate) async fn hash_password<H: PasswordHasher + Send + Sync + 'static>(
    hasher: &Arc<H>,
    password: &str,
) -> Result<String, PasswordError> {
    let hasher = hasher.clone();
    let password = password.to_string();
    tokio::task::spawn_blocking(move || hasher.hash_password(&password))
        .await
        .map_err(|e| PasswordError::Hash(e.to_string()))?
}

pub(crate) async fn verify_password<H: PasswordHasher + Send + Sync + 'static>(
    hasher: &Arc<H>,
    password: &str,
    password_hash: &str,
) -> bool {
    let hasher = hasher.clone();
    let password = password.to_string();
    let password_hash = password_hash.to_string();
    match tokio::task::spawn_blocking(move || hasher.verify_password(&password, &password_hash))
        .await
    {
        Ok(valid) => valid,
        Err(e) => {
            log::error!("Password verification task failed: {}", e);
            false
        }
    }
}
