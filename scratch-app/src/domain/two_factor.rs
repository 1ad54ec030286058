use dashmap::DashMap;
use totp_rs::{Algorithm, Secret, TOTP};

use crate::domain::UserId;

pub const TOTP_DIGITS: usize = 6;
pub const TOTP_STEP_SECS: u64 = 30;
/// Steps accepted on either side of the current one.
pub const TOTP_VALID_WINDOW: u64 = 1;

#[derive(Clone, Debug, PartialEq)]
pub struct TotpProvisioning {
    pub secret: String,
    pub otpauth_url: String,
}

#[derive(Debug, thiserror::Error)]
pub enum TwoFactorError {
    #[error("Invalid TOTP secret: {0}")]
    InvalidSecret(String),
}

pub trait TwoFactorService {
    fn generate_secret(&self) -> Result<String, TwoFactorError>;
    fn provisioning(&self, secret: &str, username: &str)
    -> Result<TotpProvisioning, TwoFactorError>;
    /// Checks `token` against `secret` at `unix_time`. A step accepted once for a user
    /// cannot be accepted again, nor can any step before it.
    fn verify(
        &self,
        user_id: UserId,
        secret: &str,
        token: &str,
        unix_time: u64,
    ) -> Result<bool, TwoFactorError>;
}

pub struct TotpTwoFactorService {
    issuer: String,
    last_used_step: DashMap<UserId, u64>,
}

impl TotpTwoFactorService {
    pub fn new(issuer: &str) -> Self {
        Self {
            issuer: issuer.replace(':', ""),
            last_used_step: DashMap::new(),
        }
    }

    fn totp(&self, secret: Vec<u8>, account_name: &str) -> Result<TOTP, TwoFactorError> {
        TOTP::new(
            Algorithm::SHA1,
            TOTP_DIGITS,
            0,
            TOTP_STEP_SECS,
            secret,
            Some(self.issuer.clone()),
            account_name.to_string(),
        )
        .map_err(|e| TwoFactorError::InvalidSecret(e.to_string()))
    }

    fn decode_secret(secret: &str) -> Result<Vec<u8>, TwoFactorError> {
        Secret::Encoded(secret.to_string())
            .to_bytes()
            .map_err(|e| TwoFactorError::InvalidSecret(format!("{:?}", e)))
    }
}

pub fn normalize_token(token: &str) -> Option<String> {
    let token: String = token.chars().filter(|c| !c.is_whitespace()).collect();
    if token.len() == TOTP_DIGITS && token.chars().all(|c| c.is_ascii_digit()) {
        Some(token)
    } else {
        None
    }
}

impl TwoFactorService for TotpTwoFactorService {
    fn generate_secret(&self) -> Result<String, TwoFactorError> {
        let raw = Secret::generate_secret()
            .to_bytes()
            .map_err(|e| TwoFactorError::InvalidSecret(format!("{:?}", e)))?;
        Ok(self.totp(raw, "scratch")?.get_secret_base32())
    }

    fn provisioning(
        &self,
        secret: &str,
        username: &str,
    ) -> Result<TotpProvisioning, TwoFactorError> {
        let totp = self.totp(Self::decode_secret(secret)?, username)?;
        Ok(TotpProvisioning {
            secret: totp.get_secret_base32(),
            otpauth_url: totp.get_url(),
        })
    }

    fn verify(
        &self,
        user_id: UserId,
        secret: &str,
        token: &str,
        unix_time: u64,
    ) -> Result<bool, TwoFactorError> {
        let Some(token) = normalize_token(token) else {
            return Ok(false);
        };
        let totp = self.totp(Self::decode_secret(secret)?, "scratch")?;

        let current_step = unix_time / TOTP_STEP_SECS;
        let first_step = current_step.saturating_sub(TOTP_VALID_WINDOW);
        let Some(matched_step) = (first_step..=current_step + TOTP_VALID_WINDOW)
            .find(|step| totp.check(&token, step * TOTP_STEP_SECS))
        else {
            return Ok(false);
        };

        let mut last_used = self.last_used_step.entry(user_id).or_insert(0);
        if matched_step <= *last_used {
            log::warn!("Rejected replayed TOTP code for user {}", user_id);
            return Ok(false);
        }
        *last_used = matched_step;
        Ok(true)
    }
}

pub fn current_unix_time() -> u64 {
    chrono::Utc::now().timestamp().max(0) as u64
}
