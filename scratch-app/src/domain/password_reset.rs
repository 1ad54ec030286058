use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use crate::domain::UserId;

pub const PASSWORD_RESET_TOKEN_TTL_SECS: i64 = 10 * 60;

#[derive(Debug, Serialize, Deserialize)]
struct ResetClaims {
    reset_password: i32,
    exp: usize,
}

struct Keys {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl Keys {
    fn new(secret: &[u8]) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ResetTokenError {
    #[error("Failed to sign reset token: {0}")]
    Sign(String),
}

pub struct PasswordResetTokens {
    keys: Keys,
}

impl PasswordResetTokens {
    pub fn new(secret_key: &str) -> Self {
        Self {
            keys: Keys::new(secret_key.as_bytes()),
        }
    }

    pub fn issue(&self, user_id: UserId, now_unix: i64) -> Result<String, ResetTokenError> {
        let claims = ResetClaims {
            reset_password: user_id.0,
            exp: (now_unix + PASSWORD_RESET_TOKEN_TTL_SECS).max(0) as usize,
        };
        encode(&Header::default(), &claims, &self.keys.encoding)
            .map_err(|e| ResetTokenError::Sign(e.to_string()))
    }

    /// Returns the user the token was issued for, if it is authentic and not expired.
    pub fn verify(&self, token: &str) -> Option<UserId> {
        let mut validation = Validation::default();
        validation.leeway = 0;
        match decode::<ResetClaims>(token, &self.keys.decoding, &validation) {
            Ok(data) => Some(UserId(data.claims.reset_password)),
            Err(e) => {
                log::debug!("Rejected password reset token: {}", e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_roundtrip() {
        let tokens = PasswordResetTokens::new("secret");
        let token = tokens.issue(UserId(42), chrono::Utc::now().timestamp()).unwrap();
        assert_eq!(tokens.verify(&token), Some(UserId(42)));
    }

    #[test]
    fn test_expired_token_is_rejected() {
        let tokens = PasswordResetTokens::new("secret");
        let issued = chrono::Utc::now().timestamp() - PASSWORD_RESET_TOKEN_TTL_SECS - 60;
        let token = tokens.issue(UserId(42), issued).unwrap();
        assert_eq!(tokens.verify(&token), None);
    }

    #[test]
    fn test_token_from_other_key_is_rejected() {
        let token = PasswordResetTokens::new("other")
            .issue(UserId(42), chrono::Utc::now().timestamp())
            .unwrap();
        assert_eq!(PasswordResetTokens::new("secret").verify(&token), None);
        assert_eq!(PasswordResetTokens::new("secret").verify("garbage"), None);
    }
}
