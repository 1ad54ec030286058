use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{UserId, user::User};

/// How long a password-verified login waits for its TOTP code.
pub const PENDING_LOGIN_TTL_SECS: i64 = 5 * 60;

/// Wrong TOTP codes a pending login tolerates before it is dropped.
pub const MAX_TOTP_ATTEMPTS: u32 = 5;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PendingLogin {
    pub user_id: i32,
    pub username: String,
    pub remember: bool,
    pub next: Option<String>,
    pub started_at: DateTime<Utc>,
    #[serde(default)]
    pub failed_attempts: u32,
}

impl PendingLogin {
    pub fn new(user: &User, remember: bool, next: Option<String>, now: DateTime<Utc>) -> Self {
        Self {
            user_id: user.id.0,
            username: user.username.clone(),
            remember,
            next,
            started_at: now,
            failed_attempts: 0,
        }
    }

    pub fn user_id(&self) -> UserId {
        UserId(self.user_id)
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now - self.started_at > Duration::seconds(PENDING_LOGIN_TTL_SECS)
    }

    /// Counts a wrong code. Returns false once the login has used up its attempts.
    pub fn record_failed_attempt(&mut self) -> bool {
        self.failed_attempts += 1;
        self.failed_attempts < MAX_TOTP_ATTEMPTS
    }
}

/// Authentication state carried by a session.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub enum AuthState {
    #[default]
    Anonymous,
    PendingTwoFactor(PendingLogin),
    Authenticated {
        user_id: i32,
    },
}

impl AuthState {
    pub fn authenticated(user_id: UserId) -> Self {
        AuthState::Authenticated { user_id: user_id.0 }
    }

    pub fn user_id(&self) -> Option<UserId> {
        match self {
            AuthState::Authenticated { user_id } => Some(UserId(*user_id)),
            _ => None,
        }
    }

    pub fn pending(&self) -> Option<&PendingLogin> {
        match self {
            AuthState::PendingTwoFactor(pending) => Some(pending),
            _ => None,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, AuthState::Authenticated { .. })
    }
}

pub enum LoginOutcome {
    Authenticated {
        user: User,
        remember: bool,
        next: Option<String>,
    },
    TwoFactorRequired(PendingLogin),
}

impl From<&LoginOutcome> for AuthState {
    fn from(outcome: &LoginOutcome) -> Self {
        match outcome {
            LoginOutcome::Authenticated { user, .. } => AuthState::authenticated(user.id),
            LoginOutcome::TwoFactorRequired(pending) => {
                AuthState::PendingTwoFactor(pending.clone())
            }
        }
    }
}

/// Only local absolute paths are followed after login.
pub fn safe_next_page(next: Option<&str>) -> String {
    match next.map(str::trim) {
        Some(next)
            if next.starts_with('/')
                && !next.starts_with("//")
                && !next.starts_with("/\\")
                && !next.contains("://") =>
        {
            next.to_string()
        }
        _ => "/".to_string(),
    }
}
