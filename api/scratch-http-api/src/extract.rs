use axum::{
    extract::FromRequestParts,
    http::request::Parts,
    response::{IntoResponse, Redirect, Response},
};
use scratch_app::{
    domain::{UserId, user::User},
    workflow::account::settings::SettingsError,
};

use crate::{AppState, ServiceError, session::Session};

pub const LOGIN_REQUIRED_MESSAGE: &str = "Please login to access this page";

/// The logged in user. Anonymous requests are sent to the login page.
pub struct CurrentUser(pub User);

/// The logged in user, if any.
pub struct MaybeUser(pub Option<User>);

async fn load_user(
    parts: &mut Parts,
    app_state: &AppState,
) -> Result<(Session, Option<User>), ServiceError> {
    let session = Session::from_request_parts(parts, app_state).await?;
    let Some(user_id) = session.auth().user_id() else {
        return Ok((session, None));
    };
    let user = find_user(app_state, user_id).await?;
    if user.is_none() {
        // The account is gone; drop the stale login.
        session.log_out();
    }
    Ok((session, user))
}

async fn find_user(app_state: &AppState, user_id: UserId) -> Result<Option<User>, ServiceError> {
    match app_state.app.settings_use_case.get_settings(user_id).await {
        Ok(user) => Ok(Some(user)),
        Err(SettingsError::UserNotFound) => Ok(None),
        Err(_) => Err(ServiceError::Internal(format!(
            "Failed to load user {}",
            user_id
        ))),
    }
}

pub fn login_path(next: Option<&str>) -> String {
    match next {
        Some(next) => {
            let next: String = url::form_urlencoded::byte_serialize(next.as_bytes()).collect();
            format!("/login?next={}", next)
        }
        None => "/login".to_string(),
    }
}

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = Response;

    async fn from_request_parts(
        parts: &mut Parts,
        app_state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        match load_user(parts, app_state).await {
            Ok((_, Some(user))) => Ok(CurrentUser(user)),
            Ok((session, None)) => {
                session.flash_error(LOGIN_REQUIRED_MESSAGE);
                let next = parts
                    .uri
                    .path_and_query()
                    .map(|p| p.as_str())
                    .unwrap_or("/");
                Err(Redirect::to(&login_path(Some(next))).into_response())
            }
            Err(e) => Err(e.into_response()),
        }
    }
}

impl FromRequestParts<AppState> for MaybeUser {
    type Rejection = ServiceError;

    async fn from_request_parts(
        parts: &mut Parts,
        app_state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let (_, user) = load_user(parts, app_state).await?;
        Ok(MaybeUser(user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_login_path_encodes_next() {
        assert_eq!(
            login_path(Some("/game/1/edit?x=1&y=2")),
            "/login?next=%2Fgame%2F1%2Fedit%3Fx%3D1%26y%3D2"
        );
        assert_eq!(login_path(None), "/login");
    }
}
