use axum::{
    Form, Json,
    extract::{Path, State},
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use scratch_app::{
    domain::two_factor::current_unix_time,
    workflow::account::{
        change_password::ChangePasswordError,
        export_data::ExportDataError,
        profile::ProfileError,
        settings::{SettingsError, SettingsInput},
        two_factor::TwoFactorUseCaseError,
    },
};
use serde::Serialize;
use validator::Validate;

use crate::{
    AppState, ServiceError,
    extract::{CurrentUser, MaybeUser},
    forms::{PasswordForm, SettingsForm, TwoFactorAction, TwoFactorForm, validation_messages},
    page::{Empty, Page, back_with_error, back_with_errors, redirect_with_flash, render},
    session::Session,
    views::{GameSummaryView, TaskView},
};

const TWO_FACTOR_PATH: &str = "/settings/two-factor-auth";

#[derive(Serialize, Debug)]
pub struct ProfilePage {
    username: String,
    avatar: String,
    website: Option<String>,
    about: Option<String>,
    member_since: DateTime<Utc>,
    games: Vec<GameSummaryView>,
    is_own_profile: bool,
}

pub async fn profile(
    MaybeUser(viewer): MaybeUser,
    session: Session,
    State(app_state): State<AppState>,
    Path(username): Path<String>,
) -> Result<Json<Page<ProfilePage>>, ServiceError> {
    let profile = app_state
        .app
        .profile_use_case
        .get_profile(&username)
        .await
        .map_err(|e| match e {
            ProfileError::NotFound => {
                ServiceError::NotFound(format!("User '{}' not found", username))
            }
            ProfileError::Internal => ServiceError::Internal("Failed to load profile".to_string()),
        })?;

    let data = ProfilePage {
        is_own_profile: viewer.as_ref().map(|v| v.id) == Some(profile.user.id),
        username: profile.user.username,
        avatar: profile.avatar,
        website: profile.user.website,
        about: profile.user.about,
        member_since: profile.user.created_at,
        games: profile.games.into_iter().map(Into::into).collect(),
    };
    Ok(render(&session, viewer.as_ref(), data))
}

#[derive(Serialize, Debug)]
pub struct SettingsPage {
    username: String,
    email: String,
    website: Option<String>,
    about: Option<String>,
    two_factor_enabled: bool,
}

pub async fn settings_page(
    CurrentUser(user): CurrentUser,
    session: Session,
) -> Json<Page<SettingsPage>> {
    let data = SettingsPage {
        username: user.username.clone(),
        email: user.email.clone(),
        website: user.website.clone(),
        about: user.about.clone(),
        two_factor_enabled: user.is_2fa_enabled,
    };
    render(&session, Some(&user), data)
}

pub async fn update_settings(
    CurrentUser(user): CurrentUser,
    session: Session,
    State(app_state): State<AppState>,
    Form(form): Form<SettingsForm>,
) -> Result<Response, ServiceError> {
    let input = SettingsInput::normalized(form.website, form.about);
    if let Err(errors) = input.validate() {
        return Ok(back_with_errors(
            &session,
            "/settings",
            validation_messages(&errors),
        ));
    }

    match app_state
        .app
        .settings_use_case
        .update_settings(user.id, input)
        .await
    {
        Ok(_) => Ok(redirect_with_flash(
            &session,
            "/settings",
            "Your changes have been saved",
        )),
        Err(SettingsError::Invalid(message)) => Ok(back_with_error(&session, "/settings", message)),
        Err(SettingsError::UserNotFound) | Err(SettingsError::Internal) => Err(
            ServiceError::Internal("Failed to save settings".to_string()),
        ),
    }
}

pub async fn password_page(
    CurrentUser(user): CurrentUser,
    session: Session,
) -> Json<Page<Empty>> {
    render(&session, Some(&user), Empty::default())
}

pub async fn change_password(
    CurrentUser(user): CurrentUser,
    session: Session,
    State(app_state): State<AppState>,
    Form(form): Form<PasswordForm>,
) -> Result<Response, ServiceError> {
    const BACK: &str = "/settings/password";
    if let Err(errors) = form.validate() {
        return Ok(back_with_errors(&session, BACK, validation_messages(&errors)));
    }

    match app_state
        .app
        .change_password_use_case
        .change_password(user.id, &form.current_password, &form.new_password)
        .await
    {
        Ok(()) => Ok(redirect_with_flash(
            &session,
            BACK,
            "Your password has been successfully changed",
        )),
        Err(ChangePasswordError::IncorrectPassword) => Ok(back_with_error(
            &session,
            BACK,
            "Current password is incorrect",
        )),
        Err(ChangePasswordError::Invalid(message)) => Ok(back_with_error(&session, BACK, message)),
        Err(ChangePasswordError::Internal) => Err(ServiceError::Internal(
            "Failed to change password".to_string(),
        )),
    }
}

#[derive(Serialize, Debug)]
pub struct TwoFactorPage {
    enabled: bool,
    secret: String,
    otpauth_url: String,
}

pub async fn two_factor_page(
    CurrentUser(user): CurrentUser,
    session: Session,
    State(app_state): State<AppState>,
) -> Result<Json<Page<TwoFactorPage>>, ServiceError> {
    let setup = app_state
        .app
        .two_factor_use_case
        .get_setup(user.id)
        .await
        .map_err(|_| ServiceError::Internal("Failed to set up two-factor auth".to_string()))?;
    let data = TwoFactorPage {
        enabled: setup.enabled,
        secret: setup.provisioning.secret,
        otpauth_url: setup.provisioning.otpauth_url,
    };
    Ok(render(&session, Some(&user), data))
}

pub async fn two_factor(
    CurrentUser(user): CurrentUser,
    session: Session,
    State(app_state): State<AppState>,
    Form(form): Form<TwoFactorForm>,
) -> Result<Response, ServiceError> {
    if let Err(errors) = form.validate() {
        return Ok(back_with_errors(
            &session,
            TWO_FACTOR_PATH,
            validation_messages(&errors),
        ));
    }

    let use_case = &app_state.app.two_factor_use_case;
    let now = current_unix_time();
    let (result, done) = match form.action {
        TwoFactorAction::Enable => (
            use_case.enable(user.id, &form.token, now).await,
            "Two-factor authentication has been enabled",
        ),
        TwoFactorAction::Disable => (
            use_case.disable(user.id, &form.token, now).await,
            "Two-factor authentication has been disabled",
        ),
    };
    match result {
        Ok(()) => Ok(redirect_with_flash(&session, TWO_FACTOR_PATH, done)),
        Err(TwoFactorUseCaseError::InvalidToken) => {
            Ok(back_with_error(&session, TWO_FACTOR_PATH, "Invalid token"))
        }
        Err(TwoFactorUseCaseError::NotProvisioned) => Ok(back_with_error(
            &session,
            TWO_FACTOR_PATH,
            "Two-factor authentication has not been set up yet",
        )),
        Err(TwoFactorUseCaseError::Internal) => Err(ServiceError::Internal(
            "Failed to update two-factor auth".to_string(),
        )),
    }
}

pub async fn export_data(
    CurrentUser(user): CurrentUser,
    session: Session,
    State(app_state): State<AppState>,
) -> Result<Response, ServiceError> {
    let profile = format!("/user/{}", user.username);
    match app_state
        .app
        .export_data_use_case
        .request_export(user.id)
        .await
    {
        Ok(_) => Ok(redirect_with_flash(&session, &profile, "Exporting data...")),
        Err(ExportDataError::AlreadyInProgress) => Ok(back_with_error(
            &session,
            &profile,
            "An export task is currently in progress",
        )),
        Err(ExportDataError::Internal) => {
            Err(ServiceError::Internal("Failed to start export".to_string()))
        }
    }
}

pub async fn tasks(
    CurrentUser(user): CurrentUser,
    session: Session,
    State(app_state): State<AppState>,
) -> Result<impl IntoResponse, ServiceError> {
    let tasks = app_state
        .app
        .export_data_use_case
        .tasks_in_progress(user.id)
        .await
        .map_err(|_| ServiceError::Internal("Failed to load tasks".to_string()))?;
    let tasks: Vec<TaskView> = tasks.into_iter().map(Into::into).collect();
    Ok(render(&session, Some(&user), tasks))
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use scratch_app::testing::totp_code;

    use crate::testing::TestApp;

    #[tokio::test]
    async fn test_update_settings() {
        let app = TestApp::new();
        let client = app.logged_in("alice").await;
        let response = client
            .post_form(
                "/settings",
                "website=https%3A%2F%2Fexample.com&about=+Makes+games+",
            )
            .await;
        assert_eq!(response.location.as_deref(), Some("/settings"));

        let page = client.get("/settings").await;
        assert_eq!(page.flashes(), vec!["Your changes have been saved"]);
        assert_eq!(page.json["data"]["website"], "https://example.com");
        assert_eq!(page.json["data"]["about"], "Makes games");
    }

    #[tokio::test]
    async fn test_invalid_website_is_rejected() {
        let app = TestApp::new();
        let client = app.logged_in("alice").await;
        client.post_form("/settings", "website=not+a+url").await;

        let page = client.get("/settings").await;
        assert_eq!(page.flashes(), vec!["Website must be a valid URL"]);
        assert!(page.json["data"]["website"].is_null());
    }

    #[tokio::test]
    async fn test_change_password_checks_current_password() {
        let app = TestApp::new();
        let client = app.logged_in("alice").await;
        client
            .post_form(
                "/settings/password",
                "current_password=wrong+horse&new_password=battery+staple&confirm_password=battery+staple",
            )
            .await;
        assert_eq!(
            client.get("/settings/password").await.flashes(),
            vec!["Current password is incorrect"]
        );

        client
            .post_form(
                "/settings/password",
                "current_password=correct+horse&new_password=battery+staple&confirm_password=battery+staple",
            )
            .await;
        assert_eq!(
            client.get("/settings/password").await.flashes(),
            vec!["Your password has been successfully changed"]
        );
    }

    #[tokio::test]
    async fn test_profile_lookup() {
        let app = TestApp::new();
        let client = app.logged_in("alice").await;

        let page = client.get("/user/alice").await;
        assert_eq!(page.status, StatusCode::OK);
        assert_eq!(page.json["data"]["username"], "alice");
        assert_eq!(page.json["data"]["is_own_profile"], true);

        let missing = client.get("/user/nobody").await;
        assert_eq!(missing.status, StatusCode::NOT_FOUND);
        assert_eq!(missing.json["error"], "User 'nobody' not found");
    }

    #[tokio::test]
    async fn test_enable_two_factor() {
        let app = TestApp::new();
        let client = app.logged_in("alice").await;

        let page = client.get("/settings/two-factor-auth").await;
        assert_eq!(page.json["data"]["enabled"], false);
        let secret = page.json["data"]["secret"].as_str().unwrap().to_string();

        let code = totp_code(&secret, chrono::Utc::now().timestamp() as u64);
        let response = client
            .post_form(
                "/settings/two-factor-auth",
                &format!("action=enable&token={}", code),
            )
            .await;
        assert_eq!(response.location.as_deref(), Some("/settings/two-factor-auth"));

        let page = client.get("/settings/two-factor-auth").await;
        assert_eq!(
            page.flashes(),
            vec!["Two-factor authentication has been enabled"]
        );
        assert_eq!(page.json["data"]["enabled"], true);
        assert_eq!(page.json["data"]["secret"], secret.as_str());
    }

    #[tokio::test]
    async fn test_export_data_redirects_to_profile() {
        let app = TestApp::new();
        let client = app.logged_in("alice").await;
        let response = client.post_form("/export_data", "").await;
        assert_eq!(response.location.as_deref(), Some("/user/alice"));
        assert_eq!(
            client.get("/user/alice").await.flashes(),
            vec!["Exporting data..."]
        );
        assert!(client.get("/tasks").await.json["data"].is_array());
    }
}
