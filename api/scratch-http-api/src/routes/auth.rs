use axum::{
    Form,
    extract::{Path, Query, State},
    response::{IntoResponse, Redirect, Response},
};
use log::warn;
use scratch_app::{
    domain::login::{AuthState, LoginOutcome, safe_next_page},
    workflow::account::{
        login::{LoginError, LoginInput},
        register::{RegisterError, RegisterInput},
        reset_password::ResetPasswordError,
        verify_totp::VerifyTotpError,
    },
};
use serde::Serialize;
use validator::Validate;

use crate::{
    AppState, ServiceError,
    extract::{MaybeUser, login_path},
    forms::{
        LoginForm, NextQuery, RegisterForm, ResetPasswordForm, ResetPasswordRequestForm, TotpForm,
        validation_messages,
    },
    page::{Empty, back_with_error, back_with_errors, redirect_with_flash, render},
    session::Session,
};

pub const VERIFY_TOTP_PATH: &str = "/login/verify-totp";

#[derive(Serialize, Debug)]
pub struct LoginPage {
    next: Option<String>,
}

pub async fn login_page(
    MaybeUser(user): MaybeUser,
    session: Session,
    Query(query): Query<NextQuery>,
) -> Response {
    if user.is_some() {
        return Redirect::to("/").into_response();
    }
    render(&session, None, LoginPage { next: query.next }).into_response()
}

pub async fn login(
    MaybeUser(user): MaybeUser,
    session: Session,
    State(app_state): State<AppState>,
    Query(query): Query<NextQuery>,
    Form(form): Form<LoginForm>,
) -> Result<Response, ServiceError> {
    if user.is_some() {
        return Ok(Redirect::to("/").into_response());
    }
    let back = login_path(query.next.as_deref());
    if let Err(errors) = form.validate() {
        return Ok(back_with_errors(&session, &back, validation_messages(&errors)));
    }

    let remember = form.remember.is_some();
    let outcome = app_state
        .app
        .login_use_case
        .login(
            LoginInput {
                username: form.username,
                password: form.password,
                remember,
                next: query.next,
            },
            chrono::Utc::now(),
        )
        .await;

    match outcome {
        Ok(outcome) => {
            session.set_auth(AuthState::from(&outcome), remember);
            match outcome {
                LoginOutcome::Authenticated { next, .. } => {
                    Ok(Redirect::to(&safe_next_page(next.as_deref())).into_response())
                }
                LoginOutcome::TwoFactorRequired(_) => {
                    Ok(Redirect::to(VERIFY_TOTP_PATH).into_response())
                }
            }
        }
        Err(LoginError::InvalidCredentials) => Ok(back_with_error(
            &session,
            &back,
            "Invalid username or password",
        )),
        Err(LoginError::Internal) => Err(ServiceError::Internal("Login failed".to_string())),
    }
}

#[derive(Serialize, Debug)]
pub struct VerifyTotpPage {
    username: String,
}

pub async fn verify_totp_page(session: Session) -> Response {
    let Some(pending) = session.auth().pending().cloned() else {
        return Redirect::to("/login").into_response();
    };
    render(
        &session,
        None,
        VerifyTotpPage {
            username: pending.username,
        },
    )
    .into_response()
}

pub async fn verify_totp(
    session: Session,
    State(app_state): State<AppState>,
    Form(form): Form<TotpForm>,
) -> Result<Response, ServiceError> {
    let Some(mut pending) = session.auth().pending().cloned() else {
        return Ok(Redirect::to("/login").into_response());
    };
    if let Err(errors) = form.validate() {
        return Ok(back_with_errors(
            &session,
            VERIFY_TOTP_PATH,
            validation_messages(&errors),
        ));
    }

    match app_state
        .app
        .verify_totp_use_case
        .verify_totp(&pending, &form.token, chrono::Utc::now())
        .await
    {
        Ok(user) => {
            session.set_auth(AuthState::authenticated(user.id), pending.remember);
            Ok(Redirect::to(&safe_next_page(pending.next.as_deref())).into_response())
        }
        Err(VerifyTotpError::InvalidToken) => {
            if pending.record_failed_attempt() {
                session.update_auth(AuthState::PendingTwoFactor(pending));
                return Ok(back_with_error(&session, VERIFY_TOTP_PATH, "Invalid token"));
            }
            warn!(
                "Too many invalid TOTP codes for user {}, dropping pending login",
                pending.username
            );
            session.log_out();
            Ok(back_with_error(
                &session,
                "/login",
                "Too many invalid tokens, please log in again",
            ))
        }
        Err(VerifyTotpError::Expired) => {
            session.log_out();
            Ok(back_with_error(
                &session,
                "/login",
                "Your login has expired, please log in again",
            ))
        }
        Err(VerifyTotpError::Internal) => Err(ServiceError::Internal(
            "Two-factor verification failed".to_string(),
        )),
    }
}

pub async fn register_page(MaybeUser(user): MaybeUser, session: Session) -> Response {
    if user.is_some() {
        return Redirect::to("/").into_response();
    }
    render(&session, None, Empty::default()).into_response()
}

pub async fn register(
    MaybeUser(user): MaybeUser,
    session: Session,
    State(app_state): State<AppState>,
    Form(form): Form<RegisterForm>,
) -> Result<Response, ServiceError> {
    if user.is_some() {
        return Ok(Redirect::to("/").into_response());
    }
    if let Err(errors) = form.validate() {
        return Ok(back_with_errors(
            &session,
            "/register",
            validation_messages(&errors),
        ));
    }

    let result = app_state
        .app
        .register_use_case
        .register(RegisterInput {
            username: form.username,
            email: form.email,
            password: form.password,
        })
        .await;
    match result {
        Ok(user) => {
            session.set_auth(AuthState::authenticated(user.id), false);
            Ok(redirect_with_flash(&session, "/", "Your account has been created"))
        }
        Err(RegisterError::Invalid(message)) => {
            Ok(back_with_error(&session, "/register", message))
        }
        Err(RegisterError::UsernameTaken) => Ok(back_with_error(
            &session,
            "/register",
            "Username already exists",
        )),
        Err(RegisterError::EmailTaken) => {
            Ok(back_with_error(&session, "/register", "Email already exists"))
        }
        Err(RegisterError::Internal) => {
            Err(ServiceError::Internal("Registration failed".to_string()))
        }
    }
}

pub async fn logout(session: Session) -> Redirect {
    session.log_out();
    Redirect::to("/")
}

pub async fn reset_password_request_page(
    MaybeUser(user): MaybeUser,
    session: Session,
) -> Response {
    if user.is_some() {
        return Redirect::to("/").into_response();
    }
    render(&session, None, Empty::default()).into_response()
}

pub async fn reset_password_request(
    MaybeUser(user): MaybeUser,
    session: Session,
    State(app_state): State<AppState>,
    Form(form): Form<ResetPasswordRequestForm>,
) -> Result<Response, ServiceError> {
    if user.is_some() {
        return Ok(Redirect::to("/").into_response());
    }
    if let Err(errors) = form.validate() {
        return Ok(back_with_errors(
            &session,
            "/reset_password_request",
            validation_messages(&errors),
        ));
    }

    match app_state
        .app
        .reset_password_use_case
        .request_reset(&form.email)
        .await
    {
        Ok(()) => Ok(redirect_with_flash(
            &session,
            "/login",
            "Check your email for the instructions to reset your password",
        )),
        Err(ResetPasswordError::Invalid(message)) => {
            Ok(back_with_error(&session, "/reset_password_request", message))
        }
        Err(_) => Err(ServiceError::Internal(
            "Password reset request failed".to_string(),
        )),
    }
}

pub async fn reset_password_page(
    MaybeUser(user): MaybeUser,
    session: Session,
    State(app_state): State<AppState>,
    Path(token): Path<String>,
) -> Response {
    if user.is_some() || !app_state.app.reset_password_use_case.check_token(&token) {
        return Redirect::to("/").into_response();
    }
    render(&session, None, Empty::default()).into_response()
}

pub async fn reset_password(
    MaybeUser(user): MaybeUser,
    session: Session,
    State(app_state): State<AppState>,
    Path(token): Path<String>,
    Form(form): Form<ResetPasswordForm>,
) -> Result<Response, ServiceError> {
    if user.is_some() {
        return Ok(Redirect::to("/").into_response());
    }
    let back = format!("/reset_password/{}", token);
    if let Err(errors) = form.validate() {
        return Ok(back_with_errors(&session, &back, validation_messages(&errors)));
    }

    match app_state
        .app
        .reset_password_use_case
        .reset_password(&token, &form.password)
        .await
    {
        Ok(()) => Ok(redirect_with_flash(
            &session,
            "/login",
            "Your password has been reset",
        )),
        Err(ResetPasswordError::InvalidToken) => Ok(Redirect::to("/").into_response()),
        Err(ResetPasswordError::Invalid(message)) => Ok(back_with_error(&session, &back, message)),
        Err(ResetPasswordError::Internal) => {
            Err(ServiceError::Internal("Password reset failed".to_string()))
        }
    }
}
