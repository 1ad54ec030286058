use std::{path::PathBuf, sync::Arc};

use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
};
use log::info;
use scratch_app::Application;
use tower_http::services::ServeDir;

mod error;
mod extract;
mod forms;
mod multipart;
mod page;
mod routes;
mod session;
mod views;

pub use error::ServiceError;
pub use session::{SESSION_COOKIE, SessionStore};

#[derive(Clone)]
pub struct AppState {
    pub app: Arc<Application>,
    pub sessions: SessionStore,
}

#[derive(Clone, Debug)]
pub struct HttpSettings {
    pub host: String,
    pub port: u16,
    pub secure_cookies: bool,
    pub max_upload_bytes: usize,
    /// Directory served under `/media` when files are stored locally.
    pub media_root: Option<PathBuf>,
}

pub fn router(app: Arc<Application>, settings: &HttpSettings) -> Router {
    let state = AppState {
        app,
        sessions: SessionStore::new(settings.secure_cookies),
    };

    let mut router: Router<AppState> = Router::new()
        .route("/", get(routes::games::index))
        .route(
            "/login",
            get(routes::auth::login_page).post(routes::auth::login),
        )
        .route(
            "/login/verify-totp",
            get(routes::auth::verify_totp_page).post(routes::auth::verify_totp),
        )
        .route(
            "/register",
            get(routes::auth::register_page).post(routes::auth::register),
        )
        .route("/logout", get(routes::auth::logout))
        .route(
            "/reset_password_request",
            get(routes::auth::reset_password_request_page)
                .post(routes::auth::reset_password_request),
        )
        .route(
            "/reset_password/{token}",
            get(routes::auth::reset_password_page).post(routes::auth::reset_password),
        )
        .route("/user/{username}", get(routes::account::profile))
        .route(
            "/settings",
            get(routes::account::settings_page).post(routes::account::update_settings),
        )
        .route(
            "/settings/password",
            get(routes::account::password_page).post(routes::account::change_password),
        )
        .route(
            "/settings/two-factor-auth",
            get(routes::account::two_factor_page).post(routes::account::two_factor),
        )
        .route("/export_data", post(routes::account::export_data))
        .route("/tasks", get(routes::account::tasks))
        .route(
            "/game/new",
            get(routes::games::new_game_page).post(routes::games::create_game),
        )
        .route("/game/{id}", get(routes::games::game))
        .route("/game/{id}/{slug}", get(routes::games::game_with_slug))
        .route(
            "/game/{id}/edit",
            get(routes::games::edit_game_page).post(routes::games::edit_game),
        )
        .route("/game/{id}/delete", post(routes::games::delete_game))
        .route("/comment/{game_id}", post(routes::comments::post_comment))
        .route(
            "/delete_comment/{id}",
            post(routes::comments::delete_comment),
        )
        .route("/tag/{name}", get(routes::games::tag))
        .route("/search", get(routes::search::search))
        .layer(DefaultBodyLimit::max(settings.max_upload_bytes))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            session::session_middleware,
        ));

    if let Some(root) = &settings.media_root {
        router = router.nest_service("/media", ServeDir::new(root));
    }

    router.with_state(state)
}

pub async fn run(
    app: Arc<Application>,
    settings: HttpSettings,
    shutdown_signal: impl std::future::Future<Output = ()> + Send + 'static,
) -> std::io::Result<()> {
    let router = router(app, &settings);

    let listener =
        tokio::net::TcpListener::bind(format!("{}:{}", settings.host, settings.port)).await?;

    info!("HTTP server listening on {}:{}", settings.host, settings.port);
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal)
        .await?;

    info!("HTTP server shut down gracefully");
    Ok(())
}

#[cfg(test)]
mod testing;
