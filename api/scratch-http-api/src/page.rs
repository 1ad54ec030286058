use axum::{
    Json,
    response::{IntoResponse, Redirect, Response},
};
use scratch_app::domain::user::User;
use serde::Serialize;

use crate::session::{Flash, Session};

pub const NAVBAR_AVATAR_SIZE: u32 = 36;

#[derive(Serialize, Debug, Clone)]
pub struct CurrentUserView {
    pub id: i32,
    pub username: String,
    pub avatar: String,
}

impl From<&User> for CurrentUserView {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.0,
            username: user.username.clone(),
            avatar: user.avatar(NAVBAR_AVATAR_SIZE),
        }
    }
}

/// A page view: what a template would get, as JSON.
#[derive(Serialize, Debug)]
pub struct Page<T: Serialize> {
    pub current_user: Option<CurrentUserView>,
    pub flashes: Vec<Flash>,
    pub data: T,
}

/// Renders `data` and consumes the pending flashes.
pub fn render<T: Serialize>(session: &Session, user: Option<&User>, data: T) -> Json<Page<T>> {
    Json(Page {
        current_user: user.map(CurrentUserView::from),
        flashes: session.take_flashes(),
        data,
    })
}

/// Flashes an error and goes back to `to`.
pub fn back_with_error(session: &Session, to: &str, message: impl Into<String>) -> Response {
    session.flash_error(message);
    Redirect::to(to).into_response()
}

/// Flashes every message and goes back to `to`.
pub fn back_with_errors(session: &Session, to: &str, messages: Vec<String>) -> Response {
    for message in messages {
        session.flash_error(message);
    }
    Redirect::to(to).into_response()
}

pub fn redirect_with_flash(session: &Session, to: &str, message: impl Into<String>) -> Response {
    session.flash(message);
    Redirect::to(to).into_response()
}

#[derive(Serialize, Debug, Default)]
pub struct Empty {}
