//! Server-side sessions keyed by a random id in the `scratch_session` cookie.
//!
//! The middleware loads the session into the request extensions and writes it
//! back once the handler is done. Any change of the authentication state gets
//! a fresh id, so an id seen before login never becomes an authenticated one.
//! Only sessions the handler changed are written back, and an existing id is
//! only overwritten while it is still stored, so a request racing a logout
//! cannot bring the old id back.

use std::{sync::Arc, time::Duration};

use axum::{
    extract::{FromRequestParts, Request, State},
    http::request::Parts,
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use moka::{
    future::Cache,
    ops::compute::{CompResult, Op},
};
use parking_lot::Mutex;
use scratch_app::domain::login::AuthState;
use serde::{Deserialize, Serialize};

use crate::{AppState, ServiceError};

pub const SESSION_COOKIE: &str = "scratch_session";
pub const SESSION_IDLE_TTL: Duration = Duration::from_secs(30 * 24 * 60 * 60);
const MAX_SESSIONS: u64 = 100_000;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlashCategory {
    Info,
    Error,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flash {
    pub category: FlashCategory,
    pub message: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionData {
    pub auth: AuthState,
    pub remember: bool,
    pub flashes: Vec<Flash>,
}

impl SessionData {
    fn is_empty(&self) -> bool {
        self.auth == AuthState::Anonymous && self.flashes.is_empty()
    }
}

#[derive(Debug)]
struct SessionInner {
    id: Option<String>,
    data: SessionData,
    rotate: bool,
    dirty: bool,
}

/// The current request's session. Cloning shares the same state.
#[derive(Clone, Debug)]
pub struct Session {
    inner: Arc<Mutex<SessionInner>>,
}

impl Session {
    fn new(id: Option<String>, data: SessionData) -> Self {
        Self {
            inner: Arc::new(Mutex::new(SessionInner {
                id,
                data,
                rotate: false,
                dirty: false,
            })),
        }
    }

    pub fn auth(&self) -> AuthState {
        self.inner.lock().data.auth.clone()
    }

    /// Replaces the authentication state and rotates the session id.
    pub fn set_auth(&self, auth: AuthState, remember: bool) {
        let mut inner = self.inner.lock();
        inner.data.auth = auth;
        inner.data.remember = remember;
        inner.rotate = true;
        inner.dirty = true;
    }

    /// Replaces the authentication state without rotating the session id.
    pub fn update_auth(&self, auth: AuthState) {
        let mut inner = self.inner.lock();
        inner.data.auth = auth;
        inner.dirty = true;
    }

    /// Forgets everything but pending flashes.
    pub fn log_out(&self) {
        let mut inner = self.inner.lock();
        inner.data.auth = AuthState::Anonymous;
        inner.data.remember = false;
        inner.rotate = true;
        inner.dirty = true;
    }

    pub fn flash(&self, message: impl Into<String>) {
        self.push_flash(FlashCategory::Info, message.into());
    }

    pub fn flash_error(&self, message: impl Into<String>) {
        self.push_flash(FlashCategory::Error, message.into());
    }

    fn push_flash(&self, category: FlashCategory, message: String) {
        let mut inner = self.inner.lock();
        inner.data.flashes.push(Flash { category, message });
        inner.dirty = true;
    }

    pub fn take_flashes(&self) -> Vec<Flash> {
        let mut inner = self.inner.lock();
        let flashes = std::mem::take(&mut inner.data.flashes);
        if !flashes.is_empty() {
            inner.dirty = true;
        }
        flashes
    }
}

impl<S: Send + Sync> FromRequestParts<S> for Session {
    type Rejection = ServiceError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Session>()
            .cloned()
            .ok_or_else(|| ServiceError::Internal("Session layer is not installed".to_string()))
    }
}

/// What the response has to do with the session cookie.
#[derive(Debug, PartialEq)]
pub enum CookieChange {
    Keep,
    Set { id: String, remember: bool },
    Remove,
}

#[derive(Clone)]
pub struct SessionStore {
    sessions: Cache<String, SessionData>,
    secure_cookies: bool,
}

impl SessionStore {
    pub fn new(secure_cookies: bool) -> Self {
        Self {
            sessions: Cache::builder()
                .max_capacity(MAX_SESSIONS)
                .time_to_idle(SESSION_IDLE_TTL)
                .build(),
            secure_cookies,
        }
    }

    async fn load(&self, id: Option<&str>) -> Session {
        if let Some(id) = id
            && let Some(data) = self.sessions.get(id).await
        {
            return Session::new(Some(id.to_string()), data);
        }
        Session::new(None, SessionData::default())
    }

    /// Persists the session state and decides what happens to the cookie.
    async fn save(&self, session: &Session) -> CookieChange {
        let (old_id, data, rotate) = {
            let inner = session.inner.lock();
            if !inner.dirty {
                return CookieChange::Keep;
            }
            (inner.id.clone(), inner.data.clone(), inner.rotate)
        };

        if data.is_empty() {
            return match old_id {
                Some(id) => {
                    self.sessions.invalidate(&id).await;
                    CookieChange::Remove
                }
                None => CookieChange::Keep,
            };
        }

        match old_id {
            Some(id) if !rotate => {
                let result = self
                    .sessions
                    .entry(id)
                    .and_compute_with(|existing| {
                        let op = match existing {
                            Some(_) => Op::Put(data),
                            None => Op::Nop,
                        };
                        std::future::ready(op)
                    })
                    .await;
                match result {
                    CompResult::StillNone(_) => CookieChange::Remove,
                    _ => CookieChange::Keep,
                }
            }
            old_id => {
                if let Some(old_id) = old_id {
                    self.sessions.invalidate(&old_id).await;
                }
                let id = new_session_id();
                let remember = data.remember;
                self.sessions.insert(id.clone(), data).await;
                CookieChange::Set { id, remember }
            }
        }
    }

    fn cookie(&self, id: String, remember: bool) -> Cookie<'static> {
        let builder = Cookie::build((SESSION_COOKIE, id))
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax)
            .secure(self.secure_cookies);
        if remember {
            builder.permanent().build()
        } else {
            builder.build()
        }
    }
}

fn new_session_id() -> String {
    format!(
        "{}{}",
        uuid::Uuid::new_v4().simple(),
        uuid::Uuid::new_v4().simple()
    )
}

pub async fn session_middleware(
    State(app_state): State<AppState>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Response {
    let store = &app_state.sessions;
    let session = store
        .load(jar.get(SESSION_COOKIE).map(|cookie| cookie.value()))
        .await;
    request.extensions_mut().insert(session.clone());

    let response = next.run(request).await;

    let jar = match store.save(&session).await {
        CookieChange::Keep => return response,
        CookieChange::Set { id, remember } => jar.add(store.cookie(id, remember)),
        CookieChange::Remove => jar.remove(Cookie::build(SESSION_COOKIE).path("/")),
    };
    (jar, response).into_response()
}
