//! A router wired to in-memory adapters, and a client that keeps the session cookie.

use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use parking_lot::Mutex;
use scratch_app::{
    AppSettings, build_application,
    testing::{
        InMemoryCommentRepository, InMemoryGameRepository, InMemoryMediaRepository,
        InMemoryObjectStorage, InMemorySearchIndex, InMemoryTagRepository,
        InMemoryTaskRepository, InMemoryUserRepository, RecordingEmailPort,
    },
};
use tokio_util::sync::{CancellationToken, DropGuard};
use tower::ServiceExt;

use crate::{HttpSettings, SESSION_COOKIE, router};

const BOUNDARY: &str = "scratch-test-boundary";
pub const PASSWORD: &str = "correct horse";

pub struct TestApp {
    router: Router,
    pub users: Arc<InMemoryUserRepository>,
    _jobs: DropGuard,
}

impl TestApp {
    pub fn new() -> Self {
        let users = Arc::new(InMemoryUserRepository::default());
        let tags = Arc::new(InMemoryTagRepository::default());
        let shutdown = CancellationToken::new();
        let settings = AppSettings {
            base_url: "http://scratch.test".to_string(),
            secret_key: "secret".to_string(),
            totp_issuer: "scratch".to_string(),
            bcrypt_cost: 4,
        };
        let (app, _jobs) = build_application(
            &settings,
            users.clone(),
            Arc::new(InMemoryGameRepository::with_tags(tags.clone())),
            Arc::new(InMemoryMediaRepository::default()),
            tags,
            Arc::new(InMemoryCommentRepository::new(users.clone())),
            Arc::new(InMemoryTaskRepository::default()),
            Arc::new(InMemoryObjectStorage::default()),
            Arc::new(InMemorySearchIndex::default()),
            Arc::new(RecordingEmailPort::default()),
            shutdown.clone(),
        );
        let http = HttpSettings {
            host: "127.0.0.1".to_string(),
            port: 0,
            secure_cookies: false,
            max_upload_bytes: 1024 * 1024,
            media_root: None,
        };
        Self {
            router: router(Arc::new(app), &http),
            users,
            _jobs: shutdown.drop_guard(),
        }
    }

    /// A client logged in as a new user whose password is `correct horse`.
    pub async fn logged_in(&self, username: &str) -> TestClient {
        self.users.add_user(username, PASSWORD, None).await;
        let client = self.client();
        let response = client
            .post_form(
                "/login",
                &format!("username={}&password=correct+horse", username),
            )
            .await;
        assert_eq!(response.location.as_deref(), Some("/"));
        client
    }

    pub fn client(&self) -> TestClient {
        TestClient {
            router: self.router.clone(),
            cookie: Mutex::new(None),
        }
    }
}

pub struct TestClient {
    router: Router,
    cookie: Mutex<Option<String>>,
}

#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub location: Option<String>,
    pub json: serde_json::Value,
}

impl TestResponse {
    pub fn flashes(&self) -> Vec<String> {
        self.json["flashes"]
            .as_array()
            .map(|flashes| {
                flashes
                    .iter()
                    .filter_map(|f| f["message"].as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default()
    }
}

pub enum Part<'a> {
    Text(&'a str, &'a str),
    File(&'a str, &'a str, &'a [u8]),
}

impl TestClient {
    pub async fn get(&self, uri: &str) -> TestResponse {
        self.send(Request::get(uri), Body::empty()).await
    }

    pub async fn post_form(&self, uri: &str, body: &str) -> TestResponse {
        let request = Request::post(uri).header(
            header::CONTENT_TYPE,
            "application/x-www-form-urlencoded",
        );
        self.send(request, Body::from(body.to_string())).await
    }

    pub async fn post_multipart(&self, uri: &str, parts: &[Part<'_>]) -> TestResponse {
        let mut body = Vec::new();
        for part in parts {
            body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
            match part {
                Part::Text(name, value) => {
                    body.extend_from_slice(
                        format!(
                            "Content-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                            name, value
                        )
                        .as_bytes(),
                    );
                }
                Part::File(name, file_name, data) => {
                    body.extend_from_slice(
                        format!(
                            "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: application/octet-stream\r\n\r\n",
                            name, file_name
                        )
                        .as_bytes(),
                    );
                    body.extend_from_slice(data);
                    body.extend_from_slice(b"\r\n");
                }
            }
        }
        body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());

        let request = Request::post(uri).header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        );
        self.send(request, Body::from(body)).await
    }

    async fn send(&self, mut request: axum::http::request::Builder, body: Body) -> TestResponse {
        if let Some(cookie) = self.cookie.lock().clone() {
            request = request.header(header::COOKIE, format!("{}={}", SESSION_COOKIE, cookie));
        }
        let response = self
            .router
            .clone()
            .oneshot(request.body(body).unwrap())
            .await
            .unwrap();

        for set_cookie in response.headers().get_all(header::SET_COOKIE) {
            let set_cookie = set_cookie.to_str().unwrap();
            let pair = set_cookie.split(';').next().unwrap();
            if let Some(value) = pair.strip_prefix(&format!("{}=", SESSION_COOKIE)) {
                *self.cookie.lock() = Some(value.to_string()).filter(|v| !v.is_empty());
            }
        }

        let status = response.status();
        let location = response
            .headers()
            .get(header::LOCATION)
            .map(|l| l.to_str().unwrap().to_string());
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = if bytes.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        TestResponse {
            status,
            location,
            json,
        }
    }
}
