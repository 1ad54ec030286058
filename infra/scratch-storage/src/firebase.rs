use std::{
    path::Path,
    time::{Duration, Instant},
};

use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use reqwest::{Client, StatusCode, Url};
use scratch_app::ports::storage::{ObjectStoragePort, StorageError};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

const STORAGE_SCOPE: &str = "https://www.googleapis.com/auth/devstorage.read_write";
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const UPLOAD_ENDPOINT: &str = "https://storage.googleapis.com/upload/storage/v1/b";
const OBJECTS_ENDPOINT: &str = "https://storage.googleapis.com/storage/v1/b";
const PUBLIC_ENDPOINT: &str = "https://storage.googleapis.com";
const ASSERTION_LIFETIME_SECS: i64 = 3600;
const TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(60);

/// The fields of a Google service account key file that are needed here.
#[derive(Clone, Debug, Deserialize)]
pub struct ServiceAccount {
    pub client_email: String,
    pub private_key: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

#[derive(Debug, Serialize)]
struct AssertionClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

struct CachedToken {
    token: String,
    expires_at: Instant,
}

fn backend_error(e: impl std::fmt::Display) -> StorageError {
    StorageError::Backend(e.to_string())
}

fn endpoint_url(endpoint: &str, segments: &[&str]) -> Result<Url, StorageError> {
    let mut url = Url::parse(endpoint).map_err(backend_error)?;
    url.path_segments_mut()
        .map_err(|_| StorageError::Backend(format!("{} cannot be a base URL", endpoint)))?
        .extend(segments);
    Ok(url)
}

/// The JSON API addresses an object by its whole name as a single, escaped path segment.
fn object_url(bucket: &str, path: &str) -> Result<Url, StorageError> {
    endpoint_url(OBJECTS_ENDPOINT, &[bucket, "o", path])
}

/// Google Cloud Storage bucket of a Firebase project, accessed through the JSON API.
pub struct FirebaseObjectStorage {
    client: Client,
    account: ServiceAccount,
    key: EncodingKey,
    bucket: String,
    token: Mutex<Option<CachedToken>>,
}

impl FirebaseObjectStorage {
    pub fn new(account: ServiceAccount, bucket: &str) -> Result<Self, StorageError> {
        let key = EncodingKey::from_rsa_pem(account.private_key.as_bytes())
            .map_err(|e| StorageError::Backend(format!("Invalid service account key: {}", e)))?;
        Ok(Self {
            client: Client::new(),
            account,
            key,
            bucket: bucket.to_string(),
            token: Mutex::new(None),
        })
    }

    pub fn from_credentials_file(path: &Path, bucket: &str) -> Result<Self, StorageError> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| StorageError::Io(format!("{}: {}", path.display(), e)))?;
        let account: ServiceAccount = serde_json::from_str(&raw)
            .map_err(|e| StorageError::Backend(format!("Invalid credentials file: {}", e)))?;
        Self::new(account, bucket)
    }

    fn assertion(&self, now: DateTime<Utc>) -> Result<String, StorageError> {
        let iat = now.timestamp();
        let claims = AssertionClaims {
            iss: &self.account.client_email,
            scope: STORAGE_SCOPE,
            aud: &self.account.token_uri,
            iat,
            exp: iat + ASSERTION_LIFETIME_SECS,
        };
        encode(&Header::new(Algorithm::RS256), &claims, &self.key).map_err(backend_error)
    }

    async fn access_token(&self) -> Result<String, StorageError> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref()
            && token.expires_at > Instant::now() + TOKEN_REFRESH_MARGIN
        {
            return Ok(token.token.clone());
        }

        let assertion = self.assertion(Utc::now())?;
        let response = self
            .client
            .post(&self.account.token_uri)
            .form(&[
                ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
                ("assertion", assertion.as_str()),
            ])
            .send()
            .await
            .map_err(backend_error)?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(StorageError::Backend(format!(
                "Token request failed with {}: {}",
                status, body
            )));
        }
        let token: TokenResponse = response.json().await.map_err(backend_error)?;
        log::debug!("Obtained storage access token valid for {}s", token.expires_in);

        *cached = Some(CachedToken {
            token: token.access_token.clone(),
            expires_at: Instant::now() + Duration::from_secs(token.expires_in),
        });
        Ok(token.access_token)
    }
}

#[async_trait::async_trait]
impl ObjectStoragePort for FirebaseObjectStorage {
    async fn upload(
        &self,
        path: &str,
        data: Vec<u8>,
        content_type: &str,
    ) -> Result<(), StorageError> {
        let token = self.access_token().await?;
        let url = endpoint_url(UPLOAD_ENDPOINT, &[&self.bucket, "o"])?;
        let response = self
            .client
            .post(url)
            .bearer_auth(token)
            .query(&[
                ("uploadType", "media"),
                ("name", path),
                ("predefinedAcl", "publicRead"),
            ])
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(data)
            .send()
            .await
            .map_err(backend_error)?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(StorageError::Backend(format!(
                "Upload of {} failed with {}: {}",
                path, status, body
            )));
        }
        Ok(())
    }

    async fn delete(&self, path: &str) -> Result<(), StorageError> {
        let token = self.access_token().await?;
        let response = self
            .client
            .delete(object_url(&self.bucket, path)?)
            .bearer_auth(token)
            .send()
            .await
            .map_err(backend_error)?;
        match response.status() {
            status if status.is_success() => Ok(()),
            StatusCode::NOT_FOUND => Ok(()),
            status => Err(StorageError::Backend(format!(
                "Delete of {} failed with {}",
                path, status
            ))),
        }
    }

    fn public_url(&self, path: &str) -> String {
        format!("{}/{}/{}", PUBLIC_ENDPOINT, self.bucket, path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_url_escapes_the_object_name() {
        let url = object_url("scratch.appspot.com", "games/1/cover/a b.png").unwrap();
        assert_eq!(
            url.as_str(),
            "https://storage.googleapis.com/storage/v1/b/scratch.appspot.com/o/games%2F1%2Fcover%2Fa%20b.png"
        );
    }

    #[test]
    fn test_service_account_defaults_token_uri() {
        let account: ServiceAccount = serde_json::from_str(
            r#"{"type": "service_account", "client_email": "svc@example.iam.gserviceaccount.com", "private_key": "key"}"#,
        )
        .unwrap();
        assert_eq!(account.token_uri, DEFAULT_TOKEN_URI);
    }

    #[test]
    fn test_invalid_private_key_is_rejected() {
        let account = ServiceAccount {
            client_email: "svc@example.iam.gserviceaccount.com".to_string(),
            private_key: "not a pem".to_string(),
            token_uri: DEFAULT_TOKEN_URI.to_string(),
        };
        assert!(matches!(
            FirebaseObjectStorage::new(account, "bucket"),
            Err(StorageError::Backend(_))
        ));
    }

    #[test]
    fn test_missing_credentials_file() {
        assert!(matches!(
            FirebaseObjectStorage::from_credentials_file(Path::new("/nonexistent/key.json"), "b"),
            Err(StorageError::Io(_))
        ));
    }
}
