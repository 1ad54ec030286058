use serde::Deserialize;

use crate::domain::{GameId, RepoError, RepoUpdateError, ScreenshotId, UploadId};

pub const SCREENSHOT_EXTENSIONS: [&str; 3] = ["png", "jpg", "jpeg"];

#[derive(Clone, Debug, PartialEq)]
pub struct Upload {
    pub id: UploadId,
    pub game_id: GameId,
    pub filepath: String,
    pub size: String,
    pub is_web_build: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Screenshot {
    pub id: ScreenshotId,
    pub game_id: GameId,
    pub filepath: String,
    pub order: i32,
}

pub struct NewUpload {
    pub filepath: String,
    pub size: String,
    pub is_web_build: bool,
}

/// Per-file flags sent alongside the uploaded builds, in upload order.
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct UploadMetadata {
    #[serde(default)]
    pub is_web_build: bool,
}

pub fn parse_upload_metadata(raw: Option<&str>) -> Result<Vec<UploadMetadata>, String> {
    match raw.map(str::trim) {
        None | Some("") => Ok(Vec::new()),
        Some(raw) => serde_json::from_str(raw).map_err(|e| format!("Invalid upload metadata: {}", e)),
    }
}

/// A file received from a form, before it is written to storage.
#[derive(Clone, Debug)]
pub struct IncomingFile {
    pub file_name: String,
    pub content_type: String,
    pub data: Vec<u8>,
}

impl IncomingFile {
    pub fn extension(&self) -> Option<String> {
        std::path::Path::new(&self.file_name)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
    }

    pub fn is_allowed_screenshot(&self) -> bool {
        self.extension()
            .is_some_and(|ext| SCREENSHOT_EXTENSIONS.contains(&ext.as_str()))
    }
}

pub fn format_file_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["KB", "MB", "GB", "TB"];
    if bytes < 1024 {
        return format!("{} B", bytes);
    }
    let mut size = bytes as f64 / 1024.0;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    format!("{:.1} {}", size, UNITS[unit])
}

/// Keeps only characters that are safe inside an object path.
pub fn sanitize_file_name(file_name: &str) -> String {
    let base = file_name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(file_name)
        .trim();
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() {
        "file".to_string()
    } else {
        cleaned.to_string()
    }
}

fn unique_path(game_id: GameId, kind: &str, file_name: &str) -> String {
    format!(
        "games/{}/{}/{}-{}",
        game_id,
        kind,
        uuid::Uuid::new_v4().simple(),
        sanitize_file_name(file_name)
    )
}

pub fn upload_path(game_id: GameId, file_name: &str) -> String {
    unique_path(game_id, "uploads", file_name)
}

pub fn screenshot_path(game_id: GameId, file_name: &str) -> String {
    unique_path(game_id, "screenshots", file_name)
}

pub fn cover_path(game_id: GameId, file_name: &str) -> String {
    unique_path(game_id, "cover", file_name)
}

#[async_trait::async_trait]
pub trait MediaRepository {
    /// Adds an upload. Marking it as web build clears the flag on the game's other uploads.
    async fn add_upload(&self, game_id: GameId, upload: NewUpload) -> Result<Upload, RepoError>;
    async fn list_uploads(&self, game_id: GameId) -> Result<Vec<Upload>, RepoError>;
    async fn delete_upload(
        &self,
        game_id: GameId,
        upload_id: UploadId,
    ) -> Result<Upload, RepoUpdateError>;
    async fn add_screenshot(
        &self,
        game_id: GameId,
        filepath: String,
        order: i32,
    ) -> Result<Screenshot, RepoError>;
    /// Screenshots ordered by ascending `order`.
    async fn list_screenshots(&self, game_id: GameId) -> Result<Vec<Screenshot>, RepoError>;
    async fn delete_screenshot(
        &self,
        game_id: GameId,
        screenshot_id: ScreenshotId,
    ) -> Result<Screenshot, RepoUpdateError>;
}
