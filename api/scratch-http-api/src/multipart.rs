use axum::extract::{Multipart, multipart::Field};
use scratch_app::{
    domain::{
        ScreenshotId, UploadId,
        media::{IncomingFile, parse_upload_metadata},
    },
    workflow::game::edit::GameEdit,
};

use crate::ServiceError;

/// Why a game form could not be used.
#[derive(Debug)]
pub enum GameFormError {
    /// Shown to the user as a flash.
    Invalid(String),
    Malformed(ServiceError),
}

impl From<axum::extract::multipart::MultipartError> for GameFormError {
    fn from(e: axum::extract::multipart::MultipartError) -> Self {
        GameFormError::Malformed(ServiceError::BadRequest(e.body_text()))
    }
}

/// Reads `field` as a file. Empty file inputs come through without a name and are skipped.
async fn read_file(field: Field<'_>) -> Result<Option<IncomingFile>, GameFormError> {
    let file_name = field.file_name().unwrap_or_default().to_string();
    let content_type = field
        .content_type()
        .unwrap_or("application/octet-stream")
        .to_string();
    let data = field.bytes().await?;
    if file_name.is_empty() && data.is_empty() {
        return Ok(None);
    }
    Ok(Some(IncomingFile {
        file_name,
        content_type,
        data: data.to_vec(),
    }))
}

fn parse_id(value: &str) -> Result<i32, GameFormError> {
    value
        .trim()
        .parse()
        .map_err(|_| GameFormError::Invalid(format!("Invalid id '{}'", value)))
}

/// Reads the multipart body shared by the create and edit forms.
pub async fn read_game_form(mut multipart: Multipart) -> Result<GameEdit, GameFormError> {
    let mut edit = GameEdit::default();
    let mut uploads_metadata = None;

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "uploads" => edit.input.uploads.extend(read_file(field).await?),
            "screenshots" => edit.input.screenshots.extend(read_file(field).await?),
            "cover" => {
                if let Some(cover) = read_file(field).await? {
                    edit.input.cover = Some(cover);
                }
            }
            "title" => edit.input.title = field.text().await?,
            "tagline" => edit.input.tagline = Some(field.text().await?),
            "description" => edit.input.description = Some(field.text().await?),
            "tags" => edit.input.tags = field.text().await?,
            "uploads_metadata" => uploads_metadata = Some(field.text().await?),
            "remove_uploads" => {
                let id = parse_id(&field.text().await?)?;
                edit.remove_uploads.push(UploadId(id));
            }
            "remove_screenshots" => {
                let id = parse_id(&field.text().await?)?;
                edit.remove_screenshots.push(ScreenshotId(id));
            }
            other => log::debug!("Ignoring game form field {:?}", other),
        }
    }

    edit.input.uploads_metadata =
        parse_upload_metadata(uploads_metadata.as_deref()).map_err(GameFormError::Invalid)?;
    Ok(edit)
}

