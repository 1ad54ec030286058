use chrono::{DateTime, Utc};
use scratch_app::{
    domain::{PaginatedResponse, comment::CommentWithAuthor, game::Game, task::Task},
    workflow::game::{
        get::{GameDetails, ScreenshotView, UploadView},
        list::GameCard,
    },
};
use serde::Serialize;

pub fn game_url(game: &Game) -> String {
    format!("/game/{}/{}", game.id, game.slug)
}

#[derive(Serialize, Debug)]
pub struct Paginated<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u64,
    pub per_page: u64,
    pub total_pages: u64,
    pub has_next: bool,
}

impl<T> Paginated<T> {
    pub fn from_response<U>(response: PaginatedResponse<U>, f: impl FnMut(U) -> T) -> Self {
        let total_pages = response.total_pages();
        let has_next = response.has_next();
        let response = response.map(f);
        Self {
            items: response.items,
            total: response.total,
            page: response.page,
            per_page: response.per_page,
            total_pages,
            has_next,
        }
    }
}

#[derive(Serialize, Debug)]
pub struct GameCardView {
    pub id: i32,
    pub title: String,
    pub tagline: Option<String>,
    pub url: String,
    pub cover_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<GameCard> for GameCardView {
    fn from(card: GameCard) -> Self {
        Self {
            url: game_url(&card.game),
            id: card.game.id.0,
            title: card.game.title,
            tagline: card.game.tagline,
            cover_url: card.cover_url,
            created_at: card.game.created_at,
        }
    }
}

#[derive(Serialize, Debug)]
pub struct GameSummaryView {
    pub id: i32,
    pub title: String,
    pub tagline: Option<String>,
    pub url: String,
}

impl From<Game> for GameSummaryView {
    fn from(game: Game) -> Self {
        Self {
            url: game_url(&game),
            id: game.id.0,
            title: game.title,
            tagline: game.tagline,
        }
    }
}

#[derive(Serialize, Debug)]
pub struct MediaView {
    pub id: i32,
    pub url: String,
    pub filepath: String,
}

#[derive(Serialize, Debug)]
pub struct UploadFileView {
    pub id: i32,
    pub url: String,
    pub filename: String,
    pub size: String,
    pub is_web_build: bool,
}

fn file_name(path: &str) -> String {
    path.rsplit('/').next().unwrap_or(path).to_string()
}

impl From<UploadView> for UploadFileView {
    fn from(view: UploadView) -> Self {
        Self {
            id: view.upload.id.0,
            filename: file_name(&view.upload.filepath),
            size: view.upload.size,
            is_web_build: view.upload.is_web_build,
            url: view.url,
        }
    }
}

impl From<ScreenshotView> for MediaView {
    fn from(view: ScreenshotView) -> Self {
        Self {
            id: view.screenshot.id.0,
            filepath: view.screenshot.filepath,
            url: view.url,
        }
    }
}

#[derive(Serialize, Debug)]
pub struct CommentView {
    pub id: i32,
    pub text: String,
    pub author: String,
    pub author_url: String,
    pub created_at: DateTime<Utc>,
    pub can_delete: bool,
}

impl CommentView {
    pub fn new(comment: CommentWithAuthor, viewer_id: Option<i32>) -> Self {
        Self {
            id: comment.comment.id.0,
            can_delete: viewer_id == Some(comment.comment.author_id.0),
            author_url: format!("/user/{}", comment.author_username),
            author: comment.author_username,
            text: comment.comment.text,
            created_at: comment.comment.created_at,
        }
    }
}

#[derive(Serialize, Debug)]
pub struct GameDetailsView {
    pub id: i32,
    pub title: String,
    pub slug: String,
    pub tagline: Option<String>,
    pub description_html: String,
    pub cover_url: Option<String>,
    pub creator: String,
    pub creator_url: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub tags: Vec<String>,
    pub uploads: Vec<UploadFileView>,
    pub web_build: Option<UploadFileView>,
    pub screenshots: Vec<MediaView>,
    pub comments: Vec<CommentView>,
    pub can_edit: bool,
}

impl GameDetailsView {
    pub fn new(details: GameDetails, viewer_id: Option<i32>) -> Self {
        let game = details.game;
        Self {
            id: game.id.0,
            can_edit: viewer_id == Some(game.creator_id.0),
            title: game.title,
            slug: game.slug,
            tagline: game.tagline,
            description_html: details.description_html,
            cover_url: details.cover_url,
            creator_url: format!("/user/{}", details.creator_username),
            creator: details.creator_username,
            created_at: game.created_at,
            updated_at: game.updated_at,
            tags: details.tags,
            uploads: details.uploads.into_iter().map(Into::into).collect(),
            web_build: details.web_build.map(Into::into),
            screenshots: details.screenshots.into_iter().map(Into::into).collect(),
            comments: details
                .comments
                .into_iter()
                .map(|c| CommentView::new(c, viewer_id))
                .collect(),
        }
    }
}

#[derive(Serialize, Debug)]
pub struct TaskView {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub complete: bool,
}

impl From<Task> for TaskView {
    fn from(task: Task) -> Self {
        Self {
            id: task.id.to_string(),
            name: task.name,
            description: task.description,
            complete: task.complete,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_name_strips_storage_prefix() {
        assert_eq!(file_name("games/1/uploads/abc-build.zip"), "abc-build.zip");
        assert_eq!(file_name("build.zip"), "build.zip");
    }
}
