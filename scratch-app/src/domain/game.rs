use chrono::{DateTime, Utc};
use pulldown_cmark::{CowStr, Event, Options, Parser, Tag};

use crate::domain::{
    GameId, PaginatedResponse, Pagination, RepoCreateError, RepoError, RepoRetrieveError,
    RepoUpdateError, UserId,
};

pub const MAX_TITLE_LEN: usize = 128;
pub const MAX_TAGLINE_LEN: usize = 150;
pub const MAX_DESCRIPTION_LEN: usize = 5000;

const FALLBACK_SLUG: &str = "game";

#[derive(Clone, Debug)]
pub struct Game {
    pub id: GameId,
    pub title: String,
    pub slug: String,
    pub tagline: Option<String>,
    pub description: Option<String>,
    pub cover_filepath: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub creator_id: UserId,
}

impl Game {
    pub fn description_html(&self) -> String {
        self.description
            .as_deref()
            .map(render_markdown)
            .unwrap_or_default()
    }

    pub fn is_owned_by(&self, user_id: UserId) -> bool {
        self.creator_id == user_id
    }
}

/// The user-editable part of a game. The slug always follows the title.
#[derive(Clone, Debug, PartialEq)]
pub struct GameDraft {
    title: String,
    slug: String,
    pub tagline: Option<String>,
    pub description: Option<String>,
}

impl GameDraft {
    pub fn new(title: &str, tagline: Option<String>, description: Option<String>) -> Self {
        let title = title.trim().to_string();
        let slug = slugify(&title);
        Self {
            title,
            slug,
            tagline: tagline.and_then(non_empty),
            description: description.and_then(non_empty),
        }
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn slug(&self) -> &str {
        &self.slug
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.title.is_empty() {
            return Err("Title is required".to_string());
        }
        if self.title.chars().count() > MAX_TITLE_LEN {
            return Err(format!("Title must be at most {} characters", MAX_TITLE_LEN));
        }
        if self
            .tagline
            .as_ref()
            .is_some_and(|t| t.chars().count() > MAX_TAGLINE_LEN)
        {
            return Err(format!(
                "Tagline must be at most {} characters",
                MAX_TAGLINE_LEN
            ));
        }
        if self
            .description
            .as_ref()
            .is_some_and(|d| d.chars().count() > MAX_DESCRIPTION_LEN)
        {
            return Err(format!(
                "Description must be at most {} characters",
                MAX_DESCRIPTION_LEN
            ));
        }
        Ok(())
    }
}

fn non_empty(s: String) -> Option<String> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

pub fn slugify(title: &str) -> String {
    let slug = slug::slugify(title);
    if slug.is_empty() {
        return FALLBACK_SLUG.to_string();
    }
    slug.chars().take(MAX_TITLE_LEN).collect()
}

const SAFE_URL_SCHEMES: [&str; 3] = ["http", "https", "mailto"];

/// Relative URLs and the schemes in `SAFE_URL_SCHEMES`. Browsers ignore
/// whitespace and control characters inside a scheme, so those are dropped first.
fn is_safe_url(url: &str) -> bool {
    let cleaned: String = url
        .chars()
        .filter(|c| !c.is_whitespace() && !c.is_control())
        .collect();
    let scheme_end = cleaned.find([':', '/', '?', '#']);
    match scheme_end {
        Some(i) if cleaned[i..].starts_with(':') => {
            let scheme = cleaned[..i].to_ascii_lowercase();
            SAFE_URL_SCHEMES.contains(&scheme.as_str())
        }
        _ => true,
    }
}

fn sanitize_url(url: CowStr<'_>) -> CowStr<'_> {
    if is_safe_url(&url) {
        url
    } else {
        CowStr::Borrowed("#")
    }
}

/// Renders markdown to HTML. Raw HTML in the source is escaped, not passed
/// through, and links or images with unsafe schemes point to `#`.
pub fn render_markdown(source: &str) -> String {
    let parser = Parser::new_ext(source, Options::ENABLE_STRIKETHROUGH | Options::ENABLE_TABLES)
        .map(|event| match event {
            Event::Html(html) | Event::InlineHtml(html) => Event::Text(html),
            Event::Start(Tag::Link {
                link_type,
                dest_url,
                title,
                id,
            }) => Event::Start(Tag::Link {
                link_type,
                dest_url: sanitize_url(dest_url),
                title,
                id,
            }),
            Event::Start(Tag::Image {
                link_type,
                dest_url,
                title,
                id,
            }) => Event::Start(Tag::Image {
                link_type,
                dest_url: sanitize_url(dest_url),
                title,
                id,
            }),
            other => other,
        });
    let mut html = String::with_capacity(source.len() * 3 / 2);
    pulldown_cmark::html::push_html(&mut html, parser);
    html
}

#[async_trait::async_trait]
pub trait GameRepository {
    async fn create_game(
        &self,
        draft: GameDraft,
        creator_id: UserId,
    ) -> Result<Game, RepoCreateError>;
    async fn get_game(&self, game_id: GameId) -> Result<Game, RepoRetrieveError>;
    async fn update_game(&self, game_id: GameId, draft: GameDraft)
    -> Result<Game, RepoUpdateError>;
    async fn set_cover(
        &self,
        game_id: GameId,
        cover_filepath: Option<String>,
    ) -> Result<(), RepoUpdateError>;
    /// Removes the game together with its uploads, screenshots, tag links and comments.
    async fn delete_game(&self, game_id: GameId) -> Result<(), RepoUpdateError>;
    async fn get_games_by_ids(&self, game_ids: &[GameId]) -> Result<Vec<Game>, RepoError>;
    async fn list_games_by_creator(&self, creator_id: UserId) -> Result<Vec<Game>, RepoError>;
    async fn list_recent_games(
        &self,
        pagination: Pagination,
    ) -> Result<PaginatedResponse<Game>, RepoError>;
    async fn list_games_by_tag(
        &self,
        tag: &str,
        pagination: Pagination,
    ) -> Result<PaginatedResponse<Game>, RepoError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slug_follows_title() {
        let draft = GameDraft::new("  Super Mario: The Return! ", None, None);
        assert_eq!(draft.title(), "Super Mario: The Return!");
        assert_eq!(draft.slug(), "super-mario-the-return");
        assert_eq!(
            GameDraft::new("Super Mario: The Return!", None, None).slug(),
            draft.slug()
        );
    }

    #[test]
    fn test_slug_falls_back_when_title_has_no_letters() {
        assert_eq!(slugify("!!!"), "game");
    }

    #[test]
    fn test_slug_transliterates() {
        assert_eq!(slugify("Crème Brûlée Quest"), "creme-brulee-quest");
    }

    #[test]
    fn test_draft_validation() {
        assert!(GameDraft::new("   ", None, None).validate().is_err());
        assert!(
            GameDraft::new(&"x".repeat(MAX_TITLE_LEN + 1), None, None)
                .validate()
                .is_err()
        );
        assert!(
            GameDraft::new("ok", Some("t".repeat(MAX_TAGLINE_LEN + 1)), None)
                .validate()
                .is_err()
        );
        assert!(GameDraft::new("ok", Some("fine".into()), None).validate().is_ok());
    }

    #[test]
    fn test_blank_optional_fields_become_none() {
        let draft = GameDraft::new("ok", Some("   ".into()), Some(String::new()));
        assert_eq!(draft.tagline, None);
        assert_eq!(draft.description, None);
    }

    #[test]
    fn test_markdown_escapes_raw_html() {
        let html = render_markdown("**bold** <script>alert(1)</script>");
        assert!(html.contains("<strong>bold</strong>"));
        assert!(!html.contains("<script>"));
        assert!(html.contains("&lt;script&gt;"));
    }

    #[test]
    fn test_markdown_neutralizes_script_links() {
        let html = render_markdown("[click](javascript:alert(document.cookie))");
        assert!(!html.contains("javascript"));
        assert!(html.contains(r##"<a href="#">click</a>"##));

        let html = render_markdown("![x](JavaScript:alert(1)) [y](data:text/html,hi)");
        assert!(!html.to_lowercase().contains("javascript"));
        assert!(!html.contains("data:"));
    }

    #[test]
    fn test_markdown_keeps_safe_links() {
        let html = render_markdown(
            "[site](https://example.com) [mail](mailto:a@example.com) [rel](/game/1/x)",
        );
        assert!(html.contains(r#"href="https://example.com""#));
        assert!(html.contains(r#"href="mailto:a@example.com""#));
        assert!(html.contains(r#"href="/game/1/x""#));
    }
}
