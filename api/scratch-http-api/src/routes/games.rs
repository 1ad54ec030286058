use axum::{
    Json,
    extract::{Multipart, Path, Query, State},
    response::{IntoResponse, Redirect, Response},
};
use scratch_app::{
    domain::{GameId, Pagination, media::SCREENSHOT_EXTENSIONS, user::User},
    workflow::game::{
        create::CreateGameError,
        delete::DeleteGameError,
        edit::{EditGameError, GameForEdit},
        get::GetGameError,
        list::GAMES_PER_PAGE,
    },
};
use serde::Serialize;

use crate::{
    AppState, ServiceError,
    extract::{CurrentUser, MaybeUser},
    forms::PageQuery,
    multipart::{GameFormError, read_game_form},
    page::{Page, back_with_error, redirect_with_flash, render},
    session::Session,
    views::{GameCardView, GameDetailsView, Paginated, game_url},
};

fn game_not_found(id: i32) -> ServiceError {
    ServiceError::NotFound(format!("Game {} not found", id))
}

pub async fn index(
    MaybeUser(user): MaybeUser,
    session: Session,
    State(app_state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> Result<Json<Page<Paginated<GameCardView>>>, ServiceError> {
    let games = app_state
        .app
        .game_list_use_case
        .list_recent(Pagination::new(query.page.unwrap_or(1), GAMES_PER_PAGE))
        .await
        .map_err(|_| ServiceError::Internal("Failed to list games".to_string()))?;
    Ok(render(
        &session,
        user.as_ref(),
        Paginated::from_response(games, GameCardView::from),
    ))
}

#[derive(Serialize, Debug)]
pub struct TagPage {
    tag: String,
    games: Paginated<GameCardView>,
}

pub async fn tag(
    MaybeUser(user): MaybeUser,
    session: Session,
    State(app_state): State<AppState>,
    Path(name): Path<String>,
    Query(query): Query<PageQuery>,
) -> Result<Json<Page<TagPage>>, ServiceError> {
    let games = app_state
        .app
        .game_list_use_case
        .list_by_tag(
            &name,
            Pagination::new(query.page.unwrap_or(1), GAMES_PER_PAGE),
        )
        .await
        .map_err(|_| ServiceError::Internal("Failed to list games".to_string()))?;
    let data = TagPage {
        tag: name,
        games: Paginated::from_response(games, GameCardView::from),
    };
    Ok(render(&session, user.as_ref(), data))
}

async fn game_page(
    user: Option<User>,
    session: &Session,
    app_state: &AppState,
    id: i32,
    slug: Option<String>,
) -> Result<Response, ServiceError> {
    let details = app_state
        .app
        .game_get_use_case
        .get_game(GameId(id))
        .await
        .map_err(|e| match e {
            GetGameError::NotFound => game_not_found(id),
            GetGameError::Internal => ServiceError::Internal("Failed to load game".to_string()),
        })?;
    if let Some(slug) = slug
        && slug != details.game.slug
    {
        return Ok(Redirect::to(&game_url(&details.game)).into_response());
    }

    let viewer_id = user.as_ref().map(|u| u.id.0);
    Ok(render(
        session,
        user.as_ref(),
        GameDetailsView::new(details, viewer_id),
    )
    .into_response())
}

pub async fn game(
    MaybeUser(user): MaybeUser,
    session: Session,
    State(app_state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Response, ServiceError> {
    game_page(user, &session, &app_state, id, None).await
}

pub async fn game_with_slug(
    MaybeUser(user): MaybeUser,
    session: Session,
    State(app_state): State<AppState>,
    Path((id, slug)): Path<(i32, String)>,
) -> Result<Response, ServiceError> {
    game_page(user, &session, &app_state, id, Some(slug)).await
}

#[derive(Serialize, Debug)]
pub struct GameFormPage {
    game: Option<EditableGame>,
    screenshot_extensions: &'static [&'static str],
}

#[derive(Serialize, Debug)]
pub struct EditableGame {
    id: i32,
    title: String,
    tagline: Option<String>,
    description: Option<String>,
    tags: String,
    uploads: Vec<EditableUpload>,
    screenshots: Vec<EditableScreenshot>,
}

#[derive(Serialize, Debug)]
pub struct EditableUpload {
    id: i32,
    filepath: String,
    size: String,
    is_web_build: bool,
}

#[derive(Serialize, Debug)]
pub struct EditableScreenshot {
    id: i32,
    filepath: String,
}

impl From<GameForEdit> for EditableGame {
    fn from(edit: GameForEdit) -> Self {
        Self {
            id: edit.game.id.0,
            title: edit.game.title,
            tagline: edit.game.tagline,
            description: edit.game.description,
            tags: edit.tags.join(", "),
            uploads: edit
                .uploads
                .into_iter()
                .map(|u| EditableUpload {
                    id: u.id.0,
                    filepath: u.filepath,
                    size: u.size,
                    is_web_build: u.is_web_build,
                })
                .collect(),
            screenshots: edit
                .screenshots
                .into_iter()
                .map(|s| EditableScreenshot {
                    id: s.id.0,
                    filepath: s.filepath,
                })
                .collect(),
        }
    }
}

pub async fn new_game_page(
    CurrentUser(user): CurrentUser,
    session: Session,
) -> Json<Page<GameFormPage>> {
    let data = GameFormPage {
        game: None,
        screenshot_extensions: &SCREENSHOT_EXTENSIONS,
    };
    render(&session, Some(&user), data)
}

pub async fn create_game(
    CurrentUser(user): CurrentUser,
    session: Session,
    State(app_state): State<AppState>,
    multipart: Multipart,
) -> Result<Response, ServiceError> {
    const BACK: &str = "/game/new";
    let form = match read_game_form(multipart).await {
        Ok(form) => form,
        Err(GameFormError::Invalid(message)) => return Ok(back_with_error(&session, BACK, message)),
        Err(GameFormError::Malformed(e)) => return Err(e),
    };

    match app_state
        .app
        .game_create_use_case
        .create_game(user.id, form.input)
        .await
    {
        Ok(game) => Ok(redirect_with_flash(
            &session,
            &game_url(&game),
            "Your game has been created",
        )),
        Err(CreateGameError::Invalid(message)) => Ok(back_with_error(&session, BACK, message)),
        Err(CreateGameError::Internal) => {
            Err(ServiceError::Internal("Failed to create game".to_string()))
        }
    }
}

pub async fn edit_game_page(
    CurrentUser(user): CurrentUser,
    session: Session,
    State(app_state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Response, ServiceError> {
    match app_state
        .app
        .game_edit_use_case
        .get_for_edit(GameId(id), user.id)
        .await
    {
        Ok(game) => {
            let data = GameFormPage {
                game: Some(game.into()),
                screenshot_extensions: &SCREENSHOT_EXTENSIONS,
            };
            Ok(render(&session, Some(&user), data).into_response())
        }
        Err(EditGameError::NotOwner) => Ok(Redirect::to(&format!("/game/{}", id)).into_response()),
        Err(EditGameError::NotFound) => Err(game_not_found(id)),
        Err(EditGameError::Invalid(_)) | Err(EditGameError::Internal) => {
            Err(ServiceError::Internal("Failed to load game".to_string()))
        }
    }
}

pub async fn edit_game(
    CurrentUser(user): CurrentUser,
    session: Session,
    State(app_state): State<AppState>,
    Path(id): Path<i32>,
    multipart: Multipart,
) -> Result<Response, ServiceError> {
    let back = format!("/game/{}/edit", id);
    let edit = match read_game_form(multipart).await {
        Ok(edit) => edit,
        Err(GameFormError::Invalid(message)) => {
            return Ok(back_with_error(&session, &back, message));
        }
        Err(GameFormError::Malformed(e)) => return Err(e),
    };

    match app_state
        .app
        .game_edit_use_case
        .edit_game(GameId(id), user.id, edit)
        .await
    {
        Ok(game) => Ok(redirect_with_flash(
            &session,
            &game_url(&game),
            "Your changes have been saved",
        )),
        Err(EditGameError::NotOwner) => Ok(Redirect::to(&format!("/game/{}", id)).into_response()),
        Err(EditGameError::NotFound) => Err(game_not_found(id)),
        Err(EditGameError::Invalid(message)) => Ok(back_with_error(&session, &back, message)),
        Err(EditGameError::Internal) => {
            Err(ServiceError::Internal("Failed to save game".to_string()))
        }
    }
}

pub async fn delete_game(
    CurrentUser(user): CurrentUser,
    session: Session,
    State(app_state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Response, ServiceError> {
    match app_state
        .app
        .game_delete_use_case
        .delete_game(GameId(id), user.id)
        .await
    {
        Ok(()) => Ok(redirect_with_flash(
            &session,
            &format!("/user/{}", user.username),
            "Your game has been deleted",
        )),
        Err(DeleteGameError::NotOwner) => {
            Ok(Redirect::to(&format!("/game/{}", id)).into_response())
        }
        Err(DeleteGameError::NotFound) => Err(game_not_found(id)),
        Err(DeleteGameError::Internal) => {
            Err(ServiceError::Internal("Failed to delete game".to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;

    use crate::testing::{Part, TestApp, TestClient};

    /// Publishes a game and returns its canonical path.
    async fn publish(client: &TestClient, title: &str) -> String {
        let response = client
            .post_multipart(
                "/game/new",
                &[
                    Part::Text("title", title),
                    Part::Text("tagline", "Ribbit"),
                    Part::Text("tags", "Arcade, puzzle"),
                    Part::Text("description", "**Hop** around"),
                    Part::File("uploads", "build.zip", b"PK-data"),
                    Part::Text("uploads_metadata", r#"[{"is_web_build": true}]"#),
                    Part::File("screenshots", "shot.png", b"png-data"),
                ],
            )
            .await;
        assert_eq!(response.status, StatusCode::SEE_OTHER);
        response.location.unwrap()
    }

    fn game_id(path: &str) -> &str {
        path.split('/').nth(2).unwrap()
    }

    #[tokio::test]
    async fn test_publish_and_view_game() {
        let app = TestApp::new();
        let alice = app.logged_in("alice").await;
        let path = publish(&alice, "Space Frogs").await;
        assert!(path.ends_with("/space-frogs"));

        let page = alice.get(&path).await;
        assert_eq!(page.flashes(), vec!["Your game has been created"]);
        let game = &page.json["data"];
        assert_eq!(game["title"], "Space Frogs");
        assert_eq!(game["creator"], "alice");
        assert_eq!(game["can_edit"], true);
        assert!(game["description_html"].as_str().unwrap().contains("<strong>Hop</strong>"));
        assert_eq!(game["web_build"]["size"], "7 B");
        assert_eq!(game["screenshots"].as_array().unwrap().len(), 1);
        let tags: Vec<&str> = game["tags"]
            .as_array()
            .unwrap()
            .iter()
            .filter_map(|t| t.as_str())
            .collect();
        assert!(tags.contains(&"arcade") && tags.contains(&"puzzle"));

        let anonymous = app.client();
        let page = anonymous.get(&format!("/game/{}", game_id(&path))).await;
        assert_eq!(page.json["data"]["can_edit"], false);

        let listed = anonymous.get("/").await;
        assert_eq!(listed.json["data"]["total"], 1);
        assert_eq!(listed.json["data"]["items"][0]["url"], path.as_str());
        let tagged = anonymous.get("/tag/arcade").await;
        assert_eq!(tagged.json["data"]["games"]["total"], 1);
    }

    #[tokio::test]
    async fn test_non_canonical_slug_redirects() {
        let app = TestApp::new();
        let alice = app.logged_in("alice").await;
        let path = publish(&alice, "Space Frogs").await;

        let response = alice
            .get(&format!("/game/{}/old-title", game_id(&path)))
            .await;
        assert_eq!(response.status, StatusCode::SEE_OTHER);
        assert_eq!(response.location.as_deref(), Some(path.as_str()));
    }

    #[tokio::test]
    async fn test_missing_game_is_not_found() {
        let app = TestApp::new();
        let response = app.client().get("/game/999").await;
        assert_eq!(response.status, StatusCode::NOT_FOUND);
        assert_eq!(response.json["error"], "Game 999 not found");
    }

    #[tokio::test]
    async fn test_title_is_required() {
        let app = TestApp::new();
        let alice = app.logged_in("alice").await;
        let response = alice
            .post_multipart("/game/new", &[Part::Text("title", "  ")])
            .await;
        assert_eq!(response.location.as_deref(), Some("/game/new"));
        assert_eq!(
            alice.get("/game/new").await.flashes(),
            vec!["Title is required"]
        );
    }

    #[tokio::test]
    async fn test_edit_regenerates_slug() {
        let app = TestApp::new();
        let alice = app.logged_in("alice").await;
        let path = publish(&alice, "Space Frogs").await;
        let id = game_id(&path);

        let edit_page = alice.get(&format!("/game/{}/edit", id)).await;
        assert_eq!(edit_page.json["data"]["game"]["title"], "Space Frogs");

        let response = alice
            .post_multipart(
                &format!("/game/{}/edit", id),
                &[
                    Part::Text("title", "Space Toads"),
                    Part::Text("tags", "arcade"),
                ],
            )
            .await;
        assert_eq!(
            response.location.as_deref(),
            Some(format!("/game/{}/space-toads", id).as_str())
        );
    }

    #[tokio::test]
    async fn test_only_owner_can_edit_or_delete() {
        let app = TestApp::new();
        let alice = app.logged_in("alice").await;
        let bob = app.logged_in("bob").await;
        let path = publish(&alice, "Space Frogs").await;
        let id = game_id(&path);
        let game_page = format!("/game/{}", id);

        let response = bob.get(&format!("/game/{}/edit", id)).await;
        assert_eq!(response.location.as_deref(), Some(game_page.as_str()));
        let response = bob
            .post_multipart(
                &format!("/game/{}/edit", id),
                &[Part::Text("title", "Stolen")],
            )
            .await;
        assert_eq!(response.location.as_deref(), Some(game_page.as_str()));
        let response = bob.post_form(&format!("/game/{}/delete", id), "").await;
        assert_eq!(response.location.as_deref(), Some(game_page.as_str()));
        assert_eq!(bob.get(&game_page).await.json["data"]["title"], "Space Frogs");

        let response = alice.post_form(&format!("/game/{}/delete", id), "").await;
        assert_eq!(response.location.as_deref(), Some("/user/alice"));
        assert_eq!(alice.get(&game_page).await.status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_search_finds_published_game() {
        let app = TestApp::new();
        let alice = app.logged_in("alice").await;
        let path = publish(&alice, "Space Frogs").await;

        let page = app.client().get("/search?q=frogs").await;
        assert_eq!(page.json["data"]["query"], "frogs");
        assert_eq!(page.json["data"]["results"]["total"], 1);
        assert_eq!(page.json["data"]["results"]["items"][0]["url"], path.as_str());

        let empty = app.client().get("/search").await;
        assert_eq!(empty.json["data"]["results"]["total"], 0);
    }
}
