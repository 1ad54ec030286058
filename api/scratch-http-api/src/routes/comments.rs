use axum::{
    Form,
    extract::{Path, State},
    response::{IntoResponse, Redirect, Response},
};
use scratch_app::{
    domain::{CommentId, GameId},
    workflow::comment::CommentError,
};
use validator::Validate;

use crate::{
    AppState, ServiceError,
    extract::CurrentUser,
    forms::{CommentForm, validation_messages},
    page::{back_with_error, back_with_errors, redirect_with_flash},
    session::Session,
};

pub async fn post_comment(
    CurrentUser(user): CurrentUser,
    session: Session,
    State(app_state): State<AppState>,
    Path(game_id): Path<i32>,
    Form(form): Form<CommentForm>,
) -> Result<Response, ServiceError> {
    let back = format!("/game/{}", game_id);
    if let Err(errors) = form.validate() {
        return Ok(back_with_errors(&session, &back, validation_messages(&errors)));
    }

    match app_state
        .app
        .comment_use_case
        .post_comment(GameId(game_id), user.id, &form.comment)
        .await
    {
        Ok(_) => Ok(redirect_with_flash(
            &session,
            &back,
            "Your comment has been posted",
        )),
        Err(CommentError::Invalid(message)) => Ok(back_with_error(&session, &back, message)),
        Err(CommentError::GameNotFound) => Err(ServiceError::NotFound(format!(
            "Game {} not found",
            game_id
        ))),
        Err(_) => Err(ServiceError::Internal("Failed to post comment".to_string())),
    }
}

pub async fn delete_comment(
    CurrentUser(user): CurrentUser,
    session: Session,
    State(app_state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Response, ServiceError> {
    match app_state
        .app
        .comment_use_case
        .delete_comment(CommentId(id), user.id)
        .await
    {
        Ok(game_id) => Ok(redirect_with_flash(
            &session,
            &format!("/game/{}", game_id),
            "Your comment has been deleted",
        )),
        Err(CommentError::NotAuthor(game_id)) => {
            Ok(Redirect::to(&format!("/game/{}", game_id)).into_response())
        }
        Err(CommentError::CommentNotFound) => Err(ServiceError::NotFound(format!(
            "Comment {} not found",
            id
        ))),
        Err(_) => Err(ServiceError::Internal(
            "Failed to delete comment".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use crate::testing::{Part, TestApp};

    #[tokio::test]
    async fn test_only_author_deletes_comment() {
        let app = TestApp::new();
        let alice = app.logged_in("alice").await;
        let bob = app.logged_in("bob").await;
        let path = alice
            .post_multipart("/game/new", &[Part::Text("title", "Space Frogs")])
            .await
            .location
            .unwrap();
        let id = path.split('/').nth(2).unwrap().to_string();
        let game_page = format!("/game/{}", id);

        let response = bob
            .post_form(&format!("/comment/{}", id), "comment=Nice+game")
            .await;
        assert_eq!(response.location.as_deref(), Some(game_page.as_str()));
        let page = bob.get(&game_page).await;
        let comment = &page.json["data"]["comments"][0];
        assert_eq!(comment["text"], "Nice game");
        assert_eq!(comment["author"], "bob");
        assert_eq!(comment["can_delete"], true);
        let comment_id = comment["id"].as_i64().unwrap();

        let response = alice
            .post_form(&format!("/delete_comment/{}", comment_id), "")
            .await;
        assert_eq!(response.location.as_deref(), Some(game_page.as_str()));
        let page = alice.get(&game_page).await;
        assert_eq!(page.json["data"]["comments"].as_array().unwrap().len(), 1);
        assert_eq!(page.json["data"]["comments"][0]["can_delete"], false);

        bob.post_form(&format!("/delete_comment/{}", comment_id), "")
            .await;
        let page = bob.get(&game_page).await;
        assert_eq!(page.flashes(), vec!["Your comment has been deleted"]);
        assert!(page.json["data"]["comments"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_empty_comment_is_rejected() {
        let app = TestApp::new();
        let alice = app.logged_in("alice").await;
        let path = alice
            .post_multipart("/game/new", &[Part::Text("title", "Space Frogs")])
            .await
            .location
            .unwrap();
        let id = path.split('/').nth(2).unwrap().to_string();

        alice
            .post_form(&format!("/comment/{}", id), "comment=")
            .await;
        let page = alice.get(&format!("/game/{}", id)).await;
        assert!(page.flashes().contains(&"Comment must not be empty".to_string()));
        assert!(page.json["data"]["comments"].as_array().unwrap().is_empty());
    }
}
