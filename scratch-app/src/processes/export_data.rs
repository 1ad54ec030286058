use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::{
    domain::{
        TaskId, UserId,
        comment::CommentRepository,
        game::GameRepository,
        task::TaskRepository,
        user::UserRepository,
    },
    ports::{
        email::{EmailAttachment, EmailMessage, EmailPort},
        jobs::Job,
    },
    processes::job_queue::JobHandler,
};

pub const EXPORT_DATA_SUBJECT: &str = "[scratch] Your Data Export";

#[derive(Debug, Serialize)]
struct ExportedGame {
    title: String,
    tagline: Option<String>,
    description: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
struct ExportedComment {
    text: String,
}

#[derive(Debug, Serialize)]
struct ExportedData {
    username: String,
    email: String,
    website: Option<String>,
    about: Option<String>,
    #[serde(rename = "2fa_enabled")]
    two_factor_enabled: bool,
    games: Vec<ExportedGame>,
    comments: Vec<ExportedComment>,
}

#[derive(Debug, thiserror::Error)]
enum ExportError {
    #[error("Failed to load {0}: {1}")]
    Load(&'static str, String),
    #[error("Failed to serialize export: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("Failed to send export: {0}")]
    Send(String),
}

/// Collects a user's data and mails it to them as `data.json`.
pub struct ExportDataJob<E: EmailPort, U: UserRepository, G: GameRepository, C: CommentRepository, T: TaskRepository>
{
    email_port: Arc<E>,
    user_repository: Arc<U>,
    game_repository: Arc<G>,
    comment_repository: Arc<C>,
    task_repository: Arc<T>,
}

impl<
    E: EmailPort + Send + Sync + 'static,
    U: UserRepository + Send + Sync + 'static,
    G: GameRepository + Send + Sync + 'static,
    C: CommentRepository + Send + Sync + 'static,
    T: TaskRepository + Send + Sync + 'static,
> ExportDataJob<E, U, G, C, T>
{
    pub fn new(
        email_port: Arc<E>,
        user_repository: Arc<U>,
        game_repository: Arc<G>,
        comment_repository: Arc<C>,
        task_repository: Arc<T>,
    ) -> Self {
        Self {
            email_port,
            user_repository,
            game_repository,
            comment_repository,
            task_repository,
        }
    }

    pub async fn run(&self, task_id: TaskId, user_id: UserId) {
        match self.export(user_id).await {
            Ok(()) => log::info!("Exported data of user {}", user_id),
            Err(e) => log::error!("Data export of user {} failed: {}", user_id, e),
        }
        if let Err(e) = self.task_repository.mark_complete(task_id).await {
            log::error!("Failed to mark task {} complete: {}", task_id, e);
        }
    }

    async fn export(&self, user_id: UserId) -> Result<(), ExportError> {
        let user = self
            .user_repository
            .get_user(user_id)
            .await
            .map_err(|e| ExportError::Load("user", e.to_string()))?;
        let games = self
            .game_repository
            .list_games_by_creator(user_id)
            .await
            .map_err(|e| ExportError::Load("games", e.to_string()))?;
        let comments = self
            .comment_repository
            .list_comments_by_author(user_id)
            .await
            .map_err(|e| ExportError::Load("comments", e.to_string()))?;

        let data = ExportedData {
            username: user.username.clone(),
            email: user.email.clone(),
            website: user.website.clone(),
            about: user.about.clone(),
            two_factor_enabled: user.is_2fa_enabled,
            games: games
                .into_iter()
                .map(|g| ExportedGame {
                    title: g.title,
                    tagline: g.tagline,
                    description: g.description,
                    created_at: g.created_at,
                    updated_at: g.updated_at,
                })
                .collect(),
            comments: comments
                .into_iter()
                .map(|c| ExportedComment { text: c.text })
                .collect(),
        };
        let json = serde_json::to_vec_pretty(&data)?;

        let message = EmailMessage::new(
            &user.email,
            EXPORT_DATA_SUBJECT,
            format!(
                "Dear {},\n\nPlease find attached the archive with your personal data that you requested.\n\nSincerely,\n\nThe scratch Team\n",
                user.username
            ),
        )
        .with_html(format!(
            "<p>Dear {},</p><p>Please find attached the archive with your personal data that you requested.</p><p>Sincerely,</p><p>The scratch Team</p>",
            user.username
        ))
        .with_attachment(EmailAttachment {
            filename: "data.json".to_string(),
            content_type: "application/json".to_string(),
            data: json,
        });

        let email_port = self.email_port.clone();
        tokio::task::spawn_blocking(move || email_port.send_email(&message))
            .await
            .map_err(|e| ExportError::Send(e.to_string()))?
            .map_err(|e| ExportError::Send(e.to_string()))
    }
}

#[async_trait::async_trait]
impl<
    E: EmailPort + Send + Sync + 'static,
    U: UserRepository + Send + Sync + 'static,
    G: GameRepository + Send + Sync + 'static,
    C: CommentRepository + Send + Sync + 'static,
    T: TaskRepository + Send + Sync + 'static,
> JobHandler for ExportDataJob<E, U, G, C, T>
{
    async fn handle(&self, job: Job) {
        match job {
            Job::ExportData { task_id, user_id } => self.run(task_id, user_id).await,
        }
    }
}
