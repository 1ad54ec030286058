//! In-memory fakes of the repositories and ports, shared by the use case tests.

use std::{
    collections::HashMap,
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use chrono::Utc;
use totp_rs::{Algorithm, Secret, TOTP};

use crate::{
    domain::{
        CommentId, GameId, PaginatedResponse, Pagination, RepoCreateError, RepoError,
        RepoRetrieveError, RepoUpdateError, ScreenshotId, TaskId, UploadId, UserId,
        comment::{Comment, CommentRepository, CommentWithAuthor},
        game::{Game, GameDraft, GameRepository},
        media::{IncomingFile, MediaRepository, NewUpload, Screenshot, Upload},
        tag::TagRepository,
        task::{Task, TaskRepository},
        two_factor::{TOTP_DIGITS, TOTP_STEP_SECS},
        user::{
            BcryptPasswordHasher, MIN_BCRYPT_COST, NewUser, ProfileUpdate, User, UserRepository,
        },
    },
    ports::{
        email::{EmailMessage, EmailPort, SendEmailError},
        jobs::{EnqueueError, Job, JobQueuePort},
        search::{SearchDocument, SearchError, SearchHits, SearchIndexPort},
        storage::{ObjectStoragePort, StorageError},
    },
};

pub fn test_hasher() -> Arc<BcryptPasswordHasher> {
    Arc::new(BcryptPasswordHasher::new(MIN_BCRYPT_COST))
}

pub fn totp_code(secret: &str, unix_time: u64) -> String {
    let secret = Secret::Encoded(secret.to_string()).to_bytes().unwrap();
    TOTP::new(
        Algorithm::SHA1,
        TOTP_DIGITS,
        0,
        TOTP_STEP_SECS,
        secret,
        None,
        "test".to_string(),
    )
    .unwrap()
    .generate(unix_time)
}

pub fn image(file_name: &str) -> IncomingFile {
    IncomingFile {
        file_name: file_name.to_string(),
        content_type: "image/png".to_string(),
        data: vec![0; 16],
    }
}

pub fn build(file_name: &str, size: usize) -> IncomingFile {
    IncomingFile {
        file_name: file_name.to_string(),
        content_type: "application/zip".to_string(),
        data: vec![0; size],
    }
}

#[derive(Default)]
pub struct InMemoryUserRepository {
    users: Mutex<Vec<User>>,
}

impl InMemoryUserRepository {
    /// Adds `{username}@example.com`. A secret also turns two-factor auth on.
    pub async fn add_user(&self, username: &str, password: &str, totp_secret: Option<&str>) -> User {
        let user = self
            .create_user(NewUser {
                username: username.to_string(),
                email: format!("{}@example.com", username),
                password_hash: bcrypt::hash(password, MIN_BCRYPT_COST).unwrap(),
            })
            .await
            .unwrap();
        if let Some(secret) = totp_secret {
            self.set_totp_secret_if_absent(user.id, secret.to_string())
                .await
                .unwrap();
            self.set_two_factor_enabled(user.id, true).await.unwrap();
        }
        self.get_user(user.id).await.unwrap()
    }

    fn update(&self, user_id: UserId, f: impl FnOnce(&mut User)) -> Result<(), RepoUpdateError> {
        let mut users = self.users.lock().unwrap();
        let user = users
            .iter_mut()
            .find(|u| u.id == user_id)
            .ok_or(RepoUpdateError::NotFound)?;
        f(user);
        Ok(())
    }

    fn find(&self, predicate: impl Fn(&User) -> bool) -> Result<User, RepoRetrieveError> {
        self.users
            .lock()
            .unwrap()
            .iter()
            .find(|u| predicate(u))
            .cloned()
            .ok_or(RepoRetrieveError::NotFound)
    }
}

#[async_trait::async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn create_user(&self, new_user: NewUser) -> Result<User, RepoCreateError> {
        let mut users = self.users.lock().unwrap();
        if users
            .iter()
            .any(|u| u.username == new_user.username || u.email == new_user.email)
        {
            return Err(RepoCreateError::Conflict);
        }
        let user = User {
            id: UserId(users.len() as i32 + 1),
            username: new_user.username,
            email: new_user.email,
            password_hash: new_user.password_hash,
            website: None,
            about: None,
            totp_secret: None,
            is_2fa_enabled: false,
            created_at: Utc::now(),
        };
        users.push(user.clone());
        Ok(user)
    }

    async fn get_user(&self, user_id: UserId) -> Result<User, RepoRetrieveError> {
        self.find(|u| u.id == user_id)
    }

    async fn get_user_by_username(&self, username: &str) -> Result<User, RepoRetrieveError> {
        self.find(|u| u.username == username)
    }

    async fn get_user_by_email(&self, email: &str) -> Result<User, RepoRetrieveError> {
        self.find(|u| u.email == email)
    }

    async fn update_profile(
        &self,
        user_id: UserId,
        update: ProfileUpdate,
    ) -> Result<(), RepoUpdateError> {
        self.update(user_id, |u| {
            u.website = update.website;
            u.about = update.about;
        })
    }

    async fn update_password_hash(
        &self,
        user_id: UserId,
        password_hash: String,
    ) -> Result<(), RepoUpdateError> {
        self.update(user_id, |u| u.password_hash = password_hash)
    }

    async fn set_totp_secret_if_absent(
        &self,
        user_id: UserId,
        secret: String,
    ) -> Result<String, RepoUpdateError> {
        let mut stored = String::new();
        self.update(user_id, |u| {
            stored = u.totp_secret.get_or_insert(secret).clone();
        })?;
        Ok(stored)
    }

    async fn set_two_factor_enabled(
        &self,
        user_id: UserId,
        enabled: bool,
    ) -> Result<(), RepoUpdateError> {
        self.update(user_id, |u| u.is_2fa_enabled = enabled)
    }
}

#[derive(Default)]
pub struct InMemoryTagRepository {
    tags: Mutex<HashMap<GameId, Vec<String>>>,
}

impl InMemoryTagRepository {
    fn games_with_tag(&self, tag: &str) -> Vec<GameId> {
        self.tags
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, tags)| tags.iter().any(|t| t == tag))
            .map(|(game_id, _)| *game_id)
            .collect()
    }
}

#[async_trait::async_trait]
impl TagRepository for InMemoryTagRepository {
    async fn set_game_tags(&self, game_id: GameId, tags: &[String]) -> Result<(), RepoError> {
        self.tags.lock().unwrap().insert(game_id, tags.to_vec());
        Ok(())
    }

    async fn get_game_tags(&self, game_id: GameId) -> Result<Vec<String>, RepoError> {
        Ok(self
            .tags
            .lock()
            .unwrap()
            .get(&game_id)
            .cloned()
            .unwrap_or_default())
    }
}

#[derive(Default)]
pub struct InMemoryGameRepository {
    games: Mutex<Vec<Game>>,
    next_id: Mutex<i32>,
    tags: Option<Arc<InMemoryTagRepository>>,
}

impl InMemoryGameRepository {
    /// Resolves tag listings through `tags`.
    pub fn with_tags(tags: Arc<InMemoryTagRepository>) -> Self {
        Self {
            tags: Some(tags),
            ..Default::default()
        }
    }

    fn page(games: Vec<Game>, pagination: Pagination) -> PaginatedResponse<Game> {
        let total = games.len() as u64;
        PaginatedResponse {
            items: games
                .into_iter()
                .rev()
                .skip(pagination.offset() as usize)
                .take(pagination.per_page as usize)
                .collect(),
            total,
            page: pagination.page,
            per_page: pagination.per_page,
        }
    }
}

#[async_trait::async_trait]
impl GameRepository for InMemoryGameRepository {
    async fn create_game(
        &self,
        draft: GameDraft,
        creator_id: UserId,
    ) -> Result<Game, RepoCreateError> {
        let mut next_id = self.next_id.lock().unwrap();
        *next_id += 1;
        let now = Utc::now();
        let game = Game {
            id: GameId(*next_id),
            title: draft.title().to_string(),
            slug: draft.slug().to_string(),
            tagline: draft.tagline,
            description: draft.description,
            cover_filepath: None,
            created_at: now,
            updated_at: now,
            creator_id,
        };
        self.games.lock().unwrap().push(game.clone());
        Ok(game)
    }

    async fn get_game(&self, game_id: GameId) -> Result<Game, RepoRetrieveError> {
        self.games
            .lock()
            .unwrap()
            .iter()
            .find(|g| g.id == game_id)
            .cloned()
            .ok_or(RepoRetrieveError::NotFound)
    }

    async fn update_game(
        &self,
        game_id: GameId,
        draft: GameDraft,
    ) -> Result<Game, RepoUpdateError> {
        let mut games = self.games.lock().unwrap();
        let game = games
            .iter_mut()
            .find(|g| g.id == game_id)
            .ok_or(RepoUpdateError::NotFound)?;
        game.title = draft.title().to_string();
        game.slug = draft.slug().to_string();
        game.tagline = draft.tagline;
        game.description = draft.description;
        game.updated_at = Utc::now();
        Ok(game.clone())
    }

    async fn set_cover(
        &self,
        game_id: GameId,
        cover_filepath: Option<String>,
    ) -> Result<(), RepoUpdateError> {
        let mut games = self.games.lock().unwrap();
        let game = games
            .iter_mut()
            .find(|g| g.id == game_id)
            .ok_or(RepoUpdateError::NotFound)?;
        game.cover_filepath = cover_filepath;
        Ok(())
    }

    async fn delete_game(&self, game_id: GameId) -> Result<(), RepoUpdateError> {
        let mut games = self.games.lock().unwrap();
        let before = games.len();
        games.retain(|g| g.id != game_id);
        if games.len() == before {
            return Err(RepoUpdateError::NotFound);
        }
        Ok(())
    }

    async fn get_games_by_ids(&self, game_ids: &[GameId]) -> Result<Vec<Game>, RepoError> {
        Ok(self
            .games
            .lock()
            .unwrap()
            .iter()
            .filter(|g| game_ids.contains(&g.id))
            .cloned()
            .collect())
    }

    async fn list_games_by_creator(&self, creator_id: UserId) -> Result<Vec<Game>, RepoError> {
        Ok(self
            .games
            .lock()
            .unwrap()
            .iter()
            .filter(|g| g.creator_id == creator_id)
            .cloned()
            .collect())
    }

    async fn list_recent_games(
        &self,
        pagination: Pagination,
    ) -> Result<PaginatedResponse<Game>, RepoError> {
        let games = self.games.lock().unwrap().clone();
        Ok(Self::page(games, pagination))
    }

    async fn list_games_by_tag(
        &self,
        tag: &str,
        pagination: Pagination,
    ) -> Result<PaginatedResponse<Game>, RepoError> {
        let tagged = self
            .tags
            .as_ref()
            .map(|tags| tags.games_with_tag(tag))
            .unwrap_or_default();
        let games = self
            .games
            .lock()
            .unwrap()
            .iter()
            .filter(|g| tagged.contains(&g.id))
            .cloned()
            .collect();
        Ok(Self::page(games, pagination))
    }
}

#[derive(Default)]
pub struct InMemoryMediaRepository {
    uploads: Mutex<Vec<Upload>>,
    screenshots: Mutex<Vec<Screenshot>>,
    next_id: Mutex<i32>,
}

impl InMemoryMediaRepository {
    fn next_id(&self) -> i32 {
        let mut next_id = self.next_id.lock().unwrap();
        *next_id += 1;
        *next_id
    }
}

#[async_trait::async_trait]
impl MediaRepository for InMemoryMediaRepository {
    async fn add_upload(&self, game_id: GameId, upload: NewUpload) -> Result<Upload, RepoError> {
        let id = UploadId(self.next_id());
        let mut uploads = self.uploads.lock().unwrap();
        if upload.is_web_build {
            for existing in uploads.iter_mut().filter(|u| u.game_id == game_id) {
                existing.is_web_build = false;
            }
        }
        let upload = Upload {
            id,
            game_id,
            filepath: upload.filepath,
            size: upload.size,
            is_web_build: upload.is_web_build,
        };
        uploads.push(upload.clone());
        Ok(upload)
    }

    async fn list_uploads(&self, game_id: GameId) -> Result<Vec<Upload>, RepoError> {
        Ok(self
            .uploads
            .lock()
            .unwrap()
            .iter()
            .filter(|u| u.game_id == game_id)
            .cloned()
            .collect())
    }

    async fn delete_upload(
        &self,
        game_id: GameId,
        upload_id: UploadId,
    ) -> Result<Upload, RepoUpdateError> {
        let mut uploads = self.uploads.lock().unwrap();
        let index = uploads
            .iter()
            .position(|u| u.id == upload_id && u.game_id == game_id)
            .ok_or(RepoUpdateError::NotFound)?;
        Ok(uploads.remove(index))
    }

    async fn add_screenshot(
        &self,
        game_id: GameId,
        filepath: String,
        order: i32,
    ) -> Result<Screenshot, RepoError> {
        let screenshot = Screenshot {
            id: ScreenshotId(self.next_id()),
            game_id,
            filepath,
            order,
        };
        self.screenshots.lock().unwrap().push(screenshot.clone());
        Ok(screenshot)
    }

    async fn list_screenshots(&self, game_id: GameId) -> Result<Vec<Screenshot>, RepoError> {
        let mut screenshots: Vec<Screenshot> = self
            .screenshots
            .lock()
            .unwrap()
            .iter()
            .filter(|s| s.game_id == game_id)
            .cloned()
            .collect();
        screenshots.sort_by_key(|s| s.order);
        Ok(screenshots)
    }

    async fn delete_screenshot(
        &self,
        game_id: GameId,
        screenshot_id: ScreenshotId,
    ) -> Result<Screenshot, RepoUpdateError> {
        let mut screenshots = self.screenshots.lock().unwrap();
        let index = screenshots
            .iter()
            .position(|s| s.id == screenshot_id && s.game_id == game_id)
            .ok_or(RepoUpdateError::NotFound)?;
        Ok(screenshots.remove(index))
    }
}

pub struct InMemoryCommentRepository {
    comments: Mutex<Vec<Comment>>,
    users: Arc<InMemoryUserRepository>,
}

impl InMemoryCommentRepository {
    pub fn new(users: Arc<InMemoryUserRepository>) -> Self {
        Self {
            comments: Mutex::new(Vec::new()),
            users,
        }
    }
}

#[async_trait::async_trait]
impl CommentRepository for InMemoryCommentRepository {
    async fn create_comment(
        &self,
        game_id: GameId,
        author_id: UserId,
        text: String,
    ) -> Result<Comment, RepoError> {
        let mut comments = self.comments.lock().unwrap();
        let comment = Comment {
            id: CommentId(comments.iter().map(|c| c.id.0).max().unwrap_or(0) + 1),
            text,
            created_at: Utc::now(),
            game_id,
            author_id,
        };
        comments.push(comment.clone());
        Ok(comment)
    }

    async fn get_comment(&self, comment_id: CommentId) -> Result<Comment, RepoRetrieveError> {
        self.comments
            .lock()
            .unwrap()
            .iter()
            .find(|c| c.id == comment_id)
            .cloned()
            .ok_or(RepoRetrieveError::NotFound)
    }

    async fn delete_comment(&self, comment_id: CommentId) -> Result<(), RepoUpdateError> {
        let mut comments = self.comments.lock().unwrap();
        let before = comments.len();
        comments.retain(|c| c.id != comment_id);
        if comments.len() == before {
            return Err(RepoUpdateError::NotFound);
        }
        Ok(())
    }

    async fn list_comments_for_game(
        &self,
        game_id: GameId,
    ) -> Result<Vec<CommentWithAuthor>, RepoError> {
        let comments: Vec<Comment> = self
            .comments
            .lock()
            .unwrap()
            .iter()
            .rev()
            .filter(|c| c.game_id == game_id)
            .cloned()
            .collect();
        let mut with_authors = Vec::with_capacity(comments.len());
        for comment in comments {
            let author = self
                .users
                .get_user(comment.author_id)
                .await
                .map_err(|e| RepoError::StorageError(e.to_string()))?;
            with_authors.push(CommentWithAuthor {
                comment,
                author_username: author.username,
            });
        }
        Ok(with_authors)
    }

    async fn list_comments_by_author(&self, author_id: UserId) -> Result<Vec<Comment>, RepoError> {
        Ok(self
            .comments
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.author_id == author_id)
            .cloned()
            .collect())
    }
}

#[derive(Default)]
pub struct InMemoryTaskRepository {
    tasks: Mutex<Vec<Task>>,
}

#[async_trait::async_trait]
impl TaskRepository for InMemoryTaskRepository {
    async fn create_task(&self, task: Task) -> Result<(), RepoError> {
        self.tasks.lock().unwrap().push(task);
        Ok(())
    }

    async fn get_task(&self, task_id: TaskId) -> Result<Task, RepoRetrieveError> {
        self.tasks
            .lock()
            .unwrap()
            .iter()
            .find(|t| t.id == task_id)
            .cloned()
            .ok_or(RepoRetrieveError::NotFound)
    }

    async fn mark_complete(&self, task_id: TaskId) -> Result<(), RepoUpdateError> {
        let mut tasks = self.tasks.lock().unwrap();
        let task = tasks
            .iter_mut()
            .find(|t| t.id == task_id)
            .ok_or(RepoUpdateError::NotFound)?;
        task.complete = true;
        Ok(())
    }

    async fn list_tasks_in_progress(&self, user_id: UserId) -> Result<Vec<Task>, RepoError> {
        Ok(self
            .tasks
            .lock()
            .unwrap()
            .iter()
            .filter(|t| t.user_id == user_id && !t.complete)
            .cloned()
            .collect())
    }

    async fn get_task_in_progress(
        &self,
        user_id: UserId,
        name: &str,
    ) -> Result<Option<Task>, RepoError> {
        Ok(self
            .tasks
            .lock()
            .unwrap()
            .iter()
            .find(|t| t.user_id == user_id && t.name == name && !t.complete)
            .cloned())
    }
}

#[derive(Default)]
pub struct InMemoryObjectStorage {
    objects: Mutex<HashMap<String, Vec<u8>>>,
    fail_uploads: AtomicBool,
}

impl InMemoryObjectStorage {
    pub fn contains(&self, path: &str) -> bool {
        self.objects.lock().unwrap().contains_key(path)
    }

    pub fn is_empty(&self) -> bool {
        self.objects.lock().unwrap().is_empty()
    }

    pub fn fail_uploads(&self) {
        self.fail_uploads.store(true, Ordering::SeqCst);
    }
}

#[async_trait::async_trait]
impl ObjectStoragePort for InMemoryObjectStorage {
    async fn upload(
        &self,
        path: &str,
        data: Vec<u8>,
        _content_type: &str,
    ) -> Result<(), StorageError> {
        if self.fail_uploads.load(Ordering::SeqCst) {
            return Err(StorageError::Backend("uploads disabled".to_string()));
        }
        self.objects.lock().unwrap().insert(path.to_string(), data);
        Ok(())
    }

    async fn delete(&self, path: &str) -> Result<(), StorageError> {
        self.objects.lock().unwrap().remove(path);
        Ok(())
    }

    fn public_url(&self, path: &str) -> String {
        format!("/media/{}", path)
    }
}

#[derive(Default)]
pub struct InMemorySearchIndex {
    documents: Mutex<Vec<SearchDocument>>,
    fail_queries: AtomicBool,
}

impl InMemorySearchIndex {
    pub fn document(&self, game_id: GameId) -> Option<SearchDocument> {
        self.documents
            .lock()
            .unwrap()
            .iter()
            .find(|d| d.id == game_id)
            .cloned()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.lock().unwrap().is_empty()
    }

    pub fn fail_queries(&self) {
        self.fail_queries.store(true, Ordering::SeqCst);
    }
}

#[async_trait::async_trait]
impl SearchIndexPort for InMemorySearchIndex {
    async fn index_game(&self, document: SearchDocument) -> Result<(), SearchError> {
        let mut documents = self.documents.lock().unwrap();
        documents.retain(|d| d.id != document.id);
        documents.push(document);
        Ok(())
    }

    async fn remove_game(&self, game_id: GameId) -> Result<(), SearchError> {
        self.documents.lock().unwrap().retain(|d| d.id != game_id);
        Ok(())
    }

    /// Case-insensitive substring match, in insertion order.
    async fn query_games(
        &self,
        query: &str,
        page: u64,
        per_page: u64,
    ) -> Result<SearchHits, SearchError> {
        if self.fail_queries.load(Ordering::SeqCst) {
            return Err(SearchError::Backend("index unavailable".to_string()));
        }
        let query = query.to_lowercase();
        let matches = |text: &str| text.to_lowercase().contains(&query);
        let ids: Vec<GameId> = self
            .documents
            .lock()
            .unwrap()
            .iter()
            .filter(|d| {
                matches(&d.title)
                    || d.tagline.as_deref().is_some_and(matches)
                    || d.description.as_deref().is_some_and(matches)
                    || d.tags.iter().any(|t| matches(t))
            })
            .map(|d| d.id)
            .collect();
        Ok(SearchHits {
            total: ids.len() as u64,
            ids: ids
                .into_iter()
                .skip(((page.max(1) - 1) * per_page) as usize)
                .take(per_page as usize)
                .collect(),
        })
    }
}

#[derive(Default)]
pub struct RecordingEmailPort {
    sent: Mutex<Vec<EmailMessage>>,
}

impl RecordingEmailPort {
    pub fn messages(&self) -> Vec<EmailMessage> {
        self.sent.lock().unwrap().clone()
    }

    /// Waits for messages handed to a background sender.
    pub async fn wait_for_messages(&self, count: usize) -> Vec<EmailMessage> {
        for _ in 0..200 {
            let sent = self.messages();
            if sent.len() >= count {
                return sent;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("expected {} emails, got {}", count, self.messages().len());
    }
}

impl EmailPort for RecordingEmailPort {
    fn send_email(&self, message: &EmailMessage) -> Result<(), SendEmailError> {
        self.sent.lock().unwrap().push(message.clone());
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingJobQueue {
    jobs: Mutex<Vec<Job>>,
    closed: bool,
}

impl RecordingJobQueue {
    pub fn closed() -> Self {
        Self {
            jobs: Mutex::new(Vec::new()),
            closed: true,
        }
    }

    pub fn jobs(&self) -> Vec<Job> {
        self.jobs.lock().unwrap().clone()
    }
}

impl JobQueuePort for RecordingJobQueue {
    fn enqueue(&self, job: Job) -> Result<(), EnqueueError> {
        if self.closed {
            return Err(EnqueueError::Closed);
        }
        self.jobs.lock().unwrap().push(job);
        Ok(())
    }
}
