use crate::domain::{RepoError, RepoRetrieveError, RepoUpdateError, TaskId, UserId};

pub const EXPORT_DATA_TASK: &str = "export_data";

#[derive(Clone, Debug, PartialEq)]
pub struct Task {
    pub id: TaskId,
    pub name: String,
    pub description: Option<String>,
    pub user_id: UserId,
    pub complete: bool,
}

impl Task {
    pub fn new(name: &str, description: Option<&str>, user_id: UserId) -> Self {
        Self {
            id: TaskId::new(),
            name: name.to_string(),
            description: description.map(str::to_string),
            user_id,
            complete: false,
        }
    }
}

#[async_trait::async_trait]
pub trait TaskRepository {
    async fn create_task(&self, task: Task) -> Result<(), RepoError>;
    async fn get_task(&self, task_id: TaskId) -> Result<Task, RepoRetrieveError>;
    async fn mark_complete(&self, task_id: TaskId) -> Result<(), RepoUpdateError>;
    async fn list_tasks_in_progress(&self, user_id: UserId) -> Result<Vec<Task>, RepoError>;
    async fn get_task_in_progress(
        &self,
        user_id: UserId,
        name: &str,
    ) -> Result<Option<Task>, RepoError>;
}
