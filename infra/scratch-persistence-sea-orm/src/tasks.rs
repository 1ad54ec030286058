use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set,
};
use scratch_app::domain::{
    RepoError, RepoRetrieveError, RepoUpdateError, TaskId, UserId,
    task::{Task, TaskRepository},
};

use crate::{entity::task, repo_error, retrieve_error, update_error};

pub struct TaskRepositoryImpl {
    db: DatabaseConnection,
}

impl TaskRepositoryImpl {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    fn model_to_task(model: task::Model) -> Result<Task, String> {
        let id = uuid::Uuid::parse_str(&model.id)
            .map_err(|e| format!("Invalid task id {}: {}", model.id, e))?;
        Ok(Task {
            id: TaskId(id),
            name: model.name,
            description: model.description,
            user_id: UserId(model.user_id),
            complete: model.complete,
        })
    }

    fn in_progress(user_id: UserId) -> sea_orm::Select<task::Entity> {
        task::Entity::find()
            .filter(task::Column::UserId.eq(user_id.0))
            .filter(task::Column::Complete.eq(false))
    }
}

#[async_trait::async_trait]
impl TaskRepository for TaskRepositoryImpl {
    async fn create_task(&self, task: Task) -> Result<(), RepoError> {
        task::ActiveModel {
            id: Set(task.id.to_string()),
            name: Set(task.name),
            description: Set(task.description),
            user_id: Set(task.user_id.0),
            complete: Set(task.complete),
        }
        .insert(&self.db)
        .await
        .map_err(repo_error)?;
        Ok(())
    }

    async fn get_task(&self, task_id: TaskId) -> Result<Task, RepoRetrieveError> {
        let model = task::Entity::find_by_id(task_id.to_string())
            .one(&self.db)
            .await
            .map_err(retrieve_error)?
            .ok_or(RepoRetrieveError::NotFound)?;
        Self::model_to_task(model).map_err(RepoRetrieveError::StorageError)
    }

    async fn mark_complete(&self, task_id: TaskId) -> Result<(), RepoUpdateError> {
        let mut model: task::ActiveModel = task::Entity::find_by_id(task_id.to_string())
            .one(&self.db)
            .await
            .map_err(update_error)?
            .ok_or(RepoUpdateError::NotFound)?
            .into();
        model.complete = Set(true);
        model.update(&self.db).await.map_err(update_error)?;
        Ok(())
    }

    async fn list_tasks_in_progress(&self, user_id: UserId) -> Result<Vec<Task>, RepoError> {
        Self::in_progress(user_id)
            .all(&self.db)
            .await
            .map_err(repo_error)?
            .into_iter()
            .map(|model| Self::model_to_task(model).map_err(RepoError::StorageError))
            .collect()
    }

    async fn get_task_in_progress(
        &self,
        user_id: UserId,
        name: &str,
    ) -> Result<Option<Task>, RepoError> {
        Self::in_progress(user_id)
            .filter(task::Column::Name.eq(name))
            .one(&self.db)
            .await
            .map_err(repo_error)?
            .map(|model| Self::model_to_task(model).map_err(RepoError::StorageError))
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use scratch_app::domain::{
        task::EXPORT_DATA_TASK,
        user::{NewUser, UserRepository},
    };

    use super::*;
    use crate::{test_db, users::UserRepositoryImpl};

    #[tokio::test]
    async fn test_task_lifecycle() {
        let db = test_db().await;
        let user = UserRepositoryImpl::new(db.clone())
            .create_user(NewUser {
                username: "alice".to_string(),
                email: "alice@example.com".to_string(),
                password_hash: "hash".to_string(),
            })
            .await
            .unwrap();
        let repo = TaskRepositoryImpl::new(db);
        let task = Task::new(EXPORT_DATA_TASK, Some("Exporting data..."), user.id);
        repo.create_task(task.clone()).await.unwrap();

        assert_eq!(repo.get_task(task.id).await.unwrap(), task);
        assert_eq!(
            repo.get_task_in_progress(user.id, EXPORT_DATA_TASK)
                .await
                .unwrap(),
            Some(task.clone())
        );
        assert_eq!(repo.list_tasks_in_progress(user.id).await.unwrap().len(), 1);

        repo.mark_complete(task.id).await.unwrap();
        assert!(repo.get_task(task.id).await.unwrap().complete);
        assert_eq!(
            repo.get_task_in_progress(user.id, EXPORT_DATA_TASK)
                .await
                .unwrap(),
            None
        );
        assert!(repo.list_tasks_in_progress(user.id).await.unwrap().is_empty());
        assert!(matches!(
            repo.mark_complete(TaskId::new()).await,
            Err(RepoUpdateError::NotFound)
        ));
    }
}
