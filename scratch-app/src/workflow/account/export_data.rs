use std::sync::Arc;

use crate::{
    domain::{
        UserId,
        task::{EXPORT_DATA_TASK, Task, TaskRepository},
    },
    ports::jobs::{Job, JobQueuePort},
};

#[async_trait::async_trait]
pub trait ExportDataUseCase {
    async fn request_export(&self, user_id: UserId) -> Result<Task, ExportDataError>;
    async fn tasks_in_progress(&self, user_id: UserId) -> Result<Vec<Task>, ExportDataError>;
}

#[derive(Debug, PartialEq)]
pub enum ExportDataError {
    AlreadyInProgress,
    Internal,
}

pub struct ExportDataUseCaseImpl<T: TaskRepository, Q: JobQueuePort> {
    task_repository: Arc<T>,
    job_queue: Arc<Q>,
}

impl<T: TaskRepository, Q: JobQueuePort> ExportDataUseCaseImpl<T, Q> {
    pub fn new(task_repository: Arc<T>, job_queue: Arc<Q>) -> Self {
        Self {
            task_repository,
            job_queue,
        }
    }
}

#[async_trait::async_trait]
impl<T: TaskRepository + Send + Sync + 'static, Q: JobQueuePort + Send + Sync + 'static>
    ExportDataUseCase for ExportDataUseCaseImpl<T, Q>
{
    async fn request_export(&self, user_id: UserId) -> Result<Task, ExportDataError> {
        match self
            .task_repository
            .get_task_in_progress(user_id, EXPORT_DATA_TASK)
            .await
        {
            Ok(None) => {}
            Ok(Some(_)) => return Err(ExportDataError::AlreadyInProgress),
            Err(e) => {
                log::error!("Failed to look up tasks of user {}: {}", user_id, e);
                return Err(ExportDataError::Internal);
            }
        }

        let task = Task::new(EXPORT_DATA_TASK, Some("Exporting data..."), user_id);
        self.task_repository
            .create_task(task.clone())
            .await
            .map_err(|e| {
                log::error!("Failed to create export task for user {}: {}", user_id, e);
                ExportDataError::Internal
            })?;

        if let Err(e) = self.job_queue.enqueue(Job::ExportData {
            task_id: task.id,
            user_id,
        }) {
            log::error!("Failed to enqueue export of user {}: {}", user_id, e);
            // Without a worker the task would stay in progress forever.
            if let Err(e) = self.task_repository.mark_complete(task.id).await {
                log::error!("Failed to close task {}: {}", task.id, e);
            }
            return Err(ExportDataError::Internal);
        }

        log::info!("Export task {} started for user {}", task.id, user_id);
        Ok(task)
    }

    async fn tasks_in_progress(&self, user_id: UserId) -> Result<Vec<Task>, ExportDataError> {
        self.task_repository
            .list_tasks_in_progress(user_id)
            .await
            .map_err(|e| {
                log::error!("Failed to list tasks of user {}: {}", user_id, e);
                ExportDataError::Internal
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{InMemoryTaskRepository, RecordingJobQueue};

    #[tokio::test]
    async fn test_export_refuses_while_in_progress() {
        let tasks = Arc::new(InMemoryTaskRepository::default());
        let queue = Arc::new(RecordingJobQueue::default());
        let use_case = ExportDataUseCaseImpl::new(tasks.clone(), queue.clone());

        let task = use_case.request_export(UserId(1)).await.unwrap();
        assert_eq!(task.name, EXPORT_DATA_TASK);
        assert!(!task.complete);
        assert_eq!(
            queue.jobs(),
            vec![Job::ExportData {
                task_id: task.id,
                user_id: UserId(1)
            }]
        );
        assert_eq!(
            use_case.request_export(UserId(1)).await.unwrap_err(),
            ExportDataError::AlreadyInProgress
        );
        assert_eq!(use_case.tasks_in_progress(UserId(1)).await.unwrap(), vec![task.clone()]);

        // Other users are unaffected.
        assert!(use_case.request_export(UserId(2)).await.is_ok());

        tasks.mark_complete(task.id).await.unwrap();
        assert!(use_case.tasks_in_progress(UserId(1)).await.unwrap().is_empty());
        assert!(use_case.request_export(UserId(1)).await.is_ok());
    }

    #[tokio::test]
    async fn test_closed_queue_completes_task() {
        let tasks = Arc::new(InMemoryTaskRepository::default());
        let queue = Arc::new(RecordingJobQueue::closed());
        let use_case = ExportDataUseCaseImpl::new(tasks.clone(), queue);

        assert_eq!(
            use_case.request_export(UserId(1)).await.unwrap_err(),
            ExportDataError::Internal
        );
        assert!(use_case.tasks_in_progress(UserId(1)).await.unwrap().is_empty());
    }
}
