use crate::domain::{TaskId, UserId};

#[derive(Clone, Debug, PartialEq)]
pub enum Job {
    ExportData { task_id: TaskId, user_id: UserId },
}

impl Job {
    pub fn task_id(&self) -> TaskId {
        match self {
            Job::ExportData { task_id, .. } => *task_id,
        }
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum EnqueueError {
    #[error("Job queue is closed")]
    Closed,
}

pub trait JobQueuePort {
    fn enqueue(&self, job: Job) -> Result<(), EnqueueError>;
}
