use std::sync::Arc;

use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};
use tokio_util::sync::CancellationToken;

use crate::ports::jobs::{EnqueueError, Job, JobQueuePort};

pub struct TokioJobQueue {
    sender: UnboundedSender<Job>,
}

impl TokioJobQueue {
    pub fn channel() -> (Self, UnboundedReceiver<Job>) {
        let (sender, receiver) = unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl JobQueuePort for TokioJobQueue {
    fn enqueue(&self, job: Job) -> Result<(), EnqueueError> {
        self.sender.send(job).map_err(|_| EnqueueError::Closed)
    }
}

#[async_trait::async_trait]
pub trait JobHandler {
    async fn handle(&self, job: Job);
}

/// Runs queued jobs one at a time.
pub struct JobRunner<H: JobHandler> {
    receiver: UnboundedReceiver<Job>,
    handler: Arc<H>,
    shutdown: CancellationToken,
}

impl<H: JobHandler + Send + Sync + 'static> JobRunner<H> {
    pub fn new(
        receiver: UnboundedReceiver<Job>,
        handler: Arc<H>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            receiver,
            handler,
            shutdown,
        }
    }

    pub async fn run(mut self) {
        loop {
            let job = tokio::select! {
                _ = self.shutdown.cancelled() => {
                    log::info!("Job runner shutting down");
                    return;
                }
                job = self.receiver.recv() => job,
            };
            let Some(job) = job else {
                log::info!("Job queue closed");
                return;
            };
            log::debug!("Running job for task {}", job.task_id());
            self.handler.handle(job).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::domain::{TaskId, UserId};

    #[derive(Default)]
    struct RecordingHandler {
        handled: Mutex<Vec<Job>>,
    }

    #[async_trait::async_trait]
    impl JobHandler for RecordingHandler {
        async fn handle(&self, job: Job) {
            self.handled.lock().unwrap().push(job);
        }
    }

    fn job(user: i32) -> Job {
        Job::ExportData {
            task_id: TaskId::new(),
            user_id: UserId(user),
        }
    }

    #[tokio::test]
    async fn test_runner_drains_queue_in_order() {
        let (queue, receiver) = TokioJobQueue::channel();
        let handler = Arc::new(RecordingHandler::default());
        let jobs = vec![job(1), job(2)];
        for job in &jobs {
            queue.enqueue(job.clone()).unwrap();
        }
        drop(queue);

        JobRunner::new(receiver, handler.clone(), CancellationToken::new())
            .run()
            .await;
        assert_eq!(*handler.handled.lock().unwrap(), jobs);
    }

    #[tokio::test]
    async fn test_runner_stops_on_shutdown() {
        let (queue, receiver) = TokioJobQueue::channel();
        let shutdown = CancellationToken::new();
        let runner = tokio::spawn(
            JobRunner::new(
                receiver,
                Arc::new(RecordingHandler::default()),
                shutdown.clone(),
            )
            .run(),
        );
        shutdown.cancel();
        runner.await.unwrap();

        // The receiver is gone once the runner stopped.
        assert!(matches!(queue.enqueue(job(1)), Err(EnqueueError::Closed)));
    }
}
