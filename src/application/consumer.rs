use crate::application::orchestrator::{JobOrchestrator, JobOutcome};
use crate::domain::error::TransportError;
use crate::domain::jobs::{Task, TranscodeRequest, TriggerResponse, TriggerStatus};
use crate::ports::persistence::PersistenceGateway;
use crate::ports::queue::{Delivery, QueueClient, QueueError};
use crate::ports::trigger::TranscodeTrigger;
use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinSet;

/// Pause after a broker error before polling again.
const ERROR_BACKOFF: Duration = Duration::from_secs(1);

#[derive(Debug, Clone)]
pub struct ConsumerConfig {
    /// Concurrent jobs in this process. Each worker holds at most one delivery.
    pub workers: usize,
    pub poll_interval: Duration,
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self {
            workers: 1,
            poll_interval: Duration::from_secs(10),
        }
    }
}

/// What happened to a delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Acked,
    Rejected,
}

/// Runs the orchestrator in the consumer's own process.
///
/// Always answers, so deliveries handled through it are only rejected on decode failure.
pub struct InProcessTrigger<P> {
    orchestrator: Arc<JobOrchestrator<P>>,
}

impl<P> InProcessTrigger<P> {
    pub fn new(orchestrator: Arc<JobOrchestrator<P>>) -> Self {
        Self { orchestrator }
    }
}

#[async_trait]
impl<P> TranscodeTrigger for InProcessTrigger<P>
where
    P: PersistenceGateway + 'static,
{
    async fn trigger(&self, request: &TranscodeRequest) -> Result<TriggerResponse, TransportError> {
        let response = match self.orchestrator.run(request).await {
            Ok(report) => TriggerResponse {
                video_id: report.video_id,
                status: TriggerStatus::Accepted,
                message: match report.outcome {
                    JobOutcome::Ready => "ready".to_string(),
                    other => format!("{:?}", other),
                },
            },
            Err(e) => TriggerResponse {
                video_id: request.video_id.clone(),
                status: TriggerStatus::Rejected,
                message: e.to_string(),
            },
        };
        Ok(response)
    }
}

/// Pulls tasks off the queue and hands each one to the orchestrator.
pub struct JobConsumer<Q, T> {
    queue: Arc<Q>,
    trigger: Arc<T>,
    config: ConsumerConfig,
}

impl<Q, T> JobConsumer<Q, T>
where
    Q: QueueClient + 'static,
    T: TranscodeTrigger + 'static,
{
    pub fn new(queue: Arc<Q>, trigger: Arc<T>, config: ConsumerConfig) -> Self {
        Self {
            queue,
            trigger,
            config,
        }
    }

    /// Decodes, triggers and settles one delivery, blocking for the whole job.
    ///
    /// Any answer from the orchestrator acks, including a refusal after a failed
    /// probe: such a job is not redelivered. Only undecodable payloads and
    /// unreachable orchestrators reject.
    pub async fn handle(&self, delivery: &Q::Delivery) -> Disposition {
        let task = match Task::from_payload(delivery.payload()) {
            Ok(task) => task,
            Err(e) => {
                tracing::error!(error = %e, "failed to read task message");
                settle(delivery, Disposition::Rejected).await;
                return Disposition::Rejected;
            }
        };

        tracing::info!(
            video_id = %task.id,
            path = %task.file_path,
            enqueued_at = %task.enqueued_at,
            "processing task"
        );

        let disposition = match self.trigger.trigger(&task.request()).await {
            Ok(response) => {
                match response.status {
                    TriggerStatus::Accepted => {
                        tracing::info!(video_id = %task.id, message = %response.message, "transcode finished")
                    }
                    TriggerStatus::Rejected => tracing::warn!(
                        video_id = %task.id,
                        message = %response.message,
                        "transcode refused, task will not be retried"
                    ),
                }
                Disposition::Acked
            }
            Err(e) => {
                tracing::warn!(video_id = %task.id, error = %e, "orchestrator unreachable");
                Disposition::Rejected
            }
        };

        settle(delivery, disposition).await;
        disposition
    }

    /// Polls once and handles the delivery if one arrived.
    pub async fn process_next(&self) -> Result<Option<Disposition>, QueueError> {
        match self.queue.receive(self.config.poll_interval).await? {
            Some(delivery) => Ok(Some(self.handle(&delivery).await)),
            None => Ok(None),
        }
    }

    /// One worker: one delivery at a time until `shutdown` flips to true or
    /// the queue closes.
    ///
    /// Shutdown is checked between polls, so an in-flight job always finishes.
    pub async fn run_worker(&self, worker_id: usize, shutdown: watch::Receiver<bool>) {
        tracing::info!(worker_id, "worker started");
        while !*shutdown.borrow() {
            match self.process_next().await {
                Ok(Some(disposition)) => {
                    tracing::debug!(worker_id, ?disposition, "delivery settled")
                }
                Ok(None) => continue,
                Err(QueueError::Closed) => break,
                Err(e) => {
                    tracing::error!(worker_id, error = %e, "queue error");
                    tokio::time::sleep(ERROR_BACKOFF).await;
                }
            }
        }
        tracing::info!(worker_id, "worker stopped");
    }

    /// Runs `config.workers` workers until `shutdown` resolves, then waits for them.
    pub async fn run_until<F>(self: Arc<Self>, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        let (stop_tx, stop_rx) = watch::channel(false);
        let mut workers = JoinSet::new();
        for worker_id in 0..self.config.workers.max(1) {
            let consumer = self.clone();
            let stop = stop_rx.clone();
            workers.spawn(async move { consumer.run_worker(worker_id, stop).await });
        }
        tracing::info!(workers = workers.len(), "consumer running");

        shutdown.await;
        tracing::info!("shutdown requested, finishing in-flight jobs");
        let _ = stop_tx.send(true);

        while let Some(result) = workers.join_next().await {
            if let Err(e) = result {
                tracing::error!(error = %e, "worker task panicked");
            }
        }
    }
}

async fn settle<D: Delivery>(delivery: &D, disposition: Disposition) {
    let result = match disposition {
        Disposition::Acked => delivery.ack().await,
        Disposition::Rejected => delivery.reject().await,
    };
    if let Err(e) = result {
        tracing::error!(?disposition, error = %e, "could not settle delivery");
    }
}
