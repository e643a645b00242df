//! Explicit fulfillment job queue.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use chrono::{TimeDelta, Utc};
use store::OrderId;
use tokio::sync::{Notify, mpsc};

use crate::coordinator::Fulfill;
use crate::state::{Job, JobState};

/// How long a finished job stays readable before it may be pruned.
pub const JOB_RETENTION: Duration = Duration::from_secs(60 * 60);

struct Jobs {
    by_order: RwLock<HashMap<OrderId, Job>>,
    finished: Notify,
    retention: TimeDelta,
}

impl Jobs {
    fn new(retention: Duration) -> Self {
        Self {
            by_order: RwLock::new(HashMap::new()),
            finished: Notify::new(),
            retention: TimeDelta::from_std(retention).unwrap_or(TimeDelta::MAX),
        }
    }

    /// Drops finished jobs older than the retention window.
    fn prune(&self, jobs: &mut HashMap<OrderId, Job>) {
        let Some(cutoff) = Utc::now().checked_sub_signed(self.retention) else {
            return;
        };
        let before = jobs.len();
        jobs.retain(|_, job| job.finished_at.is_none_or(|finished| finished > cutoff));
        let pruned = before - jobs.len();
        if pruned > 0 {
            tracing::debug!(pruned, "Pruned finished fulfillment jobs");
        }
    }

    fn set(&self, order_id: OrderId, state: JobState) {
        let terminal = state.is_terminal();
        let mut jobs = self.by_order.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(job) = jobs.get_mut(&order_id) {
            job.state = state;
            if terminal {
                job.finished_at = Some(Utc::now());
            }
        }
        drop(jobs);
        if terminal {
            self.finished.notify_waiters();
        }
    }

    fn get(&self, order_id: OrderId) -> Option<Job> {
        self.by_order
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&order_id)
            .cloned()
    }
}

/// Queue of fulfillment jobs, one per order id.
///
/// [`enqueue`](Self::enqueue) records a `queued` job and hands the order id
/// to a background worker, which runs each job in its own task. Job state
/// stays readable after the job finishes, until the retention window
/// ([`JOB_RETENTION`] by default) has passed. Expired jobs are pruned on the
/// next enqueue.
#[derive(Clone)]
pub struct FulfillmentQueue {
    jobs: Arc<Jobs>,
    sender: mpsc::UnboundedSender<OrderId>,
}

impl FulfillmentQueue {
    /// Starts the worker on the current tokio runtime.
    pub fn start(processor: Arc<dyn Fulfill>) -> Self {
        Self::with_retention(processor, JOB_RETENTION)
    }

    /// Starts the worker, keeping finished jobs for `retention`.
    pub fn with_retention(processor: Arc<dyn Fulfill>, retention: Duration) -> Self {
        let jobs = Arc::new(Jobs::new(retention));
        let (sender, receiver) = mpsc::unbounded_channel();
        tokio::spawn(run_worker(receiver, processor, jobs.clone()));
        Self { jobs, sender }
    }

    /// Queues fulfillment for `order_id`.
    ///
    /// Returns false if a job for the order is already queued or running.
    /// A finished job is replaced.
    pub fn enqueue(&self, order_id: OrderId) -> bool {
        {
            let mut jobs = self
                .jobs
                .by_order
                .write()
                .unwrap_or_else(PoisonError::into_inner);
            self.jobs.prune(&mut jobs);
            if jobs.get(&order_id).is_some_and(|job| !job.state.is_terminal()) {
                return false;
            }
            jobs.insert(
                order_id,
                Job {
                    order_id,
                    state: JobState::Queued,
                    enqueued_at: Utc::now(),
                    finished_at: None,
                },
            );
        }

        if self.sender.send(order_id).is_err() {
            tracing::error!(%order_id, "Fulfillment worker has stopped");
            self.jobs.set(
                order_id,
                JobState::Errored {
                    error: "fulfillment worker stopped".to_string(),
                },
            );
            return false;
        }
        metrics::counter!("fulfillment_jobs_enqueued_total").increment(1);
        tracing::debug!(%order_id, "Fulfillment queued");
        true
    }

    /// Returns the job for `order_id`, if one was ever enqueued.
    pub fn job(&self, order_id: OrderId) -> Option<Job> {
        self.jobs.get(order_id)
    }

    /// Waits until the job for `order_id` finishes and returns it.
    ///
    /// Returns None immediately if no job was enqueued for the order.
    pub async fn wait(&self, order_id: OrderId) -> Option<Job> {
        loop {
            let finished = self.jobs.finished.notified();
            tokio::pin!(finished);
            finished.as_mut().enable();

            let job = self.jobs.get(order_id)?;
            if job.state.is_terminal() {
                return Some(job);
            }
            finished.await;
        }
    }
}

async fn run_worker(
    mut receiver: mpsc::UnboundedReceiver<OrderId>,
    processor: Arc<dyn Fulfill>,
    jobs: Arc<Jobs>,
) {
    while let Some(order_id) = receiver.recv().await {
        let processor = processor.clone();
        let jobs = jobs.clone();
        tokio::spawn(async move {
            jobs.set(order_id, JobState::Running);
            let state = match processor.fulfill(order_id).await {
                Ok(result) => JobState::Completed { result },
                Err(e) => {
                    tracing::error!(%order_id, error = %e, "Fulfillment aborted");
                    JobState::Errored {
                        error: e.to_string(),
                    }
                }
            };
            jobs.set(order_id, state);
        });
    }
    tracing::debug!("Fulfillment worker stopped");
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;

    use super::*;
    use crate::error::{Result, WorkflowError};
    use crate::state::FulfillmentOutcome;

    #[derive(Default)]
    struct CountingProcessor {
        runs: AtomicUsize,
    }

    #[async_trait]
    impl Fulfill for CountingProcessor {
        async fn fulfill(&self, order_id: OrderId) -> Result<FulfillmentOutcome> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            if order_id.as_i64() == 13 {
                return Err(WorkflowError::OrderNotFound(order_id));
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
            Ok(FulfillmentOutcome::Processed {
                failed_decrements: Vec::new(),
            })
        }
    }

    #[tokio::test]
    async fn job_runs_to_completion() {
        let processor = Arc::new(CountingProcessor::default());
        let queue = FulfillmentQueue::start(processor.clone());

        assert!(queue.enqueue(OrderId::new(1)));
        let job = tokio::time::timeout(Duration::from_secs(1), queue.wait(OrderId::new(1)))
            .await
            .unwrap()
            .unwrap();

        assert!(matches!(job.state, JobState::Completed { .. }));
        assert!(job.finished_at.is_some());
        assert_eq!(processor.runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn active_job_is_not_enqueued_twice() {
        let processor = Arc::new(CountingProcessor::default());
        let queue = FulfillmentQueue::start(processor.clone());

        assert!(queue.enqueue(OrderId::new(2)));
        assert!(!queue.enqueue(OrderId::new(2)));
        queue.wait(OrderId::new(2)).await.unwrap();

        assert!(queue.enqueue(OrderId::new(2)));
        queue.wait(OrderId::new(2)).await.unwrap();
        assert_eq!(processor.runs.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn errors_are_recorded_on_the_job() {
        let queue = FulfillmentQueue::start(Arc::new(CountingProcessor::default()));
        queue.enqueue(OrderId::new(13));

        let job = queue.wait(OrderId::new(13)).await.unwrap();
        assert!(matches!(job.state, JobState::Errored { ref error } if error.contains("13")));
    }

    #[tokio::test]
    async fn expired_jobs_are_pruned_on_enqueue() {
        let queue =
            FulfillmentQueue::with_retention(Arc::new(CountingProcessor::default()), Duration::ZERO);
        queue.enqueue(OrderId::new(3));
        queue.wait(OrderId::new(3)).await.unwrap();
        assert!(queue.job(OrderId::new(3)).is_some());

        queue.enqueue(OrderId::new(4));
        assert!(queue.job(OrderId::new(3)).is_none());
        assert!(queue.job(OrderId::new(4)).is_some());
    }

    #[tokio::test]
    async fn jobs_within_retention_are_kept() {
        let queue = FulfillmentQueue::start(Arc::new(CountingProcessor::default()));
        queue.enqueue(OrderId::new(6));
        queue.wait(OrderId::new(6)).await.unwrap();

        queue.enqueue(OrderId::new(7));
        assert!(matches!(
            queue.job(OrderId::new(6)).unwrap().state,
            JobState::Completed { .. }
        ));
    }

    #[tokio::test]
    async fn unknown_job_is_none() {
        let queue = FulfillmentQueue::start(Arc::new(CountingProcessor::default()));
        assert!(queue.job(OrderId::new(5)).is_none());
        assert!(queue.wait(OrderId::new(5)).await.is_none());
    }
}
