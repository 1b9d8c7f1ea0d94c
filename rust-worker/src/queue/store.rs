//! In-memory job queue with an id-indexed job table.
//!
//! One lock guards both the FIFO of pending ids and the job table, so
//! submission, dequeue and publication are each a single atomic step.
//! Callers only ever receive clones of stored records.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

use super::types::{Job, JobStatus, SendSummary};

/// Shared job queue, cheap to clone across tasks.
#[derive(Clone, Default)]
pub struct JobQueue {
    inner: Arc<RwLock<QueueState>>,
}

#[derive(Default)]
struct QueueState {
    pending: VecDeque<Uuid>,
    jobs: HashMap<Uuid, Job>,
}

impl JobQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a job and append it to the FIFO.
    ///
    /// The job starts over as `Queued` with no progress and a fresh creation
    /// time. An id that is already registered leaves the stored record and the
    /// FIFO untouched and returns that id.
    pub async fn submit(&self, mut job: Job) -> Uuid {
        let id = job.id;
        let total_groups = job.total_groups;

        let mut state = self.inner.write().await;
        if let Some(stored) = state.jobs.get(&id) {
            debug!(job_id = %id, status = stored.status.as_str(), "job_submit_duplicate");
            return id;
        }

        job.status = JobStatus::Queued;
        job.created_at = chrono::Utc::now();
        job.started_at = None;
        job.completed_at = None;
        job.current_group.clear();
        job.results = SendSummary::default();
        job.error_message = None;

        state.jobs.insert(id, job);
        state.pending.push_back(id);
        let queued = state.pending.len();
        drop(state);

        info!(
            job_id = %id,
            total_groups = total_groups,
            queued = queued,
            "job_enqueued"
        );

        id
    }

    /// Pop the next pending job, without waiting.
    ///
    /// Jobs cancelled while still queued are discarded from the FIFO here.
    pub async fn try_take_next(&self) -> Option<Job> {
        let mut state = self.inner.write().await;

        while let Some(id) = state.pending.pop_front() {
            match state.jobs.get(&id) {
                Some(job) if !job.is_terminal() => return Some(job.clone()),
                Some(job) => {
                    debug!(job_id = %id, status = job.status.as_str(), "job_dequeue_discarded");
                }
                None => {
                    debug!(job_id = %id, "job_dequeue_missing");
                }
            }
        }

        None
    }

    /// Snapshot of a job by id.
    pub async fn get(&self, id: Uuid) -> Option<Job> {
        self.inner.read().await.jobs.get(&id).cloned()
    }

    /// Current status of a job by id.
    pub async fn status(&self, id: Uuid) -> Option<JobStatus> {
        self.inner.read().await.jobs.get(&id).map(|j| j.status)
    }

    /// Publish a new version of a job record, replacing the stored one.
    ///
    /// A terminal status already stored is never overwritten by a different
    /// status: the stored status, completion time and error are kept and the
    /// current group is cleared. Progress and results come from `job`.
    pub async fn update(&self, job: Job) {
        let mut state = self.inner.write().await;

        let merged = match state.jobs.get(&job.id) {
            Some(stored) if stored.is_terminal() && stored.status != job.status => {
                debug!(
                    job_id = %job.id,
                    stored_status = stored.status.as_str(),
                    published_status = job.status.as_str(),
                    "job_update_status_kept"
                );
                let mut merged = job;
                merged.status = stored.status;
                merged.completed_at = stored.completed_at.or(merged.completed_at);
                merged.error_message = stored.error_message.clone();
                merged.current_group.clear();
                merged
            }
            _ => job,
        };

        state.jobs.insert(merged.id, merged);
    }

    /// Mark a queued or running job as cancelled.
    ///
    /// Returns false for unknown ids and for jobs already in a terminal state.
    /// A running job stops at its next group boundary.
    pub async fn cancel(&self, id: Uuid) -> bool {
        let mut state = self.inner.write().await;

        let Some(job) = state.jobs.get_mut(&id) else {
            return false;
        };

        let previous = job.status;
        if job.transition(JobStatus::Cancelled).is_err() {
            return false;
        }

        info!(job_id = %id, previous_status = previous.as_str(), "job_cancel_requested");
        true
    }

    /// Number of jobs waiting in the FIFO.
    pub async fn queued_count(&self) -> usize {
        self.inner.read().await.pending.len()
    }

    /// Snapshots of all known jobs, newest first.
    pub async fn list(&self) -> Vec<Job> {
        let state = self.inner.read().await;
        let mut jobs: Vec<Job> = state.jobs.values().cloned().collect();
        jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        jobs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AttachmentCatalog, RecipientRecord, Role, Template, TemplateKind, TransportConfig};
    use crate::queue::types::{GroupOutcome, JobInputs, OutcomeKind};

    fn job() -> Job {
        Job::new(JobInputs {
            recipients: vec![RecipientRecord::new("A1", "a@example.com", Role::Primary)],
            catalog: AttachmentCatalog::default(),
            template: Template::new(TemplateKind::SoaInv, "s", "b"),
            transport: TransportConfig::default(),
        })
    }

    #[tokio::test]
    async fn test_fifo_order() {
        let queue = JobQueue::new();
        let first = queue.submit(job()).await;
        let second = queue.submit(job()).await;

        assert_eq!(queue.queued_count().await, 2);
        assert_eq!(queue.try_take_next().await.map(|j| j.id), Some(first));
        assert_eq!(queue.try_take_next().await.map(|j| j.id), Some(second));
        assert!(queue.try_take_next().await.is_none());
    }

    #[tokio::test]
    async fn test_taken_jobs_stay_queryable() {
        let queue = JobQueue::new();
        let id = queue.submit(job()).await;
        queue.try_take_next().await;

        assert_eq!(queue.queued_count().await, 0);
        assert_eq!(queue.get(id).await.map(|j| j.status), Some(JobStatus::Queued));
    }

    #[tokio::test]
    async fn test_get_unknown_id() {
        let queue = JobQueue::new();
        assert!(queue.get(Uuid::new_v4()).await.is_none());
        assert!(queue.status(Uuid::new_v4()).await.is_none());
        assert!(!queue.cancel(Uuid::new_v4()).await);
    }

    #[tokio::test]
    async fn test_cancel_queued_job_is_discarded() {
        let queue = JobQueue::new();
        let cancelled = queue.submit(job()).await;
        let kept = queue.submit(job()).await;

        assert!(queue.cancel(cancelled).await);
        let snapshot = queue.get(cancelled).await.unwrap();
        assert_eq!(snapshot.status, JobStatus::Cancelled);
        assert!(snapshot.completed_at.is_some());

        assert_eq!(queue.try_take_next().await.map(|j| j.id), Some(kept));
    }

    #[tokio::test]
    async fn test_cancel_terminal_job_fails() {
        let queue = JobQueue::new();
        let id = queue.submit(job()).await;

        let mut running = queue.try_take_next().await.unwrap();
        running.transition(JobStatus::Running).unwrap();
        running.transition(JobStatus::Completed).unwrap();
        queue.update(running).await;

        assert!(!queue.cancel(id).await);
        assert_eq!(queue.status(id).await, Some(JobStatus::Completed));
    }

    #[tokio::test]
    async fn test_update_never_resurrects_cancelled_job() {
        let queue = JobQueue::new();
        let id = queue.submit(job()).await;

        let mut running = queue.try_take_next().await.unwrap();
        running.transition(JobStatus::Running).unwrap();
        queue.update(running.clone()).await;

        assert!(queue.cancel(id).await);

        running.current_group = "A1".to_string();
        running.record(OutcomeKind::Sent, GroupOutcome::new("A1", vec![], "Sent", 1));
        queue.update(running).await;

        let stored = queue.get(id).await.unwrap();
        assert_eq!(stored.status, JobStatus::Cancelled);
        assert!(stored.current_group.is_empty());
        assert_eq!(stored.sent_count(), 1);
    }

    #[tokio::test]
    async fn test_resubmitting_finished_job_is_ignored() {
        let queue = JobQueue::new();
        let id = queue.submit(job()).await;

        let mut running = queue.try_take_next().await.unwrap();
        running.transition(JobStatus::Running).unwrap();
        running.record(OutcomeKind::Sent, GroupOutcome::new("A1", vec![], "Sent", 1));
        running.transition(JobStatus::Completed).unwrap();
        queue.update(running).await;

        let finished = queue.get(id).await.unwrap();
        assert_eq!(queue.submit(finished).await, id);

        assert_eq!(queue.queued_count().await, 0);
        assert!(queue.try_take_next().await.is_none());

        let stored = queue.get(id).await.unwrap();
        assert_eq!(stored.status, JobStatus::Completed);
        assert_eq!(stored.sent_count(), 1);
        assert!(stored.processed_count() <= stored.total_groups);
    }

    #[tokio::test]
    async fn test_resubmitting_queued_job_is_not_duplicated() {
        let queue = JobQueue::new();
        let original = job();
        let id = queue.submit(original.clone()).await;

        assert_eq!(queue.submit(original).await, id);
        assert_eq!(queue.queued_count().await, 1);
    }

    #[tokio::test]
    async fn test_list_newest_first() {
        let queue = JobQueue::new();
        let first = queue.submit(job()).await;
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        let second = queue.submit(job()).await;

        let ids: Vec<_> = queue.list().await.into_iter().map(|j| j.id).collect();
        assert_eq!(ids, vec![second, first]);
    }
}
