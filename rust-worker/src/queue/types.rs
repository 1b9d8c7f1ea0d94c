//! Job and progress types shared by the queue, the worker and pollers.
//!
//! A [`Job`] is created by the submitting side, owned by the dispatch worker
//! once dequeued, and read by pollers through snapshots from the
//! [`JobQueue`](super::JobQueue).

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::model::{AttachmentCatalog, RecipientRecord, Template, TransportConfig};
use crate::process::count_groups;

/// Lifecycle of a job.
///
/// ```text
/// Queued → Running → Completed | Failed | Cancelled
/// Queued → Cancelled
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled)
    }

    /// The single source of truth for legal status changes.
    pub fn can_transition_to(self, next: JobStatus) -> bool {
        use JobStatus::*;
        matches!(
            (self, next),
            (Queued, Running)
                | (Queued, Cancelled)
                | (Running, Completed)
                | (Running, Failed)
                | (Running, Cancelled)
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Cancelled => "cancelled",
        }
    }
}

/// Rejected status change.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("invalid job transition {from:?} -> {to:?}")]
pub struct TransitionError {
    pub from: JobStatus,
    pub to: JobStatus,
}

/// Which result list an outcome belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeKind {
    Sent,
    Failed,
    Skipped,
}

/// Result of processing one group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupOutcome {
    pub group_key: String,
    /// Primary (`To`) addresses of the group
    pub to: Vec<String>,
    /// "Sent", or the failure/skip reason
    pub message: String,
    /// Delivery attempts used
    pub retry_count: u32,
    pub timestamp: DateTime<Utc>,
}

impl GroupOutcome {
    pub fn new(group_key: impl Into<String>, to: Vec<String>, message: impl Into<String>, retry_count: u32) -> Self {
        Self {
            group_key: group_key.into(),
            to,
            message: message.into(),
            retry_count,
            timestamp: Utc::now(),
        }
    }
}

/// Per-group outcomes, each list in processing order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendSummary {
    pub sent: Vec<GroupOutcome>,
    pub failed: Vec<GroupOutcome>,
    pub skipped: Vec<GroupOutcome>,
}

impl SendSummary {
    pub fn total(&self) -> usize {
        self.sent.len() + self.failed.len() + self.skipped.len()
    }
}

/// Immutable inputs of a send request.
#[derive(Debug, Clone)]
pub struct JobInputs {
    pub recipients: Vec<RecipientRecord>,
    pub catalog: AttachmentCatalog,
    pub template: Template,
    pub transport: TransportConfig,
}

/// One submitted send request and its progress.
///
/// Progress counters are derived from the outcome lists, so counts and
/// results always agree group for group.
#[derive(Debug, Clone)]
pub struct Job {
    pub id: Uuid,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    inputs: Arc<JobInputs>,
    pub total_groups: usize,
    /// Group being processed; empty unless running
    pub current_group: String,
    pub results: SendSummary,
    /// Set only when the job failed
    pub error_message: Option<String>,
}

impl Job {
    pub fn new(inputs: JobInputs) -> Self {
        let total_groups = count_groups(&inputs.recipients);
        Self {
            id: Uuid::new_v4(),
            status: JobStatus::Queued,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            inputs: Arc::new(inputs),
            total_groups,
            current_group: String::new(),
            results: SendSummary::default(),
            error_message: None,
        }
    }

    /// Shared handle to the immutable inputs.
    pub fn inputs(&self) -> Arc<JobInputs> {
        Arc::clone(&self.inputs)
    }

    pub fn sent_count(&self) -> usize {
        self.results.sent.len()
    }

    pub fn failed_count(&self) -> usize {
        self.results.failed.len()
    }

    pub fn skipped_count(&self) -> usize {
        self.results.skipped.len()
    }

    pub fn processed_count(&self) -> usize {
        self.results.total()
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Move to `next`, stamping timestamps.
    ///
    /// Entering `Running` stamps `started_at`; entering a terminal state stamps
    /// `completed_at` and clears `current_group`.
    pub fn transition(&mut self, next: JobStatus) -> Result<(), TransitionError> {
        if !self.status.can_transition_to(next) {
            return Err(TransitionError {
                from: self.status,
                to: next,
            });
        }

        self.status = next;
        let now = Utc::now();
        if next == JobStatus::Running {
            self.started_at = Some(now);
        }
        if next.is_terminal() {
            self.completed_at = Some(now);
            self.current_group.clear();
        }
        Ok(())
    }

    /// Terminate as `Failed` with the given description.
    pub fn fail(&mut self, message: impl Into<String>) -> Result<(), TransitionError> {
        self.transition(JobStatus::Failed)?;
        self.error_message = Some(message.into());
        Ok(())
    }

    /// Append an outcome to its result list.
    pub fn record(&mut self, kind: OutcomeKind, outcome: GroupOutcome) {
        match kind {
            OutcomeKind::Sent => self.results.sent.push(outcome),
            OutcomeKind::Failed => self.results.failed.push(outcome),
            OutcomeKind::Skipped => self.results.skipped.push(outcome),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Role, TemplateKind};

    fn sample_inputs() -> JobInputs {
        JobInputs {
            recipients: vec![
                RecipientRecord::new("A1", "a@example.com", Role::Primary),
                RecipientRecord::new("B2", "b@example.com", Role::Primary),
                RecipientRecord::new("a1", "a2@example.com", Role::Observer),
            ],
            catalog: AttachmentCatalog::default(),
            template: Template::new(TemplateKind::Overdue, "s", "b"),
            transport: TransportConfig::default(),
        }
    }

    #[test]
    fn test_new_job_is_queued() {
        let job = Job::new(sample_inputs());

        assert_eq!(job.status, JobStatus::Queued);
        assert_eq!(job.total_groups, 2);
        assert_eq!(job.processed_count(), 0);
        assert!(job.started_at.is_none());
        assert!(job.current_group.is_empty());
    }

    #[test]
    fn test_legal_transitions() {
        use JobStatus::*;
        assert!(Queued.can_transition_to(Running));
        assert!(Queued.can_transition_to(Cancelled));
        assert!(Running.can_transition_to(Completed));
        assert!(Running.can_transition_to(Failed));
        assert!(Running.can_transition_to(Cancelled));

        assert!(!Queued.can_transition_to(Completed));
        assert!(!Running.can_transition_to(Queued));
        for terminal in [Completed, Failed, Cancelled] {
            for next in [Queued, Running, Completed, Failed, Cancelled] {
                assert!(!terminal.can_transition_to(next));
            }
        }
    }

    #[test]
    fn test_transition_stamps_timestamps() {
        let mut job = Job::new(sample_inputs());

        job.transition(JobStatus::Running).unwrap();
        assert!(job.started_at.is_some());
        assert!(job.completed_at.is_none());

        job.current_group = "A1".to_string();
        job.transition(JobStatus::Completed).unwrap();
        assert!(job.completed_at.is_some());
        assert!(job.current_group.is_empty());
    }

    #[test]
    fn test_no_resurrection() {
        let mut job = Job::new(sample_inputs());
        job.transition(JobStatus::Cancelled).unwrap();

        let err = job.transition(JobStatus::Running).unwrap_err();
        assert_eq!(
            err,
            TransitionError {
                from: JobStatus::Cancelled,
                to: JobStatus::Running
            }
        );
        assert_eq!(job.status, JobStatus::Cancelled);
    }

    #[test]
    fn test_fail_sets_error_message() {
        let mut job = Job::new(sample_inputs());
        job.transition(JobStatus::Running).unwrap();
        job.fail("template missing").unwrap();

        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.error_message.as_deref(), Some("template missing"));
    }

    #[test]
    fn test_counts_follow_results() {
        let mut job = Job::new(sample_inputs());
        job.record(OutcomeKind::Sent, GroupOutcome::new("A1", vec![], "Sent", 1));
        job.record(OutcomeKind::Skipped, GroupOutcome::new("B2", vec![], "none", 0));

        assert_eq!(job.sent_count(), 1);
        assert_eq!(job.failed_count(), 0);
        assert_eq!(job.skipped_count(), 1);
        assert_eq!(job.processed_count(), 2);
    }
}
