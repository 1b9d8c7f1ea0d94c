//! Job processing module - core dispatch logic.
//!
//! Advances one job through its groups in ascending key order: resolve
//! attachments, compose, deliver with bounded retry, and publish progress to
//! the queue after every state change so pollers see live counts.

use std::sync::Arc;

use thiserror::Error;
use tracing::{error, info, warn};

use crate::config::RetryPolicy;
use crate::model::TransportConfig;
use crate::process::{
    group_recipients, plan_group, ComposeError, GroupPlan, OutgoingMessage, RecipientGroup,
    NO_ATTACHMENT_REASON,
};
use crate::queue::{GroupOutcome, Job, JobQueue, JobStatus, OutcomeKind, TransitionError};
use crate::transport::{Transport, TransportError};
use crate::worker::{sleep_or_shutdown, Shutdown};

/// Errors that abort a whole job.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("message composition failed: {0}")]
    Compose(#[from] ComposeError),

    #[error(transparent)]
    Transition(#[from] TransitionError),
}

/// How a delivery with retry ended.
#[derive(Debug)]
pub enum DeliveryOutcome {
    Delivered { attempts: u32 },
    Exhausted { attempts: u32, last_error: TransportError },
    /// Shutdown fired during an attempt or a backoff delay
    Interrupted { attempts: u32 },
}

/// Deliver `message`, retrying failed attempts with exponential backoff.
///
/// Every transport error is retryable. No delay follows the final attempt.
pub async fn deliver_with_retry<T: Transport>(
    transport: &T,
    message: &OutgoingMessage,
    config: &TransportConfig,
    policy: &RetryPolicy,
    group_key: &str,
    shutdown: &mut Shutdown,
) -> DeliveryOutcome {
    let mut attempt = 0;

    loop {
        attempt += 1;

        let result = tokio::select! {
            result = transport.deliver(message, config) => result,
            _ = shutdown.triggered() => {
                warn!(group_key = %group_key, attempt = attempt, "delivery_interrupted");
                return DeliveryOutcome::Interrupted { attempts: attempt };
            }
        };

        let err = match result {
            Ok(()) => {
                info!(group_key = %group_key, attempt = attempt, "delivery_succeeded");
                return DeliveryOutcome::Delivered { attempts: attempt };
            }
            Err(e) => e,
        };

        match policy.backoff_after(attempt) {
            Some(delay) => {
                warn!(
                    group_key = %group_key,
                    attempt = attempt,
                    max_attempts = policy.max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "delivery_attempt_failed"
                );

                if !sleep_or_shutdown(delay, shutdown).await {
                    return DeliveryOutcome::Interrupted { attempts: attempt };
                }
            }
            None => {
                error!(
                    group_key = %group_key,
                    attempts = attempt,
                    error = %err,
                    "delivery_exhausted"
                );
                return DeliveryOutcome::Exhausted {
                    attempts: attempt,
                    last_error: err,
                };
            }
        }
    }
}

/// How group iteration ended.
enum JobEnd {
    Completed,
    Cancelled,
}

/// Processes dequeued jobs against a transport.
pub struct Dispatcher<T> {
    queue: JobQueue,
    transport: Arc<T>,
    retry: RetryPolicy,
}

impl<T: Transport> Dispatcher<T> {
    pub fn new(queue: JobQueue, transport: Arc<T>, retry: RetryPolicy) -> Self {
        Self {
            queue,
            transport,
            retry,
        }
    }

    /// Run a job to a terminal state and return its final record.
    ///
    /// Orchestration errors fail the job; results gathered so far are kept.
    pub async fn process_job(&self, mut job: Job, shutdown: &mut Shutdown) -> Job {
        let job_id = job.id;

        match self.run_groups(&mut job, shutdown).await {
            Ok(JobEnd::Completed) => {
                info!(
                    job_id = %job_id,
                    sent = job.sent_count(),
                    failed = job.failed_count(),
                    skipped = job.skipped_count(),
                    "job_completed"
                );
            }
            Ok(JobEnd::Cancelled) => {
                info!(
                    job_id = %job_id,
                    processed = job.processed_count(),
                    total_groups = job.total_groups,
                    "job_cancelled"
                );
            }
            Err(e) => {
                error!(job_id = %job_id, error = %e, "job_failed");
                match job.fail(e.to_string()) {
                    Ok(()) => self.queue.update(job.clone()).await,
                    Err(te) => warn!(job_id = %job_id, error = %te, "job_fail_transition_rejected"),
                }
            }
        }

        job
    }

    async fn run_groups(&self, job: &mut Job, shutdown: &mut Shutdown) -> Result<JobEnd, DispatchError> {
        job.transition(JobStatus::Running)?;
        self.publish(job).await;

        let inputs = job.inputs();
        let groups = group_recipients(&inputs.recipients);

        info!(
            job_id = %job.id,
            groups = groups.len(),
            template_kind = ?inputs.template.kind,
            "job_processing_started"
        );

        for group in &groups {
            if self.cancel_requested(job, shutdown).await {
                job.transition(JobStatus::Cancelled)?;
                self.publish(job).await;
                return Ok(JobEnd::Cancelled);
            }

            job.current_group = group.key.clone();
            self.publish(job).await;

            let plan = plan_group(&inputs.template, &inputs.catalog, group, &inputs.transport)?;

            let message = match plan {
                GroupPlan::Skip => {
                    info!(job_id = %job.id, group_key = %group.key, "group_skipped");
                    self.record(job, group, OutcomeKind::Skipped, NO_ATTACHMENT_REASON, 0)
                        .await;
                    continue;
                }
                GroupPlan::Send(message) => message,
            };

            let outcome = deliver_with_retry(
                self.transport.as_ref(),
                &message,
                &inputs.transport,
                &self.retry,
                &group.key,
                shutdown,
            )
            .await;

            match outcome {
                DeliveryOutcome::Delivered { attempts } => {
                    info!(job_id = %job.id, group_key = %group.key, attempts = attempts, "group_sent");
                    self.record(job, group, OutcomeKind::Sent, "Sent", attempts).await;
                }
                DeliveryOutcome::Exhausted {
                    attempts,
                    last_error,
                } => {
                    let reason = format!("failed after {} attempts: {}", attempts, last_error);
                    warn!(job_id = %job.id, group_key = %group.key, reason = %reason, "group_failed");
                    self.record(job, group, OutcomeKind::Failed, reason, attempts).await;
                }
                DeliveryOutcome::Interrupted { .. } => {
                    job.transition(JobStatus::Cancelled)?;
                    self.publish(job).await;
                    return Ok(JobEnd::Cancelled);
                }
            }
        }

        job.transition(JobStatus::Completed)?;
        self.publish(job).await;
        Ok(JobEnd::Completed)
    }

    /// Shutdown requested, or the job was cancelled through the queue.
    async fn cancel_requested(&self, job: &Job, shutdown: &Shutdown) -> bool {
        shutdown.is_triggered() || self.queue.status(job.id).await == Some(JobStatus::Cancelled)
    }

    async fn record(
        &self,
        job: &mut Job,
        group: &RecipientGroup,
        kind: OutcomeKind,
        message: impl Into<String>,
        attempts: u32,
    ) {
        job.record(
            kind,
            GroupOutcome::new(group.key.clone(), group.primary_addresses(), message, attempts),
        );
        self.publish(job).await;
    }

    async fn publish(&self, job: &Job) {
        self.queue.update(job.clone()).await;
    }
}
