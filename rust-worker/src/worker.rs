//! Dispatch worker loop.
//!
//! A single long-running task that drains the [`JobQueue`] one job at a time:
//! 1. Pulls the next pending job (non-blocking)
//! 2. Sleeps for the poll interval when the queue is empty
//! 3. Hands the job to the [`Dispatcher`]
//! 4. Stops promptly once the shutdown signal fires

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{error, info, warn};

use crate::config::WorkerSettings;
use crate::processor::Dispatcher;
use crate::queue::{JobQueue, JobStatus};
use crate::transport::Transport;

/// Receiving side of the process shutdown signal.
#[derive(Debug, Clone)]
pub struct Shutdown {
    rx: watch::Receiver<bool>,
}

/// Sending side of the process shutdown signal.
#[derive(Debug)]
pub struct ShutdownTrigger {
    tx: watch::Sender<bool>,
}

/// Create a connected trigger/receiver pair.
pub fn shutdown_channel() -> (ShutdownTrigger, Shutdown) {
    let (tx, rx) = watch::channel(false);
    (ShutdownTrigger { tx }, Shutdown { rx })
}

impl ShutdownTrigger {
    pub fn trigger(&self) {
        // Receivers may all be gone already; nothing to notify then.
        let _ = self.tx.send(true);
    }
}

impl Shutdown {
    /// Whether shutdown was requested. A dropped trigger counts as requested.
    pub fn is_triggered(&self) -> bool {
        *self.rx.borrow() || self.rx.has_changed().is_err()
    }

    /// Resolve once shutdown is requested.
    pub async fn triggered(&mut self) {
        let _ = self.rx.wait_for(|stop| *stop).await;
    }
}

/// Sleep for `duration` unless shutdown fires first.
///
/// Returns true when the full duration elapsed.
pub async fn sleep_or_shutdown(duration: Duration, shutdown: &mut Shutdown) -> bool {
    if shutdown.is_triggered() {
        return false;
    }

    tokio::select! {
        _ = sleep(duration) => true,
        _ = shutdown.triggered() => false,
    }
}

/// Spawn the worker loop onto the runtime.
pub fn spawn<T: Transport>(
    queue: JobQueue,
    transport: Arc<T>,
    settings: WorkerSettings,
    shutdown: Shutdown,
) -> JoinHandle<()> {
    tokio::spawn(run(queue, transport, settings, shutdown))
}

/// Run the worker loop until shutdown.
pub async fn run<T: Transport>(
    queue: JobQueue,
    transport: Arc<T>,
    settings: WorkerSettings,
    mut shutdown: Shutdown,
) {
    let dispatcher = Dispatcher::new(queue.clone(), transport, settings.retry);

    info!(
        poll_interval_ms = settings.poll_interval.as_millis() as u64,
        max_attempts = settings.retry.max_attempts,
        "worker_ready"
    );

    loop {
        if shutdown.is_triggered() {
            info!("worker_stopping");
            break;
        }

        let Some(job) = queue.try_take_next().await else {
            if !sleep_or_shutdown(settings.poll_interval, &mut shutdown).await {
                info!("worker_stopping");
                break;
            }
            continue;
        };

        let job_id = job.id;
        info!(job_id = %job_id, total_groups = job.total_groups, "worker_job_received");

        let result = AssertUnwindSafe(dispatcher.process_job(job, &mut shutdown))
            .catch_unwind()
            .await;

        if let Err(panic) = result {
            let reason = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());

            error!(job_id = %job_id, reason = %reason, "worker_job_panicked");

            if let Some(mut stored) = queue.get(job_id).await {
                let started = if stored.status == JobStatus::Queued {
                    stored.transition(JobStatus::Running)
                } else {
                    Ok(())
                };
                match started.and_then(|()| stored.fail(format!("worker error: {}", reason))) {
                    Ok(()) => queue.update(stored).await,
                    Err(e) => warn!(job_id = %job_id, error = %e, "worker_job_fail_skipped"),
                }
            }

            sleep_or_shutdown(settings.error_delay, &mut shutdown).await;
        }
    }

    info!("worker_shutdown_complete");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_shutdown_flag() {
        let (trigger, shutdown) = shutdown_channel();
        assert!(!shutdown.is_triggered());

        trigger.trigger();
        assert!(shutdown.is_triggered());
    }

    #[tokio::test]
    async fn test_dropped_trigger_counts_as_shutdown() {
        let (trigger, shutdown) = shutdown_channel();
        drop(trigger);
        assert!(shutdown.is_triggered());
    }

    #[tokio::test(start_paused = true)]
    async fn test_sleep_interrupted_by_shutdown() {
        let (trigger, mut shutdown) = shutdown_channel();

        let handle = tokio::spawn(async move {
            sleep_or_shutdown(Duration::from_secs(3600), &mut shutdown).await
        });
        tokio::task::yield_now().await;
        trigger.trigger();

        assert!(!handle.await.unwrap());
    }

    #[tokio::test]
    async fn test_one_trigger_reaches_every_receiver() {
        let (trigger, shutdown) = shutdown_channel();
        let mut server = shutdown.clone();
        let mut worker = shutdown;

        let server_done = tokio::spawn(async move { server.triggered().await });
        let worker_done = tokio::spawn(async move { worker.triggered().await });
        tokio::task::yield_now().await;
        trigger.trigger();

        server_done.await.unwrap();
        worker_done.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_sleep_completes() {
        let (_trigger, mut shutdown) = shutdown_channel();
        assert!(sleep_or_shutdown(Duration::from_millis(500), &mut shutdown).await);
    }
}
