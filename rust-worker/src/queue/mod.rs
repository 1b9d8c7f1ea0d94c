//! In-process job queue.
//!
//! This module provides:
//! - Job, status and per-group outcome types
//! - The shared FIFO + job table used by submitters, the worker and pollers
//!
//! ## Architecture
//!
//! ```text
//! HTTP submit → JobQueue (FIFO + table) → Dispatch Worker → JobQueue.update → pollers
//! ```

pub mod store;
pub mod types;

pub use store::JobQueue;
pub use types::{
    GroupOutcome, Job, JobInputs, JobStatus, OutcomeKind, SendSummary, TransitionError,
};
