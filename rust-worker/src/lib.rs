//! Bulk Mail - In-process bulk email dispatch.
//!
//! This library provides the modules behind the `bulkmail-server` binary:
//! - `queue`: FIFO of send jobs plus the shared job table
//! - `process`: grouping, attachment selection and message composition
//! - `processor`: per-job dispatch with bounded retry and cancellation
//! - `worker`: the single background loop draining the queue
//! - `web`: thin HTTP layer for submitting and polling jobs
//!
//! ## Architecture
//!
//! ```text
//! HTTP submit → JobQueue → Worker → Dispatcher → Transport (SMTP)
//!                  ↑                    │
//!                  └──── progress ──────┘
//! ```

pub mod config;
pub mod model;
pub mod process;
pub mod processor;
pub mod queue;
pub mod transport;
pub mod web;
pub mod worker;

// Re-export commonly used types
pub use config::{Config, RetryPolicy, WorkerSettings};
pub use model::{AttachmentCatalog, RecipientRecord, Role, Template, TemplateKind, TransportConfig};
pub use processor::{DispatchError, Dispatcher};
pub use queue::{GroupOutcome, Job, JobInputs, JobQueue, JobStatus, SendSummary};
pub use transport::{SmtpTransport, Transport, TransportError};
pub use web::AppState;
pub use worker::{shutdown_channel, Shutdown, ShutdownTrigger};
