//! Outbound delivery capability.
//!
//! The dispatcher only needs "deliver this message with these settings" and a
//! success/failure answer. Every [`TransportError`] is treated as retryable.

pub mod smtp;

use std::future::Future;
use std::path::PathBuf;

use thiserror::Error;

use crate::model::TransportConfig;
use crate::process::OutgoingMessage;

pub use smtp::{build_message, SmtpTransport};

/// Delivery failure reported by a transport.
#[derive(Debug, Error)]
pub enum TransportError {
    /// An address on the message could not be parsed.
    #[error("invalid address '{address}': {reason}")]
    InvalidAddress { address: String, reason: String },

    /// The MIME message could not be assembled.
    #[error("failed to build message: {0}")]
    Build(String),

    /// An attachment exists but could not be read.
    #[error("failed to read attachment '{}': {source}", .path.display())]
    Attachment {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Connection, authentication or server rejection.
    #[error("SMTP error: {0}")]
    Smtp(String),
}

/// Something that can deliver a composed message.
///
/// Calls may be repeated with identical arguments on retry; duplicate
/// delivery after a false failure is not prevented here.
pub trait Transport: Send + Sync + 'static {
    fn deliver(
        &self,
        message: &OutgoingMessage,
        config: &TransportConfig,
    ) -> impl Future<Output = Result<(), TransportError>> + Send;
}
