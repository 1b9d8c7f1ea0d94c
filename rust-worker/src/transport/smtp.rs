//! SMTP delivery using lettre's async transport.

use std::path::Path;
use std::time::Duration;

use lettre::{
    message::{header::ContentType, Attachment, Mailbox, MultiPart, SinglePart},
    transport::smtp::authentication::Credentials,
    Address, AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use tracing::{info, warn};

use super::{Transport, TransportError};
use crate::model::TransportConfig;
use crate::process::OutgoingMessage;

/// SMTP transport, building a connection from each job's settings.
#[derive(Debug, Clone, Default)]
pub struct SmtpTransport;

impl SmtpTransport {
    pub fn new() -> Self {
        Self
    }

    fn mailer(config: &TransportConfig) -> Result<AsyncSmtpTransport<Tokio1Executor>, TransportError> {
        let builder = if config.enable_ssl {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
                .map_err(|e| TransportError::Smtp(e.to_string()))?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.host)
        };

        let mut builder = builder
            .port(config.port)
            .timeout(Some(Duration::from_secs(config.timeout_seconds)));

        if let Some((username, password)) = config.credentials() {
            builder = builder.credentials(Credentials::new(username.to_string(), password.to_string()));
        }

        Ok(builder.build())
    }
}

impl Transport for SmtpTransport {
    async fn deliver(&self, message: &OutgoingMessage, config: &TransportConfig) -> Result<(), TransportError> {
        let email = build_message(message).await?;
        let mailer = Self::mailer(config)?;

        let response = mailer
            .send(email)
            .await
            .map_err(|e| TransportError::Smtp(e.to_string()))?;

        info!(
            host = %config.host,
            port = config.port,
            recipients = message.recipient_count(),
            smtp_code = %response.code(),
            "smtp_message_accepted"
        );

        Ok(())
    }
}

fn mailbox(address: &str, name: Option<&str>) -> Result<Mailbox, TransportError> {
    let parsed = address
        .trim()
        .parse::<Address>()
        .map_err(|e| TransportError::InvalidAddress {
            address: address.to_string(),
            reason: e.to_string(),
        })?;

    let name = name.map(str::trim).filter(|n| !n.is_empty()).map(str::to_string);
    Ok(Mailbox::new(name, parsed))
}

fn mime_for(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .as_deref()
    {
        Some("pdf") => "application/pdf",
        Some("csv") => "text/csv",
        Some("txt") => "text/plain",
        Some("xlsx") => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        _ => "application/octet-stream",
    }
}

/// Assemble the MIME message: plain text body plus one part per attachment.
///
/// Attachment paths that no longer exist are skipped with a warning.
pub async fn build_message(message: &OutgoingMessage) -> Result<Message, TransportError> {
    let mut builder = Message::builder()
        .from(mailbox(&message.from_email, Some(&message.from_name))?)
        .subject(message.subject.clone());

    for address in &message.to {
        builder = builder.to(mailbox(address, None)?);
    }
    for address in &message.cc {
        builder = builder.cc(mailbox(address, None)?);
    }
    for address in &message.bcc {
        builder = builder.bcc(mailbox(address, None)?);
    }

    let mut multipart = MultiPart::mixed().singlepart(SinglePart::plain(message.body.clone()));

    for path in &message.attachments {
        if !tokio::fs::try_exists(path).await.unwrap_or(false) {
            warn!(path = %path.display(), "attachment_missing_skipped");
            continue;
        }

        let bytes = tokio::fs::read(path)
            .await
            .map_err(|source| TransportError::Attachment {
                path: path.clone(),
                source,
            })?;

        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "attachment".to_string());

        let content_type =
            ContentType::parse(mime_for(path)).map_err(|e| TransportError::Build(e.to_string()))?;

        multipart = multipart.singlepart(Attachment::new(file_name).body(bytes, content_type));
    }

    builder
        .multipart(multipart)
        .map_err(|e| TransportError::Build(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn message(attachments: Vec<PathBuf>) -> OutgoingMessage {
        OutgoingMessage {
            from_email: "billing@ours.test".to_string(),
            from_name: "Billing".to_string(),
            to: vec!["ap@acme.test".to_string()],
            cc: vec!["cfo@acme.test".to_string()],
            bcc: vec![],
            subject: "Statement 3000-AT502".to_string(),
            body: "Please find attached.".to_string(),
            attachments,
        }
    }

    #[tokio::test]
    async fn test_build_message_with_attachment() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("INV_3000-AT502.pdf");
        std::fs::write(&path, b"%PDF-1.4 test").unwrap();

        let email = build_message(&message(vec![path])).await.unwrap();
        let raw = String::from_utf8_lossy(&email.formatted()).into_owned();

        assert!(raw.contains("Subject: Statement 3000-AT502"));
        assert!(raw.contains("INV_3000-AT502.pdf"));
        assert!(raw.contains("application/pdf"));
    }

    #[tokio::test]
    async fn test_missing_attachment_skipped() {
        let email = build_message(&message(vec![PathBuf::from("/nonexistent/INV.pdf")]))
            .await
            .unwrap();
        let raw = String::from_utf8_lossy(&email.formatted()).into_owned();

        assert!(!raw.contains("INV.pdf"));
    }

    #[tokio::test]
    async fn test_invalid_recipient_rejected() {
        let mut msg = message(vec![]);
        msg.to = vec!["broken".to_string()];

        let err = build_message(&msg).await.unwrap_err();
        assert!(matches!(err, TransportError::InvalidAddress { address, .. } if address == "broken"));
    }

    #[test]
    fn test_mime_for_extension() {
        assert_eq!(mime_for(Path::new("/x/a.PDF")), "application/pdf");
        assert_eq!(mime_for(Path::new("/x/a.bin")), "application/octet-stream");
        assert_eq!(mime_for(Path::new("/x/noext")), "application/octet-stream");
    }
}
