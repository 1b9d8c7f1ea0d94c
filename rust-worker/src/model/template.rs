//! Message templates and the transport configuration attached to a job.

use serde::{Deserialize, Serialize};

/// Template category, which decides the attachment categories that apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TemplateKind {
    /// Statement of account plus invoices
    SoaInv,
    /// Overdue reminders
    Overdue,
}

/// Subject and body patterns with placeholder tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Template {
    pub kind: TemplateKind,
    /// Billing period label shown in listings
    #[serde(default)]
    pub period: String,
    pub subject: String,
    pub body: String,
}

impl Template {
    pub fn new(kind: TemplateKind, subject: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            kind,
            period: String::new(),
            subject: subject.into(),
            body: body.into(),
        }
    }
}

/// SMTP connection settings and sender identity for one job.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransportConfig {
    pub host: String,
    pub port: u16,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default, skip_serializing)]
    pub password: Option<String>,
    /// Use STARTTLS
    pub enable_ssl: bool,
    pub timeout_seconds: u64,
    pub from_email: String,
    pub from_name: String,
    /// Addresses copied on every message
    #[serde(default)]
    pub global_cc: Vec<String>,
}

impl TransportConfig {
    /// Credentials, present only when a non-blank username is configured.
    pub fn credentials(&self) -> Option<(&str, &str)> {
        let username = self.username.as_deref().filter(|u| !u.trim().is_empty())?;
        Some((username, self.password.as_deref().unwrap_or("")))
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 587,
            username: None,
            password: None,
            enable_ssl: true,
            timeout_seconds: 30,
            from_email: "noreply@example.com".to_string(),
            from_name: "Bulk Mail Sender".to_string(),
            global_cc: Vec::new(),
        }
    }
}

impl std::fmt::Debug for TransportConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("enable_ssl", &self.enable_ssl)
            .field("timeout_seconds", &self.timeout_seconds)
            .field("from_email", &self.from_email)
            .field("from_name", &self.from_name)
            .field("global_cc", &self.global_cc)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credentials_require_username() {
        let mut config = TransportConfig::default();
        assert_eq!(config.credentials(), None);

        config.username = Some("  ".to_string());
        assert_eq!(config.credentials(), None);

        config.username = Some("mailer".to_string());
        config.password = Some("secret".to_string());
        assert_eq!(config.credentials(), Some(("mailer", "secret")));
    }

    #[test]
    fn test_password_not_serialized() {
        let config = TransportConfig {
            password: Some("secret".to_string()),
            ..Default::default()
        };

        let json = serde_json::to_string(&config).unwrap();
        assert!(!json.contains("secret"));
        assert!(!format!("{:?}", config).contains("secret"));
    }

    #[test]
    fn test_template_kind_serialization() {
        let json = serde_json::to_string(&TemplateKind::SoaInv).unwrap();
        assert_eq!(json, "\"soa_inv\"");
    }
}
