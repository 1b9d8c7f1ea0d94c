//! Recipient records produced by the recipient-list import.

use serde::{Deserialize, Serialize};

/// Visibility tier of a recipient on the outbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Visible `To` recipient
    Primary,
    /// Visible `Cc` recipient
    Observer,
    /// `Bcc` recipient, hidden from everyone else
    Silent,
}

/// One row of the recipient list.
///
/// Several records share a `group_key` when one account has several contacts;
/// they are merged into a single outbound message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecipientRecord {
    /// Account/customer code the record belongs to
    pub group_key: String,
    /// Organization name used for the `{organization name}` placeholder
    #[serde(default)]
    pub organization_name: Option<String>,
    /// Free-text note used for the `{notes}` placeholder (e.g. "90Days")
    #[serde(default)]
    pub notes: Option<String>,
    /// Email address
    pub address: String,
    pub role: Role,
}

impl RecipientRecord {
    pub fn new(group_key: impl Into<String>, address: impl Into<String>, role: Role) -> Self {
        Self {
            group_key: group_key.into(),
            organization_name: None,
            notes: None,
            address: address.into(),
            role,
        }
    }

    pub fn with_organization(mut self, name: impl Into<String>) -> Self {
        self.organization_name = Some(name.into());
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_deserialization() {
        let json = r#"{"group_key": "3000-AT502", "address": "a@example.com", "role": "observer"}"#;
        let record: RecipientRecord = serde_json::from_str(json).unwrap();

        assert_eq!(record.role, Role::Observer);
        assert_eq!(record.organization_name, None);
        assert_eq!(record.notes, None);
    }
}
