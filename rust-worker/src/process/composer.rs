//! Message composition - placeholder substitution and recipient partitioning.
//!
//! Composition is a pure transform: the same template, group and attachments
//! always produce the same message. Delivery happens separately through a
//! [`Transport`](crate::transport::Transport).

use std::path::PathBuf;

use lettre::Address;
use serde::Serialize;
use thiserror::Error;
use tracing::warn;

use crate::model::{Role, Template, TransportConfig};
use crate::process::grouping::RecipientGroup;

/// Replaced by the first member's organization name.
pub const ORGANIZATION_PLACEHOLDER: &str = "{organization name}";

/// Replaced by the first member's note.
pub const NOTES_PLACEHOLDER: &str = "{notes}";

/// Replaced by the group key.
pub const GROUP_KEY_PLACEHOLDER: &str = "{debtor code}";

/// Errors raised while composing a group's message.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ComposeError {
    /// Sender identity in the transport config is not a valid mailbox.
    #[error("invalid sender address '{0}'")]
    InvalidSender(String),

    /// Group ended up with no To, Cc or Bcc recipient.
    #[error("group '{0}' has no recipients")]
    NoRecipients(String),
}

/// A fully resolved message, ready for a transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutgoingMessage {
    pub from_email: String,
    pub from_name: String,
    pub to: Vec<String>,
    pub cc: Vec<String>,
    pub bcc: Vec<String>,
    pub subject: String,
    pub body: String,
    pub attachments: Vec<PathBuf>,
}

impl OutgoingMessage {
    pub fn recipient_count(&self) -> usize {
        self.to.len() + self.cc.len() + self.bcc.len()
    }
}

/// Whether `address` parses as a bare `local@domain` mailbox address.
pub fn is_valid_address(address: &str) -> bool {
    address.parse::<Address>().is_ok()
}

/// Substitute the three recognized placeholders in `pattern`.
pub fn substitute(pattern: &str, organization: &str, notes: &str, group_key: &str) -> String {
    pattern
        .replace(ORGANIZATION_PLACEHOLDER, organization)
        .replace(NOTES_PLACEHOLDER, notes)
        .replace(GROUP_KEY_PLACEHOLDER, group_key)
}

/// Build the message for one group.
///
/// `global_cc` entries from the transport config are appended to Cc; entries
/// that are malformed or already addressed on the message are skipped with a
/// warning.
pub fn compose(
    template: &Template,
    group: &RecipientGroup,
    attachments: &[PathBuf],
    transport: &TransportConfig,
) -> Result<OutgoingMessage, ComposeError> {
    if !is_valid_address(&transport.from_email) {
        return Err(ComposeError::InvalidSender(transport.from_email.clone()));
    }

    let to = group.addresses(Role::Primary);
    let mut cc = group.addresses(Role::Observer);
    let bcc = group.addresses(Role::Silent);

    for raw in &transport.global_cc {
        let address = raw.trim();
        if address.is_empty() {
            continue;
        }

        if !is_valid_address(address) {
            warn!(
                group_key = %group.key,
                address = %address,
                "global_cc_invalid_address"
            );
            continue;
        }

        let already_present = to
            .iter()
            .chain(cc.iter())
            .chain(bcc.iter())
            .any(|existing| existing.eq_ignore_ascii_case(address));
        if already_present {
            continue;
        }

        cc.push(address.to_string());
    }

    if to.is_empty() && cc.is_empty() && bcc.is_empty() {
        return Err(ComposeError::NoRecipients(group.key.clone()));
    }

    let first = group.members.first();
    let organization = first
        .and_then(|m| m.organization_name.as_deref())
        .unwrap_or(ORGANIZATION_PLACEHOLDER);
    let notes = first
        .and_then(|m| m.notes.as_deref())
        .unwrap_or(NOTES_PLACEHOLDER);

    let mut unique_attachments: Vec<PathBuf> = Vec::with_capacity(attachments.len());
    for path in attachments {
        if !unique_attachments.contains(path) {
            unique_attachments.push(path.clone());
        }
    }

    Ok(OutgoingMessage {
        from_email: transport.from_email.clone(),
        from_name: transport.from_name.clone(),
        to,
        cc,
        bcc,
        subject: substitute(&template.subject, organization, notes, &group.key),
        body: substitute(&template.body, organization, notes, &group.key),
        attachments: unique_attachments,
    })
}
