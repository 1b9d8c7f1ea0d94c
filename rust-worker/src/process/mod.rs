//! Per-group preparation: grouping, attachment selection and composition.
//!
//! ## Processing Flow
//!
//! ```text
//! RecipientRecord[] → group_recipients() → RecipientGroup
//! RecipientGroup + AttachmentCatalog → resolve_attachments() → paths
//! Template + RecipientGroup + paths → compose() → OutgoingMessage
//! ```

pub mod attachments;
pub mod composer;
pub mod grouping;

use tracing::debug;

use crate::model::{AttachmentCatalog, Template, TransportConfig};

pub use attachments::{categories_for, resolve_attachments};
pub use composer::{compose, is_valid_address, substitute, ComposeError, OutgoingMessage};
pub use grouping::{count_groups, group_recipients, RecipientGroup};

/// What to do with one group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GroupPlan {
    /// Nothing to attach for this template kind.
    Skip,
    /// Message ready for delivery.
    Send(OutgoingMessage),
}

/// Reason recorded for groups without matching attachments.
pub const NO_ATTACHMENT_REASON: &str = "no attachment found for this group and template category";

/// Resolve attachments for a group and compose its message.
pub fn plan_group(
    template: &Template,
    catalog: &AttachmentCatalog,
    group: &RecipientGroup,
    transport: &TransportConfig,
) -> Result<GroupPlan, ComposeError> {
    let attachments = resolve_attachments(template.kind, catalog.entry(&group.key));

    debug!(
        group_key = %group.key,
        template_kind = ?template.kind,
        attachment_count = attachments.len(),
        "group_attachments_resolved"
    );

    if attachments.is_empty() {
        return Ok(GroupPlan::Skip);
    }

    compose(template, group, &attachments, transport).map(GroupPlan::Send)
}
