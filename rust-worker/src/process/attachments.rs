//! Attachment selection for a group.

use std::path::PathBuf;

use crate::model::{CatalogEntry, DocumentCategory, TemplateKind};

/// Document categories attached for a template kind, in attachment order.
pub fn categories_for(kind: TemplateKind) -> &'static [DocumentCategory] {
    match kind {
        TemplateKind::SoaInv => &[DocumentCategory::Invoice, DocumentCategory::Statement],
        TemplateKind::Overdue => &[DocumentCategory::Overdue],
    }
}

/// Select the file paths a group's message should carry.
///
/// An empty result means the group has nothing to send for this template
/// kind; the caller records it as skipped.
pub fn resolve_attachments(kind: TemplateKind, entry: Option<&CatalogEntry>) -> Vec<PathBuf> {
    let Some(entry) = entry else {
        return Vec::new();
    };

    let mut paths: Vec<PathBuf> = Vec::new();
    for &category in categories_for(kind) {
        for file in entry.files_in(category) {
            if !paths.contains(&file.path) {
                paths.push(file.path.clone());
            }
        }
    }
    paths
}
