//! Input value objects handed to the dispatcher.
//!
//! Recipient lists, attachment catalogs, templates and transport settings are
//! produced by the upload and settings layers and never mutated afterwards.

pub mod catalog;
pub mod recipient;
pub mod template;

pub use catalog::{format_size, AttachmentCatalog, AttachmentFile, CatalogEntry, DocumentCategory};
pub use recipient::{RecipientRecord, Role};
pub use template::{Template, TemplateKind, TransportConfig};
