//! Categorized attachment files, keyed by group.
//!
//! The catalog is built once by the archive extraction step and handed to the
//! dispatcher read-only.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Fixed document classification assigned during extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentCategory {
    Invoice,
    Statement,
    Overdue,
    Other,
}

/// A single extracted file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachmentFile {
    pub file_name: String,
    /// Absolute path on local disk
    pub path: PathBuf,
    pub category: DocumentCategory,
    /// Secondary code parsed from the file name (free-form)
    #[serde(default)]
    pub code: String,
    /// Size in bytes
    #[serde(default)]
    pub size: u64,
}

impl AttachmentFile {
    pub fn new(path: impl Into<PathBuf>, category: DocumentCategory) -> Self {
        let path = path.into();
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        Self {
            file_name,
            path,
            category,
            code: String::new(),
            size: 0,
        }
    }

    pub fn formatted_size(&self) -> String {
        format_size(self.size)
    }
}

/// All files extracted for one group key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub group_key: String,
    #[serde(default)]
    pub files: Vec<AttachmentFile>,
}

impl CatalogEntry {
    pub fn new(group_key: impl Into<String>, files: Vec<AttachmentFile>) -> Self {
        Self {
            group_key: group_key.into(),
            files,
        }
    }

    /// Files of one category, in catalog order.
    pub fn files_in(&self, category: DocumentCategory) -> impl Iterator<Item = &AttachmentFile> {
        self.files.iter().filter(move |f| f.category == category)
    }

    pub fn total_size(&self) -> u64 {
        self.files.iter().map(|f| f.size).sum()
    }
}

/// Mapping from group key to its categorized files.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AttachmentCatalog {
    entries: Vec<CatalogEntry>,
}

impl AttachmentCatalog {
    pub fn new(entries: Vec<CatalogEntry>) -> Self {
        Self { entries }
    }

    /// Look up the entry for a group key, ignoring ASCII case.
    pub fn entry(&self, group_key: &str) -> Option<&CatalogEntry> {
        self.entries
            .iter()
            .find(|e| e.group_key.eq_ignore_ascii_case(group_key))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Human readable byte count: B below 1 KiB, otherwise KB/MB with two decimals.
pub fn format_size(size: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = 1024 * 1024;

    if size < KB {
        format!("{} B", size)
    } else if size < MB {
        format!("{:.2} KB", size as f64 / KB as f64)
    } else {
        format!("{:.2} MB", size as f64 / MB as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_lookup_ignores_case() {
        let catalog = AttachmentCatalog::new(vec![CatalogEntry::new("3000-AT502", vec![])]);

        assert!(catalog.entry("3000-at502").is_some());
        assert!(catalog.entry("3000-AT503").is_none());
    }

    #[test]
    fn test_attachment_file_name_from_path() {
        let file = AttachmentFile::new("/tmp/extract/INV_3000-AT502.pdf", DocumentCategory::Invoice);
        assert_eq!(file.file_name, "INV_3000-AT502.pdf");
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(1536), "1.50 KB");
        assert_eq!(format_size(3 * 1024 * 1024), "3.00 MB");
    }

    #[test]
    fn test_total_size() {
        let mut a = AttachmentFile::new("/tmp/a.pdf", DocumentCategory::Invoice);
        a.size = 100;
        let mut b = AttachmentFile::new("/tmp/b.pdf", DocumentCategory::Other);
        b.size = 50;

        assert_eq!(CatalogEntry::new("X", vec![a, b]).total_size(), 150);
    }
}
