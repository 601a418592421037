//! Document store for Ironpad
//!
//! This module owns the mapping from document ids to document records. It is
//! the single source of truth for which documents exist; the tab list only
//! holds ids that must resolve here.

use crate::document::{DocId, DocumentRecord};
use crate::error::{Error, Result};
use log::{debug, warn};
use std::path::{Path, PathBuf};

// ─────────────────────────────────────────────────────────────────────────────
// Path Normalization
// ─────────────────────────────────────────────────────────────────────────────

/// Normalize a path for identity comparison.
///
/// Canonicalizes when the file exists (resolving symlinks and case on
/// platforms that fold it); otherwise falls back to making the path absolute
/// lexically so never-yet-saved targets still compare stably.
pub fn normalize_path(path: &Path) -> PathBuf {
    if let Ok(canonical) = std::fs::canonicalize(path) {
        return canonical;
    }
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    }
}

/// Whether two paths refer to the same file identity.
pub fn paths_equal(a: &Path, b: &Path) -> bool {
    let (a, b) = (normalize_path(a), normalize_path(b));
    #[cfg(windows)]
    {
        a.to_string_lossy().to_lowercase() == b.to_string_lossy().to_lowercase()
    }
    #[cfg(not(windows))]
    {
        a == b
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Document Store
// ─────────────────────────────────────────────────────────────────────────────

/// Ordered collection mapping [`DocId`] → [`DocumentRecord`].
///
/// Insertion order is preserved (it matches tab creation order, which batch
/// operations walk). Lookup by id is linear; the store never holds more than
/// a few dozen entries in practice.
#[derive(Debug, Default)]
pub struct DocumentStore {
    entries: Vec<(DocId, DocumentRecord)>,
}

impl DocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of documents in the store.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether `id` refers to a document in this store. Total function.
    pub fn has_document(&self, id: DocId) -> bool {
        id.is_valid() && self.entries.iter().any(|(d, _)| *d == id)
    }

    /// Insert a new record under `id` at the end of the store.
    ///
    /// Fails with [`Error::InvalidHandle`] if `id` is invalid or already
    /// present; the record is returned to the caller untouched in neither
    /// case (ownership transfers only on success).
    pub fn add_at_end(&mut self, id: DocId, record: DocumentRecord) -> Result<()> {
        if !id.is_valid() || self.has_document(id) {
            warn!("Rejecting document insert under {}", id);
            return Err(Error::InvalidHandle);
        }
        debug!("Storing {} ({})", id, record.display_name());
        self.entries.push((id, record));
        Ok(())
    }

    /// Remove the record for `id`, returning it to the caller.
    ///
    /// The caller must have released any editor bindings to the record's
    /// buffer first; the buffer reference owned by the record is released
    /// when the returned record is dropped.
    pub fn remove(&mut self, id: DocId) -> Result<DocumentRecord> {
        let index = self
            .entries
            .iter()
            .position(|(d, _)| *d == id)
            .ok_or(Error::InvalidHandle)?;
        let (_, record) = self.entries.remove(index);
        debug!("Removed {} ({})", id, record.display_name());
        Ok(record)
    }

    /// Immutable access to the record for `id`.
    pub fn get(&self, id: DocId) -> Result<&DocumentRecord> {
        self.entries
            .iter()
            .find(|(d, _)| *d == id)
            .map(|(_, r)| r)
            .ok_or(Error::InvalidHandle)
    }

    /// Mutable access to the record for `id`.
    pub fn get_mut(&mut self, id: DocId) -> Result<&mut DocumentRecord> {
        self.entries
            .iter_mut()
            .find(|(d, _)| *d == id)
            .map(|(_, r)| r)
            .ok_or(Error::InvalidHandle)
    }

    /// Find the id of the open document backed by `path`.
    ///
    /// Returns [`DocId::INVALID`] when no open document has that path, so
    /// callers can branch without an `Option` dance.
    pub fn id_for_path(&self, path: &Path) -> DocId {
        self.entries
            .iter()
            .find(|(_, r)| r.path.as_deref().is_some_and(|p| paths_equal(p, path)))
            .map(|(id, _)| *id)
            .unwrap_or(DocId::INVALID)
    }

    /// Iterate over `(id, record)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (DocId, &DocumentRecord)> {
        self.entries.iter().map(|(id, r)| (*id, r))
    }

    /// Ids in insertion order.
    pub fn ids(&self) -> Vec<DocId> {
        self.entries.iter().map(|(id, _)| *id).collect()
    }

    /// Refresh the stored on-disk modification time for `id` from the
    /// filesystem.
    ///
    /// Used after save or reload so the reconciler does not flag our own
    /// write as an external change. With `force` unset, a record that has
    /// never observed a mod time (fresh untitled buffer) is left alone.
    pub fn update_file_time(&mut self, id: DocId, force: bool) -> Result<()> {
        let record = self.get_mut(id)?;
        let Some(path) = record.path.clone() else {
            return Ok(());
        };
        if record.file_mod_time.is_none() && !force {
            return Ok(());
        }
        match std::fs::metadata(&path).and_then(|m| m.modified()) {
            Ok(modified) => {
                record.file_mod_time = Some(modified);
                debug!("Refreshed mod time for {}", path.display());
            }
            Err(e) => {
                warn!("Could not stat '{}': {}", path.display(), e);
            }
        }
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
