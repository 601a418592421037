//! Editor buffer ownership for Ironpad
//!
//! This module defines the in-memory text buffer that stands in for the
//! editing component, together with the reference-counted handle type that
//! owns it. Exactly one `BufferHandle` lives inside each document record;
//! editor surfaces bind additional shared references while a buffer is
//! displayed or inspected.

use crate::encoding::EolFormat;
use std::cell::{Ref, RefCell, RefMut};
use std::rc::Rc;

// ─────────────────────────────────────────────────────────────────────────────
// Text Buffer
// ─────────────────────────────────────────────────────────────────────────────

/// The in-memory content of one document, with save-point tracking.
///
/// Dirtiness is determined by comparing the current content against the
/// content at the last save point, the same way the editing component's
/// save-point notifications work: `set_save_point` marks the current state
/// as clean, and any divergence from it reports dirty.
#[derive(Debug)]
pub struct TextBuffer {
    /// Current buffer content
    content: String,
    /// Content at the last save point; `None` means no save point exists and
    /// the buffer reports dirty unconditionally (adopted transfer content)
    save_point: Option<String>,
    /// Line-ending mode the editing component is currently configured with
    eol_mode: EolFormat,
    /// Whether the editing component refuses modifications
    read_only: bool,
    /// Undo history stack
    undo_stack: Vec<String>,
    /// Redo history stack
    redo_stack: Vec<String>,
    /// Maximum undo history size
    max_undo_size: usize,
    /// Bumped whenever save-point-relative state may have changed, so
    /// observers keyed off save-point notifications can re-derive state
    save_point_generation: u64,
}

impl TextBuffer {
    /// Create a buffer holding `content`, clean at that content.
    pub fn new(content: String, eol_mode: EolFormat) -> Self {
        Self {
            save_point: Some(content.clone()),
            content,
            eol_mode,
            read_only: false,
            undo_stack: Vec::new(),
            redo_stack: Vec::new(),
            max_undo_size: 100,
            save_point_generation: 0,
        }
    }

    /// Current content.
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Number of lines in the buffer (1-based count; an empty buffer has 1).
    pub fn line_count(&self) -> usize {
        self.content.matches('\n').count() + 1
    }

    /// Whether the buffer has diverged from its save point.
    pub fn is_dirty(&self) -> bool {
        self.save_point.as_deref() != Some(&self.content)
    }

    /// Mark the current content as the save point (clean).
    pub fn set_save_point(&mut self) {
        self.save_point = Some(self.content.clone());
        self.save_point_generation = self.save_point_generation.wrapping_add(1);
    }

    /// Drop the save point entirely, forcing the buffer to report dirty
    /// until the next [`TextBuffer::set_save_point`].
    ///
    /// Used when adopting content that is known to be unsaved, e.g. a tab
    /// arriving from another instance with its modified flag set.
    pub fn invalidate_save_point(&mut self) {
        self.save_point = None;
        self.save_point_generation = self.save_point_generation.wrapping_add(1);
    }

    /// Re-trigger save-point notifications without touching content.
    ///
    /// Equivalent to the empty undo/redo pair the original issues after an
    /// unresolved external-change prompt: nothing changes, but components
    /// keyed off save-point generation re-derive their state.
    pub fn nudge_save_point(&mut self) {
        self.save_point_generation = self.save_point_generation.wrapping_add(1);
    }

    /// Save-point generation counter.
    pub fn save_point_generation(&self) -> u64 {
        self.save_point_generation
    }

    /// Replace the content, pushing the previous content onto the undo stack.
    ///
    /// Returns `false` without modifying anything when the buffer is
    /// read-only.
    pub fn set_content(&mut self, new_content: String) -> bool {
        if self.read_only {
            return false;
        }
        if new_content != self.content {
            self.undo_stack.push(std::mem::replace(&mut self.content, new_content));
            if self.undo_stack.len() > self.max_undo_size {
                self.undo_stack.remove(0);
            }
            self.redo_stack.clear();
            self.save_point_generation = self.save_point_generation.wrapping_add(1);
        }
        true
    }

    /// Replace content and reset all history, as after a reload from disk.
    pub fn reset_content(&mut self, content: String) {
        self.content = content;
        self.save_point = Some(self.content.clone());
        self.undo_stack.clear();
        self.redo_stack.clear();
        self.save_point_generation = self.save_point_generation.wrapping_add(1);
    }

    /// Undo the last edit. Returns `true` if an undo was performed.
    pub fn undo(&mut self) -> bool {
        if let Some(previous) = self.undo_stack.pop() {
            self.redo_stack
                .push(std::mem::replace(&mut self.content, previous));
            self.save_point_generation = self.save_point_generation.wrapping_add(1);
            true
        } else {
            false
        }
    }

    /// Redo the last undone edit. Returns `true` if a redo was performed.
    pub fn redo(&mut self) -> bool {
        if let Some(next) = self.redo_stack.pop() {
            self.undo_stack
                .push(std::mem::replace(&mut self.content, next));
            self.save_point_generation = self.save_point_generation.wrapping_add(1);
            true
        } else {
            false
        }
    }

    /// Line-ending mode the buffer is configured with.
    pub fn eol_mode(&self) -> EolFormat {
        self.eol_mode
    }

    /// Set the line-ending mode (does not rewrite existing breaks).
    pub fn set_eol_mode(&mut self, mode: EolFormat) {
        self.eol_mode = mode;
    }

    /// Whether the editing component reports this buffer read-only.
    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    /// Toggle the editing component's read-only flag.
    pub fn set_read_only(&mut self, read_only: bool) {
        self.read_only = read_only;
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Buffer Handle
// ─────────────────────────────────────────────────────────────────────────────

/// An owning, reference-counted handle to a [`TextBuffer`].
///
/// The handle is move-only: there is no `Clone` impl, and additional
/// references are minted explicitly through [`BufferHandle::share`], which
/// mirrors the editing component's add-ref call. Dropping a handle releases
/// its reference; the buffer itself is destroyed when the last handle goes
/// away. The reload-rollback path in the reconciler relies on `share` to
/// deliberately keep a released buffer alive until the replacement load is
/// known to have succeeded.
#[derive(Debug)]
pub struct BufferHandle {
    inner: Rc<RefCell<TextBuffer>>,
}

impl BufferHandle {
    /// Create the first handle to a fresh buffer.
    pub fn new(buffer: TextBuffer) -> Self {
        Self {
            inner: Rc::new(RefCell::new(buffer)),
        }
    }

    /// Mint an additional reference to the same buffer.
    pub fn share(&self) -> BufferHandle {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }

    /// Number of live handles to this buffer.
    pub fn ref_count(&self) -> usize {
        Rc::strong_count(&self.inner)
    }

    /// Whether `other` refers to the same underlying buffer.
    pub fn same_buffer(&self, other: &BufferHandle) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// Borrow the buffer immutably.
    pub fn borrow(&self) -> Ref<'_, TextBuffer> {
        self.inner.borrow()
    }

    /// Borrow the buffer mutably.
    pub fn borrow_mut(&self) -> RefMut<'_, TextBuffer> {
        self.inner.borrow_mut()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dirty_tracks_save_point() {
        let mut buf = TextBuffer::new("hello".to_string(), EolFormat::Lf);
        assert!(!buf.is_dirty());
        buf.set_content("hello world".to_string());
        assert!(buf.is_dirty());
        buf.set_save_point();
        assert!(!buf.is_dirty());
    }

    #[test]
    fn test_undo_back_to_save_point_is_clean() {
        let mut buf = TextBuffer::new("a".to_string(), EolFormat::Lf);
        buf.set_content("ab".to_string());
        assert!(buf.is_dirty());
        assert!(buf.undo());
        assert!(!buf.is_dirty());
        assert!(buf.redo());
        assert!(buf.is_dirty());
    }

    #[test]
    fn test_read_only_blocks_edits() {
        let mut buf = TextBuffer::new("keep".to_string(), EolFormat::Lf);
        buf.set_read_only(true);
        assert!(!buf.set_content("changed".to_string()));
        assert_eq!(buf.content(), "keep");
    }

    #[test]
    fn test_nudge_bumps_generation_without_edit() {
        let mut buf = TextBuffer::new("x".to_string(), EolFormat::Lf);
        let before = buf.save_point_generation();
        buf.nudge_save_point();
        assert_ne!(buf.save_point_generation(), before);
        assert_eq!(buf.content(), "x");
        assert!(!buf.is_dirty());
    }

    #[test]
    fn test_handle_ref_counting() {
        let handle = BufferHandle::new(TextBuffer::new(String::new(), EolFormat::Lf));
        assert_eq!(handle.ref_count(), 1);
        let shared = handle.share();
        assert_eq!(handle.ref_count(), 2);
        assert!(handle.same_buffer(&shared));
        drop(shared);
        assert_eq!(handle.ref_count(), 1);
    }

    #[test]
    fn test_invalidate_save_point_forces_dirty() {
        let mut buf = TextBuffer::new("content".to_string(), EolFormat::Lf);
        assert!(!buf.is_dirty());
        buf.invalidate_save_point();
        assert!(buf.is_dirty());
        buf.set_save_point();
        assert!(!buf.is_dirty());
    }

    #[test]
    fn test_reset_content_clears_history() {
        let mut buf = TextBuffer::new("one".to_string(), EolFormat::Lf);
        buf.set_content("two".to_string());
        buf.reset_content("fresh".to_string());
        assert!(!buf.is_dirty());
        assert!(!buf.undo());
        assert_eq!(buf.content(), "fresh");
    }
}
