//! Editor surfaces for Ironpad
//!
//! This module models the two editing-component surfaces the session drives:
//! the live surface showing the selected tab, and the hidden scratch surface
//! used to materialize non-active documents for background work (reload,
//! language detection, width measurement) without disturbing the live view.

use crate::buffer::BufferHandle;
use crate::document::{CaretPosition, TabSpacePreference};
use crate::encoding::EolFormat;
use log::debug;

/// One editing-component surface.
///
/// A surface binds at most one buffer handle at a time. The live and the
/// scratch surface must never hold the same buffer for a mutating operation;
/// read-only inspection through the scratch surface is fine while the live
/// surface holds a different document.
#[derive(Debug)]
pub struct EditorSurface {
    /// "live" or "scratch", for logging
    label: &'static str,
    bound: Option<BufferHandle>,
    /// Language id the lexer is currently configured for
    language: String,
    /// Current caret/scroll state of this surface
    caret: CaretPosition,
    /// Indentation preference the surface is configured with
    indentation: TabSpacePreference,
    /// Tab width in columns the surface renders with
    tab_width: u32,
}

impl EditorSurface {
    /// The visible surface bound to the selected tab.
    pub fn live() -> Self {
        Self::with_label("live")
    }

    /// The hidden surface for background operations.
    pub fn scratch() -> Self {
        Self::with_label("scratch")
    }

    fn with_label(label: &'static str) -> Self {
        Self {
            label,
            bound: None,
            language: String::new(),
            caret: CaretPosition::default(),
            indentation: TabSpacePreference::Default,
            tab_width: 4,
        }
    }

    /// Bind a buffer to this surface, releasing any previous binding.
    pub fn bind(&mut self, handle: BufferHandle) {
        debug!("Binding buffer to {} surface", self.label);
        self.bound = Some(handle);
        self.caret = CaretPosition::default();
    }

    /// Release the current binding, returning the handle to the caller.
    pub fn release(&mut self) -> Option<BufferHandle> {
        if self.bound.is_some() {
            debug!("Releasing buffer from {} surface", self.label);
        }
        self.bound.take()
    }

    /// Whether a buffer is currently bound.
    pub fn is_bound(&self) -> bool {
        self.bound.is_some()
    }

    /// Whether this surface is bound to the same buffer as `handle`.
    pub fn is_bound_to(&self, handle: &BufferHandle) -> bool {
        self.bound
            .as_ref()
            .is_some_and(|b| b.same_buffer(handle))
    }

    /// The bound handle, if any.
    pub fn handle(&self) -> Option<&BufferHandle> {
        self.bound.as_ref()
    }

    /// Current text of the bound buffer (empty when unbound).
    pub fn text(&self) -> String {
        self.bound
            .as_ref()
            .map(|b| b.borrow().content().to_string())
            .unwrap_or_default()
    }

    /// Replace the bound buffer's content through the normal edit path.
    ///
    /// Returns `false` when unbound or the buffer is read-only.
    pub fn set_text(&mut self, text: String) -> bool {
        match &self.bound {
            Some(handle) => handle.borrow_mut().set_content(text),
            None => false,
        }
    }

    /// Apply a line-ending mode to the bound buffer.
    pub fn apply_eol_mode(&mut self, mode: EolFormat) {
        if let Some(handle) = &self.bound {
            handle.borrow_mut().set_eol_mode(mode);
        }
    }

    /// Configure the lexer for `language`.
    pub fn apply_language(&mut self, language: &str) {
        if self.language != language {
            debug!("{} surface lexer -> {}", self.label, language);
            self.language = language.to_string();
        }
    }

    /// Language the lexer is currently configured for.
    pub fn language(&self) -> &str {
        &self.language
    }

    /// Configure the surface's indentation preference.
    pub fn apply_indentation(&mut self, pref: TabSpacePreference) {
        self.indentation = pref;
    }

    /// Indentation preference currently applied.
    pub fn indentation(&self) -> TabSpacePreference {
        self.indentation
    }

    /// Configure the rendered tab width in columns.
    pub fn apply_tab_width(&mut self, columns: u32) {
        if self.tab_width != columns {
            debug!("{} surface tab width -> {}", self.label, columns);
            self.tab_width = columns;
        }
    }

    /// Tab width currently rendered.
    pub fn tab_width(&self) -> u32 {
        self.tab_width
    }

    /// Restore caret and scroll state onto this surface.
    pub fn restore_position(&mut self, position: CaretPosition) {
        self.caret = position;
    }

    /// Capture the surface's caret and scroll state.
    pub fn capture_position(&self) -> CaretPosition {
        self.caret
    }

    /// Move the caret to a 1-based line, clamped to the buffer.
    pub fn goto_line(&mut self, line: usize) {
        let max_line = self
            .bound
            .as_ref()
            .map(|b| b.borrow().line_count())
            .unwrap_or(1);
        let line = line.clamp(1, max_line);
        self.caret = CaretPosition::at_line(line);
    }

    /// 1-based caret line.
    pub fn caret_line(&self) -> usize {
        self.caret.line.max(1)
    }

    /// Issue the no-op undo/redo pair that re-fires save-point notifications
    /// without changing content.
    pub fn nudge_save_point(&mut self) {
        if let Some(handle) = &self.bound {
            handle.borrow_mut().nudge_save_point();
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::TextBuffer;

    fn handle(content: &str) -> BufferHandle {
        BufferHandle::new(TextBuffer::new(content.to_string(), EolFormat::Lf))
    }

    #[test]
    fn test_bind_and_release() {
        let mut surface = EditorSurface::live();
        assert!(!surface.is_bound());
        let h = handle("hello");
        surface.bind(h.share());
        assert!(surface.is_bound());
        assert!(surface.is_bound_to(&h));
        assert_eq!(surface.text(), "hello");
        let released = surface.release().unwrap();
        assert!(released.same_buffer(&h));
        assert!(!surface.is_bound());
    }

    #[test]
    fn test_goto_line_clamps_to_buffer() {
        let mut surface = EditorSurface::scratch();
        surface.bind(handle("one\ntwo\nthree"));
        surface.goto_line(99);
        assert_eq!(surface.caret_line(), 3);
        surface.goto_line(0);
        assert_eq!(surface.caret_line(), 1);
    }

    #[test]
    fn test_edits_through_surface_mark_buffer_dirty() {
        let mut surface = EditorSurface::live();
        let h = handle("start");
        surface.bind(h.share());
        assert!(surface.set_text("changed".to_string()));
        assert!(h.borrow().is_dirty());
    }

    #[test]
    fn test_tab_width_applies_and_sticks() {
        let mut surface = EditorSurface::live();
        assert_eq!(surface.tab_width(), 4);
        surface.apply_tab_width(8);
        assert_eq!(surface.tab_width(), 8);
    }

    #[test]
    fn test_set_text_on_unbound_surface_is_noop() {
        let mut surface = EditorSurface::live();
        assert!(!surface.set_text("anything".to_string()));
        assert_eq!(surface.text(), "");
    }
}
