//! Tab list and selection state for Ironpad
//!
//! This module maintains the ordered tab slots, the currently selected
//! index, each tab's derived visual state, and the visible scroll window
//! used when the tabs overflow the title-bar width.

use crate::document::{DocId, DocumentRecord};
use log::debug;

// ─────────────────────────────────────────────────────────────────────────────
// Visual State
// ─────────────────────────────────────────────────────────────────────────────

/// The visual state a tab renders with.
///
/// Derived deterministically from the document record: read-only wins over
/// unsaved, unsaved wins over saved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TabVisualState {
    #[default]
    Saved,
    Unsaved,
    ReadOnly,
}

impl TabVisualState {
    /// Derive the visual state from a document record.
    pub fn derive(record: &DocumentRecord) -> Self {
        if record.is_edit_blocked() {
            TabVisualState::ReadOnly
        } else if record.wants_save() {
            TabVisualState::Unsaved
        } else {
            TabVisualState::Saved
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tab Metrics
// ─────────────────────────────────────────────────────────────────────────────

/// Width model for tabs: measured text width plus fixed padding.
///
/// The UI layer supplies real text measurement; the default approximates a
/// monospace caption, which is all the scroll-window math needs.
#[derive(Debug, Clone, Copy)]
pub struct TabMetrics {
    /// Average advance width of one caption character
    pub char_width: f32,
    /// Fixed padding added to every tab (icon, close button, margins)
    pub padding: f32,
}

impl Default for TabMetrics {
    fn default() -> Self {
        Self {
            char_width: 8.0,
            padding: 24.0,
        }
    }
}

impl TabMetrics {
    /// Measured width of a tab with the given caption.
    pub fn measure(&self, title: &str) -> f32 {
        title.chars().count() as f32 * self.char_width + self.padding
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tab Slots
// ─────────────────────────────────────────────────────────────────────────────

/// One UI tab slot referencing exactly one document.
#[derive(Debug, Clone)]
pub struct TabSlot {
    /// The document this slot displays; bound immediately after insertion
    doc: DocId,
    /// Caption text shown on the tab
    title: String,
    /// Derived visual state
    state: TabVisualState,
}

impl TabSlot {
    pub fn doc(&self) -> DocId {
        self.doc
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn state(&self) -> TabVisualState {
        self.state
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tab List
// ─────────────────────────────────────────────────────────────────────────────

/// Ordered sequence of tab slots plus selection and scroll-window state.
#[derive(Debug)]
pub struct TabList {
    slots: Vec<TabSlot>,
    /// Index of the currently selected tab; meaningless while empty
    selected: usize,
    /// First tab index inside the visible scroll window
    first_visible: usize,
    /// Width available for rendering tabs
    available_width: f32,
    metrics: TabMetrics,
}

impl Default for TabList {
    fn default() -> Self {
        Self::new(TabMetrics::default(), 800.0)
    }
}

impl TabList {
    pub fn new(metrics: TabMetrics, available_width: f32) -> Self {
        Self {
            slots: Vec::new(),
            selected: 0,
            first_visible: 0,
            available_width,
            metrics,
        }
    }

    /// Number of tabs.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether there are no tabs.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// All slots in order.
    pub fn slots(&self) -> &[TabSlot] {
        &self.slots
    }

    /// The currently selected index, or `None` while empty.
    pub fn selected(&self) -> Option<usize> {
        if self.slots.is_empty() {
            None
        } else {
            Some(self.selected)
        }
    }

    /// The document bound to the selected tab.
    pub fn selected_doc(&self) -> DocId {
        self.selected()
            .map(|i| self.slots[i].doc)
            .unwrap_or(DocId::INVALID)
    }

    /// The document bound to the tab at `index`.
    pub fn doc_at(&self, index: usize) -> DocId {
        self.slots
            .get(index)
            .map(|s| s.doc)
            .unwrap_or(DocId::INVALID)
    }

    /// The tab index displaying `id`, if any.
    pub fn index_of(&self, id: DocId) -> Option<usize> {
        self.slots.iter().position(|s| s.doc == id)
    }

    /// Append a new tab slot with `title`; the caller binds a document id
    /// immediately afterwards. Returns the new index.
    pub fn insert_at_end(&mut self, title: &str) -> usize {
        self.slots.push(TabSlot {
            doc: DocId::INVALID,
            title: title.to_string(),
            state: TabVisualState::Unsaved,
        });
        let index = self.slots.len() - 1;
        debug!("Inserted tab slot {} ('{}')", index, title);
        index
    }

    /// Bind `id` to the slot at `index`.
    pub fn bind_document(&mut self, index: usize, id: DocId) {
        if let Some(slot) = self.slots.get_mut(index) {
            slot.doc = id;
        }
    }

    /// Update selection state; returns `false` for an out-of-range index.
    ///
    /// Only the index and scroll window move here. The ordered
    /// tab-changing/tab-changed notification sequence is driven by the
    /// session, which calls this in the middle of that sequence.
    pub fn set_selected(&mut self, index: usize) -> bool {
        if index >= self.slots.len() {
            return false;
        }
        self.selected = index;
        self.scroll_into_view(index);
        true
    }

    /// Remove the slot at `index`, fixing up the selected index.
    ///
    /// Selection rule: if the removed tab was selected, select the tab now
    /// occupying the same index, falling back to the last tab; if a tab
    /// before the selection was removed, the selection index shifts down to
    /// keep pointing at the same tab.
    pub fn remove(&mut self, index: usize) -> bool {
        if index >= self.slots.len() {
            return false;
        }
        self.slots.remove(index);
        if self.slots.is_empty() {
            self.selected = 0;
            self.first_visible = 0;
            return true;
        }
        if index < self.selected {
            self.selected -= 1;
        } else if self.selected >= self.slots.len() {
            self.selected = self.slots.len() - 1;
        }
        self.first_visible = self.first_visible.min(self.selected);
        debug!("Removed tab {}, selection now {}", index, self.selected);
        true
    }

    /// Refresh the caption and visual state of the tab showing `id` from its
    /// record.
    ///
    /// Runs after every mutation that could change dirtiness, read-only
    /// state, or save state: save completion, external reload, write-protect
    /// toggles, save-point notifications.
    pub fn refresh_tab(&mut self, id: DocId, record: &DocumentRecord) {
        if let Some(index) = self.index_of(id) {
            let slot = &mut self.slots[index];
            slot.title = record.display_name();
            slot.state = TabVisualState::derive(record);
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Visible Scroll Window
    // ─────────────────────────────────────────────────────────────────────────

    /// Width available for tabs (changes on window resize).
    pub fn set_available_width(&mut self, width: f32) {
        self.available_width = width;
        if !self.slots.is_empty() {
            self.scroll_into_view(self.selected);
        }
    }

    /// First index of the visible window.
    pub fn first_visible(&self) -> usize {
        self.first_visible
    }

    /// Last index (inclusive) of the visible window.
    pub fn last_visible(&self) -> usize {
        if self.slots.is_empty() {
            return 0;
        }
        let mut width = 0.0;
        let mut last = self.first_visible;
        for (i, slot) in self.slots.iter().enumerate().skip(self.first_visible) {
            width += self.metrics.measure(&slot.title);
            if width > self.available_width && i > self.first_visible {
                break;
            }
            last = i;
        }
        last
    }

    /// Adjust the window so `index` is visible.
    ///
    /// Selecting forward past the window grows it backward from the new tab
    /// until the total width fits, keeping the new tab last; selecting
    /// backward before the window grows forward, keeping the new tab first.
    fn scroll_into_view(&mut self, index: usize) {
        if index < self.first_visible {
            self.first_visible = index;
            return;
        }
        if index <= self.last_visible() {
            return;
        }
        // Grow backward from `index` while the accumulated width still fits.
        let mut width = self.metrics.measure(&self.slots[index].title);
        let mut first = index;
        while first > 0 {
            let next_width = self.metrics.measure(&self.slots[first - 1].title);
            if width + next_width > self.available_width {
                break;
            }
            width += next_width;
            first -= 1;
        }
        self.first_visible = first;
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::DocumentRecord;
    use crate::encoding::{Encoding, EolFormat};

    fn list_with_tabs(n: usize) -> TabList {
        let mut list = TabList::default();
        for i in 0..n {
            let index = list.insert_at_end(&format!("tab{}.rs", i));
            list.bind_document(index, crate::document::DocId::default());
        }
        list
    }

    #[test]
    fn test_visual_state_precedence() {
        let mut record = DocumentRecord::new_untitled(Encoding::Utf8, EolFormat::Lf);
        // Untitled buffers need saving
        assert_eq!(TabVisualState::derive(&record), TabVisualState::Unsaved);
        // Read-only wins over unsaved
        record.is_write_protected = true;
        assert_eq!(TabVisualState::derive(&record), TabVisualState::ReadOnly);
        record.is_write_protected = false;
        record.needs_saving = false;
        assert_eq!(TabVisualState::derive(&record), TabVisualState::Saved);
    }

    #[test]
    fn test_remove_before_selection_keeps_same_tab_selected() {
        // Tabs [A, B, C], selected = C; removing B keeps C selected
        let mut list = list_with_tabs(3);
        list.set_selected(2);
        list.remove(1);
        assert_eq!(list.selected(), Some(1));
        assert_eq!(list.len(), 2);
    }

    #[test]
    fn test_remove_selected_moves_to_same_index_else_last() {
        let mut list = list_with_tabs(3);
        list.set_selected(1);
        list.remove(1);
        // Tab formerly at index 2 now occupies index 1
        assert_eq!(list.selected(), Some(1));

        let mut list = list_with_tabs(2);
        list.set_selected(1);
        list.remove(1);
        // No tab at index 1 anymore; fall back to the last tab
        assert_eq!(list.selected(), Some(0));
    }

    #[test]
    fn test_remove_unselected_after_selection() {
        // Scenario: [A, B, C] selected=A, close B → [A, C], selection stays A
        let mut list = list_with_tabs(3);
        list.set_selected(0);
        list.remove(1);
        assert_eq!(list.selected(), Some(0));
        assert_eq!(list.len(), 2);
    }

    #[test]
    fn test_scroll_forward_keeps_new_tab_last() {
        // 10 tabs of width 8*6+24 = 72 each; window fits 3 (216 < 220)
        let mut list = TabList::new(TabMetrics::default(), 220.0);
        for i in 0..10 {
            list.insert_at_end(&format!("t{:02}.c", i));
        }
        list.set_selected(7);
        assert_eq!(list.last_visible(), 7);
        assert_eq!(list.first_visible(), 5);
    }

    #[test]
    fn test_scroll_backward_keeps_new_tab_first() {
        let mut list = TabList::new(TabMetrics::default(), 220.0);
        for i in 0..10 {
            list.insert_at_end(&format!("t{:02}.c", i));
        }
        list.set_selected(9);
        list.set_selected(2);
        assert_eq!(list.first_visible(), 2);
    }

    #[test]
    fn test_empty_list_has_no_selection() {
        let list = TabList::default();
        assert_eq!(list.selected(), None);
        assert!(!list.selected_doc().is_valid());
    }
}
