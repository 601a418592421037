//! Document identity and per-document state for Ironpad
//!
//! This module defines the `DocId` identifier minted for every open document
//! slot and the `DocumentRecord` that carries one buffer's on-disk identity,
//! encoding, dirty/save state, and restore-on-activation data.

use crate::buffer::{BufferHandle, TextBuffer};
use crate::encoding::{Encoding, EolFormat};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

// ─────────────────────────────────────────────────────────────────────────────
// Document Identity
// ─────────────────────────────────────────────────────────────────────────────

/// Opaque, process-local identifier for an open document slot.
///
/// The zero value means "no document". Ids are minted by [`DocIdGenerator`]
/// from a strictly increasing counter and are never reused within a process,
/// even after the owning tab closes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct DocId(u64);

impl DocId {
    /// The invalid "no document" id.
    pub const INVALID: DocId = DocId(0);

    /// Whether this id refers to a document at all.
    pub fn is_valid(&self) -> bool {
        self.0 != 0
    }

    /// Raw counter value, for logging.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for DocId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "doc#{}", self.0)
    }
}

/// Mints [`DocId`]s from a monotonically increasing counter.
#[derive(Debug, Default)]
pub struct DocIdGenerator {
    next: u64,
}

impl DocIdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mint the next id. Never returns [`DocId::INVALID`].
    pub fn mint(&mut self) -> DocId {
        self.next += 1;
        DocId(self.next)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Caret / Scroll Position
// ─────────────────────────────────────────────────────────────────────────────

/// Saved caret and scroll state, restored when a tab becomes active again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CaretPosition {
    /// 1-based caret line (0 means "unset", treated as line 1)
    pub line: usize,
    /// 0-based caret column
    pub column: usize,
    /// 1-based first visible line of the scroll viewport
    pub first_visible_line: usize,
}

impl CaretPosition {
    /// Position at the start of a line.
    pub fn at_line(line: usize) -> Self {
        Self {
            line,
            column: 0,
            first_visible_line: line,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Indentation Preference
// ─────────────────────────────────────────────────────────────────────────────

/// Per-document indentation preference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TabSpacePreference {
    /// Defer to the global / editorconfig setting
    #[default]
    Default,
    /// Indent with tab characters
    Tabs,
    /// Indent with spaces
    Spaces,
}

// ─────────────────────────────────────────────────────────────────────────────
// Document Record
// ─────────────────────────────────────────────────────────────────────────────

/// Hook invoked after a successful save of the owning document.
pub type SaveHook = Box<dyn FnMut(&Path)>;

/// The persisted-and-volatile state of one open buffer.
///
/// Exactly one record exists per open document slot; the record exclusively
/// owns the buffer handle for its content (editor surfaces bind shared
/// references while displaying it).
pub struct DocumentRecord {
    /// Absolute filesystem path, or `None` for an unsaved new buffer
    pub path: Option<PathBuf>,
    /// Code page governing byte↔text conversion on load/save
    pub encoding: Encoding,
    /// Whether a byte-order mark must be (re)written on save
    pub has_bom: bool,
    /// Line-ending format the document round-trips through
    pub eol_format: EolFormat,
    /// Buffer must be written even if the editor reports no content change
    /// (never-saved new document, pending encoding change, adopted transfer)
    pub needs_saving: bool,
    /// On-disk read-only attribute or external imposition
    pub is_readonly: bool,
    /// User-toggled soft write lock
    pub is_write_protected: bool,
    /// Language identifier used to select syntax rules
    pub language: String,
    /// Last known on-disk modification time; `None` until first observed
    pub file_mod_time: Option<SystemTime>,
    /// Saved caret/scroll state, restored on tab activation
    pub position: CaretPosition,
    /// Per-document indentation preference
    pub tab_space_pref: TabSpacePreference,
    /// 1-based bookmarked lines, carried across sessions through settings
    pub bookmark_lines: Vec<usize>,
    /// Invoked after each successful save of this document
    pub save_hook: Option<SaveHook>,
    /// Owned buffer handle; only `None` transiently mid-reload
    buffer: Option<BufferHandle>,
}

impl fmt::Debug for DocumentRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DocumentRecord")
            .field("path", &self.path)
            .field("encoding", &self.encoding)
            .field("has_bom", &self.has_bom)
            .field("eol_format", &self.eol_format)
            .field("needs_saving", &self.needs_saving)
            .field("is_readonly", &self.is_readonly)
            .field("is_write_protected", &self.is_write_protected)
            .field("language", &self.language)
            .field("has_save_hook", &self.save_hook.is_some())
            .finish_non_exhaustive()
    }
}

impl DocumentRecord {
    /// Create a record for a new, never-saved buffer.
    ///
    /// New buffers need saving from birth: there is no file backing them.
    pub fn new_untitled(encoding: Encoding, eol_format: EolFormat) -> Self {
        Self {
            path: None,
            encoding,
            has_bom: false,
            eol_format,
            needs_saving: true,
            is_readonly: false,
            is_write_protected: false,
            language: String::new(),
            file_mod_time: None,
            position: CaretPosition::default(),
            tab_space_pref: TabSpacePreference::Default,
            bookmark_lines: Vec::new(),
            save_hook: None,
            buffer: Some(BufferHandle::new(TextBuffer::new(
                String::new(),
                eol_format,
            ))),
        }
    }

    /// Create a record for content loaded from `path`.
    pub fn from_file(
        path: PathBuf,
        content: String,
        encoding: Encoding,
        has_bom: bool,
        eol_format: EolFormat,
        file_mod_time: Option<SystemTime>,
    ) -> Self {
        Self {
            path: Some(path),
            encoding,
            has_bom,
            eol_format,
            needs_saving: false,
            is_readonly: false,
            is_write_protected: false,
            language: String::new(),
            file_mod_time,
            position: CaretPosition::default(),
            tab_space_pref: TabSpacePreference::Default,
            bookmark_lines: Vec::new(),
            save_hook: None,
            buffer: Some(BufferHandle::new(TextBuffer::new(content, eol_format))),
        }
    }

    /// The buffer handle owned by this record.
    ///
    /// Panics only if called mid-reload while the handle is detached, which
    /// the reconciler never allows to escape.
    pub fn buffer(&self) -> &BufferHandle {
        self.buffer
            .as_ref()
            .expect("document record has no buffer outside reload")
    }

    /// Whether the handle is currently attached.
    pub fn has_buffer(&self) -> bool {
        self.buffer.is_some()
    }

    /// Detach the buffer handle, e.g. to release it ahead of a reload.
    ///
    /// The caller is responsible for either dropping the returned handle
    /// (releasing the reference) or reattaching it via
    /// [`DocumentRecord::attach_buffer`] if the replacement load fails.
    pub fn detach_buffer(&mut self) -> Option<BufferHandle> {
        self.buffer.take()
    }

    /// Attach a buffer handle to this record.
    pub fn attach_buffer(&mut self, handle: BufferHandle) {
        self.buffer = Some(handle);
    }

    /// Whether the editor buffer has unsaved content changes.
    pub fn is_dirty(&self) -> bool {
        self.buffer
            .as_ref()
            .map(|b| b.borrow().is_dirty())
            .unwrap_or(false)
    }

    /// Whether the document must be written out, for any reason.
    pub fn wants_save(&self) -> bool {
        self.is_dirty() || self.needs_saving
    }

    /// Whether edits are currently blocked, from any source.
    pub fn is_edit_blocked(&self) -> bool {
        self.is_readonly
            || self.is_write_protected
            || self
                .buffer
                .as_ref()
                .map(|b| b.borrow().is_read_only())
                .unwrap_or(false)
    }

    /// Refresh the on-disk read-only attribute, reconciling the soft lock:
    /// when the read-only attribute clears, the user's write-protection is
    /// dropped with it.
    pub fn set_readonly_attribute(&mut self, readonly: bool) {
        self.is_readonly = readonly;
        if !readonly {
            self.is_write_protected = false;
        }
    }

    /// Whether this is a blank, never-edited, never-saved buffer.
    ///
    /// Such a buffer formally needs saving (nothing backs it) but closing it
    /// loses nothing, so close flows skip the confirmation prompt for it and
    /// close-all treats it as the mandatory remainder tab.
    pub fn is_pristine_untitled(&self) -> bool {
        self.path.is_none()
            && !self.is_dirty()
            && self
                .buffer
                .as_ref()
                .map(|b| b.borrow().content().is_empty())
                .unwrap_or(true)
    }

    /// Display name for tab captions: the file name, or "Untitled".
    pub fn display_name(&self) -> String {
        self.path
            .as_ref()
            .and_then(|p| p.file_name())
            .and_then(|n| n.to_str())
            .map(|n| n.to_string())
            .unwrap_or_else(|| "Untitled".to_string())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
