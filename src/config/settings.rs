//! User settings and preferences for Ironpad
//!
//! This module defines the `Settings` struct that holds all user-configurable
//! options and the cross-session per-document side channel, with serde
//! support for JSON persistence.

use crate::encoding::{Encoding, EolFormat};
use crate::store::paths_equal;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

// ─────────────────────────────────────────────────────────────────────────────
// Per-File Bookmarks
// ─────────────────────────────────────────────────────────────────────────────

/// Bookmark lines remembered for one file across sessions.
///
/// Line numbers are persisted as a `*`-delimited list (e.g. `"3*17*42"`),
/// keeping the settings store format of the original tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileBookmarks {
    pub path: PathBuf,
    /// `*`-delimited 1-based line numbers
    pub lines: String,
}

impl FileBookmarks {
    /// Decode the stored line list; malformed entries are skipped.
    pub fn line_numbers(&self) -> Vec<usize> {
        self.lines
            .split('*')
            .filter_map(|tok| tok.trim().parse().ok())
            .collect()
    }

    /// Encode a line list into the stored format.
    pub fn encode_lines(lines: &[usize]) -> String {
        lines
            .iter()
            .map(|l| l.to_string())
            .collect::<Vec<_>>()
            .join("*")
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Session Tabs
// ─────────────────────────────────────────────────────────────────────────────

/// One tab remembered from the previous session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionTab {
    pub path: PathBuf,
    /// 1-based caret line to restore
    #[serde(default)]
    pub line: usize,
}

// ─────────────────────────────────────────────────────────────────────────────
// Settings
// ─────────────────────────────────────────────────────────────────────────────

/// All user-configurable options, persisted as JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Encoding assumed for new documents and undetectable files
    pub default_encoding: Encoding,
    /// Line-ending format for new documents
    pub default_eol: EolFormat,
    /// Reload clean documents silently when they change on disk
    pub auto_reload: bool,
    /// Tab width in columns
    pub tab_width: u32,
    /// Upper bound on remembered bookmark files
    pub max_bookmark_files: usize,
    /// Per-file bookmark lines, most recently touched last
    pub bookmarks: Vec<FileBookmarks>,
    /// Tabs open when the previous session ended
    pub last_open_tabs: Vec<SessionTab>,
    /// Selected tab index in the previous session
    pub active_tab_index: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            default_encoding: Encoding::Utf8,
            default_eol: default_eol_for_platform(),
            auto_reload: false,
            tab_width: 4,
            max_bookmark_files: 64,
            bookmarks: Vec::new(),
            last_open_tabs: Vec::new(),
            active_tab_index: 0,
        }
    }
}

/// Platform-native default line ending.
fn default_eol_for_platform() -> EolFormat {
    if cfg!(windows) {
        EolFormat::Crlf
    } else {
        EolFormat::Lf
    }
}

impl Settings {
    /// Parse settings from JSON, then clamp out-of-range values.
    pub fn from_json_sanitized(json: &str) -> serde_json::Result<Self> {
        let mut settings: Settings = serde_json::from_str(json)?;
        settings.sanitize();
        Ok(settings)
    }

    /// Clamp values a hand-edited config file may have pushed out of range.
    pub fn sanitize(&mut self) {
        self.tab_width = self.tab_width.clamp(1, 16);
        self.max_bookmark_files = self.max_bookmark_files.clamp(1, 512);
        if self.bookmarks.len() > self.max_bookmark_files {
            let excess = self.bookmarks.len() - self.max_bookmark_files;
            self.bookmarks.drain(0..excess);
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Bookmarks Side Channel
    // ─────────────────────────────────────────────────────────────────────────

    /// Bookmark lines remembered for `path`, or empty.
    pub fn bookmarks_for(&self, path: &Path) -> Vec<usize> {
        self.bookmarks
            .iter()
            .find(|b| paths_equal(&b.path, path))
            .map(|b| b.line_numbers())
            .unwrap_or_default()
    }

    /// Remember bookmark lines for `path`.
    ///
    /// An empty line list removes the entry. The entry moves to the
    /// most-recent end; when the bounded file count overflows, the oldest
    /// entry is evicted.
    pub fn remember_bookmarks(&mut self, path: &Path, lines: &[usize]) {
        self.bookmarks.retain(|b| !paths_equal(&b.path, path));
        if lines.is_empty() {
            return;
        }
        self.bookmarks.push(FileBookmarks {
            path: path.to_path_buf(),
            lines: FileBookmarks::encode_lines(lines),
        });
        while self.bookmarks.len() > self.max_bookmark_files {
            self.bookmarks.remove(0);
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bookmark_line_encoding_round_trip() {
        let encoded = FileBookmarks::encode_lines(&[3, 17, 42]);
        assert_eq!(encoded, "3*17*42");
        let bookmarks = FileBookmarks {
            path: PathBuf::from("/a.rs"),
            lines: encoded,
        };
        assert_eq!(bookmarks.line_numbers(), vec![3, 17, 42]);
    }

    #[test]
    fn test_malformed_bookmark_tokens_skipped() {
        let bookmarks = FileBookmarks {
            path: PathBuf::from("/a.rs"),
            lines: "1*junk**9".to_string(),
        };
        assert_eq!(bookmarks.line_numbers(), vec![1, 9]);
    }

    #[test]
    fn test_remember_bookmarks_updates_and_evicts() {
        let mut settings = Settings {
            max_bookmark_files: 2,
            ..Settings::default()
        };
        settings.remember_bookmarks(&PathBuf::from("/one.rs"), &[1]);
        settings.remember_bookmarks(&PathBuf::from("/two.rs"), &[2]);
        settings.remember_bookmarks(&PathBuf::from("/three.rs"), &[3]);
        // Oldest entry evicted
        assert!(settings.bookmarks_for(&PathBuf::from("/one.rs")).is_empty());
        assert_eq!(settings.bookmarks_for(&PathBuf::from("/three.rs")), vec![3]);
        // Empty list removes the entry
        settings.remember_bookmarks(&PathBuf::from("/two.rs"), &[]);
        assert!(settings.bookmarks_for(&PathBuf::from("/two.rs")).is_empty());
    }

    #[test]
    fn test_sanitize_clamps_values() {
        let mut settings = Settings {
            tab_width: 99,
            ..Settings::default()
        };
        settings.sanitize();
        assert_eq!(settings.tab_width, 16);
    }

    #[test]
    fn test_settings_json_round_trip() {
        let mut settings = Settings::default();
        settings.auto_reload = true;
        settings.remember_bookmarks(&PathBuf::from("/x.rs"), &[5, 6]);
        let json = serde_json::to_string(&settings).unwrap();
        let restored = Settings::from_json_sanitized(&json).unwrap();
        assert_eq!(restored, settings);
    }

    #[test]
    fn test_unknown_fields_fall_back_cleanly() {
        // A config written by a newer build parses with defaults filled in
        let settings = Settings::from_json_sanitized(r#"{"auto_reload": true}"#).unwrap();
        assert!(settings.auto_reload);
        assert_eq!(settings.tab_width, 4);
    }
}
