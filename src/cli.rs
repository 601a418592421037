//! Command-line surface for Ironpad
//!
//! Launch arguments use slash-prefixed tokens (`/path:"..."`, `/line:N`)
//! alongside bare file paths. Bare paths may contain wildcards, which expand
//! against the filesystem at parse time. A parsed argument set also decides
//! whether this launch forwards itself to an already running instance or
//! becomes one itself.

use globset::GlobBuilder;
use log::warn;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

// ─────────────────────────────────────────────────────────────────────────────
// Launch Arguments
// ─────────────────────────────────────────────────────────────────────────────

/// Everything one launch's command line asked for.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LaunchArgs {
    /// Files to open, in order, wildcards already expanded
    pub files: Vec<PathBuf>,
    /// 1-based caret line for the last opened file
    pub line: Option<usize>,
    /// Save identity to adopt for the opened file (tab handoff to a fresh
    /// instance: the opened file is staged content, this is its real path)
    pub save_path: Option<PathBuf>,
    /// The opened content carries unsaved changes from the sending instance
    pub adopt_modified: bool,
    /// Run standalone instead of forwarding to a running instance
    pub allow_multiple: bool,
    /// Relaunch with elevated rights (recognized, acted on by the shell
    /// integration layer)
    pub elevate: bool,
    /// Like elevate, but reusing an elevated instance when one exists
    pub admin: bool,
    /// Register the shell file association and exit
    pub register: bool,
    /// Remove the shell file association and exit
    pub unregister: bool,
    /// Print usage and exit
    pub help: bool,
    /// Original tokens, kept verbatim for forwarding to a peer
    raw: Vec<String>,
}

impl LaunchArgs {
    /// Parse command-line tokens (exclusive of the program name).
    pub fn parse<I>(tokens: I) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        let mut args = LaunchArgs::default();
        for token in tokens {
            args.raw.push(token.clone());
            if let Some(rest) = strip_switch(&token) {
                args.apply_switch(rest, &token);
            } else {
                args.add_path(&token);
            }
        }
        args
    }

    fn apply_switch(&mut self, switch: &str, original: &str) {
        let (name, value) = match switch.split_once(':') {
            Some((name, value)) => (name, Some(value)),
            None => (switch, None),
        };
        match (name.to_ascii_lowercase().as_str(), value) {
            ("path", Some(value)) => self.add_path(unquote(value)),
            ("line", Some(value)) => match value.parse::<usize>() {
                Ok(line) if line > 0 => self.line = Some(line),
                _ => warn!("Ignoring bad line number in '{}'", original),
            },
            ("savepath", Some(value)) => {
                self.save_path = Some(PathBuf::from(unquote(value)));
            }
            ("modified", None) => self.adopt_modified = true,
            ("multiple", None) => self.allow_multiple = true,
            ("elevate", None) => self.elevate = true,
            ("admin", None) => self.admin = true,
            ("register", None) => self.register = true,
            ("unregister", None) => self.unregister = true,
            ("help", None) | ("?", None) => self.help = true,
            _ => warn!("Ignoring unrecognized argument '{}'", original),
        }
    }

    fn add_path(&mut self, token: &str) {
        let token = unquote(token);
        if token.is_empty() {
            return;
        }
        if token.contains('*') || token.contains('?') {
            let mut matched = expand_wildcards(token);
            if matched.is_empty() {
                warn!("Pattern '{}' matched no files", token);
            }
            self.files.append(&mut matched);
            return;
        }
        let path = PathBuf::from(token);
        if path.is_dir() {
            warn!("'{}' is a directory, skipping", path.display());
            return;
        }
        self.files.push(path);
    }

    /// Whether this launch should hand its command line to a running
    /// instance instead of starting up fully. Elevation requests always
    /// start fresh so the new rights actually take effect.
    pub fn forwards_to_existing(&self) -> bool {
        !self.allow_multiple
            && !self.elevate
            && !self.admin
            && !self.register
            && !self.unregister
            && !self.help
    }

    /// Re-encode the original tokens as one forwardable command line.
    pub fn encode_forward(&self) -> String {
        self.raw
            .iter()
            .map(|token| {
                if token.contains(' ') && !token.contains('"') {
                    format!("\"{}\"", token)
                } else {
                    token.clone()
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Split a forwarded command line back into tokens.
    ///
    /// Quotes group tokens containing spaces; they do not nest. This is the
    /// inverse of [`LaunchArgs::encode_forward`] and is applied by the
    /// receiving instance before re-parsing.
    pub fn split_forwarded(command_line: &str) -> Vec<String> {
        let mut tokens = Vec::new();
        let mut current = String::new();
        let mut in_quotes = false;
        for ch in command_line.chars() {
            match ch {
                '"' => in_quotes = !in_quotes,
                ' ' if !in_quotes => {
                    if !current.is_empty() {
                        tokens.push(std::mem::take(&mut current));
                    }
                }
                _ => current.push(ch),
            }
        }
        if !current.is_empty() {
            tokens.push(current);
        }
        tokens
    }
}

/// Usage text for `/help`.
pub const USAGE: &str = "\
Usage: ironpad [options] [file ...]

Options:
  /path:\"<file>\"     Open a file (same as a bare path argument)
  /line:<n>          Move the caret to line <n> in the last opened file
  /savepath:\"<file>\" Adopt <file> as the save identity of the opened file
  /multiple          Start a separate instance instead of forwarding
  /elevate           Relaunch with elevated rights
  /admin             Reuse an elevated instance if one is running
  /register          Register the shell file association and exit
  /unregister        Remove the shell file association and exit
  /help              Show this text

Bare paths may contain * and ? wildcards.";

// ─────────────────────────────────────────────────────────────────────────────
// Helpers
// ─────────────────────────────────────────────────────────────────────────────

/// Slash switches only; a bare "/" path segment start does not count because
/// switches are single words. A token like "/home/u/f.rs" has path
/// separators after the slash and is treated as a path.
fn strip_switch(token: &str) -> Option<&str> {
    let rest = token.strip_prefix('/').or_else(|| token.strip_prefix('-'))?;
    if rest.is_empty() {
        return None;
    }
    // A switch name is alphabetic (plus "?"); colon starts its value
    let name = rest.split(':').next().unwrap_or(rest);
    if name == "?" || (!name.is_empty() && name.chars().all(|c| c.is_ascii_alphabetic())) {
        Some(rest)
    } else {
        None
    }
}

fn unquote(token: &str) -> &str {
    token
        .strip_prefix('"')
        .and_then(|t| t.strip_suffix('"'))
        .unwrap_or(token)
}

/// Expand a wildcard pattern against the filesystem.
///
/// The pattern's directory part is taken literally; only the file-name part
/// may contain wildcards. Matches are files only, sorted for a stable open
/// order.
fn expand_wildcards(pattern: &str) -> Vec<PathBuf> {
    let path = Path::new(pattern);
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return Vec::new();
    };
    let matcher = match GlobBuilder::new(name).literal_separator(true).build() {
        Ok(glob) => glob.compile_matcher(),
        Err(e) => {
            warn!("Bad pattern '{}': {}", pattern, e);
            return Vec::new();
        }
    };

    let mut matches: Vec<PathBuf> = WalkDir::new(dir)
        .max_depth(1)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| {
            entry
                .file_name()
                .to_str()
                .map(|n| matcher.is_match(n))
                .unwrap_or(false)
        })
        .map(|entry| entry.into_path())
        .collect();
    matches.sort();
    matches
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
