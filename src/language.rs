//! Language identification for Ironpad
//!
//! Maps file paths to language identifiers used for lexer setup. The actual
//! lexer configuration lives in the editing component; this module only
//! answers "which language is this path".

use std::collections::HashMap;
use std::path::Path;

/// Language id used when nothing better is known.
pub const PLAIN_TEXT: &str = "text";

/// Extension → language-id table, built once at startup.
#[derive(Debug, Clone)]
pub struct LanguageRegistry {
    by_extension: HashMap<&'static str, &'static str>,
}

impl Default for LanguageRegistry {
    fn default() -> Self {
        let mut by_extension = HashMap::new();
        for (exts, lang) in [
            (&["rs"][..], "rust"),
            (&["c", "h"][..], "c"),
            (&["cpp", "cc", "cxx", "hpp"][..], "cpp"),
            (&["py"][..], "python"),
            (&["js", "mjs"][..], "javascript"),
            (&["ts"][..], "typescript"),
            (&["json"][..], "json"),
            (&["md", "markdown"][..], "markdown"),
            (&["toml"][..], "toml"),
            (&["yaml", "yml"][..], "yaml"),
            (&["html", "htm"][..], "html"),
            (&["css"][..], "css"),
            (&["sh", "bash"][..], "shell"),
            (&["xml"][..], "xml"),
            (&["ini", "cfg", "conf"][..], "ini"),
            (&["txt"][..], PLAIN_TEXT),
        ] {
            for ext in exts {
                by_extension.insert(*ext, lang);
            }
        }
        Self { by_extension }
    }
}

impl LanguageRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up the language id for a path, falling back to plain text.
    pub fn language_for_path(&self, path: &Path) -> String {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| self.language_for_extension(ext))
            .unwrap_or(PLAIN_TEXT)
            .to_string()
    }

    /// Look up the language id for a bare extension.
    pub fn language_for_extension(&self, ext: &str) -> &'static str {
        self.by_extension
            .get(ext.to_lowercase().as_str())
            .copied()
            .unwrap_or(PLAIN_TEXT)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_language_by_extension() {
        let registry = LanguageRegistry::new();
        assert_eq!(
            registry.language_for_path(&PathBuf::from("/src/main.rs")),
            "rust"
        );
        assert_eq!(
            registry.language_for_path(&PathBuf::from("notes.MD")),
            "markdown"
        );
        assert_eq!(
            registry.language_for_path(&PathBuf::from("no_extension")),
            PLAIN_TEXT
        );
        assert_eq!(
            registry.language_for_path(&PathBuf::from("weird.zzz")),
            PLAIN_TEXT
        );
    }
}
