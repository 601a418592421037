//! Text encoding and line-ending handling for Ironpad
//!
//! This module defines the code-page catalog used to convert between the
//! bytes stored on disk and the text held in editor buffers, including
//! byte-order-mark detection and line-ending format detection and
//! normalization.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

// ─────────────────────────────────────────────────────────────────────────────
// Code Pages
// ─────────────────────────────────────────────────────────────────────────────

/// Numeric code-page identifiers, mirroring the classic Windows values.
pub const CP_UTF8: u32 = 65001;
pub const CP_UTF16_LE: u32 = 1200;
pub const CP_UTF16_BE: u32 = 1201;
pub const CP_LATIN1: u32 = 28591;

/// Supported text encodings for loading and saving documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Encoding {
    /// UTF-8 (the default for new documents)
    #[default]
    Utf8,
    /// UTF-16 little-endian
    Utf16Le,
    /// UTF-16 big-endian
    Utf16Be,
    /// ISO-8859-1, the ANSI stand-in
    Latin1,
}

impl Encoding {
    /// The numeric code-page identifier for this encoding.
    pub fn code_page(&self) -> u32 {
        match self {
            Encoding::Utf8 => CP_UTF8,
            Encoding::Utf16Le => CP_UTF16_LE,
            Encoding::Utf16Be => CP_UTF16_BE,
            Encoding::Latin1 => CP_LATIN1,
        }
    }

    /// Look up an encoding by its numeric code page.
    pub fn from_code_page(cp: u32) -> Option<Self> {
        match cp {
            CP_UTF8 => Some(Encoding::Utf8),
            CP_UTF16_LE => Some(Encoding::Utf16Le),
            CP_UTF16_BE => Some(Encoding::Utf16Be),
            CP_LATIN1 => Some(Encoding::Latin1),
            _ => None,
        }
    }

    /// Get a display name for this encoding.
    pub fn display_name(&self) -> &'static str {
        match self {
            Encoding::Utf8 => "UTF-8",
            Encoding::Utf16Le => "UTF-16 LE",
            Encoding::Utf16Be => "UTF-16 BE",
            Encoding::Latin1 => "ANSI (Latin-1)",
        }
    }

    /// The byte-order mark emitted for this encoding when BOM writing is on.
    pub fn bom(&self) -> &'static [u8] {
        match self {
            Encoding::Utf8 => &[0xEF, 0xBB, 0xBF],
            Encoding::Utf16Le => &[0xFF, 0xFE],
            Encoding::Utf16Be => &[0xFE, 0xFF],
            Encoding::Latin1 => &[],
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Line-Ending Formats
// ─────────────────────────────────────────────────────────────────────────────

/// Line-ending formats a document can round-trip through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum EolFormat {
    /// Windows-style `\r\n`
    #[default]
    Crlf,
    /// Classic Mac `\r`
    Cr,
    /// Unix `\n`
    Lf,
}

impl EolFormat {
    /// The literal line-break sequence for this format.
    pub fn as_str(&self) -> &'static str {
        match self {
            EolFormat::Crlf => "\r\n",
            EolFormat::Cr => "\r",
            EolFormat::Lf => "\n",
        }
    }

    /// Get a display label for this format.
    pub fn label(&self) -> &'static str {
        match self {
            EolFormat::Crlf => "CRLF",
            EolFormat::Cr => "CR",
            EolFormat::Lf => "LF",
        }
    }

    /// Detect the format from the first line break found in `text`.
    ///
    /// Returns `None` when the text contains no line breaks at all, in which
    /// case the caller should fall back to the configured default.
    pub fn detect(text: &str) -> Option<Self> {
        let bytes = text.as_bytes();
        for (i, &b) in bytes.iter().enumerate() {
            match b {
                b'\r' => {
                    if bytes.get(i + 1) == Some(&b'\n') {
                        return Some(EolFormat::Crlf);
                    }
                    return Some(EolFormat::Cr);
                }
                b'\n' => return Some(EolFormat::Lf),
                _ => {}
            }
        }
        None
    }

    /// Normalize every line break in `text` to this format.
    pub fn normalize(&self, text: &str) -> String {
        let eol = self.as_str();
        let mut out = String::with_capacity(text.len());
        let mut chars = text.chars().peekable();
        while let Some(c) = chars.next() {
            match c {
                '\r' => {
                    if chars.peek() == Some(&'\n') {
                        chars.next();
                    }
                    out.push_str(eol);
                }
                '\n' => out.push_str(eol),
                other => out.push(other),
            }
        }
        out
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Code-Page Catalog
// ─────────────────────────────────────────────────────────────────────────────

/// Detection result for a loaded file: the text plus what was found on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedText {
    pub text: String,
    pub encoding: Encoding,
    pub has_bom: bool,
}

/// The catalog of supported code pages.
///
/// Built once at startup and passed by reference wherever byte↔text
/// conversion is needed. Holds the fallback encoding used when detection
/// fails to identify anything better.
#[derive(Debug, Clone)]
pub struct CodePageCatalog {
    /// Encoding assumed when the bytes are neither BOM-marked nor valid UTF-8
    fallback: Encoding,
}

impl Default for CodePageCatalog {
    fn default() -> Self {
        Self {
            fallback: Encoding::Latin1,
        }
    }
}

impl CodePageCatalog {
    /// Create a catalog with a specific non-Unicode fallback.
    pub fn with_fallback(fallback: Encoding) -> Self {
        Self { fallback }
    }

    /// Decode raw file bytes into text.
    ///
    /// Detection order: BOM sniff, then UTF-8 validation, then the ANSI
    /// fallback (which cannot fail — every byte maps to a Latin-1 char).
    pub fn decode(&self, bytes: &[u8], path: &Path) -> Result<DecodedText> {
        if bytes.starts_with(Encoding::Utf8.bom()) {
            let text = std::str::from_utf8(&bytes[3..])
                .map_err(|_| Error::Decode {
                    path: path.to_path_buf(),
                    code_page: CP_UTF8,
                })?
                .to_string();
            return Ok(DecodedText {
                text,
                encoding: Encoding::Utf8,
                has_bom: true,
            });
        }
        // UTF-16 BOMs: FF FE is LE, FE FF is BE
        if bytes.starts_with(&[0xFF, 0xFE]) {
            let text = decode_utf16(&bytes[2..], false, path)?;
            return Ok(DecodedText {
                text,
                encoding: Encoding::Utf16Le,
                has_bom: true,
            });
        }
        if bytes.starts_with(&[0xFE, 0xFF]) {
            let text = decode_utf16(&bytes[2..], true, path)?;
            return Ok(DecodedText {
                text,
                encoding: Encoding::Utf16Be,
                has_bom: true,
            });
        }
        if let Ok(text) = std::str::from_utf8(bytes) {
            return Ok(DecodedText {
                text: text.to_string(),
                encoding: Encoding::Utf8,
                has_bom: false,
            });
        }
        match self.fallback {
            Encoding::Latin1 => Ok(DecodedText {
                text: bytes.iter().map(|&b| b as char).collect(),
                encoding: Encoding::Latin1,
                has_bom: false,
            }),
            other => Err(Error::Decode {
                path: path.to_path_buf(),
                code_page: other.code_page(),
            }),
        }
    }

    /// Encode text for saving with the given encoding, prepending the BOM
    /// when `with_bom` is set.
    pub fn encode(&self, text: &str, encoding: Encoding, with_bom: bool) -> Vec<u8> {
        let mut out = Vec::with_capacity(text.len() + 4);
        if with_bom {
            out.extend_from_slice(encoding.bom());
        }
        match encoding {
            Encoding::Utf8 => out.extend_from_slice(text.as_bytes()),
            Encoding::Utf16Le => {
                for unit in text.encode_utf16() {
                    out.extend_from_slice(&unit.to_le_bytes());
                }
            }
            Encoding::Utf16Be => {
                for unit in text.encode_utf16() {
                    out.extend_from_slice(&unit.to_be_bytes());
                }
            }
            Encoding::Latin1 => {
                // Characters outside Latin-1 degrade to '?', matching the
                // lossy ANSI save behavior of the classic editors.
                for c in text.chars() {
                    let code = c as u32;
                    out.push(if code <= 0xFF { code as u8 } else { b'?' });
                }
            }
        }
        out
    }
}

/// Decode UTF-16 payload bytes (after any BOM has been stripped).
fn decode_utf16(bytes: &[u8], big_endian: bool, path: &Path) -> Result<String> {
    let code_page = if big_endian { CP_UTF16_BE } else { CP_UTF16_LE };
    if bytes.len() % 2 != 0 {
        return Err(Error::Decode {
            path: path.to_path_buf(),
            code_page,
        });
    }
    let units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|pair| {
            if big_endian {
                u16::from_be_bytes([pair[0], pair[1]])
            } else {
                u16::from_le_bytes([pair[0], pair[1]])
            }
        })
        .collect();
    String::from_utf16(&units).map_err(|_| Error::Decode {
        path: path.to_path_buf(),
        code_page,
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
