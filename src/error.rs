//! Centralized error handling for Ironpad
//!
//! This module provides a unified error type that covers all error scenarios
//! in the application: file I/O, configuration, document-store contract
//! violations, and the cross-instance transfer protocol.

use log::warn;
use std::fmt;
use std::io;
use std::path::PathBuf;

// ─────────────────────────────────────────────────────────────────────────────
// Custom Result Type Alias
// ─────────────────────────────────────────────────────────────────────────────

/// A specialized `Result` type for the application.
pub type Result<T> = std::result::Result<T, Error>;

/// The centralized error type for the application.
#[derive(Debug)]
pub enum Error {
    // ─────────────────────────────────────────────────────────────────────────
    // File I/O Errors
    // ─────────────────────────────────────────────────────────────────────────
    /// Generic I/O error wrapper
    Io(io::Error),

    /// Failed to read file contents
    FileRead { path: PathBuf, source: io::Error },

    /// Failed to write file contents
    FileWrite { path: PathBuf, source: io::Error },

    /// File bytes could not be decoded with the selected code page
    Decode { path: PathBuf, code_page: u32 },

    // ─────────────────────────────────────────────────────────────────────────
    // Document Store Contract Errors
    // ─────────────────────────────────────────────────────────────────────────
    /// A document id was used that the store does not know about.
    ///
    /// The reference implementation asserts here; we return a typed error
    /// instead, since a stale id can legitimately arrive from a peer
    /// instance running a different protocol version.
    InvalidHandle,

    // ─────────────────────────────────────────────────────────────────────────
    // Cross-Instance Transfer Errors
    // ─────────────────────────────────────────────────────────────────────────
    /// An inter-process payload did not match the expected shape
    /// (wrong field count, bad discriminator, undecodable text).
    MalformedMessage(String),

    /// The receiving instance reported that it could not adopt the tab.
    TransferRejected,

    /// No peer instance endpoint could be reached.
    PeerUnreachable,

    /// Spawning a new application instance failed.
    ProcessLaunch { source: io::Error },

    // ─────────────────────────────────────────────────────────────────────────
    // Configuration Errors
    // ─────────────────────────────────────────────────────────────────────────
    /// Failed to load configuration file
    ConfigLoad {
        path: PathBuf,
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Failed to save configuration file
    ConfigSave {
        path: PathBuf,
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Failed to parse configuration (invalid JSON/format)
    ConfigParse {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration directory not found or inaccessible
    ConfigDirNotFound,

    // ─────────────────────────────────────────────────────────────────────────
    // Application Errors
    // ─────────────────────────────────────────────────────────────────────────
    /// Generic application error with a message
    Application(String),
}

// Implement From traits for convenient error conversion
impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::Io(err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::ConfigParse {
            message: err.to_string(),
            source: Some(Box::new(err)),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Display trait implementation for user-friendly error messages
// ─────────────────────────────────────────────────────────────────────────────
impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            // File I/O Errors
            Error::Io(err) => write!(f, "I/O error: {}", err),
            Error::FileRead { path, source } => {
                write!(f, "Failed to read '{}': {}", path.display(), source)
            }
            Error::FileWrite { path, source } => {
                write!(f, "Failed to write '{}': {}", path.display(), source)
            }
            Error::Decode { path, code_page } => {
                write!(
                    f,
                    "Could not decode '{}' with code page {}",
                    path.display(),
                    code_page
                )
            }

            // Document Store Contract Errors
            Error::InvalidHandle => write!(f, "Unknown document id"),

            // Cross-Instance Transfer Errors
            Error::MalformedMessage(detail) => {
                write!(f, "Malformed inter-process message: {}", detail)
            }
            Error::TransferRejected => {
                write!(f, "The target instance rejected the tab transfer")
            }
            Error::PeerUnreachable => {
                write!(f, "No running instance could be reached")
            }
            Error::ProcessLaunch { source } => {
                write!(f, "Failed to launch a new instance: {}", source)
            }

            // Configuration Errors
            Error::ConfigLoad { path, source } => {
                write!(
                    f,
                    "Failed to load configuration from '{}': {}",
                    path.display(),
                    source
                )
            }
            Error::ConfigSave { path, source } => {
                write!(
                    f,
                    "Failed to save configuration to '{}': {}",
                    path.display(),
                    source
                )
            }
            Error::ConfigParse { message, .. } => {
                write!(f, "Invalid configuration format: {}", message)
            }
            Error::ConfigDirNotFound => {
                write!(f, "Configuration directory not found")
            }

            // Application Errors
            Error::Application(msg) => write!(f, "{}", msg),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// std::error::Error trait implementation for error chaining
// ─────────────────────────────────────────────────────────────────────────────
impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(err) => Some(err),
            Error::FileRead { source, .. } => Some(source),
            Error::FileWrite { source, .. } => Some(source),
            Error::ProcessLaunch { source } => Some(source),
            Error::ConfigLoad { source, .. } => Some(source.as_ref()),
            Error::ConfigSave { source, .. } => Some(source.as_ref()),
            Error::ConfigParse { source, .. } => source
                .as_ref()
                .map(|s| s.as_ref() as &(dyn std::error::Error + 'static)),
            Error::Decode { .. }
            | Error::InvalidHandle
            | Error::MalformedMessage(_)
            | Error::TransferRejected
            | Error::PeerUnreachable
            | Error::ConfigDirNotFound
            | Error::Application(_) => None,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Graceful Degradation Helpers
// ─────────────────────────────────────────────────────────────────────────────

/// Extension trait for Result to support graceful degradation.
pub trait ResultExt<T> {
    /// If the result is an error, log it at warning level and return the provided default.
    fn unwrap_or_warn_default(self, default: T, context: &str) -> T;
}

impl<T> ResultExt<T> for Result<T> {
    fn unwrap_or_warn_default(self, default: T, context: &str) -> T {
        match self {
            Ok(value) => value,
            Err(err) => {
                warn!("{}: {}. Using default.", context, err);
                default
            }
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
    fn test_io_error_creation() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "test error");
        let err = Error::from(io_err);
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_file_write_error() {
        let path = PathBuf::from("/test/file.rs");
        let io_err = io::Error::other("write failed");
        let err = Error::FileWrite {
            path: path.clone(),
            source: io_err,
        };
        assert!(matches!(err, Error::FileWrite { path: p, .. } if p == path));
    }

    #[test]
    fn test_malformed_message_display() {
        let err = Error::MalformedMessage("expected 4 fields, got 2".to_string());
        assert!(err.to_string().contains("expected 4 fields"));
    }

    #[test]
    fn test_serde_json_error_conversion() {
        let json_result: std::result::Result<String, _> = serde_json::from_str("invalid json");
        let err = Error::from(json_result.unwrap_err());
        assert!(matches!(err, Error::ConfigParse { .. }));
    }

    #[test]
    fn test_unwrap_or_warn_default() {
        let failing: Result<u32> = Err(Error::InvalidHandle);
        assert_eq!(failing.unwrap_or_warn_default(7, "lookup"), 7);
        let passing: Result<u32> = Ok(3);
        assert_eq!(passing.unwrap_or_warn_default(7, "lookup"), 3);
    }
}
