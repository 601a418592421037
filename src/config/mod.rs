//! Configuration module for Ironpad
//!
//! This module handles user preferences and the per-document side channel
//! (default encoding, auto-reload, bookmarks, last session), including
//! serialization/deserialization to/from JSON and persistent storage to
//! platform-specific directories.

mod persistence;
mod settings;

pub use persistence::*;
pub use settings::*;
