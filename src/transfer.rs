//! Cross-instance tab transfer for Ironpad
//!
//! Moving a tab between running instances works by value, not by reference:
//! the sender stages the buffer content into a temporary file, describes the
//! tab in a single delimited payload, and only tears its own tab down after
//! the receiver confirms adoption. A failed handoff must leave the sender's
//! tab exactly as it was; losing the user's buffer is never an acceptable
//! outcome of a failed transfer.
//!
//! Payload format: four `*`-delimited fields, in order the real file path
//! (empty for an untitled buffer), the staged temp file path, the modified
//! flag (`1` or `0`), and the 1-based caret line.

use crate::error::{Error, Result};
use crate::ipc::{Discriminator, InstanceClient, REPLY_REJECTED};
use crate::reconcile::disk_mod_time;
use crate::session::EditorSession;
use crate::store::normalize_path;
use log::{debug, info, warn};
use std::path::{Path, PathBuf};
use std::process::Command;

// ─────────────────────────────────────────────────────────────────────────────
// Payload
// ─────────────────────────────────────────────────────────────────────────────

/// The tab descriptor carried by a move-tab message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveTabPayload {
    /// Path the document identifies as, empty-equivalent for untitled
    pub real_path: Option<PathBuf>,
    /// Staged file holding the buffer content
    pub temp_path: PathBuf,
    /// Whether the buffer had unsaved changes at the sender
    pub modified: bool,
    /// 1-based caret line to restore
    pub line: usize,
}

impl MoveTabPayload {
    /// Encode into the `*`-delimited wire form.
    pub fn encode(&self) -> String {
        format!(
            "{}*{}*{}*{}",
            self.real_path
                .as_deref()
                .map(|p| p.to_string_lossy().into_owned())
                .unwrap_or_default(),
            self.temp_path.to_string_lossy(),
            if self.modified { "1" } else { "0" },
            self.line
        )
    }

    /// Parse the `*`-delimited wire form.
    ///
    /// # Errors
    ///
    /// [`Error::MalformedMessage`] for a wrong field count, an unknown
    /// modified flag, or an unparseable line number. A reference
    /// implementation would assert on the field count; a typed error is
    /// returned instead since the payload crosses a process boundary.
    pub fn parse(text: &str) -> Result<Self> {
        let fields: Vec<&str> = text.split('*').collect();
        if fields.len() != 4 {
            return Err(Error::MalformedMessage(format!(
                "move-tab payload has {} fields, expected 4",
                fields.len()
            )));
        }
        let modified = match fields[2] {
            "1" => true,
            "0" => false,
            other => {
                return Err(Error::MalformedMessage(format!(
                    "unknown modified flag '{}'",
                    other
                )))
            }
        };
        let line: usize = fields[3].parse().map_err(|_| {
            Error::MalformedMessage(format!("bad line number '{}'", fields[3]))
        })?;
        Ok(Self {
            real_path: (!fields[0].is_empty()).then(|| PathBuf::from(fields[0])),
            temp_path: PathBuf::from(fields[1]),
            modified,
            line,
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Staging
// ─────────────────────────────────────────────────────────────────────────────

/// Write a document's buffer into a temp file the receiver can adopt.
///
/// The file is persisted (not auto-deleted); whoever completes or abandons
/// the transfer is responsible for removing it.
fn stage_content(session: &EditorSession, id: crate::document::DocId) -> Result<PathBuf> {
    let record = session.store().get(id)?;
    let content = record.buffer().borrow().content().to_string();
    let bytes = session
        .catalog()
        .encode(&content, record.encoding, record.has_bom);

    let staged = tempfile::Builder::new()
        .prefix("ironpad_transfer_")
        .suffix(".tmp")
        .tempfile()?;
    std::fs::write(staged.path(), bytes)?;
    let path = staged
        .into_temp_path()
        .keep()
        .map_err(|e| Error::Io(e.error))?;
    debug!("Staged {} into '{}'", id, path.display());
    Ok(path)
}

fn remove_staged(path: &Path) {
    if let Err(e) = std::fs::remove_file(path) {
        warn!("Could not remove staged file '{}': {}", path.display(), e);
    }
}

/// Build the transfer payload for one document.
fn payload_for(session: &EditorSession, id: crate::document::DocId, temp_path: PathBuf) -> Result<MoveTabPayload> {
    let record = session.store().get(id)?;
    Ok(MoveTabPayload {
        real_path: record.path.clone(),
        temp_path,
        modified: record.wants_save(),
        line: record.position.line.max(1),
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Sender
// ─────────────────────────────────────────────────────────────────────────────

/// Hand the document on the tab at `index` over to the peer instance.
///
/// Observers see the document-close notification after staging and before
/// the send, while the record is still intact. The local tab is torn down
/// only after the peer confirms adoption. On any failure the staged file is
/// removed and the local tab is left untouched.
pub fn send_tab(session: &mut EditorSession, index: usize, client: &InstanceClient) -> Result<()> {
    let id = session.tabs().doc_at(index);
    if !id.is_valid() {
        return Err(Error::InvalidHandle);
    }

    let staged = stage_content(session, id)?;
    let payload = payload_for(session, id, staged.clone())?;

    // Collaborators persist per-document state before the synchronous send;
    // control may not come back here cleanly
    session.announce_handoff(id);

    match client.send(Discriminator::MoveTab, &payload.encode()) {
        Ok(code) if code != REPLY_REJECTED => {
            info!("Peer adopted {}, closing local tab", id);
            if let Some(index) = session.tabs().index_of(id) {
                session.remove_handed_off_tab(index);
            }
            // The receiver deletes the staged file once adopted
            Ok(())
        }
        Ok(_) => {
            warn!("Peer declined to adopt {}", id);
            remove_staged(&staged);
            Err(Error::TransferRejected)
        }
        Err(e) => {
            warn!("Transfer of {} failed: {}", id, e);
            remove_staged(&staged);
            Err(e)
        }
    }
}

/// Hand the document on the tab at `index` to a freshly launched instance.
///
/// The new instance is told to open the staged file and adopt the real path
/// as its save identity. The local tab closes once the process launches; the
/// staged file becomes the new instance's responsibility.
pub fn send_tab_to_new_instance(session: &mut EditorSession, index: usize) -> Result<()> {
    let id = session.tabs().doc_at(index);
    if !id.is_valid() {
        return Err(Error::InvalidHandle);
    }

    let staged = stage_content(session, id)?;
    let payload = payload_for(session, id, staged.clone())?;

    let exe = std::env::current_exe().map_err(|e| Error::ProcessLaunch { source: e })?;
    let mut command = Command::new(exe);
    command.arg("/multiple");
    if let Some(real) = &payload.real_path {
        command.arg(format!("/savepath:\"{}\"", real.display()));
    }
    command.arg(format!("/path:\"{}\"", payload.temp_path.display()));
    if payload.modified {
        command.arg("/modified");
    }
    command.arg(format!("/line:{}", payload.line));

    // Same ordering as the peer handoff: observers run before the launch
    session.announce_handoff(id);

    match command.spawn() {
        Ok(child) => {
            info!("Launched instance {} to adopt {}", child.id(), id);
            if let Some(index) = session.tabs().index_of(id) {
                session.remove_handed_off_tab(index);
            }
            Ok(())
        }
        Err(e) => {
            warn!("Could not launch a new instance: {}", e);
            remove_staged(&staged);
            Err(Error::ProcessLaunch { source: e })
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Receiver
// ─────────────────────────────────────────────────────────────────────────────

/// Adopt a tab described by an arriving move-tab payload.
///
/// When the real path is already open here, the existing tab is activated
/// and the incoming copy is discarded; both instances held the same file and
/// the receiving instance's buffer wins. Otherwise the staged content is
/// opened and re-identified as the real path in place.
pub fn receive_tab(session: &mut EditorSession, payload_text: &str) -> Result<()> {
    let payload = MoveTabPayload::parse(payload_text)?;

    if let Some(real) = &payload.real_path {
        let existing = session.store().id_for_path(real);
        if existing.is_valid() {
            info!(
                "'{}' already open as {}, discarding the incoming copy",
                real.display(),
                existing
            );
            session.select_doc(existing);
            remove_staged(&payload.temp_path);
            return Ok(());
        }
    }

    // Load the staged content as a document, then re-identify it in place
    let id = match session.open_file(&payload.temp_path, None) {
        Ok(id) => id,
        Err(e) => {
            // Nothing was adopted; do not leave the staged copy behind
            remove_staged(&payload.temp_path);
            return Err(e);
        }
    };
    adopt_identity(session, id, &payload);
    session.goto_line(payload.line.max(1));
    session.refresh_tab_for(id);
    remove_staged(&payload.temp_path);

    info!(
        "Adopted transferred tab as {} ({})",
        id,
        payload
            .real_path
            .as_deref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "untitled".to_string())
    );
    Ok(())
}

/// Swap a freshly loaded staged document's identity for the real one.
fn adopt_identity(session: &mut EditorSession, id: crate::document::DocId, payload: &MoveTabPayload) {
    let language = payload
        .real_path
        .as_deref()
        .map(|p| session.languages().language_for_path(p));

    let Ok(record) = session.store_mut().get_mut(id) else {
        return;
    };
    record.path = payload.real_path.as_deref().map(normalize_path);
    if let Some(language) = language {
        record.language = language;
    }
    // Baseline against the real file, not the staged copy
    record.file_mod_time = payload.real_path.as_deref().and_then(disk_mod_time);
    if payload.modified {
        // The content was unsaved at the sender and must stay that way here
        record.buffer().borrow_mut().invalidate_save_point();
        record.needs_saving = true;
    } else {
        record.needs_saving = payload.real_path.is_none();
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
