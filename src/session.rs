//! Editor session controller for Ironpad
//!
//! This module ties the document store, tab list, editor surfaces, and
//! reconciliation flows together. All public operations leave the store and
//! tab list consistent: every id referenced by a tab resolves in the store,
//! and every record reachable from a tab slot exists.
//!
//! Prompts shown by these flows are suspension points (the modal dialog
//! pumps a nested message loop), so every index and id is re-checked after
//! a prompt returns rather than cached across it.

use crate::buffer::{BufferHandle, TextBuffer};
use crate::config::{save_config_silent, SessionTab, Settings};
use crate::document::{DocId, DocIdGenerator, DocumentRecord};
use crate::editor::EditorSurface;
use crate::encoding::{CodePageCatalog, Encoding, EolFormat};
use crate::error::{Error, Result};
use crate::language::LanguageRegistry;
use crate::observers::{ObserverRegistry, SessionObserver};
use crate::prompt::{BatchDecision, CloseDecision, ReloadDecision, RemovedDecision, UserPrompter};
use crate::reconcile::{self, FileChangeState};
use crate::store::{normalize_path, DocumentStore};
use crate::tabs::TabList;
use log::{debug, info, warn};
use std::cell::Cell;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::time::SystemTime;

// ─────────────────────────────────────────────────────────────────────────────
// UI Update Suppression
// ─────────────────────────────────────────────────────────────────────────────

/// Reentrant "block all updates" counter.
///
/// Nested batch operations each take a guard; the real unblock happens only
/// when the depth returns to zero. A counter rather than a boolean so that
/// close-all triggering per-tab saves, each suppressing redraw, composes.
#[derive(Debug, Clone, Default)]
pub struct UpdateSuppression {
    depth: Rc<Cell<u32>>,
}

impl UpdateSuppression {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enter a suppressed region; updates resume when the guard drops.
    pub fn suppress(&self) -> SuppressionGuard {
        self.depth.set(self.depth.get() + 1);
        SuppressionGuard {
            depth: Rc::clone(&self.depth),
        }
    }

    /// Whether updates are currently suppressed.
    pub fn is_suppressed(&self) -> bool {
        self.depth.get() > 0
    }
}

/// Scope guard for one suppression level.
#[derive(Debug)]
pub struct SuppressionGuard {
    depth: Rc<Cell<u32>>,
}

impl Drop for SuppressionGuard {
    fn drop(&mut self) {
        self.depth.set(self.depth.get().saturating_sub(1));
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Loaded File Snapshot
// ─────────────────────────────────────────────────────────────────────────────

/// What one disk read produced, before a record exists for it.
#[derive(Debug)]
struct LoadedFile {
    text: String,
    encoding: Encoding,
    has_bom: bool,
    eol: EolFormat,
    mod_time: Option<SystemTime>,
    readonly: bool,
}

// ─────────────────────────────────────────────────────────────────────────────
// Editor Session
// ─────────────────────────────────────────────────────────────────────────────

/// Central controller owning documents, tabs, and editor surfaces.
pub struct EditorSession {
    settings: Settings,
    catalog: CodePageCatalog,
    languages: LanguageRegistry,
    store: DocumentStore,
    tabs: TabList,
    ids: DocIdGenerator,
    /// Visible surface bound to the selected tab
    live: EditorSurface,
    /// Hidden surface for background reloads and inspection
    scratch: EditorSurface,
    observers: ObserverRegistry,
    prompter: Box<dyn UserPrompter>,
    updates: UpdateSuppression,
    /// Settings were modified and should be persisted on exit
    settings_dirty: bool,
}

impl std::fmt::Debug for EditorSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EditorSession")
            .field("documents", &self.store.len())
            .field("tabs", &self.tabs.len())
            .field("selected", &self.tabs.selected())
            .finish_non_exhaustive()
    }
}

impl EditorSession {
    /// Create a session with the given settings and prompt surface.
    ///
    /// No tabs exist yet; callers follow up with
    /// [`EditorSession::restore_previous_session`], explicit opens, or
    /// [`EditorSession::ensure_tab`].
    pub fn new(settings: Settings, prompter: Box<dyn UserPrompter>) -> Self {
        info!("Session initialized");
        Self {
            catalog: CodePageCatalog::default(),
            languages: LanguageRegistry::new(),
            store: DocumentStore::new(),
            tabs: TabList::default(),
            ids: DocIdGenerator::new(),
            live: EditorSurface::live(),
            scratch: EditorSurface::scratch(),
            observers: ObserverRegistry::new(),
            prompter,
            updates: UpdateSuppression::new(),
            settings_dirty: false,
            settings,
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Accessors
    // ─────────────────────────────────────────────────────────────────────────

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn settings_mut(&mut self) -> &mut Settings {
        self.settings_dirty = true;
        &mut self.settings
    }

    pub fn store(&self) -> &DocumentStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut DocumentStore {
        &mut self.store
    }

    pub fn tabs(&self) -> &TabList {
        &self.tabs
    }

    pub fn live(&self) -> &EditorSurface {
        &self.live
    }

    pub fn live_mut(&mut self) -> &mut EditorSurface {
        &mut self.live
    }

    pub fn updates(&self) -> &UpdateSuppression {
        &self.updates
    }

    pub fn languages(&self) -> &LanguageRegistry {
        &self.languages
    }

    pub fn catalog(&self) -> &CodePageCatalog {
        &self.catalog
    }

    /// Register a lifecycle observer (notified in registration order).
    pub fn register_observer(&mut self, observer: Box<dyn SessionObserver>) {
        self.observers.register(observer);
    }

    /// The id of the document on the selected tab.
    pub fn active_doc(&self) -> DocId {
        self.tabs.selected_doc()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Tab Creation & Opening
    // ─────────────────────────────────────────────────────────────────────────

    /// Create a new blank tab and select it. Returns its document id.
    pub fn new_tab(&mut self) -> DocId {
        let id = self.ids.mint();
        let record =
            DocumentRecord::new_untitled(self.settings.default_encoding, self.settings.default_eol);
        let name = record.display_name();
        self.store
            .add_at_end(id, record)
            .expect("freshly minted id cannot collide");
        let index = self.tabs.insert_at_end(&name);
        self.tabs.bind_document(index, id);
        if let Ok(record) = self.store.get(id) {
            self.observers.notify_document_open(id, record);
        }
        self.select_tab(index);
        debug!("New blank tab {} at index {}", id, index);
        id
    }

    /// Guarantee at least one tab exists (the mandatory blank tab policy).
    pub fn ensure_tab(&mut self) {
        if self.tabs.is_empty() {
            self.new_tab();
        }
    }

    /// Open `path`, or activate its tab if it is already open.
    ///
    /// At most one document per path: opening an already-open path never
    /// creates a second record. `line` jumps the caret (1-based) after
    /// activation.
    pub fn open_file(&mut self, path: &Path, line: Option<usize>) -> Result<DocId> {
        let existing = self.store.id_for_path(path);
        if existing.is_valid() {
            info!("'{}' already open as {}, activating", path.display(), existing);
            if let Some(index) = self.tabs.index_of(existing) {
                self.select_tab(index);
            }
            if let Some(line) = line {
                self.goto_line(line);
            }
            return Ok(existing);
        }

        let loaded = self.load_from_disk(path)?;
        let id = self.ids.mint();
        let mut record = DocumentRecord::from_file(
            normalize_path(path),
            loaded.text,
            loaded.encoding,
            loaded.has_bom,
            loaded.eol,
            loaded.mod_time,
        );
        record.language = self.languages.language_for_path(path);
        record.bookmark_lines = self.settings.bookmarks_for(path);
        record.set_readonly_attribute(loaded.readonly);
        if loaded.readonly {
            record.buffer().borrow_mut().set_read_only(true);
        }
        let name = record.display_name();
        self.store
            .add_at_end(id, record)
            .expect("freshly minted id cannot collide");

        let index = self.tabs.insert_at_end(&name);
        self.tabs.bind_document(index, id);
        if let Ok(record) = self.store.get(id) {
            self.observers.notify_document_open(id, record);
        }
        self.select_tab(index);
        if let Some(line) = line {
            self.goto_line(line);
        }
        self.refresh_tab_for(id);
        info!("Opened '{}' as {}", path.display(), id);
        Ok(id)
    }

    /// Read and decode `path` without creating any document state.
    fn load_from_disk(&self, path: &Path) -> Result<LoadedFile> {
        let bytes = std::fs::read(path).map_err(|e| Error::FileRead {
            path: path.to_path_buf(),
            source: e,
        })?;
        let decoded = self.catalog.decode(&bytes, path)?;
        let eol = EolFormat::detect(&decoded.text).unwrap_or(self.settings.default_eol);
        let readonly = std::fs::metadata(path)
            .map(|m| m.permissions().readonly())
            .unwrap_or(false);
        Ok(LoadedFile {
            text: decoded.text,
            encoding: decoded.encoding,
            has_bom: decoded.has_bom,
            eol,
            mod_time: reconcile::disk_mod_time(path),
            readonly,
        })
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Selection
    // ─────────────────────────────────────────────────────────────────────────

    /// Select the tab at `index`, running the full ordered sequence:
    /// tab-changing (old document still live, caret state persisted), index
    /// update, tab-changed (new document bound and restored), then a
    /// synchronous external-change check for the newly active document.
    pub fn select_tab(&mut self, index: usize) -> bool {
        let new_doc = self.tabs.doc_at(index);
        if !new_doc.is_valid() {
            return false;
        }

        let old_doc = self.tabs.selected_doc();
        if old_doc.is_valid() && old_doc != new_doc {
            // (1) tab-changing fires while the old document is still live
            self.observers.notify_tab_changing(old_doc);
            let position = self.live.capture_position();
            if let Ok(old) = self.store.get_mut(old_doc) {
                old.position = position;
            }
        }

        // (2) selection index updates (and the scroll window follows)
        if !self.tabs.set_selected(index) {
            return false;
        }

        // (3) tab-changed: bind and restore the new document
        self.bind_live(new_doc);
        self.observers.notify_tab_activated(new_doc);

        // External-change check for this single document, synchronously,
        // before control returns to the caller
        self.check_document(new_doc);
        self.refresh_tab_for(new_doc);
        true
    }

    /// Activate the tab showing `id`, if any.
    pub fn select_doc(&mut self, id: DocId) -> bool {
        match self.tabs.index_of(id) {
            Some(index) => self.select_tab(index),
            None => false,
        }
    }

    /// Bind a document to the live surface and restore its per-document
    /// state: EOL mode, language, caret/scroll position, indentation.
    fn bind_live(&mut self, id: DocId) {
        self.live.release();
        let Ok(record) = self.store.get(id) else {
            return;
        };
        let eol = record.eol_format;
        let language = record.language.clone();
        let position = record.position;
        let indentation = record.tab_space_pref;
        let handle = record.buffer().share();
        self.live.bind(handle);
        self.live.apply_eol_mode(eol);
        self.live.apply_language(&language);
        self.live.apply_indentation(indentation);
        self.live.apply_tab_width(self.settings.tab_width);
        self.live.restore_position(position);
    }

    /// Move the caret of the live surface to a 1-based line and remember it
    /// on the record.
    pub fn goto_line(&mut self, line: usize) {
        self.live.goto_line(line);
        let id = self.tabs.selected_doc();
        let position = self.live.capture_position();
        if let Ok(record) = self.store.get_mut(id) {
            record.position = position;
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Editing
    // ─────────────────────────────────────────────────────────────────────────

    /// Replace the active document's content through the live surface,
    /// re-deriving the tab's visual state.
    pub fn edit_active(&mut self, text: &str) -> bool {
        if !self.live.set_text(text.to_string()) {
            return false;
        }
        let id = self.tabs.selected_doc();
        self.refresh_tab_for(id);
        true
    }

    /// Toggle the user's soft write lock on a document.
    pub fn toggle_write_protect(&mut self, id: DocId) -> Result<()> {
        let record = self.store.get_mut(id)?;
        record.is_write_protected = !record.is_write_protected;
        let protected = record.is_write_protected;
        if let Some(handle) = record.has_buffer().then(|| record.buffer().share()) {
            handle.borrow_mut().set_read_only(protected || record.is_readonly);
        }
        self.refresh_tab_for(id);
        Ok(())
    }

    /// Toggle a bookmark on a 1-based line of a document. Returns whether
    /// the line is bookmarked afterwards.
    pub fn toggle_bookmark(&mut self, id: DocId, line: usize) -> Result<bool> {
        let record = self.store.get_mut(id)?;
        match record.bookmark_lines.iter().position(|&l| l == line) {
            Some(at) => {
                record.bookmark_lines.remove(at);
                Ok(false)
            }
            None => {
                record.bookmark_lines.push(line);
                record.bookmark_lines.sort_unstable();
                Ok(true)
            }
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Saving
    // ─────────────────────────────────────────────────────────────────────────

    /// Write a document to its backing path.
    ///
    /// On success the save point is set, `needs_saving` clears, the stored
    /// mod time refreshes (so the reconciler does not flag our own write),
    /// the save hook runs, and observers are notified. On failure nothing
    /// is cleared: the dirty state survives for the caller to deal with.
    pub fn save_document(&mut self, id: DocId) -> Result<()> {
        let record = self.store.get(id)?;
        let Some(path) = record.path.clone() else {
            return Err(Error::Application(
                "No file path set. Use save_document_as instead.".to_string(),
            ));
        };
        let content = record.buffer().borrow().content().to_string();
        let normalized = record.eol_format.normalize(&content);
        let bytes = self
            .catalog
            .encode(&normalized, record.encoding, record.has_bom);

        std::fs::write(&path, bytes).map_err(|e| Error::FileWrite {
            path: path.clone(),
            source: e,
        })?;

        let record = self.store.get_mut(id)?;
        record.buffer().borrow_mut().set_save_point();
        record.needs_saving = false;
        self.store.update_file_time(id, true)?;

        // Run the save hook outside the store borrow; reentrant hooks may
        // look the document up again
        let mut hook = self.store.get_mut(id)?.save_hook.take();
        if let Some(hook) = hook.as_mut() {
            hook(&path);
        }
        if let Some(hook) = hook {
            if let Ok(record) = self.store.get_mut(id) {
                record.save_hook = Some(hook);
            }
        }

        if let Ok(record) = self.store.get(id) {
            self.observers.notify_document_save(id, record);
            self.tabs.refresh_tab(id, record);
        }
        info!("Saved {} to '{}'", id, path.display());
        Ok(())
    }

    /// Save a document under a new path.
    ///
    /// Fails without touching anything if another open document already owns
    /// the destination path.
    pub fn save_document_as(&mut self, id: DocId, path: &Path) -> Result<()> {
        let owner = self.store.id_for_path(path);
        if owner.is_valid() && owner != id {
            return Err(Error::Application(format!(
                "'{}' is already open in another tab",
                path.display()
            )));
        }
        let language = self.languages.language_for_path(path);
        let record = self.store.get_mut(id)?;
        record.path = Some(normalize_path(path));
        record.language = language.clone();
        self.save_document(id)?;
        if self.tabs.selected_doc() == id {
            self.live.apply_language(&language);
        }
        self.refresh_tab_for(id);
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Closing
    // ─────────────────────────────────────────────────────────────────────────

    /// Close the tab at `index`.
    ///
    /// Without `force`, a document with unsaved state prompts the user;
    /// "stay open" selects the tab in question and leaves everything
    /// untouched. Teardown order: close notification, tab slot removal,
    /// editor binding release, record removal. Returns `true` if the tab
    /// actually closed.
    pub fn close_tab(&mut self, index: usize, force: bool, quitting: bool) -> bool {
        self.close_tab_inner(index, force, quitting, None, true)
    }

    fn close_tab_inner(
        &mut self,
        index: usize,
        force: bool,
        quitting: bool,
        mut batch: Option<&mut BatchDecision<CloseDecision>>,
        notify_close: bool,
    ) -> bool {
        let id = self.tabs.doc_at(index);
        if !id.is_valid() {
            return false;
        }

        if !force {
            let (wants_save, pristine, name) = match self.store.get(id) {
                Ok(r) => (r.wants_save(), r.is_pristine_untitled(), r.display_name()),
                Err(_) => return false,
            };
            if wants_save && !pristine {
                let prompter = &mut self.prompter;
                let decision = match batch.as_deref_mut() {
                    Some(batch) => batch.resolve(|| prompter.ask_to_close(&name)),
                    None => prompter.ask_to_close(&name).decision,
                };
                match decision {
                    CloseDecision::SaveAndClose => {
                        if let Err(e) = self.save_document(id) {
                            warn!("Save before close failed: {}", e);
                            self.select_doc(id);
                            return false;
                        }
                    }
                    CloseDecision::CloseWithoutSaving => {}
                    CloseDecision::StayOpen => {
                        // Show the user what they were asked about
                        self.select_doc(id);
                        return false;
                    }
                }
            }
        }

        // The prompt was a suspension point; resolve the index fresh
        let Some(index) = self.tabs.index_of(id) else {
            return false;
        };
        let was_selected = self.tabs.selected() == Some(index);

        // Close notification fires while the tab slot and record still exist
        if notify_close {
            if let Ok(record) = self.store.get(id) {
                self.observers.notify_document_close(id, record);
            }
        }

        // Bookmarks outlive the tab through the settings side channel
        if let Ok(record) = self.store.get(id) {
            if let Some(path) = record.path.clone() {
                let lines = record.bookmark_lines.clone();
                self.settings.remember_bookmarks(&path, &lines);
                self.settings_dirty = true;
            }
        }

        self.tabs.remove(index);

        // Release editor bindings before the record (and its buffer) go away
        if let Ok(record) = self.store.get(id) {
            if record.has_buffer() {
                if self.live.is_bound_to(record.buffer()) {
                    self.live.release();
                }
                if self.scratch.is_bound_to(record.buffer()) {
                    self.scratch.release();
                }
            }
        }
        if let Err(e) = self.store.remove(id) {
            warn!("Closing tab found no record for {}: {}", id, e);
        }
        info!("Closed tab {} ({})", index, id);

        if self.tabs.is_empty() {
            if !quitting {
                self.new_tab();
            }
        } else if was_selected {
            let selected = self.tabs.selected().unwrap_or(0);
            self.activate_after_close(selected);
        }
        true
    }

    /// Bind and announce the tab that selection landed on after a close.
    ///
    /// No tab-changing notification fires: the previously live document no
    /// longer exists.
    fn activate_after_close(&mut self, index: usize) {
        let id = self.tabs.doc_at(index);
        if !id.is_valid() {
            return;
        }
        self.tabs.set_selected(index);
        self.bind_live(id);
        self.observers.notify_tab_activated(id);
        self.check_document(id);
        self.refresh_tab_for(id);
    }

    /// Close tabs until none remain or the user cancels.
    ///
    /// Short-circuits when only one blank never-modified tab remains and
    /// this is not a shutdown, to avoid closing the mandatory blank tab just
    /// to recreate it. Returns `false` if a close was rejected.
    pub fn close_all_tabs(&mut self, quitting: bool) -> bool {
        let _updates = self.updates.suppress();
        // The "apply to all" answer lives exactly as long as this pass
        let mut batch = BatchDecision::new();
        loop {
            if self.tabs.is_empty() {
                break;
            }
            if !quitting && self.tabs.len() == 1 {
                let id = self.tabs.doc_at(0);
                let pristine = self
                    .store
                    .get(id)
                    .map(|r| r.is_pristine_untitled())
                    .unwrap_or(false);
                if pristine {
                    return true;
                }
            }
            let selected = self.tabs.selected().unwrap_or(0);
            if !self.close_tab_inner(selected, false, quitting, Some(&mut batch), true) {
                return false;
            }
        }
        if !quitting {
            self.ensure_tab();
        }
        true
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Tab Handoff Support
    // ─────────────────────────────────────────────────────────────────────────

    /// Fire the close notification for a document about to be handed to a
    /// peer instance.
    ///
    /// This runs before the handoff's synchronous send: control (or the
    /// whole process) may move away during the send, so observers persist
    /// their per-document state here, while the record and tab slot are
    /// fully intact. The teardown after a confirmed handoff goes through
    /// [`EditorSession::remove_handed_off_tab`], which does not repeat the
    /// notification.
    pub fn announce_handoff(&mut self, id: DocId) {
        if let Ok(record) = self.store.get(id) {
            self.observers.notify_document_close(id, record);
        }
    }

    /// Tear down a tab whose document a peer instance adopted.
    ///
    /// No prompt and no close notification: the content is confirmed safe
    /// at the peer, and observers already saw this document leave in
    /// [`EditorSession::announce_handoff`].
    pub fn remove_handed_off_tab(&mut self, index: usize) -> bool {
        self.close_tab_inner(index, true, false, None, false)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // External-Change Reconciliation
    // ─────────────────────────────────────────────────────────────────────────

    /// Reconcile one document against its backing file, prompting as needed.
    pub fn check_document(&mut self, id: DocId) {
        let mut reload_batch = BatchDecision::new();
        let mut removed_batch = BatchDecision::new();
        self.check_one(id, &mut reload_batch, &mut removed_batch);
    }

    /// Batch reconciliation across all open documents, in tab order.
    ///
    /// Each document is fully resolved before the next is considered; an
    /// "apply to all" answer suppresses later prompts within this pass only.
    pub fn check_all_documents(&mut self) {
        let _updates = self.updates.suppress();
        let mut reload_batch = BatchDecision::new();
        let mut removed_batch = BatchDecision::new();
        let mut visited: HashSet<DocId> = HashSet::new();
        loop {
            // Re-read the tab order every step: resolving one document may
            // have closed tabs or re-entered other operations
            let next = self
                .tabs
                .slots()
                .iter()
                .map(|s| s.doc())
                .find(|d| d.is_valid() && !visited.contains(d));
            let Some(id) = next else {
                break;
            };
            visited.insert(id);
            self.check_one(id, &mut reload_batch, &mut removed_batch);
        }
    }

    fn check_one(
        &mut self,
        id: DocId,
        reload_batch: &mut BatchDecision<ReloadDecision>,
        removed_batch: &mut BatchDecision<RemovedDecision>,
    ) {
        let Ok(record) = self.store.get(id) else {
            return;
        };
        match reconcile::classify(record) {
            FileChangeState::Unchanged => {}
            FileChangeState::Modified => self.handle_modified(id, reload_batch),
            FileChangeState::Removed => self.handle_removed(id, removed_batch),
        }
    }

    fn handle_modified(&mut self, id: DocId, batch: &mut BatchDecision<ReloadDecision>) {
        let Ok(record) = self.store.get(id) else {
            return;
        };
        let name = record.display_name();
        let clean = !record.wants_save();

        if clean && self.settings.auto_reload {
            info!("'{}' changed on disk; auto-reloading", name);
            self.reload_document(id, true);
            return;
        }

        let prompter = &mut self.prompter;
        let decision = batch.resolve(|| prompter.ask_to_reload(&name));
        match decision {
            ReloadDecision::Reload => {
                self.reload_document(id, true);
            }
            ReloadDecision::KeepOurs => {
                if let Err(e) = self.save_document(id) {
                    warn!("Keeping our copy of '{}' failed to save: {}", name, e);
                }
            }
            ReloadDecision::Cancel => self.mark_unresolved(id),
        }
    }

    fn handle_removed(&mut self, id: DocId, batch: &mut BatchDecision<RemovedDecision>) {
        let Ok(record) = self.store.get(id) else {
            return;
        };
        let name = record.display_name();

        let prompter = &mut self.prompter;
        let decision = batch.resolve(|| prompter.ask_about_removed(&name));
        match decision {
            RemovedDecision::KeepOpen => {
                if let Ok(record) = self.store.get_mut(id) {
                    record.needs_saving = true;
                    // Clear the baseline so the next check reports Unchanged
                    // instead of re-prompting about the same deletion
                    record.file_mod_time = None;
                    record.buffer().borrow_mut().nudge_save_point();
                }
                self.refresh_tab_for(id);
            }
            RemovedDecision::CloseTab => {
                // The backing file is gone; close without further prompts
                if let Some(index) = self.tabs.index_of(id) {
                    self.close_tab(index, true, false);
                }
            }
        }
    }

    /// The user declined to resolve an external change: keep our state but
    /// mark it unsaved so the discrepancy cannot be silently lost, and
    /// refresh the baseline so the same unresolved state does not re-prompt.
    fn mark_unresolved(&mut self, id: DocId) {
        if let Ok(record) = self.store.get_mut(id) {
            record.needs_saving = true;
            record.buffer().borrow_mut().nudge_save_point();
        }
        if let Err(e) = self.store.update_file_time(id, true) {
            warn!("Could not refresh mod time for {}: {}", id, e);
        }
        self.refresh_tab_for(id);
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Reload
    // ─────────────────────────────────────────────────────────────────────────

    /// Reload a document's content from disk, possibly in the background.
    ///
    /// With `confirmed` unset and unsaved state present, the user is asked
    /// to confirm the discard first. The old buffer handle is released
    /// before the replacement loads but kept alive for rollback: if the load
    /// fails, the old handle is reattached and the document is left exactly
    /// as it was. Caret position and write protection survive a successful
    /// reload; content state does not.
    pub fn reload_document(&mut self, id: DocId, confirmed: bool) -> bool {
        let Ok(record) = self.store.get(id) else {
            return false;
        };
        let Some(path) = record.path.clone() else {
            return false;
        };
        let name = record.display_name();

        if !confirmed && record.wants_save() {
            if !self.prompter.confirm_discard(&name) {
                return false;
            }
        }

        // The confirm was a suspension point; re-check the document
        let Ok(record) = self.store.get(id) else {
            return false;
        };
        let was_live = record.has_buffer() && self.live.is_bound_to(record.buffer());
        if was_live {
            self.live.release();
        }

        // Release our reference before loading the replacement, but hold the
        // handle so a failed load can reacquire it instead of leaking the
        // old buffer unreleased
        let old_handle: Option<BufferHandle> = match self.store.get_mut(id) {
            Ok(record) => record.detach_buffer(),
            Err(_) => return false,
        };

        match self.load_from_disk(&path) {
            Err(e) => {
                warn!("Reload of '{}' failed: {}", path.display(), e);
                if let Ok(record) = self.store.get_mut(id) {
                    if let Some(handle) = old_handle {
                        record.attach_buffer(handle);
                    }
                }
                if was_live {
                    self.bind_live(id);
                }
                false
            }
            Ok(loaded) => {
                let Ok(record) = self.store.get_mut(id) else {
                    return false;
                };
                record.encoding = loaded.encoding;
                record.has_bom = loaded.has_bom;
                record.eol_format = loaded.eol;
                record.file_mod_time = loaded.mod_time;
                record.needs_saving = false;
                // Only a real attribute transition may touch the soft lock
                if record.is_readonly != loaded.readonly {
                    record.set_readonly_attribute(loaded.readonly);
                }
                record.attach_buffer(BufferHandle::new(TextBuffer::new(
                    loaded.text,
                    loaded.eol,
                )));
                if record.is_readonly || record.is_write_protected {
                    record.buffer().borrow_mut().set_read_only(true);
                }
                drop(old_handle);

                if was_live {
                    self.bind_live(id);
                } else {
                    self.materialize_in_scratch(id);
                }
                self.refresh_tab_for(id);
                info!("Reloaded '{}'", path.display());
                true
            }
        }
    }

    /// Configure a background document through the scratch surface (EOL
    /// mode, lexer) without disturbing the live view. The binding is
    /// transient; the scratch surface is released before returning.
    fn materialize_in_scratch(&mut self, id: DocId) {
        let Ok(record) = self.store.get(id) else {
            return;
        };
        let eol = record.eol_format;
        let language = record.language.clone();
        let handle = record.buffer().share();
        self.scratch.bind(handle);
        self.scratch.apply_eol_mode(eol);
        self.scratch.apply_language(&language);
        self.scratch.release();
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Helpers
    // ─────────────────────────────────────────────────────────────────────────

    /// Re-derive caption and visual state for the tab showing `id`.
    pub fn refresh_tab_for(&mut self, id: DocId) {
        if let Ok(record) = self.store.get(id) {
            self.tabs.refresh_tab(id, record);
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Session Persistence
    // ─────────────────────────────────────────────────────────────────────────

    /// Reopen the tabs remembered from the previous session.
    ///
    /// Files that vanished since are skipped with a warning. Falls back to a
    /// blank tab when nothing could be restored.
    pub fn restore_previous_session(&mut self) {
        let remembered: Vec<SessionTab> = self.settings.last_open_tabs.clone();
        let saved_active = self.settings.active_tab_index;

        if !remembered.is_empty() {
            info!("Restoring {} tab(s) from previous session", remembered.len());
            for tab in &remembered {
                let line = (tab.line > 0).then_some(tab.line);
                if let Err(e) = self.open_file(&tab.path, line) {
                    warn!(
                        "Could not restore tab for '{}': {}. File may have been moved or deleted.",
                        tab.path.display(),
                        e
                    );
                }
            }
            if !self.tabs.is_empty() {
                let index = saved_active.min(self.tabs.len() - 1);
                self.select_tab(index);
            }
        }
        self.ensure_tab();
    }

    /// Record the current tabs into settings and persist them best-effort.
    pub fn persist_session(&mut self) {
        // Persist the live caret onto the active record first
        let active = self.tabs.selected_doc();
        let position = self.live.capture_position();
        if let Ok(record) = self.store.get_mut(active) {
            record.position = position;
        }

        self.record_bookmarks();

        self.settings.last_open_tabs = self
            .tabs
            .slots()
            .iter()
            .filter_map(|slot| {
                let record = self.store.get(slot.doc()).ok()?;
                let path = record.path.clone()?;
                Some(SessionTab {
                    path,
                    line: record.position.line,
                })
            })
            .collect();
        self.settings.active_tab_index = self.tabs.selected().unwrap_or(0);
        save_config_silent(&self.settings);
        self.settings_dirty = false;
    }

    /// Fold every open document's bookmarks into the settings side channel.
    fn record_bookmarks(&mut self) {
        for (_, record) in self.store.iter() {
            if let Some(path) = &record.path {
                self.settings
                    .remember_bookmarks(path, &record.bookmark_lines);
            }
        }
    }

    /// Whether settings changed since the last persist.
    pub fn settings_dirty(&self) -> bool {
        self.settings_dirty
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::prompt::BatchAnswer;
    use std::cell::RefCell;
    use std::collections::VecDeque;
    use std::fs;
    use std::time::Duration;
    use tempfile::TempDir;

    /// Scripted prompt surface: answers come from queues, and every prompt
    /// shown is counted. Empty queues answer with the safest outcome, the
    /// same mapping a dismissed dialog gets.
    #[derive(Default)]
    pub(crate) struct ScriptedPrompter {
        pub close: RefCell<VecDeque<BatchAnswer<CloseDecision>>>,
        pub reload: RefCell<VecDeque<BatchAnswer<ReloadDecision>>>,
        pub removed: RefCell<VecDeque<BatchAnswer<RemovedDecision>>>,
        pub discard: RefCell<VecDeque<bool>>,
        pub shown: Rc<Cell<usize>>,
    }

    impl UserPrompter for ScriptedPrompter {
        fn ask_to_close(&mut self, _name: &str) -> BatchAnswer<CloseDecision> {
            self.shown.set(self.shown.get() + 1);
            self.close
                .borrow_mut()
                .pop_front()
                .unwrap_or(BatchAnswer::single(CloseDecision::StayOpen))
        }

        fn ask_to_reload(&mut self, _name: &str) -> BatchAnswer<ReloadDecision> {
            self.shown.set(self.shown.get() + 1);
            self.reload
                .borrow_mut()
                .pop_front()
                .unwrap_or(BatchAnswer::single(ReloadDecision::Cancel))
        }

        fn ask_about_removed(&mut self, _name: &str) -> BatchAnswer<RemovedDecision> {
            self.shown.set(self.shown.get() + 1);
            self.removed
                .borrow_mut()
                .pop_front()
                .unwrap_or(BatchAnswer::single(RemovedDecision::KeepOpen))
        }

        fn confirm_discard(&mut self, _name: &str) -> bool {
            self.shown.set(self.shown.get() + 1);
            self.discard.borrow_mut().pop_front().unwrap_or(false)
        }
    }

    pub(crate) struct Fixture {
        pub session: EditorSession,
        pub shown: Rc<Cell<usize>>,
        pub dir: TempDir,
    }

    pub(crate) fn fixture_with(
        settings: Settings,
        prompter: ScriptedPrompter,
    ) -> Fixture {
        let shown = Rc::clone(&prompter.shown);
        Fixture {
            session: EditorSession::new(settings, Box::new(prompter)),
            shown,
            dir: TempDir::new().unwrap(),
        }
    }

    pub(crate) fn fixture() -> Fixture {
        fixture_with(Settings::default(), ScriptedPrompter::default())
    }

    pub(crate) fn write_file(dir: &TempDir, name: &str, content: &str) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, content).unwrap();
        path
    }

    /// Age a document's stored mod time so a subsequent disk write always
    /// classifies as Modified regardless of filesystem timestamp granularity.
    fn age_baseline(session: &mut EditorSession, id: DocId) {
        let record = session.store_mut().get_mut(id).unwrap();
        record.file_mod_time = record.file_mod_time.map(|t| t - Duration::from_secs(120));
    }

    fn assert_consistent(session: &EditorSession) {
        for slot in session.tabs().slots() {
            assert!(session.store().has_document(slot.doc()));
        }
        assert_eq!(session.store().len(), session.tabs().len());
    }

    #[test]
    fn test_doc_ids_unique_across_churn() {
        let mut fx = fixture();
        let mut issued = HashSet::new();
        for round in 0..5 {
            let id = fx.session.new_tab();
            assert!(issued.insert(id), "round {} reissued {}", round, id);
            // Closing never recycles the id
            let index = fx.session.tabs().index_of(id).unwrap();
            fx.session.close_tab(index, true, false);
            assert!(!fx.session.store().has_document(id));
        }
        assert_consistent(&fx.session);
    }

    #[test]
    fn test_open_edit_save_scenario() {
        let mut fx = fixture();
        let path = write_file(&fx.dir, "scenario_a.rs", "fn a() {}\n");

        let before = fx.session.tabs().len();
        let id = fx.session.open_file(&path, None).unwrap();
        assert_eq!(fx.session.tabs().len(), before + 1);
        assert!(fx.session.store().id_for_path(&path).is_valid());
        assert!(!fx.session.store().get(id).unwrap().is_dirty());

        fx.session.edit_active("fn a() { body(); }\n");
        assert!(fx.session.store().get(id).unwrap().is_dirty());
        assert_eq!(
            fx.session.tabs().slots()[fx.session.tabs().selected().unwrap()].state(),
            crate::tabs::TabVisualState::Unsaved
        );

        fx.session.save_document(id).unwrap();
        let record = fx.session.store().get(id).unwrap();
        assert!(!record.is_dirty());
        assert!(!record.needs_saving);
        assert_eq!(record.file_mod_time, reconcile::disk_mod_time(&path));
        assert_eq!(
            fx.session.tabs().slots()[fx.session.tabs().selected().unwrap()].state(),
            crate::tabs::TabVisualState::Saved
        );
        assert_consistent(&fx.session);
    }

    #[test]
    fn test_open_same_path_twice_reuses_tab() {
        let mut fx = fixture();
        let path = write_file(&fx.dir, "once.rs", "x");
        let first = fx.session.open_file(&path, None).unwrap();
        let count = fx.session.tabs().len();
        let second = fx.session.open_file(&path, None).unwrap();
        assert_eq!(first, second);
        assert_eq!(fx.session.tabs().len(), count);
        assert_eq!(fx.session.active_doc(), first);
    }

    #[test]
    fn test_close_dirty_tab_stay_open_changes_nothing() {
        let mut fx = fixture();
        let path = write_file(&fx.dir, "dirty.rs", "original");
        let id = fx.session.open_file(&path, None).unwrap();
        fx.session.edit_active("edited");

        let count = fx.session.tabs().len();
        let index = fx.session.tabs().index_of(id).unwrap();
        // Queue is empty: the prompter answers StayOpen
        assert!(!fx.session.close_tab(index, false, false));
        assert_eq!(fx.shown.get(), 1);
        assert_eq!(fx.session.tabs().len(), count);
        let record = fx.session.store().get(id).unwrap();
        assert!(record.is_dirty());
        // The tab being closed became the selected tab
        assert_eq!(fx.session.active_doc(), id);
    }

    #[test]
    fn test_close_pristine_blank_tab_never_prompts() {
        let mut fx = fixture();
        let id = fx.session.new_tab();
        let index = fx.session.tabs().index_of(id).unwrap();
        assert!(fx.session.close_tab(index, false, false));
        assert_eq!(fx.shown.get(), 0);
        // The mandatory blank tab policy recreated one
        assert_eq!(fx.session.tabs().len(), 1);
        assert_consistent(&fx.session);
    }

    #[test]
    fn test_close_unselected_tab_keeps_selection() {
        let mut fx = fixture();
        let a = write_file(&fx.dir, "a.rs", "a");
        let b = write_file(&fx.dir, "b.rs", "b");
        let c = write_file(&fx.dir, "c.rs", "c");
        let id_a = fx.session.open_file(&a, None).unwrap();
        let id_b = fx.session.open_file(&b, None).unwrap();
        let id_c = fx.session.open_file(&c, None).unwrap();

        fx.session.select_doc(id_a);
        let index_b = fx.session.tabs().index_of(id_b).unwrap();
        assert!(fx.session.close_tab(index_b, true, false));

        assert_eq!(fx.session.tabs().len(), 2);
        assert_eq!(fx.session.active_doc(), id_a);
        // C reindexed from 2 to 1
        assert_eq!(fx.session.tabs().doc_at(0), id_a);
        assert_eq!(fx.session.tabs().doc_at(1), id_c);
        assert_consistent(&fx.session);
    }

    #[test]
    fn test_auto_reload_silently_picks_up_external_change() {
        let settings = Settings {
            auto_reload: true,
            ..Settings::default()
        };
        let mut fx = fixture_with(settings, ScriptedPrompter::default());
        let path = write_file(&fx.dir, "watched.rs", "v1");
        let id = fx.session.open_file(&path, None).unwrap();

        fs::write(&path, "v2 external").unwrap();
        age_baseline(&mut fx.session, id);

        fx.session.check_all_documents();
        assert_eq!(fx.shown.get(), 0, "no prompt for a clean auto-reload");
        assert_eq!(
            fx.session.store().get(id).unwrap().buffer().borrow().content(),
            "v2 external"
        );
    }

    #[test]
    fn test_modified_and_dirty_prompts_cancel_marks_unresolved() {
        let mut fx = fixture();
        let path = write_file(&fx.dir, "conflict.rs", "v1");
        let id = fx.session.open_file(&path, None).unwrap();
        fx.session.edit_active("local edit");

        fs::write(&path, "v2 external").unwrap();
        age_baseline(&mut fx.session, id);

        // Empty reload queue: prompter answers Cancel
        fx.session.check_all_documents();
        assert_eq!(fx.shown.get(), 1);
        let record = fx.session.store().get(id).unwrap();
        assert!(record.needs_saving);
        assert_eq!(record.buffer().borrow().content(), "local edit");

        // Baseline was refreshed: the same unresolved state does not re-prompt
        fx.session.check_all_documents();
        assert_eq!(fx.shown.get(), 1);
    }

    #[test]
    fn test_removed_keep_open_suppresses_repeat_prompt() {
        let mut fx = fixture();
        let path = write_file(&fx.dir, "vanishing.rs", "content");
        let id = fx.session.open_file(&path, None).unwrap();

        fs::remove_file(&path).unwrap();
        // Empty removed queue: prompter answers KeepOpen
        fx.session.check_all_documents();
        assert_eq!(fx.shown.get(), 1);
        let record = fx.session.store().get(id).unwrap();
        assert!(record.needs_saving);
        assert!(record.file_mod_time.is_none());
        assert!(fx.session.tabs().index_of(id).is_some());

        // Immediate re-check: Unchanged against the synthetic baseline
        assert_eq!(
            reconcile::classify(fx.session.store().get(id).unwrap()),
            FileChangeState::Unchanged
        );
        fx.session.check_all_documents();
        assert_eq!(fx.shown.get(), 1);
    }

    #[test]
    fn test_removed_close_tab_closes_without_more_prompts() {
        let prompter = ScriptedPrompter::default();
        prompter
            .removed
            .borrow_mut()
            .push_back(BatchAnswer::single(RemovedDecision::CloseTab));
        let mut fx = fixture_with(Settings::default(), prompter);
        let path = write_file(&fx.dir, "gone.rs", "content");
        let id = fx.session.open_file(&path, None).unwrap();
        fx.session.edit_active("dirty now");

        fs::remove_file(&path).unwrap();
        fx.session.check_all_documents();
        // One prompt (the removed prompt); the dirty close prompt is skipped
        assert_eq!(fx.shown.get(), 1);
        assert!(fx.session.tabs().index_of(id).is_none());
        assert!(!fx.session.store().has_document(id));
        assert_consistent(&fx.session);
    }

    #[test]
    fn test_batch_apply_to_all_prompts_once() {
        let prompter = ScriptedPrompter::default();
        prompter.reload.borrow_mut().push_back(BatchAnswer {
            decision: ReloadDecision::Reload,
            apply_to_all: true,
        });
        let mut fx = fixture_with(Settings::default(), prompter);

        let mut ids = Vec::new();
        for i in 0..3 {
            let path = write_file(&fx.dir, &format!("batch{}.rs", i), "v1");
            let id = fx.session.open_file(&path, None).unwrap();
            fs::write(&path, "v2").unwrap();
            fx.session.edit_active("local");
            age_baseline(&mut fx.session, id);
            ids.push(id);
        }

        fx.session.check_all_documents();
        assert_eq!(fx.shown.get(), 1, "apply-to-all answered the rest");
        for id in ids {
            assert_eq!(
                fx.session.store().get(id).unwrap().buffer().borrow().content(),
                "v2"
            );
        }
    }

    #[test]
    fn test_reload_failure_rolls_back_old_buffer() {
        let mut fx = fixture();
        let path = write_file(&fx.dir, "fragile.rs", "survivor");
        let id = fx.session.open_file(&path, None).unwrap();

        fs::remove_file(&path).unwrap();
        assert!(!fx.session.reload_document(id, true));

        let record = fx.session.store().get(id).unwrap();
        assert!(record.has_buffer(), "old handle was reacquired");
        assert_eq!(record.buffer().borrow().content(), "survivor");
        // The live surface was rebound to the surviving buffer
        assert!(fx.session.live().is_bound_to(record.buffer()));
    }

    #[test]
    fn test_background_reload_leaves_live_surface_alone() {
        let mut fx = fixture();
        let back = write_file(&fx.dir, "background.rs", "old");
        let front = write_file(&fx.dir, "foreground.rs", "front");
        let back_id = fx.session.open_file(&back, None).unwrap();
        let front_id = fx.session.open_file(&front, None).unwrap();
        assert_eq!(fx.session.active_doc(), front_id);

        fs::write(&back, "new content").unwrap();
        assert!(fx.session.reload_document(back_id, true));

        let back_record = fx.session.store().get(back_id).unwrap();
        assert_eq!(back_record.buffer().borrow().content(), "new content");
        // Live still shows the foreground document
        let front_record = fx.session.store().get(front_id).unwrap();
        assert!(fx.session.live().is_bound_to(front_record.buffer()));
        assert_eq!(fx.session.live().text(), "front");
    }

    #[test]
    fn test_reload_preserves_position_and_write_protection() {
        let mut fx = fixture();
        let path = write_file(&fx.dir, "stable.rs", "l1\nl2\nl3\nl4\n");
        let id = fx.session.open_file(&path, None).unwrap();
        fx.session.goto_line(3);
        fx.session.toggle_write_protect(id).unwrap();

        fs::write(&path, "l1\nl2\nl3\nl4\nl5\n").unwrap();
        age_baseline(&mut fx.session, id);
        assert!(fx.session.reload_document(id, true));

        let record = fx.session.store().get(id).unwrap();
        assert_eq!(record.position.line, 3);
        assert!(record.is_write_protected);
    }

    #[test]
    fn test_close_all_short_circuits_on_blank_remainder() {
        let mut fx = fixture();
        let path = write_file(&fx.dir, "only.rs", "content");
        fx.session.new_tab();
        fx.session.open_file(&path, None).unwrap();

        assert!(fx.session.close_all_tabs(false));
        assert_eq!(fx.session.tabs().len(), 1);
        let remaining = fx.session.store().get(fx.session.active_doc()).unwrap();
        assert!(remaining.is_pristine_untitled());
        assert_consistent(&fx.session);
    }

    #[test]
    fn test_close_all_rejected_stops_the_pass() {
        let mut fx = fixture();
        let path = write_file(&fx.dir, "keepme.rs", "v");
        let id = fx.session.open_file(&path, None).unwrap();
        fx.session.edit_active("unsaved");

        // Empty close queue: StayOpen rejects the close
        assert!(!fx.session.close_all_tabs(false));
        assert!(fx.session.store().has_document(id));
        assert!(fx.session.store().get(id).unwrap().is_dirty());
    }

    #[test]
    fn test_selection_persists_caret_across_tabs() {
        let mut fx = fixture();
        let a = write_file(&fx.dir, "first.rs", "1\n2\n3\n4\n5\n");
        let b = write_file(&fx.dir, "second.rs", "x\ny\n");
        let id_a = fx.session.open_file(&a, None).unwrap();
        let id_b = fx.session.open_file(&b, None).unwrap();

        fx.session.select_doc(id_a);
        fx.session.goto_line(4);
        fx.session.select_doc(id_b);
        assert_eq!(fx.session.store().get(id_a).unwrap().position.line, 4);

        fx.session.select_doc(id_a);
        assert_eq!(fx.session.live().caret_line(), 4);
    }

    #[test]
    fn test_update_suppression_is_reentrant() {
        let updates = UpdateSuppression::new();
        assert!(!updates.is_suppressed());
        let outer = updates.suppress();
        {
            let _inner = updates.suppress();
            assert!(updates.is_suppressed());
        }
        // Inner guard dropped; still suppressed until the outer one goes
        assert!(updates.is_suppressed());
        drop(outer);
        assert!(!updates.is_suppressed());
    }

    #[test]
    fn test_save_hook_runs_after_successful_save() {
        let mut fx = fixture();
        let path = write_file(&fx.dir, "hooked.rs", "v");
        let id = fx.session.open_file(&path, None).unwrap();

        let fired: Rc<Cell<usize>> = Rc::new(Cell::new(0));
        let fired_in_hook = Rc::clone(&fired);
        fx.session.store_mut().get_mut(id).unwrap().save_hook =
            Some(Box::new(move |_path| {
                fired_in_hook.set(fired_in_hook.get() + 1);
            }));

        fx.session.edit_active("v2");
        fx.session.save_document(id).unwrap();
        assert_eq!(fired.get(), 1);
    }

    #[test]
    fn test_save_as_refuses_path_open_elsewhere() {
        let mut fx = fixture();
        let a = write_file(&fx.dir, "one.rs", "1");
        let b = write_file(&fx.dir, "two.rs", "2");
        let id_a = fx.session.open_file(&a, None).unwrap();
        fx.session.open_file(&b, None).unwrap();

        assert!(fx.session.save_document_as(id_a, &b).is_err());
        // Nothing moved: the record still points at its own path
        assert_eq!(fx.session.store().id_for_path(&a), id_a);
    }

    #[test]
    fn test_session_restore_skips_vanished_files() {
        let mut fx = fixture();
        let kept = write_file(&fx.dir, "kept.rs", "still here");
        let gone = fx.dir.path().join("gone.rs");

        let settings = fx.session.settings_mut();
        settings.last_open_tabs = vec![
            SessionTab {
                path: gone.clone(),
                line: 0,
            },
            SessionTab {
                path: kept.clone(),
                line: 1,
            },
        ];
        settings.active_tab_index = 0;

        fx.session.restore_previous_session();
        assert_eq!(fx.session.tabs().len(), 1);
        assert!(fx.session.store().id_for_path(&kept).is_valid());
        assert!(!fx.session.store().id_for_path(&gone).is_valid());
    }

    #[test]
    fn test_bookmarks_survive_close_and_reopen() {
        let mut fx = fixture();
        let path = write_file(&fx.dir, "marked.rs", "a\nb\nc\nd\n");
        let id = fx.session.open_file(&path, None).unwrap();

        assert!(fx.session.toggle_bookmark(id, 3).unwrap());
        assert!(fx.session.toggle_bookmark(id, 1).unwrap());
        // Toggling again clears the mark
        assert!(!fx.session.toggle_bookmark(id, 3).unwrap());
        assert!(fx.session.toggle_bookmark(id, 4).unwrap());

        let index = fx.session.tabs().index_of(id).unwrap();
        assert!(fx.session.close_tab(index, true, false));
        assert_eq!(fx.session.settings().bookmarks_for(&path), vec![1, 4]);
        assert!(fx.session.settings_dirty());

        let reopened = fx.session.open_file(&path, None).unwrap();
        let record = fx.session.store().get(reopened).unwrap();
        assert_eq!(record.bookmark_lines, vec![1, 4]);
    }

    #[test]
    fn test_persisting_records_bookmarks_of_open_tabs() {
        let mut fx = fixture();
        let path = write_file(&fx.dir, "still_open.rs", "x\ny\n");
        let id = fx.session.open_file(&path, None).unwrap();
        fx.session.toggle_bookmark(id, 2).unwrap();

        fx.session.record_bookmarks();
        assert_eq!(fx.session.settings().bookmarks_for(&path), vec![2]);
    }

    #[test]
    fn test_configured_tab_width_reaches_live_surface() {
        let settings = Settings {
            tab_width: 8,
            ..Settings::default()
        };
        let mut fx = fixture_with(settings, ScriptedPrompter::default());
        let path = write_file(&fx.dir, "wide.rs", "fn main() {}\n");
        fx.session.open_file(&path, None).unwrap();
        assert_eq!(fx.session.live().tab_width(), 8);
    }
}
