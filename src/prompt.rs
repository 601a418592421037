//! User-decision seam for Ironpad
//!
//! Every flow that needs a user choice (close a dirty tab, reload an
//! externally changed file, keep or drop an externally deleted file) goes
//! through the [`UserPrompter`] trait. The real implementation shows modal
//! dialogs; tests script the answers.
//!
//! A prompt call is a suspension point: a modal dialog pumps its own nested
//! message loop, during which other session operations may re-enter. Callers
//! must re-check indices and preconditions after every prompt returns and
//! must never cache iterators across one.

// ─────────────────────────────────────────────────────────────────────────────
// Decisions
// ─────────────────────────────────────────────────────────────────────────────

/// Answer when closing a tab with unsaved changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseDecision {
    /// Save the document, then close the tab
    SaveAndClose,
    /// Close the tab, discarding changes
    CloseWithoutSaving,
    /// Keep the tab open (also the dialog-dismissal outcome)
    StayOpen,
}

/// Answer when a file changed on disk behind an open document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReloadDecision {
    /// Discard in-memory state and reload from disk
    Reload,
    /// Keep our buffer; write it over the external change on next save
    KeepOurs,
    /// Do nothing yet (also the dialog-dismissal outcome)
    Cancel,
}

/// Answer when the backing file was deleted outside the application.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemovedDecision {
    /// Keep the tab; the document now needs saving
    KeepOpen,
    /// Close the tab; the backing file is already gone
    CloseTab,
}

/// A decision plus the "do this for all" checkbox state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchAnswer<T> {
    pub decision: T,
    pub apply_to_all: bool,
}

impl<T> BatchAnswer<T> {
    /// An answer for this document only.
    pub fn single(decision: T) -> Self {
        Self {
            decision,
            apply_to_all: false,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Prompter
// ─────────────────────────────────────────────────────────────────────────────

/// The prompt surface the session calls into.
///
/// Implementations must map dialog dismissal to the safest outcome
/// (`StayOpen`, `Cancel`, `KeepOpen`), never to a destructive default.
pub trait UserPrompter {
    /// "<name> has unsaved changes" when closing a tab.
    fn ask_to_close(&mut self, name: &str) -> BatchAnswer<CloseDecision>;

    /// "<name> changed on disk" during reconciliation.
    fn ask_to_reload(&mut self, name: &str) -> BatchAnswer<ReloadDecision>;

    /// "<name> was deleted on disk" during reconciliation.
    fn ask_about_removed(&mut self, name: &str) -> BatchAnswer<RemovedDecision>;

    /// "discard changes in <name>?" for an explicit dirty reload.
    fn confirm_discard(&mut self, name: &str) -> bool;
}

// ─────────────────────────────────────────────────────────────────────────────
// Batch Decision Carrier
// ─────────────────────────────────────────────────────────────────────────────

/// Carries a "do this for all" choice through one batch reconciliation pass.
///
/// Owned by the pass itself and dropped when the pass ends, so a stale
/// batch decision can never leak into a later, unrelated operation — this
/// replaces the free-standing static flag of the original design.
#[derive(Debug, Default)]
pub struct BatchDecision<T: Copy> {
    remembered: Option<T>,
}

impl<T: Copy> BatchDecision<T> {
    pub fn new() -> Self {
        Self { remembered: None }
    }

    /// Resolve the decision for one document: reuse the remembered answer if
    /// the user chose "do for all" earlier in this pass, otherwise prompt.
    pub fn resolve(&mut self, prompt: impl FnOnce() -> BatchAnswer<T>) -> T {
        if let Some(decision) = self.remembered {
            return decision;
        }
        let answer = prompt();
        if answer.apply_to_all {
            self.remembered = Some(answer.decision);
        }
        answer.decision
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_decision_prompts_every_time_without_do_all() {
        let mut batch = BatchDecision::new();
        let mut prompts = 0;
        for _ in 0..3 {
            let d = batch.resolve(|| {
                prompts += 1;
                BatchAnswer::single(ReloadDecision::KeepOurs)
            });
            assert_eq!(d, ReloadDecision::KeepOurs);
        }
        assert_eq!(prompts, 3);
    }

    #[test]
    fn test_batch_decision_remembers_do_all() {
        let mut batch = BatchDecision::new();
        let mut prompts = 0;
        for _ in 0..3 {
            let d = batch.resolve(|| {
                prompts += 1;
                BatchAnswer {
                    decision: ReloadDecision::Reload,
                    apply_to_all: true,
                }
            });
            assert_eq!(d, ReloadDecision::Reload);
        }
        // Only the first document prompted; the rest reused the answer
        assert_eq!(prompts, 1);
    }
}
