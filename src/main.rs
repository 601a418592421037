//! Ironpad - Main Entry Point
//!
//! A tabbed text editor core with single-instance behavior: later launches
//! forward their command line to the running instance, and open tabs can be
//! handed between instances without losing unsaved content.

mod buffer;
mod cli;
mod config;
mod document;
mod editor;
mod encoding;
mod error;
mod ipc;
mod language;
mod observers;
mod prompt;
mod reconcile;
mod session;
mod store;
mod tabs;
mod transfer;

use cli::LaunchArgs;
use config::load_config;
use ipc::{Discriminator, InstanceClient, InstanceEndpoint, Message, MessageHandler};
use log::{debug, info, warn};
use prompt::{BatchAnswer, CloseDecision, ReloadDecision, RemovedDecision, UserPrompter};
use reconcile::DocumentWatcher;
use session::EditorSession;
use std::io::Write as _;
use std::time::Duration;

/// Application name constant.
const APP_NAME: &str = "Ironpad";

fn main() {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = LaunchArgs::parse(std::env::args().skip(1));

    if args.help {
        println!("{}", cli::USAGE);
        return;
    }
    if args.register || args.unregister {
        // Shell association management is handled by the platform installer;
        // the switches are accepted so forwarded command lines stay intact.
        info!("Shell association switches are managed by the installer");
        return;
    }

    // Hand the command line to a running instance when one exists
    if args.forwards_to_existing() {
        if let Ok(client) = InstanceClient::discover() {
            match client.send(Discriminator::CommandLine, &args.encode_forward()) {
                Ok(code) if code != ipc::REPLY_REJECTED => {
                    info!("Forwarded command line to the running instance");
                    return;
                }
                Ok(_) => warn!("Running instance declined the command line"),
                Err(e) => debug!("No reachable instance ({}), starting up", e),
            }
        }
    }

    info!("Starting {}", APP_NAME);
    let settings = load_config();
    let mut session = EditorSession::new(settings, Box::new(ConsolePrompter));

    // Claim the single-instance endpoint unless running standalone
    let endpoint = if args.allow_multiple {
        None
    } else {
        match InstanceEndpoint::claim() {
            Ok(endpoint) => Some(endpoint),
            Err(e) => {
                warn!("Could not claim the instance endpoint: {}", e);
                None
            }
        }
    };

    open_requested_files(&mut session, &args);
    if session.tabs().is_empty() {
        session.restore_previous_session();
    }

    let mut watcher = match DocumentWatcher::new() {
        Ok(watcher) => Some(watcher),
        Err(e) => {
            warn!("File watching disabled: {}", e);
            None
        }
    };

    run_event_loop(&mut session, endpoint.as_ref(), watcher.as_mut());
}

/// Open everything the command line asked for.
///
/// A `/savepath:` switch re-identifies the opened staged content as the real
/// path, completing a tab handoff into this fresh instance.
fn open_requested_files(session: &mut EditorSession, args: &LaunchArgs) {
    if let (Some(staged), Some(real)) = (args.files.first(), &args.save_path) {
        let payload = transfer::MoveTabPayload {
            real_path: Some(real.clone()),
            temp_path: staged.clone(),
            modified: args.adopt_modified,
            line: args.line.unwrap_or(1),
        };
        if let Err(e) = transfer::receive_tab(session, &payload.encode()) {
            warn!("Could not adopt the handed-over tab: {}", e);
        }
        return;
    }

    for path in &args.files {
        if let Err(e) = session.open_file(path, None) {
            warn!("Could not open '{}': {}", path.display(), e);
        }
    }
    if let Some(line) = args.line {
        session.goto_line(line);
    }
}

/// Poll the instance endpoint and the file watcher until the process ends.
///
/// The open-tab set is persisted periodically, so an interrupted instance
/// still restores close to its last state.
fn run_event_loop(
    session: &mut EditorSession,
    endpoint: Option<&InstanceEndpoint>,
    mut watcher: Option<&mut DocumentWatcher>,
) -> ! {
    const PERSIST_EVERY: u32 = 25;
    session.ensure_tab();
    let mut ticks = 0u32;
    loop {
        if let Some(endpoint) = endpoint {
            let mut handler = SessionMessageHandler {
                session: &mut *session,
            };
            endpoint.poll(&mut handler);
        }
        if let Some(watcher) = watcher.as_mut() {
            watcher.sync_with_store(session.store());
            if watcher.check_due() {
                session.check_all_documents();
            }
        }
        ticks = ticks.wrapping_add(1);
        if session.settings_dirty() || ticks % PERSIST_EVERY == 0 {
            session.persist_session();
        }
        std::thread::sleep(Duration::from_millis(200));
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Message Dispatch
// ─────────────────────────────────────────────────────────────────────────────

/// Routes inter-instance messages into the session.
struct SessionMessageHandler<'a> {
    session: &'a mut EditorSession,
}

impl MessageHandler for SessionMessageHandler<'_> {
    fn handle_message(&mut self, message: Message) -> u32 {
        match message.discriminator {
            Discriminator::CommandLine => {
                let args = LaunchArgs::parse(LaunchArgs::split_forwarded(&message.payload));
                open_requested_files(self.session, &args);
                ipc::REPLY_ACCEPTED
            }
            Discriminator::MoveTab => match transfer::receive_tab(self.session, &message.payload) {
                Ok(()) => ipc::REPLY_ACCEPTED,
                Err(e) => {
                    warn!("Rejected incoming tab: {}", e);
                    ipc::REPLY_REJECTED
                }
            },
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Console Prompter
// ─────────────────────────────────────────────────────────────────────────────

/// Terminal-backed prompt surface. Anything other than a recognized answer,
/// including end of input, maps to the safest outcome.
struct ConsolePrompter;

impl ConsolePrompter {
    fn ask(&self, question: &str, options: &str) -> String {
        print!("{} {} ", question, options);
        let _ = std::io::stdout().flush();
        let mut line = String::new();
        if std::io::stdin().read_line(&mut line).is_err() {
            return String::new();
        }
        line.trim().to_ascii_lowercase()
    }

    fn apply_to_all(answer: &str) -> bool {
        answer.ends_with('!')
    }
}

impl UserPrompter for ConsolePrompter {
    fn ask_to_close(&mut self, name: &str) -> BatchAnswer<CloseDecision> {
        let answer = self.ask(
            &format!("'{}' has unsaved changes. Save before closing?", name),
            "[s]ave / [d]iscard / [k]eep open (append ! for all):",
        );
        let decision = match answer.trim_end_matches('!') {
            "s" => CloseDecision::SaveAndClose,
            "d" => CloseDecision::CloseWithoutSaving,
            _ => CloseDecision::StayOpen,
        };
        BatchAnswer {
            decision,
            apply_to_all: Self::apply_to_all(&answer),
        }
    }

    fn ask_to_reload(&mut self, name: &str) -> BatchAnswer<ReloadDecision> {
        let answer = self.ask(
            &format!("'{}' changed on disk.", name),
            "[r]eload / [k]eep ours / [c]ancel (append ! for all):",
        );
        let decision = match answer.trim_end_matches('!') {
            "r" => ReloadDecision::Reload,
            "k" => ReloadDecision::KeepOurs,
            _ => ReloadDecision::Cancel,
        };
        BatchAnswer {
            decision,
            apply_to_all: Self::apply_to_all(&answer),
        }
    }

    fn ask_about_removed(&mut self, name: &str) -> BatchAnswer<RemovedDecision> {
        let answer = self.ask(
            &format!("'{}' was deleted on disk.", name),
            "[k]eep open / [c]lose tab (append ! for all):",
        );
        let decision = match answer.trim_end_matches('!') {
            "c" => RemovedDecision::CloseTab,
            _ => RemovedDecision::KeepOpen,
        };
        BatchAnswer {
            decision,
            apply_to_all: Self::apply_to_all(&answer),
        }
    }

    fn confirm_discard(&mut self, name: &str) -> bool {
        self.ask(
            &format!("Discard unsaved changes in '{}'?", name),
            "[y]es / [n]o:",
        ) == "y"
    }
}
