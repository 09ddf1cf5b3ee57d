//! The session loop: one user turn is a sequence of rounds.
//!
//! Each round sends the prompt, renders the streamed reply, and then acts on
//! the reply's directives in a fixed order:
//!
//! 1. create/edit directives are applied and committed,
//! 2. requested files are attached (and dropped ones detached),
//! 3. detail maps are computed,
//! 4. shell commands pass the approval gate and run.
//!
//! Steps 2 to 4 may produce a follow-up request, which becomes the next
//! round's input without consulting the user. The first step that produces
//! one ends the round, so a reply that both requests files and asks for shell
//! commands only gets its files this round.

use std::io::Write;
use std::path::{Path, PathBuf};

use futures::StreamExt;
use quill_ai::Message;
use quill_tui::theme::paint;
use quill_tui::{Spinner, StreamRenderer, Theme, strip_ansi};
use tokio::fs;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::conversation::Conversation;
use crate::directive::{self, Directive};
use crate::edit::{EditEngine, EditReport, resolve_within};
use crate::error::Result;
use crate::handle::SessionHandle;
use crate::prompt;
use crate::repo_map;
use crate::shell::{self, Approver, ApprovalDecision, ShellGate, ShellOutcome};
use crate::transport::Transport;
use crate::vcs::Vcs;

/// Appended to a reply cut short by the user.
pub const INTERRUPTED_REPLY_MARKER: &str = "[interrupted by user]";

/// Label of the waiting indicator.
const SPINNER_LABEL: &str = "AI";

/// Static inputs of a session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Repository root; all directive paths are relative to it
    pub root: PathBuf,
    /// System instructions, project instructions included
    pub instructions: String,
    /// Environment summary computed once at startup
    pub environment: String,
    pub theme: Theme,
    /// Show the waiting indicator
    pub spinner: bool,
    /// Strip styling from output
    pub plain: bool,
}

impl SessionConfig {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            instructions: prompt::SYSTEM_PROMPT.to_string(),
            environment: "{}".to_string(),
            theme: Theme::default(),
            spinner: true,
            plain: false,
        }
    }
}

/// Why a turn ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnEnd {
    /// The reply needed no further action
    Completed,
    /// The user interrupted the stream
    Interrupted,
    /// No reply could be obtained
    TransportFailed(String),
    /// A shell command was refused
    Denied,
}

/// What to do after a round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoundOutcome {
    /// Send this request next
    Continue(String),
    Finished(TurnEnd),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnSummary {
    pub rounds: usize,
    pub end: TurnEnd,
    /// Number of create/edit directives applied across all rounds
    pub applied: usize,
}

enum Reply {
    Complete(String),
    Interrupted(String),
    Failed(String),
}

/// Owns the conversation and drives rounds against a [`Transport`].
pub struct Session {
    config: SessionConfig,
    conversation: Conversation,
    gate: ShellGate,
    edits: EditEngine,
    transport: Box<dyn Transport>,
    vcs: Box<dyn Vcs>,
    approver: Box<dyn Approver>,
    out: Box<dyn Write + Send>,
    handle: SessionHandle,
    applied: usize,
}

impl Session {
    pub fn new(
        config: SessionConfig,
        transport: Box<dyn Transport>,
        vcs: Box<dyn Vcs>,
        approver: Box<dyn Approver>,
    ) -> Self {
        Self {
            edits: EditEngine::new(config.root.clone()),
            config,
            conversation: Conversation::new(),
            gate: ShellGate::new(),
            transport,
            vcs,
            approver,
            out: Box::new(std::io::stdout()),
            handle: SessionHandle::new(),
            applied: 0,
        }
    }

    /// Write rendered output somewhere other than stdout.
    pub fn with_output(mut self, out: Box<dyn Write + Send>) -> Self {
        self.out = out;
        self
    }

    pub fn handle(&self) -> SessionHandle {
        self.handle.clone()
    }

    pub fn root(&self) -> &Path {
        &self.config.root
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub fn gate(&self) -> &ShellGate {
        &self.gate
    }

    pub fn context_files(&self) -> Vec<String> {
        self.conversation
            .context_files()
            .map(str::to_string)
            .collect()
    }

    /// Attach every file matching `pattern` (relative to the root).
    ///
    /// Returns the matching files, including ones already attached.
    pub fn add_files(&mut self, pattern: &str) -> Result<Vec<String>> {
        let root = &self.config.root;
        let full = format!(
            "{}/{}",
            glob::Pattern::escape(&root.to_string_lossy()),
            pattern.trim()
        );

        let mut found = Vec::new();
        for path in glob::glob(&full)?.filter_map(|entry| entry.ok()) {
            if !path.is_file() {
                continue;
            }
            let Ok(relative) = path.strip_prefix(root) else {
                continue;
            };
            let relative = relative.to_string_lossy().replace('\\', "/");
            if resolve_within(root, &relative).is_none() {
                debug!("/add: skipping {} outside the repository", relative);
                continue;
            }
            found.push(relative);
        }
        found.sort();
        for path in &found {
            self.conversation.add_file(path.clone());
        }
        debug!("/add {}: {} files", pattern, found.len());
        Ok(found)
    }

    /// Returns `false` if the file was not attached.
    pub fn drop_file(&mut self, path: &str) -> bool {
        self.conversation.drop_file(path.trim())
    }

    pub fn clear_history(&mut self) {
        self.conversation.clear_history();
    }

    /// Undo the last commit.
    pub async fn undo(&self) -> Result<()> {
        self.vcs.undo().await
    }

    /// Add the result of a user-run command to the history.
    pub fn record_shell_output(&mut self, outcome: &ShellOutcome, truncated: bool) {
        self.conversation
            .push(Message::user(outcome.to_context(truncated)));
    }

    /// Run a command typed by the user, without approval.
    ///
    /// The output is shown but not recorded; see
    /// [`Session::record_shell_output`].
    pub async fn run_user_command(&mut self, command: &str) -> ShellOutcome {
        self.handle.set_busy(true);
        let outcome = self.execute(command.trim()).await;
        self.handle.set_busy(false);
        outcome
    }

    /// Process one user request until the model needs nothing more.
    pub async fn run_turn(&mut self, request: &str) -> TurnSummary {
        self.handle.set_busy(true);
        let applied_before = self.applied;
        let mut request = request.to_string();
        let mut rounds = 0;

        let end = loop {
            rounds += 1;
            debug!("round {}", rounds);
            match self.run_round(&request).await {
                RoundOutcome::Continue(next) => request = next,
                RoundOutcome::Finished(end) => break end,
            }
        };

        self.handle.set_busy(false);
        TurnSummary {
            rounds,
            end,
            applied: self.applied - applied_before,
        }
    }

    /// Send `request`, render the reply and act on its directives.
    pub async fn run_round(&mut self, request: &str) -> RoundOutcome {
        let cancel = self.handle.renew();
        let messages = self.build_messages(request).await;

        let reply = match self.stream_reply(&messages, &cancel).await {
            Reply::Complete(reply) => reply,
            Reply::Interrupted(partial) => {
                let recorded = if partial.is_empty() {
                    INTERRUPTED_REPLY_MARKER.to_string()
                } else {
                    format!("{}\n{}", partial, INTERRUPTED_REPLY_MARKER)
                };
                self.conversation.record_exchange(request, recorded);
                let notice = paint(self.config.theme.warning_style(), "Interrupted.");
                self.emit(&format!("{}\n", notice));
                return RoundOutcome::Finished(TurnEnd::Interrupted);
            }
            Reply::Failed(message) => {
                return RoundOutcome::Finished(TurnEnd::TransportFailed(message));
            }
        };

        self.conversation.record_exchange(request, reply.as_str());
        let directives = directive::extract(&reply);
        debug!("{} directives in reply", directives.len());

        self.apply_edits(&directives).await;

        if let Some(next) = self.resolve_files(&directives) {
            return RoundOutcome::Continue(next);
        }
        if let Some(next) = self.resolve_detail_map(&directives).await {
            return RoundOutcome::Continue(next);
        }
        self.resolve_shell(&directives).await
    }

    async fn build_messages(&self, request: &str) -> Vec<Message> {
        let root = &self.config.root;
        let map = repo_map::repo_map(root).await;

        let mut files = Vec::new();
        for path in self.conversation.context_files() {
            match fs::read_to_string(root.join(path)).await {
                Ok(content) => files.push((path.to_string(), content)),
                Err(e) => warn!("Skipping context file {}: {}", path, e),
            }
        }

        prompt::build_messages(
            &self.config.instructions,
            &self.config.environment,
            self.conversation.messages(),
            &map,
            &files,
            request,
        )
    }

    async fn stream_reply(&mut self, messages: &[Message], cancel: &CancellationToken) -> Reply {
        let theme = self.config.theme.clone();
        let mut spinner = if self.config.spinner {
            Spinner::start(SPINNER_LABEL, &theme)
        } else {
            Spinner::disabled()
        };

        let opened = tokio::select! {
            _ = cancel.cancelled() => None,
            result = self.transport.stream(messages) => Some(result),
        };
        let mut stream = match opened {
            None => {
                spinner.stop().await;
                return Reply::Interrupted(String::new());
            }
            Some(Err(e)) => {
                spinner.stop().await;
                self.error_line(&e.to_string());
                return Reply::Failed(e.to_string());
            }
            Some(Ok(stream)) => stream,
        };

        let mut renderer = StreamRenderer::new(theme.clone());
        let mut reply = String::new();
        let mut started = false;
        let mut interrupted = false;
        let mut fault = None;

        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    interrupted = true;
                    break;
                }
                next = stream.next() => next,
            };
            match next {
                Some(Ok(fragment)) => {
                    if !started {
                        spinner.stop().await;
                        started = true;
                        let badge = paint(theme.badge_style(), &format!(" {} ", SPINNER_LABEL));
                        self.emit(&format!("{} ", badge));
                    }
                    reply.push_str(&fragment);
                    let shown = renderer.push(&fragment);
                    self.emit(&shown);
                }
                Some(Err(e)) if !started => {
                    spinner.stop().await;
                    self.error_line(&e.to_string());
                    return Reply::Failed(e.to_string());
                }
                Some(Err(e)) => {
                    fault = Some(e);
                    break;
                }
                None => break,
            }
        }

        spinner.stop().await;
        let rest = renderer.finish();
        self.emit(&rest);
        self.emit("\n\n");

        if let Some(e) = fault {
            warn!("Stream ended early: {}", e);
            self.error_line(&e.to_string());
        }
        if interrupted {
            Reply::Interrupted(reply)
        } else {
            Reply::Complete(reply)
        }
    }

    async fn apply_edits(&mut self, directives: &[Directive]) {
        let reports: Vec<EditReport> = self.edits.apply_all(directives).await;
        for report in &reports {
            let rendered = report.render(&self.config.theme);
            self.emit(&rendered);
        }

        let applied = reports.iter().filter(|r| r.outcome.is_applied()).count();
        if applied == 0 {
            return;
        }
        self.applied += applied;

        let message = directive::commit_message(directives);
        match self.vcs.commit_all(message).await {
            Ok(()) => {
                let line = paint(self.config.theme.dim_style(), &format!("Committed: {}", message));
                self.emit(&format!("{}\n", line));
            }
            Err(e) => {
                warn!("Commit failed: {}", e);
                self.error_line(&format!("Commit failed: {}", e));
            }
        }
    }

    fn resolve_files(&mut self, directives: &[Directive]) -> Option<String> {
        let mut added: Vec<String> = Vec::new();
        for d in directives {
            match d {
                Directive::RequestFiles(paths) => {
                    for path in paths {
                        let exists = self
                            .edits
                            .resolve(path)
                            .is_some_and(|full| full.is_file());
                        if exists && !self.conversation.has_file(path) && !added.contains(path) {
                            added.push(path.clone());
                        }
                    }
                }
                Directive::DropFiles(paths) => {
                    for path in paths {
                        self.conversation.drop_file(path);
                    }
                }
                _ => {}
            }
        }

        if added.is_empty() {
            return None;
        }
        for path in &added {
            self.conversation.add_file(path.clone());
        }
        let notice = paint(
            self.config.theme.warning_style(),
            &format!("+{} file(s)", added.len()),
        );
        self.emit(&format!("{}\n", notice));
        Some(format!("Added files: {}. Please continue.", added.join(", ")))
    }

    async fn resolve_detail_map(&mut self, directives: &[Directive]) -> Option<String> {
        let paths: Vec<String> = directives
            .iter()
            .filter_map(|d| match d {
                Directive::DetailMap(paths) => Some(paths.iter().cloned()),
                _ => None,
            })
            .flatten()
            .collect();
        if paths.is_empty() {
            return None;
        }

        let detail = repo_map::detail_map(&self.config.root, &paths).await;
        let notice = paint(
            self.config.theme.warning_style(),
            &format!("Detail map: {} file(s)", paths.len()),
        );
        self.emit(&format!("{}\n", notice));
        Some(format!("Detail map:\n{}\nPlease continue.", detail))
    }

    async fn resolve_shell(&mut self, directives: &[Directive]) -> RoundOutcome {
        let commands: Vec<&str> = directives
            .iter()
            .filter_map(|d| match d {
                Directive::Shell(cmd) if !cmd.is_empty() => Some(cmd.as_str()),
                _ => None,
            })
            .collect();
        if commands.is_empty() {
            return RoundOutcome::Finished(TurnEnd::Completed);
        }

        let theme = self.config.theme.clone();
        let mut results = Vec::with_capacity(commands.len());
        for command in commands {
            self.emit(&format!("{}\n", paint(theme.accent_bold(), command)));

            let decision = self.gate.decide(command, self.approver.as_ref()).await;
            match decision {
                ApprovalDecision::Denied => {
                    results.push(shell::denied_context(command));
                    self.emit(&format!("{}\n", paint(theme.error_style(), "Denied.")));
                    self.conversation.push(Message::user(format!(
                        "Shell results:\n{}",
                        results.join("\n\n")
                    )));
                    return RoundOutcome::Finished(TurnEnd::Denied);
                }
                ApprovalDecision::AutoApprovedSafe | ApprovalDecision::AutoApprovedAll => {
                    self.emit(&format!("{}\n", paint(theme.dim_style(), "(auto-approved)")));
                }
                ApprovalDecision::ApprovedOnce => {}
            }

            let outcome = self.execute(command).await;
            results.push(outcome.to_context(true));
        }

        RoundOutcome::Continue(format!(
            "Shell results:\n{}\nPlease continue.",
            results.join("\n\n")
        ))
    }

    async fn execute(&mut self, command: &str) -> ShellOutcome {
        let token = self.handle.renew();
        let plain = self.config.plain;
        let out = &mut self.out;
        let outcome = shell::run_command(command, &self.config.root, &token, |line| {
            let _ = writeln!(out, "{}", if plain { strip_ansi(line) } else { line.to_string() });
            let _ = out.flush();
        })
        .await;

        let status = format!("exit={}", outcome.exit_code.unwrap_or(-1));
        let status = paint(self.config.theme.dim_style(), &status);
        self.emit(&format!("{}\n", status));
        if let Some(error) = &outcome.error {
            self.error_line(error);
        }
        outcome
    }

    fn error_line(&mut self, message: &str) {
        let line = paint(self.config.theme.error_style(), &format!("Error: {}", message));
        self.emit(&format!("{}\n", line));
    }

    fn emit(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        let result = if self.config.plain {
            self.out.write_all(strip_ansi(text).as_bytes())
        } else {
            self.out.write_all(text.as_bytes())
        };
        if let Err(e) = result.and_then(|_| self.out.flush()) {
            debug!("output write failed: {}", e);
        }
    }
}
