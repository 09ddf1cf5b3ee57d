//! quill-agent: the directive-driven session loop
//!
//! This crate turns a complete reply into actions: it extracts directives,
//! applies file edits, gates and runs shell commands, and drives the
//! multi-round loop that feeds results back to the model.

pub mod conversation;
pub mod directive;
pub mod edit;
pub mod error;
pub mod handle;
pub mod lint;
pub mod prompt;
pub mod repo_map;
pub mod session;
pub mod shell;
pub mod transport;
pub mod vcs;

pub use conversation::Conversation;
pub use directive::Directive;
pub use edit::{EditEngine, EditOutcome, EditReport};
pub use error::{Error, Result};
pub use handle::SessionHandle;
pub use session::{RoundOutcome, Session, SessionConfig, TurnEnd, TurnSummary};
pub use shell::{ApprovalChoice, ApprovalDecision, Approver, Risk, ShellGate, ShellOutcome};
pub use transport::{ProviderTransport, Transport};
pub use vcs::{GitVcs, Vcs};
