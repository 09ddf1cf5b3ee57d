//! Error types for quill-agent

use thiserror::Error;

/// Result type alias using quill-agent Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while running a session
#[derive(Error, Debug)]
pub enum Error {
    /// An error from the transport layer
    #[error(transparent)]
    Ai(#[from] quill_ai::Error),

    /// File system failure outside of per-edit handling
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A version-control command failed
    #[error("{command} failed: {message}")]
    Vcs { command: String, message: String },

    /// Bad glob pattern from the user
    #[error("Invalid pattern: {0}")]
    Pattern(#[from] glob::PatternError),

    /// A generic session error
    #[error("{0}")]
    Other(String),
}
