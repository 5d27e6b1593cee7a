//! Error types for Veildrop.
//!
//! This module provides a unified error type for all Veildrop operations.
//! Only caller mistakes and collaborator I/O surface here; failures of the
//! background service are modelled as session states, never as errors.

use thiserror::Error;

/// A specialized `Result` type for Veildrop operations.
pub type Result<T> = std::result::Result<T, Error>;

/// The main error type for Veildrop.
#[derive(Error, Debug)]
pub enum Error {
    /// A command was issued in a state that does not accept it
    #[error("command '{command}' is not valid in state '{state}'")]
    InvalidTransition {
        /// The rejected command
        command: &'static str,
        /// The state the session was in
        state: &'static str,
    },

    /// Sharing was requested with no files selected
    #[error("no files selected to share")]
    EmptyShare,

    /// A file selection contained no paths
    #[error("selection contains no paths")]
    EmptySelection,

    /// A selected path does not exist or is not a regular file or directory
    #[error("file not found: {0}")]
    FileNotFound(String),

    /// An onion address failed validation
    #[error("invalid onion address: {0}")]
    InvalidOnionAddress(String),

    /// The session driver is no longer running
    #[error("session closed")]
    SessionClosed,

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
