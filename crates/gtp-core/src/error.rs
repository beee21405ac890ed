//! Error types for GTP sessions

use thiserror::Error;

/// Result type for GTP operations
pub type Result<T> = std::result::Result<T, GtpError>;

/// GTP error types
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GtpError {
    /// Command was empty after stripping comments and whitespace
    #[error("Empty command")]
    EmptyCommand,

    /// Reading from or writing to the engine failed
    #[error("I/O error: {0}")]
    Io(String),

    /// Engine output did not follow the protocol; the session is unusable
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Session was shut down or the engine went away
    #[error("Session closed")]
    SessionClosed,

    /// Engine answered a well-formed command with a failure status
    #[error("Command '{command}' failed: {message}")]
    CommandFailed { command: String, message: String },

    /// Engine reply could not be interpreted for the command sent
    #[error("Unexpected response: {0}")]
    UnexpectedResponse(String),

    /// Malformed vertex token
    #[error("Invalid vertex: '{0}'")]
    InvalidVertex(String),

    /// Malformed color token
    #[error("Invalid color: '{0}'")]
    InvalidColor(String),

    /// Malformed analysis record
    #[error("Analysis format error: {0}")]
    Analysis(String),

    /// Request arguments that cannot be expressed as a command
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

impl GtpError {
    /// Whether this error leaves the session unusable
    pub fn is_fatal(&self) -> bool {
        matches!(self, GtpError::Protocol(_) | GtpError::SessionClosed)
    }
}

impl From<std::io::Error> for GtpError {
    fn from(err: std::io::Error) -> Self {
        GtpError::Io(err.to_string())
    }
}
