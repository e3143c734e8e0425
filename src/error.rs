//! Hub error types
//!
//! Every failure below is local in scope: it is reported to the observer or
//! session that triggered it and never takes down the dispatcher. Only
//! startup I/O (binding the listener, creating the log directory) is fatal.

/// Convenience alias used throughout the crate
pub type Result<T> = std::result::Result<T, HubError>;

/// Error type for hub operations
#[derive(Debug)]
pub enum HubError {
    /// A capability descriptor matched no configured entry
    NoMatchingCapability,
    /// A stream chunk arrived on a connection with no bound session
    UnboundStreamWrite,
    /// Appending to a session's log failed at the storage layer
    LogWriteFailed {
        /// Session whose log stream failed
        session: String,
        /// Underlying storage error, rendered
        reason: String,
    },
    /// The session already has an open log stream in this process
    SessionAlreadyRecording(String),
    /// An inbound line could not be decoded as a known command
    InvalidCommand(String),
    /// The coordinator reported an internal error
    CoordinatorError(String),
    /// I/O error (fatal only during startup)
    Io(std::io::Error),
}

impl HubError {
    /// Stable code used when reporting the error to an observer
    pub fn code(&self) -> &'static str {
        match self {
            HubError::NoMatchingCapability => "no-matching-capability",
            HubError::UnboundStreamWrite => "unbound-stream-write",
            HubError::LogWriteFailed { .. } => "log-write-failed",
            HubError::SessionAlreadyRecording(_) => "session-already-recording",
            HubError::InvalidCommand(_) => "invalid-command",
            HubError::CoordinatorError(_) => "coordinator-error",
            HubError::Io(_) => "io",
        }
    }
}

impl std::fmt::Display for HubError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HubError::NoMatchingCapability => {
                write!(f, "no configured capability matches the descriptor")
            }
            HubError::UnboundStreamWrite => {
                write!(f, "stream chunk received with no bound session")
            }
            HubError::LogWriteFailed { session, reason } => {
                write!(f, "log write failed for session '{}': {}", session, reason)
            }
            HubError::SessionAlreadyRecording(session) => {
                write!(f, "session '{}' already has an open log stream", session)
            }
            HubError::InvalidCommand(reason) => write!(f, "invalid command: {}", reason),
            HubError::CoordinatorError(reason) => write!(f, "coordinator error: {}", reason),
            HubError::Io(e) => write!(f, "I/O error: {}", e),
        }
    }
}

impl std::error::Error for HubError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            HubError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for HubError {
    fn from(e: std::io::Error) -> Self {
        HubError::Io(e)
    }
}

impl From<serde_json::Error> for HubError {
    fn from(e: serde_json::Error) -> Self {
        HubError::InvalidCommand(e.to_string())
    }
}
