//! Error types and handling
//!
//! This module provides the error types used throughout the Genie engine.
//! All errors implement the `GenieErrorExt` trait which provides user-facing
//! hints and indicates whether errors are recoverable.
//!
//! # Security
//!
//! Error hints never include API keys, file paths or raw provider output.
//! The `Display` text may carry detail and is meant for logs.

use thiserror::Error;

/// Trait for Genie error extensions
///
/// Provides a hint that is safe to show to the person chatting with the
/// assistant, plus whether retrying can help.
pub trait GenieErrorExt {
    /// Returns a user-friendly hint for the error
    fn user_hint(&self) -> &str;

    /// Returns whether the error is recoverable
    ///
    /// Recoverable errors can be retried or worked around. Non-recoverable
    /// errors need the configuration or environment fixed first.
    fn is_recoverable(&self) -> bool;
}

/// Main engine error type
///
/// # Error Categories
///
/// - **Configuration**: invalid or missing configuration
/// - **Persistence**: the meetings file could not be read or written
/// - **Meetings**: a record that breaks the meeting invariants
/// - **Backends**: LLM, corpus or web search failures
/// - **Sessions**: unknown conversation thread
///
/// # Examples
///
/// ```
/// use sdk::errors::{EngineError, GenieErrorExt};
///
/// let error = EngineError::Persistence("disk full".to_string());
/// println!("Hint: {}", error.user_hint());
/// assert!(error.is_recoverable());
///
/// let fatal = EngineError::Config("unknown provider".to_string());
/// assert!(!fatal.is_recoverable());
/// ```
#[derive(Debug, Error)]
pub enum EngineError {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    // Store errors
    #[error("Persistence failure: {0}")]
    Persistence(String),

    #[error("Invalid meeting: {0}")]
    InvalidMeeting(String),

    #[error("Duplicate meeting id: {0}")]
    DuplicateMeeting(String),

    #[error("Meeting not found: {0}")]
    MeetingNotFound(String),

    // Backend errors
    #[error("Backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("Rate limited by {0}")]
    RateLimited(String),

    #[error("Backend call timed out: {0}")]
    Timeout(String),

    // Session errors
    #[error("Unknown session: {0}")]
    UnknownSession(String),

    // Keyring errors
    #[error("Keyring error: {0}")]
    KeyringError(String),

    // Generic IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl GenieErrorExt for EngineError {
    fn user_hint(&self) -> &str {
        match self {
            Self::Config(_) => "Check your config.toml file for errors",

            Self::Persistence(_) => "Couldn't save your calendar. Please try again",
            Self::InvalidMeeting(_) => "That meeting has an invalid time range",
            Self::DuplicateMeeting(_) => "A meeting with that id already exists",
            Self::MeetingNotFound(_) => "That meeting is no longer on the calendar",

            Self::BackendUnavailable(_) => "A lookup service is unavailable right now",
            Self::RateLimited(_) => "Too many requests. Please wait before trying again",
            Self::Timeout(_) => "A lookup took too long to respond. Try again",

            Self::UnknownSession(_) => "That conversation has ended. Start a new one",

            Self::KeyringError(_) => "Failed to access secure storage. Check system keychain",

            Self::Io(_) => "File system operation failed",
        }
    }

    fn is_recoverable(&self) -> bool {
        match self {
            // Non-recoverable errors
            Self::Config(_) | Self::InvalidMeeting(_) | Self::KeyringError(_) => false,

            // All other errors are potentially recoverable
            _ => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hints_do_not_leak_detail() {
        let error = EngineError::Persistence("/home/me/.genie/meetings.json: EACCES".to_string());
        assert!(!error.user_hint().contains(".genie"));
        assert!(error.to_string().contains("EACCES"));
    }

    #[test]
    fn test_recoverability() {
        assert!(EngineError::Timeout("web".into()).is_recoverable());
        assert!(EngineError::UnknownSession("meeting_x".into()).is_recoverable());
        assert!(!EngineError::Config("bad".into()).is_recoverable());
    }

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let error: EngineError = io.into();
        assert!(matches!(error, EngineError::Io(_)));
    }
}
