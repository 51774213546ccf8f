//! Server error types.

use std::fmt;

use masque_core::SessionError;

use crate::command::ParseError;

/// Errors that can occur in the engine.
#[derive(Debug)]
pub enum ServerError {
    /// Session operation rejected.
    ///
    /// Local to the command that caused it. The adapter shows the player the
    /// message for [`SessionError::message_key`] and carries on.
    Session(SessionError),

    /// Configuration error (zero durations, sweep slower than expiry, etc.).
    ///
    /// Fatal at startup. Fix configuration and restart.
    Config(String),

    /// Inbound command could not be understood.
    ///
    /// The line or action id is dropped; other commands are unaffected.
    InvalidCommand(ParseError),

    /// I/O error on the console.
    Io(String),
}

impl ServerError {
    /// Localization key for errors a player can cause.
    pub fn message_key(&self) -> Option<&'static str> {
        match self {
            Self::Session(err) => Some(err.message_key()),
            Self::InvalidCommand(_) => Some("invalidInput"),
            Self::Config(_) | Self::Io(_) => None,
        }
    }
}

impl fmt::Display for ServerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Session(err) => write!(f, "session error: {err}"),
            Self::Config(msg) => write!(f, "configuration error: {msg}"),
            Self::InvalidCommand(err) => write!(f, "invalid command: {err}"),
            Self::Io(msg) => write!(f, "i/o error: {msg}"),
        }
    }
}

impl std::error::Error for ServerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Session(err) => Some(err),
            Self::InvalidCommand(err) => Some(err),
            _ => None,
        }
    }
}

impl From<SessionError> for ServerError {
    fn from(err: SessionError) -> Self {
        Self::Session(err)
    }
}

impl From<ParseError> for ServerError {
    fn from(err: ParseError) -> Self {
        Self::InvalidCommand(err)
    }
}

impl From<std::io::Error> for ServerError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}
