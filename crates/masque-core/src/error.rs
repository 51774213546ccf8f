//! Error types for the session engine core.
//!
//! Every failure an adapter can trigger is a local, recoverable value of
//! [`SessionError`]. Nothing here is fatal to the process; the only
//! session-ending conditions (quit quorum, host leaving, timeout) are state
//! transitions, not errors.

use thiserror::Error;

use crate::{PlayerId, RoomId, session::SessionState};

/// Errors returned by registry, timer and state machine operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// Player is not a member of the session
    #[error("player {0} is not in this game")]
    PlayerNotFound(PlayerId),

    /// No active session is bound to the room
    #[error("no active session in room {0}")]
    SessionNotFound(RoomId),

    /// Player registry already holds this player
    #[error("player {0} is already present")]
    AlreadyPresent(PlayerId),

    /// Player tried to join a session they are already in
    #[error("player {0} is already in this game")]
    AlreadyInGame(PlayerId),

    /// Non-host attempted a host-only action
    #[error("player {player} is not the host")]
    Unauthorized {
        /// Player who attempted the action
        player: PlayerId,
    },

    /// Start attempted without full readiness or with too few players
    #[error("not ready: {ready} of {total} players ready")]
    NotReady {
        /// Players currently ready
        ready: usize,
        /// Players in the session
        total: usize,
    },

    /// A submitted setting is out of range
    #[error("invalid setting {field}: {reason}")]
    InvalidSetting {
        /// Setting that was rejected
        field: &'static str,
        /// Why it was rejected
        reason: String,
    },

    /// Note recorded by someone other than the player whose turn it is
    #[error("player {player} is not the current player")]
    NotCurrentPlayer {
        /// Player who attempted the action
        player: PlayerId,
        /// Player whose turn it is, if any
        current: Option<PlayerId>,
    },

    /// Lobby deadline already elapsed
    #[error("lobby has expired")]
    Expired,

    /// Target assignment needs at least two players
    #[error("insufficient players: need at least 2, have {0}")]
    InsufficientPlayers(usize),

    /// Room already has a session that has not finished
    #[error("room {0} already has an active session")]
    DuplicateActiveSession(RoomId),

    /// Operation is not valid in the current state
    #[error("cannot {operation} in state {state:?}")]
    InvalidState {
        /// State when the operation was attempted
        state: SessionState,
        /// Operation that was attempted
        operation: &'static str,
    },

    /// Player signalled readiness before naming their target
    #[error("player {player} has not recorded an identity for their target")]
    IdentityMissing {
        /// Player who tried to ready up
        player: PlayerId,
    },

    /// Free text exceeds the configured limit
    #[error("{field} is longer than {max} characters")]
    TextTooLong {
        /// Field that was too long
        field: &'static str,
        /// Configured limit in characters
        max: usize,
    },

    /// Free text is empty after trimming
    #[error("{field} must not be empty")]
    EmptyText {
        /// Field that was empty
        field: &'static str,
    },
}

impl SessionError {
    /// Stable key the adapter uses to look up a localized message.
    ///
    /// Keys are part of the adapter contract and must not change once
    /// translations exist for them.
    pub fn message_key(&self) -> &'static str {
        match self {
            Self::PlayerNotFound(_) => "notInGame",
            Self::SessionNotFound(_) => "noGame",
            Self::AlreadyPresent(_) | Self::AlreadyInGame(_) => "alreadyInGame",
            Self::Unauthorized { .. } => "notHost",
            Self::NotReady { .. } => "notReady",
            Self::InvalidSetting { .. } | Self::EmptyText { .. } => "invalidInput",
            Self::NotCurrentPlayer { .. } => "notYourTurn",
            Self::Expired => "expired",
            Self::InsufficientPlayers(_) => "notEnoughPlayers",
            Self::DuplicateActiveSession(_) => "gameOngoing",
            Self::InvalidState { .. } => "wrongPhase",
            Self::IdentityMissing { .. } => "identityMissing",
            Self::TextTooLong { .. } => "textTooLong",
        }
    }

    /// Returns true if the caller lacked permission rather than sending a bad
    /// request.
    pub fn is_permission_denied(&self) -> bool {
        matches!(self, Self::Unauthorized { .. } | Self::NotCurrentPlayer { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_keys_match_adapter_table() {
        assert_eq!(SessionError::Unauthorized { player: 1 }.message_key(), "notHost");
        assert_eq!(SessionError::SessionNotFound(9).message_key(), "noGame");
        assert_eq!(SessionError::DuplicateActiveSession(9).message_key(), "gameOngoing");
        assert_eq!(
            SessionError::InvalidSetting { field: "timeLimit", reason: "negative".to_string() }
                .message_key(),
            "invalidInput"
        );
    }

    #[test]
    fn permission_errors_are_classified() {
        assert!(SessionError::Unauthorized { player: 3 }.is_permission_denied());
        assert!(
            SessionError::NotCurrentPlayer { player: 3, current: Some(4) }.is_permission_denied()
        );
        assert!(!SessionError::Expired.is_permission_denied());
        assert!(!SessionError::NotReady { ready: 1, total: 2 }.is_permission_denied());
    }

    #[test]
    fn display_includes_context() {
        let err = SessionError::NotReady { ready: 2, total: 3 };
        assert_eq!(err.to_string(), "not ready: 2 of 3 players ready");

        let err = SessionError::InvalidState {
            state: SessionState::Waiting,
            operation: "add_note",
        };
        assert_eq!(err.to_string(), "cannot add_note in state Waiting");

        let err = SessionError::TextTooLong { field: "identity", max: 32 };
        assert_eq!(err.to_string(), "identity is longer than 32 characters");
    }
}
