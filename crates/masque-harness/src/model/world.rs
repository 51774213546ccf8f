//! Session world - applies operations to a simulated engine.
//!
//! The world owns one room on a [`SimEngine`] and checks, after every
//! operation, that the session snapshot satisfies the standard invariants.
//! Membership operations are additionally predicted from the pre-state so
//! an accepted join or leave that should have been rejected (or the other
//! way round) is caught.

use std::time::Duration;

use masque_core::{PlayerId, RoomId, SessionSnapshot, SessionState, SettingsUpdate};
use masque_server::{Command, EngineConfig, ServerError};

use super::operation::{Operation, seat_player};
use crate::{
    invariants::{InvariantRegistry, Violation},
    sim_driver::SimEngine,
};

/// Outcome of applying one operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationResult {
    /// The engine accepted the operation
    Applied,
    /// The engine rejected it with this message key
    Rejected(&'static str),
}

/// A single room driven by random operations.
pub struct SessionWorld {
    engine: SimEngine,
    invariants: InvariantRegistry,
    steps: usize,
}

impl SessionWorld {
    /// Room every operation targets.
    pub const ROOM: RoomId = 1;

    /// World with the default engine configuration and no session yet.
    ///
    /// # Errors
    ///
    /// - `ServerError::Config` if the default configuration is invalid
    pub fn new(seed: u64) -> Result<Self, ServerError> {
        Ok(Self {
            engine: SimEngine::new(seed, EngineConfig::default())?,
            invariants: InvariantRegistry::standard(),
            steps: 0,
        })
    }

    /// The host of every session this world creates.
    pub fn host() -> PlayerId {
        seat_player(0)
    }

    /// Underlying engine.
    pub fn engine(&self) -> &SimEngine {
        &self.engine
    }

    /// Current snapshot. `None` when no session is open.
    pub fn snapshot(&self) -> Option<SessionSnapshot> {
        self.engine.snapshot(Self::ROOM).ok()
    }

    /// Operations applied so far.
    pub fn steps(&self) -> usize {
        self.steps
    }

    /// Apply an operation.
    ///
    /// Returns `Err` with a description if the engine's answer contradicts
    /// the membership prediction or the engine fails internally.
    pub fn apply(&mut self, op: &Operation) -> Result<OperationResult, String> {
        let before = self.snapshot();
        self.steps += 1;

        match op {
            Operation::Create => self.command(
                Self::host(),
                Command::CreateSession { language: String::new(), gamemode: "classic".to_string() },
            ),
            Operation::Join { seat } => {
                let player = seat_player(*seat);
                let expected = before
                    .as_ref()
                    .is_some_and(|s| s.state == SessionState::Waiting && !is_member(s, player));
                let result = self.command(player, Command::Join);
                expect_outcome("join", player, expected, result)
            },
            Operation::Leave { seat } => {
                let player = seat_player(*seat);
                let expected = before.as_ref().is_some_and(|s| is_member(s, player));
                let result = self.command(player, Command::Leave);
                expect_outcome("leave", player, expected, result)
            },
            Operation::SetReady { seat, ready } => {
                self.command(seat_player(*seat), Command::SetReady(*ready))
            },
            Operation::ReadyEveryone => {
                for player in members(before.as_ref()) {
                    self.command(player, Command::SetReady(true))?;
                }
                Ok(OperationResult::Applied)
            },
            Operation::SetQuitVote { seat, vote } => {
                self.command(seat_player(*seat), Command::SetQuitVote(*vote))
            },
            Operation::UpdateSettings { seat, max_guesses, time_limit } => self.command(
                seat_player(*seat),
                Command::UpdateSettings(SettingsUpdate {
                    max_guesses: i64::from(*max_guesses),
                    time_limit: i64::from(*time_limit),
                    category: None,
                }),
            ),
            Operation::Start { seat } => self.command(seat_player(*seat), Command::Start),
            Operation::RecordIdentity { seat, len } => self.command(
                seat_player(*seat),
                Command::RecordIdentity("x".repeat(usize::from(*len % 40))),
            ),
            Operation::NameEveryTarget => {
                for player in members(before.as_ref()) {
                    self.command(player, Command::RecordIdentity(format!("Figure {player}")))?;
                }
                Ok(OperationResult::Applied)
            },
            Operation::AddNote { seat } => self.command(
                seat_player(*seat),
                Command::AddNote { question: format!("Question {}", self.steps), answer: "Yes".to_string() },
            ),
            Operation::Cancel { seat } => self.command(seat_player(*seat), Command::Cancel),
            Operation::Advance { secs } => {
                self.engine.advance(Duration::from_secs(u64::from(*secs))).map_err(|e| e.to_string())?;
                Ok(OperationResult::Applied)
            },
        }
    }

    /// Check the standard invariants against the current session, if any.
    pub fn check(&self) -> Result<(), Vec<Violation>> {
        match self.snapshot() {
            Some(snapshot) => self.invariants.check_all(&snapshot),
            None => Ok(()),
        }
    }

    /// Run a command; session-level rejections become
    /// [`OperationResult::Rejected`].
    fn command(&mut self, player: PlayerId, command: Command) -> Result<OperationResult, String> {
        match self.engine.command(Self::ROOM, player, command) {
            Ok(()) => Ok(OperationResult::Applied),
            Err(ServerError::Session(err)) => Ok(OperationResult::Rejected(err.message_key())),
            Err(other) => Err(other.to_string()),
        }
    }
}

fn is_member(snapshot: &SessionSnapshot, player: PlayerId) -> bool {
    snapshot.players.iter().any(|p| p.id == player)
}

fn members(snapshot: Option<&SessionSnapshot>) -> Vec<PlayerId> {
    snapshot.map(|s| s.players.iter().map(|p| p.id).collect()).unwrap_or_default()
}

fn expect_outcome(
    operation: &str,
    player: PlayerId,
    expected: bool,
    result: Result<OperationResult, String>,
) -> Result<OperationResult, String> {
    let accepted = matches!(result, Ok(OperationResult::Applied));
    if accepted != expected {
        return Err(format!(
            "{operation} by {player}: expected accepted={expected}, got {result:?}"
        ));
    }
    result
}
