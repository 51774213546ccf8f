//! Masque session engine core.
//!
//! Sans-IO state machines for a hidden-identity party game. Players gather in
//! a room, the host configures and starts a game, every player is secretly
//! assigned a target (nobody gets themself) and play proceeds in turns while
//! the session enforces readiness, timeouts and a majority vote to quit.
//!
//! # Architecture
//!
//! Nothing in this crate performs I/O. Operations take the current time and
//! return actions describing what the runtime should do next (re-render,
//! schedule or cancel a timer, close the session). Time and randomness come
//! from an [`Environment`], so the same code runs against the system clock in
//! production and a virtual clock with a seeded RNG in simulation.
//!
//! # Components
//!
//! - [`assignment`]: derangement target assignment
//! - [`player`]: per-session roster with cached counters
//! - [`timers`]: handle-addressed single-shot timer slots
//! - [`session`]: the lobby and game state machine
//! - [`error`]: the error type shared by all of the above

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod assignment;
pub mod env;
pub mod error;
pub mod player;
pub mod session;
pub mod timers;

pub use assignment::{Assignment, MAX_SHUFFLE_ATTEMPTS, assign_targets, is_derangement};
pub use env::{EnvRng, Environment, Timestamp};
pub use error::SessionError;
pub use player::{Note, Player, PlayerRegistry, quit_quorum};
pub use session::{
    CancelReason, GamePhase, LobbyStatus, Session, SessionAction, SessionConfig, SessionSnapshot,
    SessionState, Settings, SettingsUpdate,
};
pub use timers::{HandleAllocator, SessionTimers, TimerHandle, TimerKind};

/// Opaque player identifier assigned by the chat platform.
pub type PlayerId = u64;

/// Opaque room identifier; at most one active session per room.
pub type RoomId = u64;
