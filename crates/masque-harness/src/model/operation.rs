//! Operations for model-based testing.
//!
//! Operations represent everything players and time can do to one room. They
//! are generated randomly by proptest or cargo-fuzz and applied to a
//! [`SessionWorld`](super::SessionWorld).

use arbitrary::Arbitrary;
use masque_core::PlayerId;

/// Seat index (mapped onto a small player id range to keep collisions likely).
pub type Seat = u8;

/// Number of distinct seats. Seat 0 is always the host.
pub const SEATS: u8 = 6;

/// Map a seat onto a player id.
pub fn seat_player(seat: Seat) -> PlayerId {
    PlayerId::from(seat % SEATS) + 1
}

/// Operations that can be applied to a session.
///
/// Each is small and composable so the generator can explore interesting
/// interleavings. The bulk operations (`ReadyEveryone`, `NameEveryTarget`)
/// exist so random sequences actually reach the later phases.
#[derive(Debug, Clone, Arbitrary)]
pub enum Operation {
    /// Host opens the room (no-op error if already open).
    Create,

    /// Player joins the lobby.
    Join {
        /// Joining seat
        seat: Seat,
    },

    /// Player leaves.
    Leave {
        /// Leaving seat
        seat: Seat,
    },

    /// Player toggles readiness.
    SetReady {
        /// Acting seat
        seat: Seat,
        /// New readiness
        ready: bool,
    },

    /// Every member readies up (errors ignored).
    ReadyEveryone,

    /// Player toggles quit vote.
    SetQuitVote {
        /// Acting seat
        seat: Seat,
        /// New vote
        vote: bool,
    },

    /// Seat submits settings.
    UpdateSettings {
        /// Acting seat
        seat: Seat,
        /// Raw max guesses (may be negative)
        max_guesses: i8,
        /// Raw time limit (may be negative)
        time_limit: i8,
    },

    /// Seat starts the game.
    Start {
        /// Acting seat
        seat: Seat,
    },

    /// Player names their target.
    RecordIdentity {
        /// Acting seat
        seat: Seat,
        /// Identity length (0 and over-long values exercise validation)
        len: u8,
    },

    /// Every member names their target (errors ignored).
    NameEveryTarget,

    /// Player records a note.
    AddNote {
        /// Acting seat
        seat: Seat,
    },

    /// Seat cancels the session.
    Cancel {
        /// Acting seat
        seat: Seat,
    },

    /// Advance virtual time.
    Advance {
        /// Seconds to advance
        secs: u8,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seats_map_into_small_range() {
        assert_eq!(seat_player(0), 1);
        assert_eq!(seat_player(SEATS), 1);
        assert_eq!(seat_player(255), PlayerId::from(255 % SEATS) + 1);
    }
}
