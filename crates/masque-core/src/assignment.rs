//! Random target assignment.
//!
//! Produces a derangement of the player list: every player gets exactly one
//! target, every player is exactly one player's target, and nobody targets
//! themself. The permuted sequence doubles as the round order.
//!
//! Rejection sampling over uniform shuffles accepts roughly 1/e of draws, so
//! the expected number of attempts is constant. The attempt budget bounds the
//! loop; once it is exhausted the assignment falls back to a cyclic shift,
//! which is a derangement for every N >= 2.

use rand::{Rng, seq::SliceRandom};

use crate::{PlayerId, error::SessionError};

/// Shuffles attempted before falling back to a cyclic shift.
pub const MAX_SHUFFLE_ATTEMPTS: usize = 1000;

/// Result of a target assignment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assignment {
    /// Permuted player sequence; also the round order.
    pub round_order: Vec<PlayerId>,
    /// `(player, target)` pairs in the input order.
    pub targets: Vec<(PlayerId, PlayerId)>,
}

impl Assignment {
    /// Target assigned to `player`. `None` if the player was not assigned.
    pub fn target_of(&self, player: PlayerId) -> Option<PlayerId> {
        self.targets.iter().find(|(p, _)| *p == player).map(|(_, t)| *t)
    }
}

/// Assigns targets using the default attempt budget.
///
/// `players` must contain distinct ids.
///
/// # Errors
///
/// - `SessionError::InsufficientPlayers` if fewer than two players are given
pub fn assign_targets<R: Rng + ?Sized>(
    players: &[PlayerId],
    rng: &mut R,
) -> Result<Assignment, SessionError> {
    assign_targets_with_budget(players, rng, MAX_SHUFFLE_ATTEMPTS)
}

/// Assigns targets, shuffling at most `max_attempts` times.
pub fn assign_targets_with_budget<R: Rng + ?Sized>(
    players: &[PlayerId],
    rng: &mut R,
    max_attempts: usize,
) -> Result<Assignment, SessionError> {
    let n = players.len();
    if n < 2 {
        return Err(SessionError::InsufficientPlayers(n));
    }

    let permuted = if n == 2 {
        vec![players[1], players[0]]
    } else {
        shuffle_derangement(players, rng, max_attempts)
            .unwrap_or_else(|| cyclic_shift(players))
    };

    let targets = players.iter().copied().zip(permuted.iter().copied()).collect();

    Ok(Assignment { round_order: permuted, targets })
}

fn shuffle_derangement<R: Rng + ?Sized>(
    players: &[PlayerId],
    rng: &mut R,
    max_attempts: usize,
) -> Option<Vec<PlayerId>> {
    let mut candidate = players.to_vec();
    for attempt in 0..max_attempts {
        candidate.shuffle(rng);
        if is_derangement(players, &candidate) {
            tracing::trace!(attempt, "derangement accepted");
            return Some(candidate);
        }
    }

    tracing::debug!(max_attempts, players = players.len(), "shuffle budget exhausted");
    None
}

/// Every element moved one position to the left, wrapping around.
fn cyclic_shift(players: &[PlayerId]) -> Vec<PlayerId> {
    let mut shifted = players.to_vec();
    shifted.rotate_left(1);
    shifted
}

/// True if no position of `permuted` holds the same id as `original`.
pub fn is_derangement(original: &[PlayerId], permuted: &[PlayerId]) -> bool {
    original.len() == permuted.len() && original.iter().zip(permuted).all(|(a, b)| a != b)
}
