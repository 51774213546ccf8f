//! Standard invariant checks.
//!
//! These invariants capture behavioral properties that must always hold.
//! They verify WHAT must be true, not specific test scenarios.

use std::collections::BTreeSet;

use masque_core::{GamePhase, SessionSnapshot, SessionState, quit_quorum};

use super::{Invariant, InvariantKind, InvariantResult, Violation};

fn violation(kind: InvariantKind, message: String) -> InvariantResult {
    Err(Violation { invariant: kind, message })
}

/// Cached counters must equal a scan of the roster.
pub struct CounterCaches;

impl Invariant for CounterCaches {
    fn kind(&self) -> InvariantKind {
        InvariantKind::CounterCaches
    }

    fn check(&self, state: &SessionSnapshot) -> InvariantResult {
        let ready = state.players.iter().filter(|p| p.ready).count();
        let quit = state.players.iter().filter(|p| p.wants_to_quit).count();

        if ready != state.ready_count || quit != state.quit_count {
            return violation(
                self.kind(),
                format!(
                    "room {}: cached ready/quit {}/{} but scan gives {}/{}",
                    state.id, state.ready_count, state.quit_count, ready, quit
                ),
            );
        }
        Ok(())
    }
}

/// Quorum must track the roster size.
pub struct QuitQuorum;

impl Invariant for QuitQuorum {
    fn kind(&self) -> InvariantKind {
        InvariantKind::QuitQuorum
    }

    fn check(&self, state: &SessionSnapshot) -> InvariantResult {
        let expected = quit_quorum(state.players.len());
        if state.needed_to_quit != expected {
            return violation(
                self.kind(),
                format!(
                    "room {}: needed_to_quit {} for {} players, expected {}",
                    state.id,
                    state.needed_to_quit,
                    state.players.len(),
                    expected
                ),
            );
        }
        Ok(())
    }
}

/// While playing, targets form a bijection on the roster with no fixed point.
pub struct TargetDerangement;

impl Invariant for TargetDerangement {
    fn kind(&self) -> InvariantKind {
        InvariantKind::TargetDerangement
    }

    fn check(&self, state: &SessionSnapshot) -> InvariantResult {
        if state.game_phase == GamePhase::None {
            return Ok(());
        }

        let roster: BTreeSet<_> = state.players.iter().map(|p| p.id).collect();
        let mut targeted = BTreeSet::new();

        for player in &state.players {
            let Some(target) = player.target else {
                return violation(self.kind(), format!("room {}: player {} has no target", state.id, player.id));
            };
            if target == player.id {
                return violation(self.kind(), format!("room {}: player {} targets themself", state.id, player.id));
            }
            if !roster.contains(&target) {
                return violation(
                    self.kind(),
                    format!("room {}: player {} targets departed player {}", state.id, player.id, target),
                );
            }
            if !targeted.insert(target) {
                return violation(
                    self.kind(),
                    format!("room {}: player {} is targeted twice", state.id, target),
                );
            }
        }
        Ok(())
    }
}

/// Round order, once assigned, is a permutation of the roster.
pub struct RoundOrderPermutation;

impl Invariant for RoundOrderPermutation {
    fn kind(&self) -> InvariantKind {
        InvariantKind::RoundOrderPermutation
    }

    fn check(&self, state: &SessionSnapshot) -> InvariantResult {
        let Some(order) = &state.round_order else {
            if state.game_phase != GamePhase::None {
                return violation(self.kind(), format!("room {}: playing without a round order", state.id));
            }
            return Ok(());
        };

        let roster: BTreeSet<_> = state.players.iter().map(|p| p.id).collect();
        let ordered: BTreeSet<_> = order.iter().copied().collect();

        if ordered.len() != order.len() || ordered != roster {
            return violation(
                self.kind(),
                format!("room {}: round order {:?} vs roster {:?}", state.id, order, roster),
            );
        }
        Ok(())
    }
}

/// During a round the cursor points at a player.
pub struct RoundCursorInBounds;

impl Invariant for RoundCursorInBounds {
    fn kind(&self) -> InvariantKind {
        InvariantKind::RoundCursorInBounds
    }

    fn check(&self, state: &SessionSnapshot) -> InvariantResult {
        let SessionState::Round { index } = state.state else {
            return Ok(());
        };

        let len = state.round_order.as_ref().map_or(0, Vec::len);
        if index >= len || state.current_player.is_none() {
            return violation(
                self.kind(),
                format!("room {}: round index {} out of {} players", state.id, index, len),
            );
        }
        Ok(())
    }
}

/// Lobby expiry only while waiting, countdown only while assigning, never
/// both.
pub struct TimerExclusivity;

impl Invariant for TimerExclusivity {
    fn kind(&self) -> InvariantKind {
        InvariantKind::TimerExclusivity
    }

    fn check(&self, state: &SessionSnapshot) -> InvariantResult {
        let waiting = state.state == SessionState::Waiting;
        let assigning = state.state == SessionState::Assigning;

        if state.expiry_armed && state.countdown_armed {
            return violation(self.kind(), format!("room {}: both timers armed", state.id));
        }
        if state.expiry_armed != waiting {
            return violation(
                self.kind(),
                format!("room {}: expiry armed={} in state {:?}", state.id, state.expiry_armed, state.state),
            );
        }
        if state.countdown_armed && !assigning {
            return violation(
                self.kind(),
                format!("room {}: countdown armed in state {:?}", state.id, state.state),
            );
        }
        Ok(())
    }
}

/// The roster is never empty and always contains the host.
pub struct HostPresent;

impl Invariant for HostPresent {
    fn kind(&self) -> InvariantKind {
        InvariantKind::HostPresent
    }

    fn check(&self, state: &SessionSnapshot) -> InvariantResult {
        if !state.players.iter().any(|p| p.id == state.host) {
            return violation(
                self.kind(),
                format!("room {}: host {} missing from roster", state.id, state.host),
            );
        }
        Ok(())
    }
}
