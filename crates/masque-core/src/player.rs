//! Per-session player registry.
//!
//! Stores every player's mutable state and keeps the counters the state
//! machine gates on (`ready_count`, `quit_count`, `needed_to_quit`). The
//! counters are adjusted by deltas, never recomputed by scanning, and must
//! always equal the scan result.
//!
//! The registry also owns the round order once targets are assigned, so a
//! departing player is removed from the roster, the round order and the
//! target graph in one call.

use std::collections::HashMap;

use serde::Serialize;

use crate::{PlayerId, error::SessionError};

/// A question/answer pair a player wrote down about their own identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Note {
    /// Question asked during the round
    pub question: String,
    /// Answer the group gave
    pub answer: String,
}

/// Mutable per-player state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Player {
    /// Player identifier
    pub id: PlayerId,
    /// Lobby readiness, or "identity recorded" during assignment
    pub ready: bool,
    /// Vote to end the game early
    pub wants_to_quit: bool,
    /// Identity written for this player by whoever targets them
    pub identity: Option<String>,
    /// Player this one writes an identity for
    pub target: Option<PlayerId>,
    /// Private notes, oldest first
    pub notes: Vec<Note>,
}

impl Player {
    /// Player with every flag cleared.
    pub fn new(id: PlayerId) -> Self {
        Self { id, ready: false, wants_to_quit: false, identity: None, target: None, notes: Vec::new() }
    }
}

/// Minimum concurrent quit votes that end a game of `player_count` players.
pub fn quit_quorum(player_count: usize) -> usize {
    player_count / 2 + 1
}

/// Registry of the players in one session.
#[derive(Debug, Clone)]
pub struct PlayerRegistry {
    /// Player ID → state
    players: HashMap<PlayerId, Player>,
    /// Join order, used for lobby display and as assignment input
    join_order: Vec<PlayerId>,
    /// Round order, fixed at assignment time. `None` before the game starts
    round_order: Option<Vec<PlayerId>>,
    /// Cached `count(ready)`
    ready_count: usize,
    /// Cached `count(wants_to_quit)`
    quit_count: usize,
    /// Cached `quit_quorum(len)`
    needed_to_quit: usize,
}

impl Default for PlayerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl PlayerRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            players: HashMap::new(),
            join_order: Vec::new(),
            round_order: None,
            ready_count: 0,
            quit_count: 0,
            needed_to_quit: quit_quorum(0),
        }
    }

    /// Create a registry holding one player.
    pub fn with_player(id: PlayerId) -> Self {
        let mut registry = Self::new();
        registry.players.insert(id, Player::new(id));
        registry.join_order.push(id);
        registry.needed_to_quit = quit_quorum(1);
        registry
    }

    /// Insert a player with default state.
    ///
    /// # Errors
    ///
    /// - `SessionError::AlreadyPresent` if the player is already a member
    pub fn add(&mut self, id: PlayerId) -> Result<(), SessionError> {
        if self.players.contains_key(&id) {
            return Err(SessionError::AlreadyPresent(id));
        }

        self.players.insert(id, Player::new(id));
        self.join_order.push(id);
        self.needed_to_quit = quit_quorum(self.players.len());
        Ok(())
    }

    /// Remove a player and return their final state.
    ///
    /// Drops the id from the round order, keeps the counters consistent and
    /// hands the departing player's target to whoever targeted them. If that
    /// would make someone their own target (a two-player cycle), they are
    /// spliced into another cycle instead.
    ///
    /// # Errors
    ///
    /// - `SessionError::PlayerNotFound` if the player is not a member
    pub fn remove(&mut self, id: PlayerId) -> Result<Player, SessionError> {
        let removed = self.players.remove(&id).ok_or(SessionError::PlayerNotFound(id))?;

        if removed.ready {
            self.ready_count -= 1;
        }
        if removed.wants_to_quit {
            self.quit_count -= 1;
        }

        self.join_order.retain(|p| *p != id);
        if let Some(order) = self.round_order.as_mut() {
            order.retain(|p| *p != id);
        }

        let mut orphan = None;
        for player in self.players.values_mut() {
            if player.target == Some(id) {
                match removed.target {
                    Some(target) if target != player.id => player.target = Some(target),
                    _ => {
                        player.target = None;
                        orphan = Some(player.id);
                    },
                }
            }
        }
        if let Some(orphan) = orphan {
            self.splice_into_cycle(orphan);
        }

        self.needed_to_quit = quit_quorum(self.players.len());
        Ok(removed)
    }

    /// Give an untargeted, target-less player a place in the target graph.
    ///
    /// Picks the first other player `q` (round order) with a target `r` and
    /// rewires `q -> orphan -> r`. Neither edge can be a self-target because
    /// nobody targets the orphan.
    fn splice_into_cycle(&mut self, orphan: PlayerId) {
        let order = self.round_order.as_deref().unwrap_or(self.join_order.as_slice());
        let Some((previous, next)) = order
            .iter()
            .filter(|p| **p != orphan)
            .find_map(|p| self.players.get(p).and_then(|q| q.target.map(|t| (q.id, t))))
        else {
            return;
        };

        if let Some(q) = self.players.get_mut(&previous) {
            q.target = Some(orphan);
        }
        if let Some(o) = self.players.get_mut(&orphan) {
            o.target = Some(next);
        }
    }

    /// Set a player's ready flag. Returns whether the flag changed.
    ///
    /// # Errors
    ///
    /// - `SessionError::PlayerNotFound` if the player is not a member
    pub fn set_ready(&mut self, id: PlayerId, ready: bool) -> Result<bool, SessionError> {
        let player = self.players.get_mut(&id).ok_or(SessionError::PlayerNotFound(id))?;
        if player.ready == ready {
            return Ok(false);
        }

        player.ready = ready;
        if ready {
            self.ready_count += 1;
        } else {
            self.ready_count -= 1;
        }
        Ok(true)
    }

    /// Set a player's quit vote. Returns whether the vote changed.
    ///
    /// # Errors
    ///
    /// - `SessionError::PlayerNotFound` if the player is not a member
    pub fn set_quit_vote(&mut self, id: PlayerId, wants_to_quit: bool) -> Result<bool, SessionError> {
        let player = self.players.get_mut(&id).ok_or(SessionError::PlayerNotFound(id))?;
        if player.wants_to_quit == wants_to_quit {
            return Ok(false);
        }

        player.wants_to_quit = wants_to_quit;
        if wants_to_quit {
            self.quit_count += 1;
        } else {
            self.quit_count -= 1;
        }
        Ok(true)
    }

    /// Clear every ready flag.
    pub fn reset_ready(&mut self) {
        for player in self.players.values_mut() {
            player.ready = false;
        }
        self.ready_count = 0;
    }

    /// Fix the round order and each player's target.
    ///
    /// `targets` holds `(player, target)` pairs; unknown players are skipped.
    pub fn apply_assignment(&mut self, round_order: Vec<PlayerId>, targets: &[(PlayerId, PlayerId)]) {
        for (player, target) in targets {
            if let Some(p) = self.players.get_mut(player) {
                p.target = Some(*target);
            }
        }
        self.round_order = Some(round_order);
    }

    /// Write the identity of `id`'s target.
    ///
    /// Returns the target whose identity was written.
    ///
    /// # Errors
    ///
    /// - `SessionError::PlayerNotFound` if the player is not a member or has
    ///   no target
    pub fn record_identity(&mut self, id: PlayerId, identity: String) -> Result<PlayerId, SessionError> {
        let target = self
            .players
            .get(&id)
            .ok_or(SessionError::PlayerNotFound(id))?
            .target
            .ok_or(SessionError::PlayerNotFound(id))?;

        let target_player =
            self.players.get_mut(&target).ok_or(SessionError::PlayerNotFound(target))?;
        target_player.identity = Some(identity);
        Ok(target)
    }

    /// Append a note to a player's private list.
    ///
    /// # Errors
    ///
    /// - `SessionError::PlayerNotFound` if the player is not a member
    pub fn push_note(&mut self, id: PlayerId, note: Note) -> Result<(), SessionError> {
        let player = self.players.get_mut(&id).ok_or(SessionError::PlayerNotFound(id))?;
        player.notes.push(note);
        Ok(())
    }

    /// True if `id`'s target already has an identity.
    pub fn has_named_target(&self, id: PlayerId) -> bool {
        self.players
            .get(&id)
            .and_then(|p| p.target)
            .and_then(|t| self.players.get(&t))
            .is_some_and(|t| t.identity.is_some())
    }

    /// Player state. `None` if not a member.
    pub fn get(&self, id: PlayerId) -> Option<&Player> {
        self.players.get(&id)
    }

    /// Check membership.
    pub fn contains(&self, id: PlayerId) -> bool {
        self.players.contains_key(&id)
    }

    /// Number of players.
    pub fn len(&self) -> usize {
        self.players.len()
    }

    /// True if the registry holds no players.
    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    /// Players currently ready.
    pub fn ready_count(&self) -> usize {
        self.ready_count
    }

    /// Players currently voting to quit.
    pub fn quit_count(&self) -> usize {
        self.quit_count
    }

    /// Quit votes required to end the game.
    pub fn needed_to_quit(&self) -> usize {
        self.needed_to_quit
    }

    /// True if every player is ready. Vacuously false for an empty roster.
    pub fn all_ready(&self) -> bool {
        !self.players.is_empty() && self.ready_count == self.players.len()
    }

    /// True if the quit votes reach the quorum.
    pub fn quorum_reached(&self) -> bool {
        self.quit_count >= self.needed_to_quit
    }

    /// Player ids in join order.
    pub fn join_order(&self) -> &[PlayerId] {
        &self.join_order
    }

    /// Round order. `None` before targets are assigned.
    pub fn round_order(&self) -> Option<&[PlayerId]> {
        self.round_order.as_deref()
    }

    /// Position of `id` in the round order.
    pub fn round_position(&self, id: PlayerId) -> Option<usize> {
        self.round_order.as_ref().and_then(|order| order.iter().position(|p| *p == id))
    }

    /// Players in display order: round order once assigned, join order before.
    pub fn iter(&self) -> impl Iterator<Item = &Player> + '_ {
        self.round_order
            .as_deref()
            .unwrap_or(self.join_order.as_slice())
            .iter()
            .filter_map(|id| self.players.get(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry_with(ids: &[PlayerId]) -> PlayerRegistry {
        let mut registry = PlayerRegistry::new();
        for id in ids {
            registry.add(*id).unwrap();
        }
        registry
    }

    #[test]
    fn add_updates_quorum() {
        let mut registry = PlayerRegistry::new();
        assert_eq!(registry.needed_to_quit(), 1);

        registry.add(1).unwrap();
        assert_eq!(registry.needed_to_quit(), 1);

        registry.add(2).unwrap();
        assert_eq!(registry.needed_to_quit(), 2);

        registry.add(3).unwrap();
        registry.add(4).unwrap();
        assert_eq!(registry.needed_to_quit(), 3);
    }

    #[test]
    fn add_duplicate_fails() {
        let mut registry = registry_with(&[1]);

        assert_eq!(registry.add(1), Err(SessionError::AlreadyPresent(1)));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn remove_unknown_fails() {
        let mut registry = registry_with(&[1]);

        assert_eq!(registry.remove(2), Err(SessionError::PlayerNotFound(2)));
    }

    #[test]
    fn set_ready_twice_counts_once() {
        let mut registry = registry_with(&[1, 2]);

        assert!(registry.set_ready(1, true).unwrap());
        assert!(!registry.set_ready(1, true).unwrap());
        assert_eq!(registry.ready_count(), 1);

        assert!(registry.set_ready(1, false).unwrap());
        assert!(!registry.set_ready(1, false).unwrap());
        assert_eq!(registry.ready_count(), 0);
    }

    #[test]
    fn quit_vote_mirrors_ready() {
        let mut registry = registry_with(&[1, 2, 3]);

        registry.set_quit_vote(1, true).unwrap();
        registry.set_quit_vote(1, true).unwrap();
        assert_eq!(registry.quit_count(), 1);
        assert!(!registry.quorum_reached());

        registry.set_quit_vote(2, true).unwrap();
        assert!(registry.quorum_reached());
    }

    #[test]
    fn remove_adjusts_counters() {
        let mut registry = registry_with(&[1, 2, 3]);
        registry.set_ready(2, true).unwrap();
        registry.set_quit_vote(2, true).unwrap();

        let removed = registry.remove(2).unwrap();

        assert!(removed.ready);
        assert_eq!(registry.ready_count(), 0);
        assert_eq!(registry.quit_count(), 0);
        assert_eq!(registry.needed_to_quit(), 2);
        assert_eq!(registry.join_order(), &[1, 3]);
    }

    #[test]
    fn remove_preserves_round_order_and_retargets() {
        let mut registry = registry_with(&[1, 2, 3, 4]);
        registry.apply_assignment(vec![2, 3, 4, 1], &[(1, 2), (2, 3), (3, 4), (4, 1)]);

        registry.remove(3).unwrap();

        assert_eq!(registry.round_order(), Some(&[2, 4, 1][..]));
        // 2 targeted 3, so 2 inherits 3's target
        assert_eq!(registry.get(2).unwrap().target, Some(4));
    }

    #[test]
    fn remove_never_creates_self_target() {
        let mut registry = registry_with(&[1, 2, 3, 4]);
        registry.apply_assignment(vec![2, 1, 4, 3], &[(1, 2), (2, 1), (3, 4), (4, 3)]);

        registry.remove(2).unwrap();

        // 1 and 2 targeted each other, so 1 is spliced into the 3/4 cycle
        assert_eq!(registry.round_order(), Some(&[1, 4, 3][..]));
        assert_eq!(registry.get(4).unwrap().target, Some(1));
        assert_eq!(registry.get(1).unwrap().target, Some(3));
        assert_eq!(registry.get(3).unwrap().target, Some(4));
    }

    #[test]
    fn identity_is_written_on_target() {
        let mut registry = registry_with(&[1, 2]);
        registry.apply_assignment(vec![2, 1], &[(1, 2), (2, 1)]);

        assert!(!registry.has_named_target(1));
        let target = registry.record_identity(1, "Ada Lovelace".to_string()).unwrap();

        assert_eq!(target, 2);
        assert_eq!(registry.get(2).unwrap().identity.as_deref(), Some("Ada Lovelace"));
        assert!(registry.has_named_target(1));
        assert!(!registry.has_named_target(2));
    }

    #[test]
    fn iter_follows_round_order_once_assigned() {
        let mut registry = registry_with(&[1, 2, 3]);
        let ids: Vec<_> = registry.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);

        registry.apply_assignment(vec![3, 1, 2], &[(1, 3), (2, 1), (3, 2)]);
        let ids: Vec<_> = registry.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![3, 1, 2]);
    }

    #[test]
    fn reset_ready_clears_all() {
        let mut registry = registry_with(&[1, 2]);
        registry.set_ready(1, true).unwrap();
        registry.set_ready(2, true).unwrap();
        assert!(registry.all_ready());

        registry.reset_ready();

        assert_eq!(registry.ready_count(), 0);
        assert!(registry.iter().all(|p| !p.ready));
    }
}
