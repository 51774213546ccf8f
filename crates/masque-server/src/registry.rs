//! Process-wide session registry.
//!
//! Maps room ids to sessions. Each session sits behind its own mutex so
//! commands for different rooms never contend; the map itself sits behind a
//! read-write lock that is only ever held for map operations. A session lock
//! is never acquired while the map lock is held.
//!
//! A room maps to at most one session, and a session stays in the map exactly
//! as long as it is active: whoever finishes a session removes it.

#![allow(clippy::disallowed_types, reason = "Synchronous in-memory operations only")]
#![allow(clippy::expect_used, reason = "Lock poisoning should cause a panic")]

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard, RwLock},
    time::{Duration, Instant},
};

use masque_core::{
    CancelReason, HandleAllocator, PlayerId, RoomId, Session, SessionAction, SessionConfig,
    SessionError, SessionSnapshot, Timestamp,
};

/// Shared handle to one session.
pub type SharedSession<I> = Arc<Mutex<Session<I>>>;

/// Lock a session.
pub fn lock_session<I>(session: &SharedSession<I>) -> MutexGuard<'_, Session<I>> {
    session.lock().expect("session mutex poisoned")
}

/// What a sweep did to one session.
#[derive(Debug, Clone)]
pub struct SweepOutcome<I> {
    /// Room of the affected session
    pub room_id: RoomId,
    /// Actions the session returned
    pub actions: Vec<SessionAction<I>>,
    /// Session state after the sweep
    pub snapshot: SessionSnapshot,
}

/// Registry of active sessions keyed by room.
///
/// Every session draws timer handles from one shared allocator, so a handle
/// outlives the session it was issued to without ever matching another.
pub struct SessionRegistry<I = Instant> {
    sessions: RwLock<HashMap<RoomId, SharedSession<I>>>,
    handles: HandleAllocator,
}

impl<I: Timestamp> Default for SessionRegistry<I> {
    fn default() -> Self {
        Self::new()
    }
}

impl<I: Timestamp> SessionRegistry<I> {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self { sessions: RwLock::new(HashMap::new()), handles: HandleAllocator::new() }
    }

    /// Create a session for `room_id` hosted by `host`.
    ///
    /// # Errors
    ///
    /// - `SessionError::DuplicateActiveSession` if the room already has one
    pub fn create(
        &self,
        room_id: RoomId,
        host: PlayerId,
        language: &str,
        gamemode: &str,
        now: I,
        config: SessionConfig,
    ) -> Result<SharedSession<I>, SessionError> {
        let mut sessions = self.sessions.write().expect("registry lock poisoned");
        if sessions.contains_key(&room_id) {
            return Err(SessionError::DuplicateActiveSession(room_id));
        }

        let session = Arc::new(Mutex::new(Session::with_allocator(
            room_id,
            host,
            language,
            gamemode,
            now,
            config,
            self.handles.clone(),
        )));
        sessions.insert(room_id, Arc::clone(&session));

        tracing::debug!(room = room_id, host, active = sessions.len(), "session registered");
        Ok(session)
    }

    /// Session bound to `room_id`.
    ///
    /// # Errors
    ///
    /// - `SessionError::SessionNotFound` if the room has no active session
    pub fn get(&self, room_id: RoomId) -> Result<SharedSession<I>, SessionError> {
        self.sessions
            .read()
            .expect("registry lock poisoned")
            .get(&room_id)
            .cloned()
            .ok_or(SessionError::SessionNotFound(room_id))
    }

    /// Unbind and return the session for `room_id`.
    pub fn destroy(&self, room_id: RoomId) -> Option<SharedSession<I>> {
        let removed = self.sessions.write().expect("registry lock poisoned").remove(&room_id);
        if removed.is_some() {
            tracing::debug!(room = room_id, "session destroyed");
        }
        removed
    }

    /// Unbind `room_id` only if it still maps to `session`.
    ///
    /// Guards against removing a replacement created after `session`
    /// finished.
    pub fn remove_if_same(&self, room_id: RoomId, session: &SharedSession<I>) -> bool {
        let mut sessions = self.sessions.write().expect("registry lock poisoned");
        match sessions.get(&room_id) {
            Some(current) if Arc::ptr_eq(current, session) => {
                sessions.remove(&room_id);
                tracing::debug!(room = room_id, "session destroyed");
                true
            },
            _ => false,
        }
    }

    /// True if `room_id` has an active session.
    pub fn contains(&self, room_id: RoomId) -> bool {
        self.sessions.read().expect("registry lock poisoned").contains_key(&room_id)
    }

    /// Rooms with an active session, ascending.
    pub fn room_ids(&self) -> Vec<RoomId> {
        let mut ids: Vec<_> =
            self.sessions.read().expect("registry lock poisoned").keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Number of active sessions.
    pub fn len(&self) -> usize {
        self.sessions.read().expect("registry lock poisoned").len()
    }

    /// True if no session is active.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Expire stale lobbies and deliver due ready countdowns.
    ///
    /// A lobby whose expiry falls within `window` of `now` is cancelled with
    /// a timeout and removed. Sessions that did nothing are omitted from the
    /// result.
    pub fn sweep(&self, now: I, window: Duration) -> Vec<SweepOutcome<I>> {
        let entries: Vec<(RoomId, SharedSession<I>)> = {
            let sessions = self.sessions.read().expect("registry lock poisoned");
            let mut entries: Vec<_> =
                sessions.iter().map(|(id, session)| (*id, Arc::clone(session))).collect();
            entries.sort_unstable_by_key(|(id, _)| *id);
            entries
        };

        let mut outcomes = Vec::new();
        for (room_id, shared) in entries {
            let (actions, snapshot, finished) = {
                let mut session = lock_session(&shared);
                let actions = if session.lobby_expires_within(now, window) {
                    session.cancel(CancelReason::Timeout)
                } else {
                    session.poll_timers(now)
                };
                (actions, session.snapshot(), session.is_finished())
            };

            if finished {
                self.remove_if_same(room_id, &shared);
            }
            if !actions.is_empty() {
                outcomes.push(SweepOutcome { room_id, actions, snapshot });
            }
        }

        if !outcomes.is_empty() {
            tracing::debug!(affected = outcomes.len(), "sweep complete");
        }
        outcomes
    }
}
