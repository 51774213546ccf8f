//! Per-session timer slots.
//!
//! Each session owns two single-shot slots: the lobby expiry and the ready
//! countdown. Arming a slot returns a [`TimerHandle`]; the runtime schedules
//! the handle however it likes and reports it back when the delay elapses.
//! Only the handle currently armed in a slot can fire. Cancelling or
//! re-arming a slot invalidates the old handle, so a stale delivery is a
//! no-op rather than a fault.
//!
//! Handles come from a [`HandleAllocator`]. Sessions created from one
//! allocator never share a handle, so a delivery addressed to a closed
//! session cannot match a timer of its successor in the same room.
//!
//! This module is pure bookkeeping. It never sleeps and never calls back.

use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

use serde::Serialize;

use crate::env::Timestamp;

/// Opaque handle to an armed timer.
///
/// Handles are unique per [`HandleAllocator`] and never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct TimerHandle(u64);

impl TimerHandle {
    /// Raw handle value (for logging and runtime bookkeeping).
    pub fn value(self) -> u64 {
        self.0
    }
}

/// Which slot a timer occupies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum TimerKind {
    /// Inactive lobby deadline, consumed by the registry sweep
    LobbyExpiry,
    /// Grace period before the first round starts
    ReadyCountdown,
}

/// Source of timer handles, shared by every session of one registry.
///
/// Cloning shares the counter.
#[derive(Debug, Clone)]
pub struct HandleAllocator {
    next: Arc<AtomicU64>,
}

impl Default for HandleAllocator {
    fn default() -> Self {
        Self::new()
    }
}

impl HandleAllocator {
    /// Fresh allocator whose first handle is 1.
    pub fn new() -> Self {
        Self { next: Arc::new(AtomicU64::new(1)) }
    }

    fn allocate(&self) -> TimerHandle {
        TimerHandle(self.next.fetch_add(1, Ordering::Relaxed))
    }
}

#[derive(Debug, Clone, Copy)]
struct Armed<I> {
    handle: TimerHandle,
    deadline: I,
}

/// The two timer slots of one session.
#[derive(Debug, Clone)]
pub struct SessionTimers<I> {
    lobby_expiry: Option<Armed<I>>,
    ready_countdown: Option<Armed<I>>,
    handles: HandleAllocator,
}

impl<I: Timestamp> Default for SessionTimers<I> {
    fn default() -> Self {
        Self::new()
    }
}

impl<I: Timestamp> SessionTimers<I> {
    /// Create with both slots empty and a private allocator.
    pub fn new() -> Self {
        Self::with_allocator(HandleAllocator::new())
    }

    /// Create with both slots empty, drawing handles from `handles`.
    pub fn with_allocator(handles: HandleAllocator) -> Self {
        Self { lobby_expiry: None, ready_countdown: None, handles }
    }

    /// Arm `kind` to fire at `deadline`.
    ///
    /// Returns the new handle and, if the slot was already armed, the handle
    /// it replaced (which can no longer fire).
    pub fn arm(&mut self, kind: TimerKind, deadline: I) -> (TimerHandle, Option<TimerHandle>) {
        let handle = self.handles.allocate();

        let replaced = self.slot_mut(kind).replace(Armed { handle, deadline });
        (handle, replaced.map(|armed| armed.handle))
    }

    /// Cancel the timer identified by `handle`.
    ///
    /// Idempotent: returns `false` if the handle already fired, was already
    /// cancelled, or was replaced.
    pub fn cancel(&mut self, handle: TimerHandle) -> bool {
        for kind in [TimerKind::LobbyExpiry, TimerKind::ReadyCountdown] {
            let slot = self.slot_mut(kind);
            if slot.is_some_and(|armed| armed.handle == handle) {
                *slot = None;
                return true;
            }
        }
        false
    }

    /// Cancel whatever occupies `kind`, returning its handle.
    pub fn cancel_kind(&mut self, kind: TimerKind) -> Option<TimerHandle> {
        self.slot_mut(kind).take().map(|armed| armed.handle)
    }

    /// Cancel both slots, returning the handles that were armed.
    pub fn cancel_all(&mut self) -> Vec<TimerHandle> {
        [TimerKind::LobbyExpiry, TimerKind::ReadyCountdown]
            .into_iter()
            .filter_map(|kind| self.cancel_kind(kind))
            .collect()
    }

    /// Consume `handle` if it is the one currently armed.
    ///
    /// Returns the slot it occupied. `None` means the handle is stale and the
    /// caller must do nothing.
    pub fn fire(&mut self, handle: TimerHandle) -> Option<TimerKind> {
        [TimerKind::LobbyExpiry, TimerKind::ReadyCountdown].into_iter().find(|kind| {
            let slot = self.slot_mut(*kind);
            if slot.is_some_and(|armed| armed.handle == handle) {
                *slot = None;
                true
            } else {
                false
            }
        })
    }

    /// Handle of the timer in `kind` whose deadline is at or before `now`.
    pub fn due(&self, kind: TimerKind, now: I) -> Option<TimerHandle> {
        self.slot(kind).filter(|armed| armed.deadline <= now).map(|armed| armed.handle)
    }

    /// Deadline of `kind`. `None` if the slot is empty.
    pub fn deadline(&self, kind: TimerKind) -> Option<I> {
        self.slot(kind).map(|armed| armed.deadline)
    }

    /// Handle armed in `kind`. `None` if the slot is empty.
    pub fn handle(&self, kind: TimerKind) -> Option<TimerHandle> {
        self.slot(kind).map(|armed| armed.handle)
    }

    /// True if `kind` is armed.
    pub fn is_armed(&self, kind: TimerKind) -> bool {
        self.slot(kind).is_some()
    }

    fn slot(&self, kind: TimerKind) -> Option<Armed<I>> {
        match kind {
            TimerKind::LobbyExpiry => self.lobby_expiry,
            TimerKind::ReadyCountdown => self.ready_countdown,
        }
    }

    fn slot_mut(&mut self, kind: TimerKind) -> &mut Option<Armed<I>> {
        match kind {
            TimerKind::LobbyExpiry => &mut self.lobby_expiry,
            TimerKind::ReadyCountdown => &mut self.ready_countdown,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use super::*;

    #[test]
    fn armed_handle_fires_once() {
        let now = Instant::now();
        let mut timers = SessionTimers::new();

        let (handle, replaced) = timers.arm(TimerKind::ReadyCountdown, now);
        assert!(replaced.is_none());

        assert_eq!(timers.fire(handle), Some(TimerKind::ReadyCountdown));
        assert_eq!(timers.fire(handle), None);
        assert!(!timers.is_armed(TimerKind::ReadyCountdown));
    }

    #[test]
    fn cancelled_handle_never_fires() {
        let now = Instant::now();
        let mut timers = SessionTimers::new();

        let (handle, _) = timers.arm(TimerKind::ReadyCountdown, now);
        assert!(timers.cancel(handle));
        assert!(!timers.cancel(handle));

        assert_eq!(timers.fire(handle), None);
    }

    #[test]
    fn rearming_invalidates_previous_handle() {
        let now = Instant::now();
        let mut timers = SessionTimers::new();

        let (first, _) = timers.arm(TimerKind::LobbyExpiry, now);
        let (second, replaced) = timers.arm(TimerKind::LobbyExpiry, now + Duration::from_secs(60));

        assert_eq!(replaced, Some(first));
        assert_ne!(first, second);
        assert_eq!(timers.fire(first), None);
        assert_eq!(timers.deadline(TimerKind::LobbyExpiry), Some(now + Duration::from_secs(60)));
        assert_eq!(timers.fire(second), Some(TimerKind::LobbyExpiry));
    }

    #[test]
    fn slots_are_independent() {
        let now = Instant::now();
        let mut timers = SessionTimers::new();

        let (lobby, _) = timers.arm(TimerKind::LobbyExpiry, now);
        let (countdown, _) = timers.arm(TimerKind::ReadyCountdown, now);

        assert!(timers.cancel(countdown));
        assert_eq!(timers.handle(TimerKind::LobbyExpiry), Some(lobby));
    }

    #[test]
    fn due_respects_deadline() {
        let now = Instant::now();
        let mut timers = SessionTimers::new();
        let (handle, _) = timers.arm(TimerKind::ReadyCountdown, now + Duration::from_secs(10));

        assert_eq!(timers.due(TimerKind::ReadyCountdown, now), None);
        assert_eq!(
            timers.due(TimerKind::ReadyCountdown, now + Duration::from_secs(10)),
            Some(handle)
        );
    }

    #[test]
    fn shared_allocator_never_repeats_handles() {
        let now = Instant::now();
        let handles = HandleAllocator::new();
        let mut first = SessionTimers::with_allocator(handles.clone());
        let mut second = SessionTimers::with_allocator(handles);

        let (a, _) = first.arm(TimerKind::LobbyExpiry, now);
        let (b, _) = second.arm(TimerKind::LobbyExpiry, now);
        assert_ne!(a, b);
        assert_eq!(second.fire(a), None);
        assert_eq!(first.fire(b), None);
    }

    #[test]
    fn cancel_all_empties_both_slots() {
        let now = Instant::now();
        let mut timers = SessionTimers::new();
        timers.arm(TimerKind::LobbyExpiry, now);
        timers.arm(TimerKind::ReadyCountdown, now);

        assert_eq!(timers.cancel_all().len(), 2);
        assert!(timers.cancel_all().is_empty());
    }
}
