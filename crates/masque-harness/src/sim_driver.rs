//! Simulated engine runtime.
//!
//! Executes [`EngineDriver`] actions against virtual time: scheduled timers
//! go into a deadline-ordered queue and sweep ticks fire every
//! `sweep_interval`. [`SimEngine::advance`] delivers both in time order, so
//! a test can fast-forward through countdowns and lobby expiry without
//! sleeping.

use std::{collections::BTreeSet, time::Duration};

use masque_core::{Environment, PlayerId, RoomId, SessionSnapshot, TimerHandle};
use masque_server::{
    Command, EngineAction, EngineConfig, EngineDriver, EngineEvent, LogLevel, Notification,
    ServerError,
};

use crate::sim_env::{SimEnv, SimInstant};

/// Engine driven by virtual time.
pub struct SimEngine {
    driver: EngineDriver<SimEnv>,
    env: SimEnv,
    /// Pending timers ordered by deadline
    timers: BTreeSet<(SimInstant, RoomId, TimerHandle)>,
    /// When the next sweep tick is due
    next_tick: SimInstant,
    /// Every notification produced so far
    notifications: Vec<Notification>,
    /// Every log action produced so far
    logs: Vec<(LogLevel, String)>,
}

impl SimEngine {
    /// Engine with a fresh [`SimEnv`] seeded from `seed`.
    ///
    /// # Errors
    ///
    /// - `ServerError::Config` if `config` fails validation
    pub fn new(seed: u64, config: EngineConfig) -> Result<Self, ServerError> {
        let env = SimEnv::with_seed(seed);
        let next_tick = env.now() + config.sweep_interval;
        let driver = EngineDriver::new(env.clone(), config)?;

        Ok(Self {
            driver,
            env,
            timers: BTreeSet::new(),
            next_tick,
            notifications: Vec::new(),
            logs: Vec::new(),
        })
    }

    /// The driver under test.
    pub fn driver(&self) -> &EngineDriver<SimEnv> {
        &self.driver
    }

    /// Shared simulated environment.
    pub fn env(&self) -> &SimEnv {
        &self.env
    }

    /// Current virtual time.
    pub fn now(&self) -> SimInstant {
        self.env.now()
    }

    /// Issue a command and execute its actions.
    pub fn command(
        &mut self,
        room_id: RoomId,
        player_id: PlayerId,
        command: Command,
    ) -> Result<(), ServerError> {
        self.dispatch(EngineEvent::Command { room_id, player_id, command })
    }

    /// Process one event and execute its actions.
    pub fn dispatch(&mut self, event: EngineEvent) -> Result<(), ServerError> {
        let actions = self.driver.process_event(event)?;
        self.execute(actions);
        Ok(())
    }

    /// Advance virtual time by `duration`, delivering due timers and sweep
    /// ticks in time order. A timer and a tick due at the same instant are
    /// delivered timer first.
    pub fn advance(&mut self, duration: Duration) -> Result<(), ServerError> {
        let target = self.now() + duration;

        loop {
            let next_timer = self.timers.first().map(|(deadline, ..)| *deadline);
            let next = next_timer.map_or(self.next_tick, |t| t.min(self.next_tick));
            if next > target {
                break;
            }

            self.env.advance_to(next);
            if next_timer == Some(next) {
                if let Some((_, room_id, handle)) = self.timers.pop_first() {
                    self.dispatch(EngineEvent::TimerFired { room_id, handle })?;
                }
            } else {
                self.next_tick = next + self.driver.config().sweep_interval;
                self.dispatch(EngineEvent::Tick)?;
            }
        }

        self.env.advance_to(target);
        Ok(())
    }

    /// Current snapshot of `room_id`.
    pub fn snapshot(&self, room_id: RoomId) -> Result<SessionSnapshot, ServerError> {
        self.driver.snapshot(room_id)
    }

    /// Notifications produced so far.
    pub fn notifications(&self) -> &[Notification] {
        &self.notifications
    }

    /// Drain the notifications produced so far.
    pub fn take_notifications(&mut self) -> Vec<Notification> {
        std::mem::take(&mut self.notifications)
    }

    /// Most recent notification for `room_id`.
    pub fn last_notification(&self, room_id: RoomId) -> Option<&Notification> {
        self.notifications.iter().rev().find(|n| n.room_id() == room_id)
    }

    /// Log messages produced so far.
    pub fn logs(&self) -> &[(LogLevel, String)] {
        &self.logs
    }

    /// Timers scheduled and not yet delivered or cancelled.
    pub fn pending_timers(&self) -> usize {
        self.timers.len()
    }

    fn execute(&mut self, actions: Vec<EngineAction<SimInstant>>) {
        for action in actions {
            match action {
                EngineAction::Render { room_id, snapshot } => {
                    self.notifications.push(Notification::Render { room_id, snapshot });
                },
                EngineAction::SessionClosed { room_id, reason, snapshot } => {
                    self.notifications.push(Notification::Closed { room_id, reason, snapshot });
                },
                EngineAction::ScheduleTimer { room_id, handle, deadline, .. } => {
                    self.timers.insert((deadline, room_id, handle));
                },
                EngineAction::CancelTimer { room_id, handle } => {
                    self.timers.retain(|(_, r, h)| !(*r == room_id && *h == handle));
                },
                EngineAction::Log { level, message, .. } => {
                    tracing::debug!(?level, "{}", message);
                    self.logs.push((level, message));
                },
            }
        }
    }
}
