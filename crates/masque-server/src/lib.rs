//! Masque session engine server.
//!
//! Production glue around [`masque_core`]'s action-based session logic: a
//! process-wide registry of sessions, a driver that turns player commands,
//! timer deliveries and sweep ticks into actions, and a Tokio runtime that
//! executes those actions.
//!
//! # Architecture
//!
//! The [`EngineDriver`] follows the Sans-IO pattern (see [`masque_core`] for
//! details), while [`Engine`] executes its actions: it spawns and aborts
//! timer tasks, runs the periodic expiry sweep and forwards
//! [`Notification`]s to whatever adapter renders sessions for players.
//!
//! # Components
//!
//! - [`EngineDriver`]: Action-based orchestrator (pure logic, no I/O)
//! - [`Engine`]: Production runtime that executes `EngineDriver` actions
//! - [`SessionRegistry`]: Room id to session map with per-session locking
//! - [`SystemEnv`]: Production environment (real time, OS RNG)
//! - [`command`]: Command type and the `"<action>-<roomId>"` text encoding

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![allow(clippy::disallowed_types, reason = "Timer task map is never held across an await")]
#![allow(clippy::expect_used, reason = "Mutex poisoning should cause a panic")]

pub mod command;
mod driver;
mod error;
mod registry;
mod system_env;

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard},
    time::Duration,
};

pub use command::{ActionId, ActionName, Command, CommandLine, ParseError, parse_line};
pub use driver::{
    DEFAULT_SWEEP_INTERVAL, EngineAction, EngineConfig, EngineDriver, EngineEvent, LogLevel,
};
pub use error::ServerError;
use masque_core::{CancelReason, Environment, PlayerId, RoomId, SessionSnapshot, TimerHandle};
pub use registry::{SessionRegistry, SharedSession, SweepOutcome, lock_session};
use serde::Serialize;
pub use system_env::SystemEnv;
use tokio::{sync::mpsc, task::JoinHandle};

/// Outbound notification for the rendering adapter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Notification {
    /// Session changed
    #[serde(rename_all = "camelCase")]
    Render {
        /// Room of the session
        room_id: RoomId,
        /// State to render
        snapshot: SessionSnapshot,
    },
    /// Session ended; the room is free
    #[serde(rename_all = "camelCase")]
    Closed {
        /// Room that closed
        room_id: RoomId,
        /// Why it ended
        reason: CancelReason,
        /// Final state
        snapshot: SessionSnapshot,
    },
}

impl Notification {
    /// Room the notification concerns.
    pub fn room_id(&self) -> RoomId {
        match self {
            Self::Render { room_id, .. } | Self::Closed { room_id, .. } => *room_id,
        }
    }

    /// Snapshot carried by the notification.
    pub fn snapshot(&self) -> &SessionSnapshot {
        match self {
            Self::Render { snapshot, .. } | Self::Closed { snapshot, .. } => snapshot,
        }
    }
}

/// Pending timer deliveries keyed by room and handle.
type TimerTasks = HashMap<(RoomId, TimerHandle), JoinHandle<()>>;

/// Production Masque engine.
///
/// Wraps `EngineDriver` with Tokio timer tasks and a notification channel.
/// Cloning shares the same driver, timers and channel.
#[derive(Clone)]
pub struct Engine {
    /// The action-based driver
    driver: Arc<EngineDriver<SystemEnv>>,
    /// Timer tasks that have not fired yet
    timers: Arc<Mutex<TimerTasks>>,
    /// Outbound notifications
    notifications: mpsc::UnboundedSender<Notification>,
}

impl Engine {
    /// Create an engine and the receiving end of its notification channel.
    ///
    /// # Errors
    ///
    /// - `ServerError::Config` if `config` fails validation
    pub fn new(
        config: EngineConfig,
    ) -> Result<(Self, mpsc::UnboundedReceiver<Notification>), ServerError> {
        let driver = EngineDriver::new(SystemEnv::new(), config)?;
        let (tx, rx) = mpsc::unbounded_channel();

        let engine = Self {
            driver: Arc::new(driver),
            timers: Arc::new(Mutex::new(HashMap::new())),
            notifications: tx,
        };
        Ok((engine, rx))
    }

    /// The driver behind this engine.
    pub fn driver(&self) -> &EngineDriver<SystemEnv> {
        &self.driver
    }

    /// Number of timer tasks waiting to fire.
    pub fn pending_timers(&self) -> usize {
        self.lock_timers().len()
    }

    /// Submit a player command.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn submit(
        &self,
        room_id: RoomId,
        player_id: PlayerId,
        command: Command,
    ) -> Result<(), ServerError> {
        self.dispatch(EngineEvent::Command { room_id, player_id, command })
    }

    /// Process an event and execute the resulting actions.
    pub fn dispatch(&self, event: EngineEvent) -> Result<(), ServerError> {
        let actions = self.driver.process_event(event)?;
        self.execute(actions);
        Ok(())
    }

    /// Spawn the periodic expiry sweep.
    pub fn spawn_sweeper(&self) -> JoinHandle<()> {
        let engine = self.clone();
        let interval = self.driver.config().sweep_interval;

        tokio::spawn(async move {
            tracing::info!(?interval, "sweep loop started");
            loop {
                engine.driver.env().sleep(interval).await;
                if let Err(e) = engine.dispatch(EngineEvent::Tick) {
                    tracing::error!("sweep failed: {e}");
                }
            }
        })
    }

    fn execute(&self, actions: Vec<EngineAction<std::time::Instant>>) {
        for action in actions {
            match action {
                EngineAction::Render { room_id, snapshot } => {
                    self.notify(Notification::Render { room_id, snapshot });
                },
                EngineAction::SessionClosed { room_id, reason, snapshot } => {
                    self.notify(Notification::Closed { room_id, reason, snapshot });
                },
                EngineAction::ScheduleTimer { room_id, handle, delay, .. } => {
                    self.schedule(room_id, handle, delay);
                },
                EngineAction::CancelTimer { room_id, handle } => {
                    if let Some(task) = self.lock_timers().remove(&(room_id, handle)) {
                        task.abort();
                        tracing::debug!(room = room_id, handle = handle.value(), "timer aborted");
                    }
                },
                EngineAction::Log { level, message, .. } => match level {
                    LogLevel::Debug => tracing::debug!("{}", message),
                    LogLevel::Info => tracing::info!("{}", message),
                    LogLevel::Warn => tracing::warn!("{}", message),
                    LogLevel::Error => tracing::error!("{}", message),
                },
            }
        }
    }

    fn schedule(&self, room_id: RoomId, handle: TimerHandle, delay: Duration) {
        let mut timers = self.lock_timers();
        let engine = self.clone();

        let task = tokio::spawn(async move {
            engine.driver.env().sleep(delay).await;
            engine.lock_timers().remove(&(room_id, handle));

            if let Err(e) = engine.dispatch(EngineEvent::TimerFired { room_id, handle }) {
                tracing::warn!(room = room_id, "timer delivery failed: {e}");
            }
        });

        tracing::debug!(room = room_id, handle = handle.value(), ?delay, "timer scheduled");
        timers.insert((room_id, handle), task);
    }

    fn notify(&self, notification: Notification) {
        if self.notifications.send(notification).is_err() {
            tracing::debug!("notification receiver dropped");
        }
    }

    fn lock_timers(&self) -> MutexGuard<'_, TimerTasks> {
        self.timers.lock().expect("timer map poisoned")
    }
}
