//! Engine driver.
//!
//! Ties together the session registry, the session state machines and the
//! environment. Events go in, actions come out; the driver never sleeps,
//! never spawns and never renders.

use std::time::Duration;

use masque_core::{
    CancelReason, Environment, PlayerId, RoomId, SessionAction, SessionConfig, SessionError,
    SessionSnapshot, TimerHandle, TimerKind, session::DEFAULT_LANGUAGE,
};

use crate::{
    command::Command,
    error::ServerError,
    registry::{SessionRegistry, SharedSession, lock_session},
};

/// Default period of the expiry sweep.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(1);

/// Engine configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Per-session timing and text limits
    pub session: SessionConfig,
    /// Period of the expiry sweep
    pub sweep_interval: Duration,
    /// Language for sessions created without one
    pub default_language: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            session: SessionConfig::default(),
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
            default_language: DEFAULT_LANGUAGE.to_string(),
        }
    }
}

impl EngineConfig {
    /// Check the configuration for values the engine cannot run with.
    ///
    /// # Errors
    ///
    /// - `ServerError::Config` naming the first offending field
    pub fn validate(&self) -> Result<(), ServerError> {
        let durations = [
            ("lobby extension", self.session.lobby_extension),
            ("ready countdown", self.session.ready_countdown),
            ("sweep interval", self.sweep_interval),
        ];
        if let Some((name, _)) = durations.iter().find(|(_, d)| d.is_zero()) {
            return Err(ServerError::Config(format!("{name} must be non-zero")));
        }

        if self.sweep_interval > self.session.lobby_extension {
            return Err(ServerError::Config(format!(
                "sweep interval {:?} exceeds lobby extension {:?}",
                self.sweep_interval, self.session.lobby_extension
            )));
        }

        let limits = [
            ("max identity length", self.session.max_identity_len),
            ("max question length", self.session.max_question_len),
            ("max answer length", self.session.max_answer_len),
        ];
        if let Some((name, _)) = limits.iter().find(|(_, len)| *len == 0) {
            return Err(ServerError::Config(format!("{name} must be non-zero")));
        }

        if self.default_language.trim().is_empty() {
            return Err(ServerError::Config("default language is empty".to_string()));
        }

        Ok(())
    }
}

/// Events that the engine driver processes.
///
/// These are produced by the external runtime (console, chat adapter, timer
/// tasks, sweep loop).
#[derive(Debug, Clone)]
pub enum EngineEvent {
    /// A player issued a command
    Command {
        /// Room the command targets
        room_id: RoomId,
        /// Player issuing it
        player_id: PlayerId,
        /// The command
        command: Command,
    },

    /// A timer scheduled through [`EngineAction::ScheduleTimer`] elapsed
    TimerFired {
        /// Room the timer belongs to
        room_id: RoomId,
        /// Handle being delivered
        handle: TimerHandle,
    },

    /// Periodic tick driving the expiry sweep
    Tick,
}

/// Actions that the engine driver produces.
///
/// These are executed by runtime-specific code (production or simulation).
#[derive(Debug, Clone)]
pub enum EngineAction<I> {
    /// Session changed; re-render it
    Render {
        /// Room of the session
        room_id: RoomId,
        /// Session state to render
        snapshot: SessionSnapshot,
    },

    /// Session ended and was removed from the registry
    SessionClosed {
        /// Room that is free again
        room_id: RoomId,
        /// Why it ended
        reason: CancelReason,
        /// Final session state
        snapshot: SessionSnapshot,
    },

    /// Deliver a [`EngineEvent::TimerFired`] after `delay`
    ScheduleTimer {
        /// Room the timer belongs to
        room_id: RoomId,
        /// Handle to deliver
        handle: TimerHandle,
        /// Slot the handle occupies
        kind: TimerKind,
        /// Absolute deadline
        deadline: I,
        /// Delay from the time the action was produced
        delay: Duration,
    },

    /// Drop a scheduled delivery
    CancelTimer {
        /// Room the timer belongs to
        room_id: RoomId,
        /// Handle that must not be delivered
        handle: TimerHandle,
    },

    /// Log a message (for debugging/monitoring)
    Log {
        /// Log level
        level: LogLevel,
        /// Message to log
        message: String,
        /// When the event occurred
        timestamp: I,
    },
}

/// Log levels for engine actions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Debug information
    Debug,
    /// Informational message
    Info,
    /// Warning
    Warn,
    /// Error
    Error,
}

/// Action-based engine driver.
///
/// Takes `&self` everywhere: the registry synchronises internally, so one
/// driver can be shared between the command path, timer tasks and the sweep
/// loop.
pub struct EngineDriver<E: Environment> {
    /// Active sessions
    registry: SessionRegistry<E::Instant>,
    /// Environment (time, RNG)
    env: E,
    /// Engine configuration
    config: EngineConfig,
}

impl<E: Environment> EngineDriver<E> {
    /// Create a new engine driver.
    ///
    /// # Errors
    ///
    /// - `ServerError::Config` if `config` fails validation
    pub fn new(env: E, config: EngineConfig) -> Result<Self, ServerError> {
        config.validate()?;
        Ok(Self { registry: SessionRegistry::new(), env, config })
    }

    /// Session registry.
    pub fn registry(&self) -> &SessionRegistry<E::Instant> {
        &self.registry
    }

    /// Engine configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Environment.
    pub fn env(&self) -> &E {
        &self.env
    }

    /// Snapshot of the session in `room_id`.
    ///
    /// # Errors
    ///
    /// - `ServerError::Session` if the room has no active session
    pub fn snapshot(&self, room_id: RoomId) -> Result<SessionSnapshot, ServerError> {
        let session = self.registry.get(room_id)?;
        let snapshot = lock_session(&session).snapshot();
        Ok(snapshot)
    }

    /// Process an engine event and return actions to execute.
    ///
    /// This is the main entry point for the engine driver.
    pub fn process_event(
        &self,
        event: EngineEvent,
    ) -> Result<Vec<EngineAction<E::Instant>>, ServerError> {
        match event {
            EngineEvent::Command { room_id, player_id, command } => {
                self.handle_command(room_id, player_id, command)
            },
            EngineEvent::TimerFired { room_id, handle } => Ok(self.handle_timer_fired(room_id, handle)),
            EngineEvent::Tick => Ok(self.handle_tick()),
        }
    }

    /// Handle a player command.
    fn handle_command(
        &self,
        room_id: RoomId,
        player_id: PlayerId,
        command: Command,
    ) -> Result<Vec<EngineAction<E::Instant>>, ServerError> {
        let now = self.env.now();

        let (session, command) = match (self.registry.get(room_id), command) {
            (Err(_), Command::CreateSession { language, gamemode }) => {
                return self.handle_create(room_id, player_id, &language, &gamemode, now);
            },
            (session, command) => (session?, command),
        };

        let (session_actions, snapshot) = {
            let mut guard = lock_session(&session);
            let actions = match command {
                Command::CreateSession { .. } => {
                    return Err(SessionError::DuplicateActiveSession(room_id).into());
                },
                Command::Join => guard.join(player_id, now)?,
                Command::Leave => guard.leave(player_id, now)?,
                Command::SetReady(ready) => guard.set_ready(player_id, ready, now)?,
                Command::SetQuitVote(vote) => guard.set_quit_vote(player_id, vote)?,
                Command::UpdateSettings(update) => guard.update_settings(player_id, update, now)?,
                Command::SetLanguage(code) => guard.set_language(player_id, &code, now)?,
                Command::Start => guard.start(player_id, &mut self.env.rng())?,
                Command::RecordIdentity(text) => guard.record_identity(player_id, &text)?,
                Command::AddNote { question, answer } => {
                    guard.add_note(player_id, &question, &answer)?
                },
                Command::Cancel => guard.cancel_by_host(player_id)?,
            };
            (actions, guard.snapshot())
        };

        Ok(self.convert_session_actions(room_id, &session, session_actions, snapshot, now))
    }

    /// Open a session in an empty room.
    fn handle_create(
        &self,
        room_id: RoomId,
        player_id: PlayerId,
        language: &str,
        gamemode: &str,
        now: E::Instant,
    ) -> Result<Vec<EngineAction<E::Instant>>, ServerError> {
        let language =
            if language.trim().is_empty() { self.config.default_language.as_str() } else { language };
        let session = self.registry.create(
            room_id,
            player_id,
            language,
            gamemode,
            now,
            self.config.session.clone(),
        )?;
        let snapshot = lock_session(&session).snapshot();

        Ok(vec![
            EngineAction::Log {
                level: LogLevel::Info,
                message: format!("room {room_id}: session created by {player_id}"),
                timestamp: now,
            },
            EngineAction::Render { room_id, snapshot },
        ])
    }

    /// Handle a timer delivery. Stale handles and closed rooms are no-ops.
    fn handle_timer_fired(
        &self,
        room_id: RoomId,
        handle: TimerHandle,
    ) -> Vec<EngineAction<E::Instant>> {
        let now = self.env.now();

        let Ok(session) = self.registry.get(room_id) else {
            tracing::trace!(room = room_id, handle = handle.value(), "timer for closed room");
            return Vec::new();
        };

        let (session_actions, snapshot) = {
            let mut guard = lock_session(&session);
            let actions = guard.timer_fired(handle);
            (actions, guard.snapshot())
        };

        self.convert_session_actions(room_id, &session, session_actions, snapshot, now)
    }

    /// Run the expiry sweep.
    fn handle_tick(&self) -> Vec<EngineAction<E::Instant>> {
        let now = self.env.now();
        let mut actions = Vec::new();

        for outcome in self.registry.sweep(now, self.config.sweep_interval) {
            actions.extend(self.convert_actions(outcome.room_id, outcome.actions, outcome.snapshot, now));
        }

        actions
    }

    /// Convert session actions and drop the session from the registry if it
    /// finished.
    fn convert_session_actions(
        &self,
        room_id: RoomId,
        session: &SharedSession<E::Instant>,
        session_actions: Vec<SessionAction<E::Instant>>,
        snapshot: SessionSnapshot,
        now: E::Instant,
    ) -> Vec<EngineAction<E::Instant>> {
        if snapshot.state.is_finished() {
            self.registry.remove_if_same(room_id, session);
        }
        self.convert_actions(room_id, session_actions, snapshot, now)
    }

    /// Convert session actions to engine actions.
    ///
    /// Any number of `StateChanged` collapse into one trailing render, which
    /// is suppressed once the session is closed.
    fn convert_actions(
        &self,
        room_id: RoomId,
        session_actions: Vec<SessionAction<E::Instant>>,
        snapshot: SessionSnapshot,
        now: E::Instant,
    ) -> Vec<EngineAction<E::Instant>> {
        let mut actions = Vec::new();
        let mut render = false;
        let mut closed = None;

        for action in session_actions {
            match action {
                SessionAction::StateChanged => render = true,
                SessionAction::ScheduleTimer { handle, kind, deadline } => {
                    actions.push(EngineAction::ScheduleTimer {
                        room_id,
                        handle,
                        kind,
                        deadline,
                        delay: deadline - now,
                    });
                },
                SessionAction::CancelTimer { handle } => {
                    actions.push(EngineAction::CancelTimer { room_id, handle });
                },
                SessionAction::Finished { reason } => closed = Some(reason),
            }
        }

        if let Some(reason) = closed {
            actions.push(EngineAction::Log {
                level: LogLevel::Info,
                message: format!("room {room_id}: session closed ({})", reason.as_str()),
                timestamp: now,
            });
            actions.push(EngineAction::SessionClosed { room_id, reason, snapshot });
        } else if render {
            actions.push(EngineAction::Render { room_id, snapshot });
        }

        actions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::system_env::SystemEnv;

    fn driver() -> EngineDriver<SystemEnv> {
        EngineDriver::new(SystemEnv::new(), EngineConfig::default()).unwrap()
    }

    fn create(driver: &EngineDriver<SystemEnv>, room_id: RoomId) -> Vec<EngineAction<std::time::Instant>> {
        driver
            .process_event(EngineEvent::Command {
                room_id,
                player_id: 1,
                command: Command::CreateSession { language: String::new(), gamemode: "classic".into() },
            })
            .unwrap()
    }

    #[test]
    fn default_config_is_valid() {
        assert!(EngineConfig::default().validate().is_ok());
    }

    #[test]
    fn zero_durations_rejected() {
        let mut config = EngineConfig::default();
        config.session.ready_countdown = Duration::ZERO;
        let err = config.validate().unwrap_err();
        assert_eq!(err.to_string(), "configuration error: ready countdown must be non-zero");
    }

    #[test]
    fn sweep_longer_than_extension_rejected() {
        let config = EngineConfig { sweep_interval: Duration::from_secs(120), ..EngineConfig::default() };
        assert!(matches!(config.validate(), Err(ServerError::Config(_))));
    }

    #[test]
    fn zero_text_limit_rejected() {
        let mut config = EngineConfig::default();
        config.session.max_answer_len = 0;
        assert!(matches!(config.validate(), Err(ServerError::Config(msg)) if msg.contains("answer")));
    }

    #[test]
    fn blank_default_language_rejected() {
        let config = EngineConfig { default_language: "  ".into(), ..EngineConfig::default() };
        assert!(config.validate().is_err());
        assert!(EngineDriver::new(SystemEnv::new(), config).is_err());
    }

    #[test]
    fn create_logs_and_renders() {
        let driver = driver();
        let actions = create(&driver, 3);

        assert_eq!(actions.len(), 2);
        assert!(matches!(actions[0], EngineAction::Log { level: LogLevel::Info, .. }));
        match &actions[1] {
            EngineAction::Render { room_id, snapshot } => {
                assert_eq!(*room_id, 3);
                assert_eq!(snapshot.language, DEFAULT_LANGUAGE);
            },
            other => panic!("expected render, got {other:?}"),
        }
    }

    #[test]
    fn ready_up_schedules_countdown_with_delay() {
        let driver = driver();
        create(&driver, 3);
        let join = |player| {
            driver.process_event(EngineEvent::Command { room_id: 3, player_id: player, command: Command::Join })
        };
        join(2).unwrap();

        for player in [1, 2] {
            driver
                .process_event(EngineEvent::Command { room_id: 3, player_id: player, command: Command::SetReady(true) })
                .unwrap();
        }
        driver
            .process_event(EngineEvent::Command { room_id: 3, player_id: 1, command: Command::Start })
            .unwrap();
        for player in [1, 2] {
            driver
                .process_event(EngineEvent::Command {
                    room_id: 3,
                    player_id: player,
                    command: Command::RecordIdentity("Ada Lovelace".into()),
                })
                .unwrap();
        }
        driver
            .process_event(EngineEvent::Command { room_id: 3, player_id: 1, command: Command::SetReady(true) })
            .unwrap();
        let actions = driver
            .process_event(EngineEvent::Command { room_id: 3, player_id: 2, command: Command::SetReady(true) })
            .unwrap();

        assert_eq!(actions.len(), 2);
        match &actions[0] {
            EngineAction::ScheduleTimer { room_id, kind, delay, .. } => {
                assert_eq!(*room_id, 3);
                assert_eq!(*kind, TimerKind::ReadyCountdown);
                assert!(*delay <= driver.config().session.ready_countdown);
            },
            other => panic!("expected timer, got {other:?}"),
        }
        assert!(matches!(actions[1], EngineAction::Render { .. }));
    }

    #[test]
    fn close_suppresses_render() {
        let driver = driver();
        create(&driver, 3);

        let actions = driver
            .process_event(EngineEvent::Command { room_id: 3, player_id: 1, command: Command::Cancel })
            .unwrap();

        assert!(actions.iter().all(|a| !matches!(a, EngineAction::Render { .. })));
        assert!(matches!(
            actions.last(),
            Some(EngineAction::SessionClosed { reason: CancelReason::ByHost, .. })
        ));
        assert!(!driver.registry().contains(3));
    }

    #[test]
    fn no_op_command_produces_no_actions() {
        let driver = driver();
        create(&driver, 3);

        let actions = driver
            .process_event(EngineEvent::Command { room_id: 3, player_id: 1, command: Command::SetReady(false) })
            .unwrap();
        assert!(actions.is_empty());
    }

    #[test]
    fn tick_on_empty_registry_is_quiet() {
        let driver = driver();
        assert!(driver.process_event(EngineEvent::Tick).unwrap().is_empty());
    }
}
