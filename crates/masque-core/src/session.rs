//! Session state machine.
//!
//! One [`Session`] per room. Uses the action pattern: methods take the
//! current time as input and return [`SessionAction`]s for the driver to
//! execute. The state machine never sleeps, never renders and never touches
//! the registry that owns it.
//!
//! # State Machine
//!
//! ```text
//! ┌─────────┐  start   ┌───────────┐  countdown   ┌───────────────┐
//! │ Waiting │─────────>│ Assigning │─────────────>│ Round { idx } │──┐
//! └─────────┘          └───────────┘              └───────────────┘  │ add_note
//!      │                     │                          │      ^     │
//!      │ host leaves         │ quit quorum              │      └─────┘
//!      │ timeout             │ host leaves              │
//!      ↓                     ↓                          ↓
//!                    ┌──────────────────────┐
//!                    │ Finished { reason }  │
//!                    └──────────────────────┘
//! ```

use std::time::{Duration, Instant};

use rand::Rng;
use serde::Serialize;

use crate::{
    PlayerId, RoomId,
    assignment::assign_targets,
    env::Timestamp,
    error::SessionError,
    player::{Note, Player, PlayerRegistry},
    timers::{HandleAllocator, SessionTimers, TimerHandle, TimerKind},
};

/// How far each lobby change pushes the expiry deadline.
pub const DEFAULT_LOBBY_EXTENSION: Duration = Duration::from_secs(60);

/// Grace period between full readiness and the first round.
pub const DEFAULT_READY_COUNTDOWN: Duration = Duration::from_secs(10);

/// Maximum length of identities, questions and answers, in characters.
pub const DEFAULT_MAX_TEXT_LEN: usize = 32;

/// Turn time limit applied to new sessions, in seconds.
pub const DEFAULT_TIME_LIMIT_SECS: u32 = 60;

/// Language used when the host does not pick one.
pub const DEFAULT_LANGUAGE: &str = "en";

/// Session configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Lobby expiry extension applied on every lobby change
    pub lobby_extension: Duration,
    /// Delay between full readiness and the first round
    pub ready_countdown: Duration,
    /// Maximum identity length
    pub max_identity_len: usize,
    /// Maximum note question length
    pub max_question_len: usize,
    /// Maximum note answer length
    pub max_answer_len: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            lobby_extension: DEFAULT_LOBBY_EXTENSION,
            ready_countdown: DEFAULT_READY_COUNTDOWN,
            max_identity_len: DEFAULT_MAX_TEXT_LEN,
            max_question_len: DEFAULT_MAX_TEXT_LEN,
            max_answer_len: DEFAULT_MAX_TEXT_LEN,
        }
    }
}

/// Why a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum CancelReason {
    /// Host left or cancelled
    ByHost,
    /// Quit votes reached the quorum
    VoteQuit,
    /// Lobby expired without starting
    Timeout,
    /// Fewer than two players remained mid-game
    Abandoned,
}

impl CancelReason {
    /// Localization key for the reason.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ByHost => "byHost",
            Self::VoteQuit => "voteQuit",
            Self::Timeout => "timeout",
            Self::Abandoned => "abandoned",
        }
    }
}

/// Coarse lobby status shown to players.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum LobbyStatus {
    /// Gathering players
    Waiting,
    /// Game in progress
    Playing,
    /// Game over
    Finished,
}

/// Phase within a game. Only meaningful while [`LobbyStatus::Playing`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum GamePhase {
    /// Not playing
    None,
    /// Players name their targets
    Assigning,
    /// Players take turns asking questions
    Round,
}

/// Session state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SessionState {
    /// Lobby open, players joining and readying up
    Waiting,
    /// Targets assigned, players recording identities
    Assigning,
    /// Turn-based note taking; `index` points into the round order
    Round {
        /// Cursor into the round order
        index: usize,
    },
    /// Terminal
    Finished {
        /// Why the session ended
        reason: CancelReason,
    },
}

impl SessionState {
    /// Lobby status derived from the state.
    pub fn lobby_status(self) -> LobbyStatus {
        match self {
            Self::Waiting => LobbyStatus::Waiting,
            Self::Assigning | Self::Round { .. } => LobbyStatus::Playing,
            Self::Finished { .. } => LobbyStatus::Finished,
        }
    }

    /// Game phase derived from the state.
    pub fn game_phase(self) -> GamePhase {
        match self {
            Self::Waiting | Self::Finished { .. } => GamePhase::None,
            Self::Assigning => GamePhase::Assigning,
            Self::Round { .. } => GamePhase::Round,
        }
    }

    /// True once the session has ended.
    pub fn is_finished(self) -> bool {
        matches!(self, Self::Finished { .. })
    }
}

/// Game settings chosen by the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    /// Guess ceiling; 0 means unlimited
    pub max_guesses: u32,
    /// Turn time limit in seconds; 0 means unlimited
    pub time_limit: u32,
    /// Optional theme for identities
    pub category: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self { max_guesses: 0, time_limit: DEFAULT_TIME_LIMIT_SECS, category: None }
    }
}

/// Raw settings as submitted by the host, before validation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SettingsUpdate {
    /// Requested guess ceiling
    pub max_guesses: i64,
    /// Requested time limit in seconds
    pub time_limit: i64,
    /// Requested category; empty or `"0"` clears it
    pub category: Option<String>,
}

/// Actions returned by the session for the driver to execute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionAction<I> {
    /// Session state changed; re-render
    StateChanged,

    /// Deliver `handle` back to the session at `deadline`
    ScheduleTimer {
        /// Handle to deliver
        handle: TimerHandle,
        /// Slot the handle occupies
        kind: TimerKind,
        /// When to deliver it
        deadline: I,
    },

    /// Drop a previously scheduled delivery
    CancelTimer {
        /// Handle that must no longer be delivered
        handle: TimerHandle,
    },

    /// Session reached its terminal state
    Finished {
        /// Why the session ended
        reason: CancelReason,
    },
}

/// Serializable view of a session for adapters.
///
/// Carries everything, including private fields such as identities and
/// notes. The adapter decides what each player is allowed to see.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    /// Room the session is bound to
    pub id: RoomId,
    /// Host player
    pub host: PlayerId,
    /// Gamemode code
    pub gamemode: String,
    /// Language tag
    pub language: String,
    /// Full state
    pub state: SessionState,
    /// Derived lobby status
    pub lobby_status: LobbyStatus,
    /// Derived game phase
    pub game_phase: GamePhase,
    /// Current settings
    pub settings: Settings,
    /// Players in display order
    pub players: Vec<Player>,
    /// Cached ready count
    pub ready_count: usize,
    /// Cached quit vote count
    pub quit_count: usize,
    /// Quit votes required to end the game
    pub needed_to_quit: usize,
    /// Round order, once assigned
    pub round_order: Option<Vec<PlayerId>>,
    /// Player whose turn it is during a round
    pub current_player: Option<PlayerId>,
    /// Whether the lobby expiry is armed
    pub expiry_armed: bool,
    /// Whether the ready countdown is armed
    pub countdown_armed: bool,
}

/// Session state machine for one room.
///
/// Generic over `I` (Instant type) to support virtual time in tests.
#[derive(Debug, Clone)]
pub struct Session<I = Instant> {
    /// Room the session is bound to
    id: RoomId,
    /// Only player allowed to change settings, start and cancel
    host: PlayerId,
    /// Gamemode code chosen at creation
    gamemode: String,
    /// Lower-cased language tag
    language: String,
    /// Current state
    state: SessionState,
    /// Host-chosen settings
    settings: Settings,
    /// Roster and per-player state
    players: PlayerRegistry,
    /// Lobby expiry and ready countdown
    timers: SessionTimers<I>,
    /// Configuration
    config: SessionConfig,
}

impl<I: Timestamp> Session<I> {
    /// Create a session in [`SessionState::Waiting`] with the host as its
    /// only player and the lobby expiry armed.
    pub fn new(
        id: RoomId,
        host: PlayerId,
        language: &str,
        gamemode: impl Into<String>,
        now: I,
        config: SessionConfig,
    ) -> Self {
        Self::with_allocator(id, host, language, gamemode, now, config, HandleAllocator::new())
    }

    /// Like [`Session::new`], drawing timer handles from `handles`.
    pub fn with_allocator(
        id: RoomId,
        host: PlayerId,
        language: &str,
        gamemode: impl Into<String>,
        now: I,
        config: SessionConfig,
        handles: HandleAllocator,
    ) -> Self {
        let mut timers = SessionTimers::with_allocator(handles);
        timers.arm(TimerKind::LobbyExpiry, now + config.lobby_extension);

        let language = language.trim().to_lowercase();
        let language = if language.is_empty() { DEFAULT_LANGUAGE.to_string() } else { language };

        tracing::debug!(room = id, host, %language, "session created");

        Self {
            id,
            host,
            gamemode: gamemode.into(),
            language,
            state: SessionState::Waiting,
            settings: Settings::default(),
            players: PlayerRegistry::with_player(host),
            timers,
            config,
        }
    }

    /// Room the session is bound to.
    pub fn id(&self) -> RoomId {
        self.id
    }

    /// Host player.
    pub fn host(&self) -> PlayerId {
        self.host
    }

    /// Current state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Derived lobby status.
    pub fn lobby_status(&self) -> LobbyStatus {
        self.state.lobby_status()
    }

    /// Derived game phase.
    pub fn game_phase(&self) -> GamePhase {
        self.state.game_phase()
    }

    /// True once the session has ended.
    pub fn is_finished(&self) -> bool {
        self.state.is_finished()
    }

    /// Current settings.
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Language tag.
    pub fn language(&self) -> &str {
        &self.language
    }

    /// Gamemode code.
    pub fn gamemode(&self) -> &str {
        &self.gamemode
    }

    /// Roster.
    pub fn players(&self) -> &PlayerRegistry {
        &self.players
    }

    /// Timer slots.
    pub fn timers(&self) -> &SessionTimers<I> {
        &self.timers
    }

    /// Lobby expiry deadline. `None` outside the lobby.
    pub fn expiry(&self) -> Option<I> {
        self.timers.deadline(TimerKind::LobbyExpiry)
    }

    /// Ready countdown deadline. `None` unless armed.
    pub fn ready_countdown_deadline(&self) -> Option<I> {
        self.timers.deadline(TimerKind::ReadyCountdown)
    }

    /// Round cursor. `None` outside a round.
    pub fn round_index(&self) -> Option<usize> {
        match self.state {
            SessionState::Round { index } => Some(index),
            _ => None,
        }
    }

    /// Player whose turn it is. `None` outside a round.
    pub fn current_player(&self) -> Option<PlayerId> {
        let index = self.round_index()?;
        self.players.round_order()?.get(index).copied()
    }

    /// Add a player to the lobby.
    ///
    /// # Errors
    ///
    /// - `SessionError::InvalidState` if not in [`SessionState::Waiting`]
    /// - `SessionError::AlreadyInGame` if the player is already a member
    pub fn join(&mut self, player: PlayerId, now: I) -> Result<Vec<SessionAction<I>>, SessionError> {
        if self.state != SessionState::Waiting {
            return Err(self.invalid_state("join"));
        }

        self.players.add(player).map_err(|err| match err {
            SessionError::AlreadyPresent(id) => SessionError::AlreadyInGame(id),
            other => other,
        })?;
        self.extend_expiry(now);

        tracing::debug!(room = self.id, player, players = self.players.len(), "player joined");
        Ok(vec![SessionAction::StateChanged])
    }

    /// Remove a player.
    ///
    /// The host leaving cancels the session. Mid-game departures rewire the
    /// target graph and may end the game if too few players remain or the
    /// remaining quit votes now reach the quorum.
    ///
    /// # Errors
    ///
    /// - `SessionError::InvalidState` if the session already finished
    /// - `SessionError::PlayerNotFound` if the player is not a member
    pub fn leave(&mut self, player: PlayerId, now: I) -> Result<Vec<SessionAction<I>>, SessionError> {
        if self.state.is_finished() {
            return Err(self.invalid_state("leave"));
        }
        if !self.players.contains(player) {
            return Err(SessionError::PlayerNotFound(player));
        }
        if player == self.host {
            return Ok(self.cancel(CancelReason::ByHost));
        }

        match self.state {
            SessionState::Waiting => {
                self.players.remove(player)?;
                self.extend_expiry(now);
                tracing::debug!(room = self.id, player, "player left lobby");
                Ok(vec![SessionAction::StateChanged])
            },
            SessionState::Assigning | SessionState::Round { .. } => {
                self.remove_mid_game(player, now)
            },
            SessionState::Finished { .. } => Err(self.invalid_state("leave")),
        }
    }

    /// Set a player's readiness.
    ///
    /// In the lobby this gates [`Session::start`]. While assigning it means
    /// "I have named my target": full readiness arms the ready countdown and
    /// any player un-readying cancels it. Re-applying the current value is a
    /// no-op and returns no actions.
    ///
    /// # Errors
    ///
    /// - `SessionError::InvalidState` during a round or after the game
    /// - `SessionError::PlayerNotFound` if the player is not a member
    /// - `SessionError::IdentityMissing` if readying up before naming the
    ///   target
    pub fn set_ready(
        &mut self,
        player: PlayerId,
        ready: bool,
        now: I,
    ) -> Result<Vec<SessionAction<I>>, SessionError> {
        match self.state {
            SessionState::Waiting => {
                if !self.players.set_ready(player, ready)? {
                    return Ok(Vec::new());
                }
                Ok(vec![SessionAction::StateChanged])
            },
            SessionState::Assigning => {
                if !self.players.contains(player) {
                    return Err(SessionError::PlayerNotFound(player));
                }
                if ready && !self.players.has_named_target(player) {
                    return Err(SessionError::IdentityMissing { player });
                }
                if !self.players.set_ready(player, ready)? {
                    return Ok(Vec::new());
                }

                let mut actions = self.sync_ready_countdown(now);
                actions.push(SessionAction::StateChanged);
                Ok(actions)
            },
            SessionState::Round { .. } | SessionState::Finished { .. } => {
                Err(self.invalid_state("set_ready"))
            },
        }
    }

    /// Set a player's quit vote. Ends the game once the quorum is reached.
    ///
    /// # Errors
    ///
    /// - `SessionError::InvalidState` outside a game
    /// - `SessionError::PlayerNotFound` if the player is not a member
    pub fn set_quit_vote(
        &mut self,
        player: PlayerId,
        wants_to_quit: bool,
    ) -> Result<Vec<SessionAction<I>>, SessionError> {
        match self.state {
            SessionState::Assigning | SessionState::Round { .. } => {
                if !self.players.set_quit_vote(player, wants_to_quit)? {
                    return Ok(Vec::new());
                }

                if self.players.quorum_reached() {
                    return Ok(self.cancel(CancelReason::VoteQuit));
                }
                Ok(vec![SessionAction::StateChanged])
            },
            SessionState::Waiting | SessionState::Finished { .. } => {
                Err(self.invalid_state("set_quit_vote"))
            },
        }
    }

    /// Apply host-submitted settings.
    ///
    /// A guess ceiling at or above the player count means "unlimited" and is
    /// stored as 0.
    ///
    /// # Errors
    ///
    /// - `SessionError::InvalidState` outside the lobby
    /// - `SessionError::Unauthorized` if `caller` is not the host
    /// - `SessionError::Expired` if the lobby deadline already passed
    /// - `SessionError::InvalidSetting` for negative or oversized numbers
    pub fn update_settings(
        &mut self,
        caller: PlayerId,
        update: SettingsUpdate,
        now: I,
    ) -> Result<Vec<SessionAction<I>>, SessionError> {
        if self.state != SessionState::Waiting {
            return Err(self.invalid_state("update_settings"));
        }
        self.require_host(caller)?;
        if self.expiry().is_some_and(|deadline| now > deadline) {
            return Err(SessionError::Expired);
        }

        let max_guesses = non_negative("maxGuesses", update.max_guesses)?;
        let time_limit = non_negative("timeLimit", update.time_limit)?;

        self.settings.max_guesses =
            if (max_guesses as usize) < self.players.len() { max_guesses } else { 0 };
        self.settings.time_limit = time_limit;
        self.settings.category = update
            .category
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty() && c != "0");
        self.extend_expiry(now);

        tracing::debug!(room = self.id, settings = ?self.settings, "settings updated");
        Ok(vec![SessionAction::StateChanged])
    }

    /// Change the session language. Cosmetic; only the adapter reads it.
    ///
    /// # Errors
    ///
    /// - `SessionError::InvalidState` if the session already finished
    /// - `SessionError::Unauthorized` if `caller` is not the host
    /// - `SessionError::InvalidSetting` if the code is empty
    pub fn set_language(
        &mut self,
        caller: PlayerId,
        code: &str,
        now: I,
    ) -> Result<Vec<SessionAction<I>>, SessionError> {
        if self.state.is_finished() {
            return Err(self.invalid_state("set_language"));
        }
        self.require_host(caller)?;

        let code = code.trim().to_lowercase();
        if code.is_empty() {
            return Err(SessionError::InvalidSetting {
                field: "language",
                reason: "language code is empty".to_string(),
            });
        }
        if code == self.language {
            return Ok(Vec::new());
        }

        self.language = code;
        self.extend_expiry(now);
        Ok(vec![SessionAction::StateChanged])
    }

    /// Start the game: assign targets and enter [`SessionState::Assigning`].
    ///
    /// Clears the lobby expiry and every ready flag.
    ///
    /// # Errors
    ///
    /// - `SessionError::InvalidState` outside the lobby
    /// - `SessionError::Unauthorized` if `caller` is not the host
    /// - `SessionError::NotReady` unless at least two players are all ready
    pub fn start<R: Rng + ?Sized>(
        &mut self,
        caller: PlayerId,
        rng: &mut R,
    ) -> Result<Vec<SessionAction<I>>, SessionError> {
        if self.state != SessionState::Waiting {
            return Err(self.invalid_state("start"));
        }
        self.require_host(caller)?;

        let total = self.players.len();
        if total < 2 || !self.players.all_ready() {
            return Err(SessionError::NotReady { ready: self.players.ready_count(), total });
        }

        let assignment = assign_targets(self.players.join_order(), rng)?;
        self.players.apply_assignment(assignment.round_order, &assignment.targets);
        self.players.reset_ready();
        self.timers.cancel_kind(TimerKind::LobbyExpiry);
        self.state = SessionState::Assigning;

        tracing::info!(room = self.id, players = total, "game started");
        Ok(vec![SessionAction::StateChanged])
    }

    /// Write the identity of `player`'s target.
    ///
    /// # Errors
    ///
    /// - `SessionError::InvalidState` outside the assigning phase
    /// - `SessionError::PlayerNotFound` if the player is not a member
    /// - `SessionError::EmptyText` / `SessionError::TextTooLong` for bad text
    pub fn record_identity(
        &mut self,
        player: PlayerId,
        identity: &str,
    ) -> Result<Vec<SessionAction<I>>, SessionError> {
        if self.state != SessionState::Assigning {
            return Err(self.invalid_state("record_identity"));
        }
        if !self.players.contains(player) {
            return Err(SessionError::PlayerNotFound(player));
        }

        let identity = validate_text("identity", identity, self.config.max_identity_len)?;
        let target = self.players.record_identity(player, identity)?;

        tracing::debug!(room = self.id, player, target, "identity recorded");
        Ok(vec![SessionAction::StateChanged])
    }

    /// Record a note for the current player and pass the turn on.
    ///
    /// # Errors
    ///
    /// - `SessionError::InvalidState` outside a round
    /// - `SessionError::PlayerNotFound` if the player is not a member
    /// - `SessionError::NotCurrentPlayer` if it is not `player`'s turn
    /// - `SessionError::EmptyText` / `SessionError::TextTooLong` for bad text
    pub fn add_note(
        &mut self,
        player: PlayerId,
        question: &str,
        answer: &str,
    ) -> Result<Vec<SessionAction<I>>, SessionError> {
        if self.round_index().is_none() {
            return Err(self.invalid_state("add_note"));
        }
        if !self.players.contains(player) {
            return Err(SessionError::PlayerNotFound(player));
        }

        let current = self.current_player();
        if current != Some(player) {
            return Err(SessionError::NotCurrentPlayer { player, current });
        }

        let question = validate_text("question", question, self.config.max_question_len)?;
        let answer = validate_text("answer", answer, self.config.max_answer_len)?;
        self.players.push_note(player, Note { question, answer })?;
        self.next_round();

        Ok(vec![SessionAction::StateChanged])
    }

    /// Host-requested cancellation.
    ///
    /// # Errors
    ///
    /// - `SessionError::InvalidState` if the session already finished
    /// - `SessionError::Unauthorized` if `caller` is not the host
    pub fn cancel_by_host(&mut self, caller: PlayerId) -> Result<Vec<SessionAction<I>>, SessionError> {
        if self.state.is_finished() {
            return Err(self.invalid_state("cancel"));
        }
        self.require_host(caller)?;
        Ok(self.cancel(CancelReason::ByHost))
    }

    /// End the session. Idempotent: a finished session returns no actions.
    pub fn cancel(&mut self, reason: CancelReason) -> Vec<SessionAction<I>> {
        if self.state.is_finished() {
            return Vec::new();
        }

        let mut actions: Vec<_> = self
            .timers
            .cancel_all()
            .into_iter()
            .map(|handle| SessionAction::CancelTimer { handle })
            .collect();
        self.state = SessionState::Finished { reason };

        tracing::info!(room = self.id, reason = reason.as_str(), "session cancelled");
        actions.push(SessionAction::Finished { reason });
        actions
    }

    /// Deliver a timer previously handed out in a
    /// [`SessionAction::ScheduleTimer`].
    ///
    /// Stale handles (cancelled, replaced or already fired) are ignored. The
    /// lobby expiry is never scheduled and only the sweep may consume it.
    pub fn timer_fired(&mut self, handle: TimerHandle) -> Vec<SessionAction<I>> {
        if self.timers.handle(TimerKind::ReadyCountdown) == Some(handle) {
            self.timers.fire(handle);
            return self.begin_round();
        }
        tracing::trace!(room = self.id, handle = handle.value(), "stale timer ignored");
        Vec::new()
    }

    /// Fire the ready countdown if its deadline has passed.
    pub fn poll_timers(&mut self, now: I) -> Vec<SessionAction<I>> {
        match self.timers.due(TimerKind::ReadyCountdown, now) {
            Some(handle) => self.timer_fired(handle),
            None => Vec::new(),
        }
    }

    /// True if the lobby expiry falls before `now + window`.
    ///
    /// The registry sweep calls this with its own interval, so a session is
    /// never kept alive more than one sweep past its deadline.
    pub fn lobby_expires_within(&self, now: I, window: Duration) -> bool {
        self.state == SessionState::Waiting
            && self.expiry().is_some_and(|deadline| deadline < now + window)
    }

    /// Serializable view for adapters.
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            id: self.id,
            host: self.host,
            gamemode: self.gamemode.clone(),
            language: self.language.clone(),
            state: self.state,
            lobby_status: self.lobby_status(),
            game_phase: self.game_phase(),
            settings: self.settings.clone(),
            players: self.players.iter().cloned().collect(),
            ready_count: self.players.ready_count(),
            quit_count: self.players.quit_count(),
            needed_to_quit: self.players.needed_to_quit(),
            round_order: self.players.round_order().map(<[PlayerId]>::to_vec),
            current_player: self.current_player(),
            expiry_armed: self.timers.is_armed(TimerKind::LobbyExpiry),
            countdown_armed: self.timers.is_armed(TimerKind::ReadyCountdown),
        }
    }

    fn remove_mid_game(
        &mut self,
        player: PlayerId,
        now: I,
    ) -> Result<Vec<SessionAction<I>>, SessionError> {
        let position = self.players.round_position(player);
        self.players.remove(player)?;
        tracing::info!(room = self.id, player, remaining = self.players.len(), "player quit");

        if self.players.len() < 2 {
            return Ok(self.cancel(CancelReason::Abandoned));
        }
        if self.players.quorum_reached() {
            return Ok(self.cancel(CancelReason::VoteQuit));
        }

        let mut actions = Vec::new();
        match self.state {
            SessionState::Assigning => {
                // Retargeting may hand a ready player a target nobody has named yet
                let unnamed: Vec<PlayerId> = self
                    .players
                    .iter()
                    .filter(|p| p.ready && !self.players.has_named_target(p.id))
                    .map(|p| p.id)
                    .collect();
                for id in unnamed {
                    self.players.set_ready(id, false)?;
                }
                actions.extend(self.sync_ready_countdown(now));
            },
            SessionState::Round { index } => {
                let mut next = match position {
                    Some(pos) if pos < index => index - 1,
                    _ => index,
                };
                if next >= self.players.len() {
                    next = 0;
                }
                self.state = SessionState::Round { index: next };
            },
            SessionState::Waiting | SessionState::Finished { .. } => {},
        }

        actions.push(SessionAction::StateChanged);
        Ok(actions)
    }

    /// Arm the countdown on full readiness, cancel it otherwise.
    fn sync_ready_countdown(&mut self, now: I) -> Vec<SessionAction<I>> {
        let armed = self.timers.handle(TimerKind::ReadyCountdown);

        match (self.players.all_ready(), armed) {
            (true, None) => {
                let deadline = now + self.config.ready_countdown;
                let (handle, _) = self.timers.arm(TimerKind::ReadyCountdown, deadline);
                tracing::debug!(room = self.id, handle = handle.value(), "ready countdown armed");
                vec![SessionAction::ScheduleTimer {
                    handle,
                    kind: TimerKind::ReadyCountdown,
                    deadline,
                }]
            },
            (false, Some(handle)) => {
                self.timers.cancel(handle);
                tracing::debug!(room = self.id, handle = handle.value(), "ready countdown cancelled");
                vec![SessionAction::CancelTimer { handle }]
            },
            _ => Vec::new(),
        }
    }

    fn begin_round(&mut self) -> Vec<SessionAction<I>> {
        if self.state != SessionState::Assigning || !self.players.all_ready() {
            return Vec::new();
        }

        self.state = SessionState::Round { index: 0 };
        tracing::info!(room = self.id, first = ?self.current_player(), "first round started");
        vec![SessionAction::StateChanged]
    }

    fn next_round(&mut self) {
        if let SessionState::Round { index } = self.state {
            let len = self.players.round_order().map_or(1, <[PlayerId]>::len).max(1);
            self.state = SessionState::Round { index: (index + 1) % len };
        }
    }

    /// Push the lobby deadline forward. No-op outside the lobby.
    fn extend_expiry(&mut self, now: I) {
        if self.state == SessionState::Waiting {
            self.timers.arm(TimerKind::LobbyExpiry, now + self.config.lobby_extension);
        }
    }

    fn require_host(&self, caller: PlayerId) -> Result<(), SessionError> {
        if caller == self.host { Ok(()) } else { Err(SessionError::Unauthorized { player: caller }) }
    }

    fn invalid_state(&self, operation: &'static str) -> SessionError {
        SessionError::InvalidState { state: self.state, operation }
    }
}

fn non_negative(field: &'static str, value: i64) -> Result<u32, SessionError> {
    if value < 0 {
        return Err(SessionError::InvalidSetting {
            field,
            reason: format!("{value} is negative"),
        });
    }
    u32::try_from(value).map_err(|_| SessionError::InvalidSetting {
        field,
        reason: format!("{value} is too large"),
    })
}

fn validate_text(field: &'static str, text: &str, max: usize) -> Result<String, SessionError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(SessionError::EmptyText { field });
    }
    if trimmed.chars().count() > max {
        return Err(SessionError::TextTooLong { field, max });
    }
    Ok(trimmed.to_string())
}
