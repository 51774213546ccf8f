//! Inbound commands and their textual encoding.
//!
//! Chat adapters identify interactive components with action ids of the form
//! `"<action>-<roomId>"` (for example `join-42`). [`ActionId`] parses those
//! ids; [`parse_line`] extends the same encoding into the console format used
//! by the binary:
//!
//! ```text
//! <action>-<roomId> <playerId> [args...]
//! ```
//!
//! | action     | args                                   |
//! |------------|----------------------------------------|
//! | `create`   | `[language] [gamemode]`                |
//! | `settings` | `<maxGuesses> <timeLimit> [category]`  |
//! | `language` | `<code>`                               |
//! | `identity` | `<text...>`                            |
//! | `note`     | `<question...> \| <answer...>`         |
//! | others     | none                                   |

use std::{fmt, str::FromStr};

use masque_core::{PlayerId, RoomId, SettingsUpdate};
use thiserror::Error;

/// Gamemode used when `create` does not name one.
pub const DEFAULT_GAMEMODE: &str = "classic";

/// Errors from parsing action ids and console lines.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// Line had no tokens
    #[error("empty command")]
    Empty,

    /// Action id lacks the `-<roomId>` suffix
    #[error("malformed action id: {0}")]
    MalformedActionId(String),

    /// Action name is not recognised
    #[error("unknown action: {0}")]
    UnknownAction(String),

    /// A numeric field did not parse
    #[error("invalid {field}: {value}")]
    InvalidNumber {
        /// Field being parsed
        field: &'static str,
        /// Offending text
        value: String,
    },

    /// A required argument is absent
    #[error("missing {0}")]
    MissingArgument(&'static str),
}

/// Commands a player can issue against a room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Open a new lobby with the caller as host
    CreateSession {
        /// Requested language; empty selects the configured default
        language: String,
        /// Gamemode code
        gamemode: String,
    },
    /// Join the lobby
    Join,
    /// Leave the lobby or the game
    Leave,
    /// Set readiness
    SetReady(bool),
    /// Set quit vote
    SetQuitVote(bool),
    /// Host changes settings
    UpdateSettings(SettingsUpdate),
    /// Host changes language
    SetLanguage(String),
    /// Host starts the game
    Start,
    /// Name the caller's target
    RecordIdentity(String),
    /// Record a note for the current turn
    AddNote {
        /// Question asked
        question: String,
        /// Answer received
        answer: String,
    },
    /// Host ends the session
    Cancel,
}

/// Action names carried in action ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionName {
    /// `create`
    Create,
    /// `join`
    Join,
    /// `leave`
    Leave,
    /// `ready`
    Ready,
    /// `unready`
    Unready,
    /// `quit`
    Quit,
    /// `unquit`
    Unquit,
    /// `settings`
    Settings,
    /// `language`
    Language,
    /// `start`
    Start,
    /// `identity`
    Identity,
    /// `note`
    Note,
    /// `cancel`
    Cancel,
}

impl ActionName {
    /// Every action, in help order.
    pub const ALL: [Self; 13] = [
        Self::Create,
        Self::Join,
        Self::Leave,
        Self::Ready,
        Self::Unready,
        Self::Quit,
        Self::Unquit,
        Self::Settings,
        Self::Language,
        Self::Start,
        Self::Identity,
        Self::Note,
        Self::Cancel,
    ];

    /// Wire name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Join => "join",
            Self::Leave => "leave",
            Self::Ready => "ready",
            Self::Unready => "unready",
            Self::Quit => "quit",
            Self::Unquit => "unquit",
            Self::Settings => "settings",
            Self::Language => "language",
            Self::Start => "start",
            Self::Identity => "identity",
            Self::Note => "note",
            Self::Cancel => "cancel",
        }
    }
}

impl fmt::Display for ActionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActionName {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|action| action.as_str() == s)
            .ok_or_else(|| ParseError::UnknownAction(s.to_string()))
    }
}

/// Parsed `"<action>-<roomId>"` identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ActionId {
    /// Action to perform
    pub action: ActionName,
    /// Room it targets
    pub room_id: RoomId,
}

impl ActionId {
    /// Action id for `action` in `room_id`.
    pub fn new(action: ActionName, room_id: RoomId) -> Self {
        Self { action, room_id }
    }
}

impl fmt::Display for ActionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.action, self.room_id)
    }
}

impl FromStr for ActionId {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (action, room) =
            s.split_once('-').ok_or_else(|| ParseError::MalformedActionId(s.to_string()))?;
        let action = action.parse()?;
        let room_id = parse_number("room id", room)?;
        Ok(Self { action, room_id })
    }
}

/// A fully parsed console line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine {
    /// Room the command targets
    pub room_id: RoomId,
    /// Player issuing it
    pub player_id: PlayerId,
    /// The command
    pub command: Command,
}

/// Parse one console line.
pub fn parse_line(line: &str) -> Result<CommandLine, ParseError> {
    let line = line.trim();
    let (id, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
    if id.is_empty() {
        return Err(ParseError::Empty);
    }

    let ActionId { action, room_id } = id.parse()?;

    let rest = rest.trim_start();
    let (player, args) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
    if player.is_empty() {
        return Err(ParseError::MissingArgument("player id"));
    }
    let player_id = parse_number("player id", player)?;

    let command = parse_command(action, args.trim())?;
    Ok(CommandLine { room_id, player_id, command })
}

fn parse_command(action: ActionName, args: &str) -> Result<Command, ParseError> {
    let mut words = args.split_whitespace();

    let command = match action {
        ActionName::Create => Command::CreateSession {
            language: words.next().unwrap_or_default().to_string(),
            gamemode: words.next().unwrap_or(DEFAULT_GAMEMODE).to_string(),
        },
        ActionName::Join => Command::Join,
        ActionName::Leave => Command::Leave,
        ActionName::Ready => Command::SetReady(true),
        ActionName::Unready => Command::SetReady(false),
        ActionName::Quit => Command::SetQuitVote(true),
        ActionName::Unquit => Command::SetQuitVote(false),
        ActionName::Settings => {
            let max_guesses = words.next().ok_or(ParseError::MissingArgument("max guesses"))?;
            let time_limit = words.next().ok_or(ParseError::MissingArgument("time limit"))?;
            let category: Vec<&str> = words.collect();
            Command::UpdateSettings(SettingsUpdate {
                max_guesses: parse_number("max guesses", max_guesses)?,
                time_limit: parse_number("time limit", time_limit)?,
                category: (!category.is_empty()).then(|| category.join(" ")),
            })
        },
        ActionName::Language => {
            Command::SetLanguage(words.next().ok_or(ParseError::MissingArgument("language"))?.to_string())
        },
        ActionName::Start => Command::Start,
        ActionName::Identity => {
            if args.is_empty() {
                return Err(ParseError::MissingArgument("identity"));
            }
            Command::RecordIdentity(args.to_string())
        },
        ActionName::Note => {
            let (question, answer) =
                args.split_once('|').ok_or(ParseError::MissingArgument("answer"))?;
            Command::AddNote { question: question.trim().to_string(), answer: answer.trim().to_string() }
        },
        ActionName::Cancel => Command::Cancel,
    };

    Ok(command)
}

fn parse_number<T: FromStr>(field: &'static str, value: &str) -> Result<T, ParseError> {
    value.parse().map_err(|_| ParseError::InvalidNumber { field, value: value.to_string() })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn action_id_round_trips_through_display() {
        let id: ActionId = "join-42".parse().unwrap();
        assert_eq!(id, ActionId::new(ActionName::Join, 42));
        assert_eq!(id.to_string(), "join-42");
    }

    #[test]
    fn action_id_errors() {
        assert_eq!(
            "join42".parse::<ActionId>(),
            Err(ParseError::MalformedActionId("join42".to_string()))
        );
        assert_eq!("dance-1".parse::<ActionId>(), Err(ParseError::UnknownAction("dance".to_string())));
        assert!(matches!(
            "join-abc".parse::<ActionId>(),
            Err(ParseError::InvalidNumber { field: "room id", .. })
        ));
    }

    #[test]
    fn parses_simple_commands() {
        let line = parse_line("ready-7 12").unwrap();
        assert_eq!(line, CommandLine { room_id: 7, player_id: 12, command: Command::SetReady(true) });

        assert_eq!(parse_line("  unquit-7   3 ").unwrap().command, Command::SetQuitVote(false));
    }

    #[test]
    fn create_defaults() {
        let line = parse_line("create-1 5").unwrap();
        assert_eq!(
            line.command,
            Command::CreateSession { language: String::new(), gamemode: DEFAULT_GAMEMODE.to_string() }
        );
    }

    #[test]
    fn settings_accept_negative_numbers_and_multiword_category() {
        let line = parse_line("settings-1 5 -2 90 old movies").unwrap();
        assert_eq!(
            line.command,
            Command::UpdateSettings(SettingsUpdate {
                max_guesses: -2,
                time_limit: 90,
                category: Some("old movies".to_string()),
            })
        );
    }

    #[test]
    fn note_splits_on_pipe() {
        let line = parse_line("note-1 5 Am I a person? | Yes").unwrap();
        assert_eq!(
            line.command,
            Command::AddNote { question: "Am I a person?".to_string(), answer: "Yes".to_string() }
        );
    }

    #[test]
    fn missing_arguments_reported() {
        assert_eq!(parse_line(""), Err(ParseError::Empty));
        assert_eq!(parse_line("join-1"), Err(ParseError::MissingArgument("player id")));
        assert_eq!(parse_line("identity-1 5"), Err(ParseError::MissingArgument("identity")));
        assert_eq!(parse_line("note-1 5 no answer"), Err(ParseError::MissingArgument("answer")));
    }
}
