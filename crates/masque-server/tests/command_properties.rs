//! Property-based tests for the console command encoding
//!
//! Action ids are what adapters put on buttons, so every valid id must parse
//! back to itself and no input may crash the parser.

use masque_server::{ActionId, ActionName, Command, ParseError, parse_line};
use proptest::prelude::*;

fn action_name() -> impl Strategy<Value = ActionName> {
    prop::sample::select(ActionName::ALL.to_vec())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    #[test]
    fn prop_action_id_parses_back(action in action_name(), room_id in any::<u64>()) {
        let id = ActionId::new(action, room_id);
        prop_assert_eq!(id.to_string().parse::<ActionId>()?, id);
    }

    #[test]
    fn prop_parser_never_panics(line in ".{0,64}") {
        let _ = parse_line(&line);
    }

    #[test]
    fn prop_simple_commands_carry_room_and_player(
        action in action_name(),
        room_id in any::<u64>(),
        player_id in any::<u64>()
    ) {
        let result = parse_line(&format!("{action}-{room_id} {player_id}"));

        match action {
            ActionName::Settings
            | ActionName::Language
            | ActionName::Identity
            | ActionName::Note => prop_assert!(matches!(result, Err(ParseError::MissingArgument(_)))),
            _ => {
                let line = result?;
                prop_assert_eq!(line.room_id, room_id);
                prop_assert_eq!(line.player_id, player_id);
            },
        }
    }

    #[test]
    fn prop_identity_text_kept_verbatim(text in "[A-Za-z][A-Za-z .']{0,30}[A-Za-z]") {
        let line = parse_line(&format!("identity-3 9 {text}"))?;
        prop_assert_eq!(line.command, Command::RecordIdentity(text));
    }
}
