//! Property-based tests for the session engine.
//!
//! Random operation sequences are applied to a [`SessionWorld`]; after every
//! step the standard invariants must hold and membership outcomes must match
//! the world's prediction.

use masque_core::{GamePhase, SessionState};
use masque_harness::{Operation, OperationResult, SessionWorld};
use proptest::prelude::*;

/// Weighted towards the operations that move a session forward.
fn operation_strategy() -> impl Strategy<Value = Operation> {
    let seat = 0u8..8;

    prop_oneof![
        4 => seat.clone().prop_map(|seat| Operation::Join { seat }),
        1 => seat.clone().prop_map(|seat| Operation::Leave { seat }),
        2 => (seat.clone(), any::<bool>()).prop_map(|(seat, ready)| Operation::SetReady { seat, ready }),
        3 => Just(Operation::ReadyEveryone),
        1 => (seat.clone(), any::<bool>()).prop_map(|(seat, vote)| Operation::SetQuitVote { seat, vote }),
        1 => (seat.clone(), any::<i8>(), any::<i8>()).prop_map(|(seat, max_guesses, time_limit)| {
            Operation::UpdateSettings { seat, max_guesses, time_limit }
        }),
        3 => Just(Operation::Start { seat: 0 }),
        1 => seat.clone().prop_map(|seat| Operation::Start { seat }),
        1 => (seat.clone(), any::<u8>()).prop_map(|(seat, len)| Operation::RecordIdentity { seat, len }),
        3 => Just(Operation::NameEveryTarget),
        3 => seat.clone().prop_map(|seat| Operation::AddNote { seat }),
        1 => seat.clone().prop_map(|seat| Operation::Cancel { seat }),
        1 => Just(Operation::Create),
        2 => (0u8..30).prop_map(|secs| Operation::Advance { secs }),
    ]
}

fn apply_all(world: &mut SessionWorld, ops: &[Operation]) -> Result<(), TestCaseError> {
    for (i, op) in ops.iter().enumerate() {
        let result = world.apply(op);
        prop_assert!(result.is_ok(), "operation {} ({:?}) failed: {:?}", i, op, result);

        if let Err(violations) = world.check() {
            return Err(TestCaseError::fail(format!(
                "invariants violated after operation {i} ({op:?}): {violations:?}"
            )));
        }
    }
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    /// Invariants hold after every operation of a random sequence.
    #[test]
    fn prop_invariants_hold(
        seed in any::<u64>(),
        ops in prop::collection::vec(operation_strategy(), 0..80)
    ) {
        let mut world = SessionWorld::new(seed)?;
        world.apply(&Operation::Create).map_err(TestCaseError::fail)?;
        apply_all(&mut world, &ops)?;
    }

    /// Same seed, same operations, same final state.
    #[test]
    fn prop_replay_is_deterministic(
        seed in any::<u64>(),
        ops in prop::collection::vec(operation_strategy(), 0..60)
    ) {
        let mut first = SessionWorld::new(seed)?;
        let mut second = SessionWorld::new(seed)?;

        for world in [&mut first, &mut second] {
            world.apply(&Operation::Create).map_err(TestCaseError::fail)?;
            for op in &ops {
                world.apply(op).map_err(TestCaseError::fail)?;
            }
        }

        prop_assert_eq!(first.snapshot(), second.snapshot());
        prop_assert_eq!(first.engine().notifications(), second.engine().notifications());
    }

    /// A full table that readies up and starts always gets a complete
    /// target cycle, whatever the seed.
    #[test]
    fn prop_start_assigns_every_target(seed in any::<u64>(), players in 2u8..6) {
        let mut world = SessionWorld::new(seed)?;
        world.apply(&Operation::Create).map_err(TestCaseError::fail)?;
        for seat in 1..players {
            prop_assert_eq!(world.apply(&Operation::Join { seat }).map_err(TestCaseError::fail)?, OperationResult::Applied);
        }
        world.apply(&Operation::ReadyEveryone).map_err(TestCaseError::fail)?;
        prop_assert_eq!(world.apply(&Operation::Start { seat: 0 }).map_err(TestCaseError::fail)?, OperationResult::Applied);

        let snapshot = world.snapshot().ok_or_else(|| TestCaseError::fail("session vanished"))?;
        prop_assert_eq!(snapshot.state, SessionState::Assigning);
        prop_assert_eq!(snapshot.game_phase, GamePhase::Assigning);
        prop_assert!(snapshot.players.iter().all(|p| p.target.is_some() && !p.ready));
        prop_assert!(world.check().is_ok());
    }

    /// Naming every target and waiting out the countdown reaches the first
    /// round.
    #[test]
    fn prop_countdown_reaches_round(seed in any::<u64>(), players in 2u8..6) {
        let mut world = SessionWorld::new(seed)?;
        world.apply(&Operation::Create).map_err(TestCaseError::fail)?;
        for seat in 1..players {
            world.apply(&Operation::Join { seat }).map_err(TestCaseError::fail)?;
        }
        world.apply(&Operation::ReadyEveryone).map_err(TestCaseError::fail)?;
        world.apply(&Operation::Start { seat: 0 }).map_err(TestCaseError::fail)?;
        world.apply(&Operation::NameEveryTarget).map_err(TestCaseError::fail)?;
        world.apply(&Operation::ReadyEveryone).map_err(TestCaseError::fail)?;

        let armed = world.snapshot().is_some_and(|s| s.countdown_armed);
        prop_assert!(armed, "countdown not armed after everyone readied");

        world.apply(&Operation::Advance { secs: 10 }).map_err(TestCaseError::fail)?;
        let snapshot = world.snapshot().ok_or_else(|| TestCaseError::fail("session vanished"))?;
        prop_assert_eq!(snapshot.state, SessionState::Round { index: 0 });
        prop_assert!(!snapshot.countdown_armed);
        prop_assert!(world.check().is_ok());
    }
}

#[test]
fn idle_lobby_is_swept() {
    let mut world = SessionWorld::new(9).unwrap();
    world.apply(&Operation::Create).unwrap();
    world.apply(&Operation::Join { seat: 1 }).unwrap();

    world.apply(&Operation::Advance { secs: 30 }).unwrap();
    assert!(world.snapshot().is_some());

    world.apply(&Operation::Advance { secs: 31 }).unwrap();
    assert!(world.snapshot().is_none());
    assert_eq!(world.apply(&Operation::Join { seat: 2 }).unwrap(), OperationResult::Rejected("noGame"));
}

#[test]
fn host_leaving_closes_the_room() {
    let mut world = SessionWorld::new(1).unwrap();
    world.apply(&Operation::Create).unwrap();
    world.apply(&Operation::Join { seat: 1 }).unwrap();

    assert_eq!(world.apply(&Operation::Leave { seat: 0 }).unwrap(), OperationResult::Applied);
    assert!(world.snapshot().is_none());
    assert_eq!(world.steps(), 3);
}
