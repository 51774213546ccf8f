//! Fuzz target for the session state machine
//!
//! Drive one room through arbitrary player and clock operations
//!
//! # Strategy
//!
//! - Membership churn: joins and leaves from a small seat range, host
//!   included
//! - Phase pressure: bulk ready and identity operations so sequences reach
//!   the assigning and round phases
//! - Hostile input: negative settings, empty and over-long identities,
//!   non-host starts and cancels
//! - Time: virtual clock jumps that race the countdown against the sweep
//!
//! # Invariants
//!
//! - Cached ready and quit counters equal a scan of the roster
//! - While playing, targets form a derangement over the roster
//! - Round order is a permutation of the roster and the cursor is in bounds
//! - Lobby expiry and ready countdown are never armed together
//! - Joins and leaves are accepted exactly when membership allows

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use masque_harness::{Operation, SessionWorld};

#[derive(Debug, Clone, Arbitrary)]
struct Scenario {
    seed: u64,
    ops: Vec<Operation>,
}

fuzz_target!(|scenario: Scenario| {
    let mut world = SessionWorld::new(scenario.seed).expect("default config is valid");

    for op in std::iter::once(Operation::Create).chain(scenario.ops.into_iter().take(256)) {
        if let Err(msg) = world.apply(&op) {
            panic!("step {}: {op:?}: {msg}", world.steps());
        }
        if let Err(violations) = world.check() {
            panic!("step {}: {op:?} broke invariants: {violations:?}", world.steps());
        }
    }
});
