//! Deterministic simulation harness for Masque session testing.
//!
//! Virtual-time implementations of the Environment trait and the engine
//! runtime for deterministic, reproducible tests of timers, sweeps and target
//! assignment.
//!
//! # Model-Based Testing
//!
//! The `model` module generates random operation sequences and applies them
//! to a simulated engine, predicting membership outcomes along the way.
//!
//! # Invariant Testing
//!
//! The `invariants` module checks session snapshots against properties that
//! must hold on every execution path. Use [`InvariantRegistry::standard()`]
//! for the full set.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod invariants;
pub mod model;
pub mod sim_driver;
pub mod sim_env;

pub use invariants::{
    CounterCaches, HostPresent, Invariant, InvariantKind, InvariantRegistry, InvariantResult,
    QuitQuorum, RoundCursorInBounds, RoundOrderPermutation, TargetDerangement, TimerExclusivity,
    Violation,
};
pub use model::{Operation, OperationResult, SEATS, Seat, SessionWorld, seat_player};
pub use sim_driver::SimEngine;
pub use sim_env::{SimEnv, SimInstant};
