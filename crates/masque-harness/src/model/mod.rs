//! Model-based testing support.
//!
//! [`Operation`]s are generated randomly (proptest, cargo-fuzz) and applied
//! to a [`SessionWorld`], which predicts membership outcomes and checks the
//! session invariants after every step.

mod operation;
mod world;

pub use operation::{Operation, SEATS, Seat, seat_player};
pub use world::{OperationResult, SessionWorld};
