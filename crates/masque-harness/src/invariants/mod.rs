//! Invariant checking for deterministic simulation testing.
//!
//! Invariants are properties that must always hold during session execution.
//! Unlike example-based tests that check specific scenarios, invariants
//! verify behavioral properties across all possible execution paths.
//!
//! # Architecture
//!
//! Invariants run against a [`SessionSnapshot`], the same serializable view
//! the engine hands to adapters. Violations carry enough context to debug
//! the failing sequence.
//!
//! # Usage
//!
//! ```ignore
//! let registry = InvariantRegistry::standard();
//! registry.check_all(&session.snapshot())?;
//! ```

mod checks;

pub use checks::{
    CounterCaches, HostPresent, QuitQuorum, RoundCursorInBounds, RoundOrderPermutation,
    TargetDerangement, TimerExclusivity,
};
use masque_core::SessionSnapshot;

/// Invariant check result.
pub type InvariantResult = Result<(), Violation>;

/// Invariant identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InvariantKind {
    /// Cached counters equal the scan counts
    CounterCaches,
    /// Quorum equals `floor(n/2)+1`
    QuitQuorum,
    /// Targets form a fixed-point-free bijection while playing
    TargetDerangement,
    /// Round order is a permutation of the roster
    RoundOrderPermutation,
    /// Round cursor points into the round order
    RoundCursorInBounds,
    /// Expiry and countdown are never both armed
    TimerExclusivity,
    /// Roster is non-empty and contains the host
    HostPresent,
}

impl InvariantKind {
    /// Name for error reporting.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::CounterCaches => "counter_caches",
            Self::QuitQuorum => "quit_quorum",
            Self::TargetDerangement => "target_derangement",
            Self::RoundOrderPermutation => "round_order_permutation",
            Self::RoundCursorInBounds => "round_cursor_in_bounds",
            Self::TimerExclusivity => "timer_exclusivity",
            Self::HostPresent => "host_present",
        }
    }
}

/// Invariant violation with context.
#[derive(Debug, Clone)]
pub struct Violation {
    /// The violated invariant.
    pub invariant: InvariantKind,
    /// Description of what went wrong.
    pub message: String,
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.invariant.as_str(), self.message)
    }
}

impl std::error::Error for Violation {}

/// An invariant that can be checked against session state.
pub trait Invariant: Send + Sync {
    /// Which invariant this is.
    fn kind(&self) -> InvariantKind;

    /// Check the invariant against a snapshot.
    ///
    /// Returns `Ok(())` if the invariant holds, or a [`Violation`]
    /// describing what went wrong.
    fn check(&self, state: &SessionSnapshot) -> InvariantResult;
}

/// Registry of invariants to check.
pub struct InvariantRegistry {
    invariants: Vec<Box<dyn Invariant>>,
}

impl Default for InvariantRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl InvariantRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self { invariants: Vec::new() }
    }

    /// Create a registry with every session invariant.
    pub fn standard() -> Self {
        let mut registry = Self::new();
        registry.add(CounterCaches);
        registry.add(QuitQuorum);
        registry.add(TargetDerangement);
        registry.add(RoundOrderPermutation);
        registry.add(RoundCursorInBounds);
        registry.add(TimerExclusivity);
        registry.add(HostPresent);
        registry
    }

    /// Add an invariant to the registry.
    pub fn add<I: Invariant + 'static>(&mut self, invariant: I) {
        self.invariants.push(Box::new(invariant));
    }

    /// Check all invariants against the given state.
    ///
    /// Returns `Ok(())` if all invariants hold, or all violations found.
    pub fn check_all(&self, state: &SessionSnapshot) -> Result<(), Vec<Violation>> {
        let violations: Vec<_> =
            self.invariants.iter().filter_map(|inv| inv.check(state).err()).collect();

        if violations.is_empty() { Ok(()) } else { Err(violations) }
    }

    /// Number of registered invariants.
    pub fn len(&self) -> usize {
        self.invariants.len()
    }

    /// Check if registry is empty.
    pub fn is_empty(&self) -> bool {
        self.invariants.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use masque_core::{Session, SessionConfig};

    use super::*;

    #[test]
    fn standard_registry_has_invariants() {
        let registry = InvariantRegistry::standard();
        assert_eq!(registry.len(), 7);
    }

    #[test]
    fn fresh_session_passes_invariants() {
        let session = Session::new(1, 10, "en", "classic", Instant::now(), SessionConfig::default());
        let registry = InvariantRegistry::standard();

        assert!(registry.check_all(&session.snapshot()).is_ok());
    }

    #[test]
    fn tampered_counter_is_reported() {
        let session = Session::new(1, 10, "en", "classic", Instant::now(), SessionConfig::default());
        let mut snapshot = session.snapshot();
        snapshot.ready_count = 5;

        let violations = InvariantRegistry::standard().check_all(&snapshot).unwrap_err();

        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].invariant, InvariantKind::CounterCaches);
    }
}
