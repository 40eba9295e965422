//! Fractional ordering keys for list positions.
//!
//! # Responsibility
//! - Derive a new ordering key between two neighbors.
//! - Provide evenly spaced keys for renormalizing a sublist.
//!
//! # Invariants
//! - Callers derive `prev`/`next` from the same sorted sublist, so
//!   `prev <= next` whenever both are present.
//! - Repeated midpoint insertion between fixed neighbors halves the gap each
//!   time; after roughly 50 halvings of a 1000 gap the midpoint collapses onto
//!   a neighbor. `has_room` detects that point.

/// Distance between a new key and its single neighbor, and the key of the
/// first task in an empty list.
pub const POSITION_GAP: f64 = 1000.0;

/// Computes an ordering key that sorts between `prev` and `next`.
pub fn calculate_position(prev: Option<f64>, next: Option<f64>) -> f64 {
    match (prev, next) {
        (None, None) => POSITION_GAP,
        (Some(prev), None) => prev + POSITION_GAP,
        (None, Some(next)) => next - POSITION_GAP,
        (Some(prev), Some(next)) => {
            debug_assert!(prev <= next, "neighbors out of order: {prev} > {next}");
            (prev + next) / 2.0
        }
    }
}

/// Returns whether `calculate_position(prev, next)` sorts strictly between
/// both present neighbors.
pub fn has_room(prev: Option<f64>, next: Option<f64>) -> bool {
    let candidate = calculate_position(prev, next);
    if !candidate.is_finite() {
        return false;
    }
    prev.map_or(true, |prev| candidate > prev) && next.map_or(true, |next| candidate < next)
}

/// Returns `count` evenly spaced keys: `GAP, 2 * GAP, ...`.
pub fn spread_positions(count: usize) -> Vec<f64> {
    (1..=count).map(|slot| slot as f64 * POSITION_GAP).collect()
}
