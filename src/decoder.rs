//! Single-edge quadrature decoding.
//!
//! [`decode`] maps a pair of observed line levels onto a [`Transition`].
//! Exactly one channel changing yields a ±1 step (4× resolution, one count
//! per edge); both channels changing at once is reported as
//! [`Transition::Invalid`] because the direction of a missed edge cannot be
//! recovered.
//!
//! ```text
//!            A rises   A falls   B rises   B falls
//! other = 0    -1        +1        +1        -1
//! other = 1    +1        -1        -1        +1
//! ```

/// Logical levels of both channels at one observation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Levels {
    /// Channel A (`true` = high).
    pub a: bool,
    /// Channel B (`true` = high).
    pub b: bool,
}

impl Levels {
    pub const fn new(a: bool, b: bool) -> Self {
        Self { a, b }
    }
}

/// Outcome of decoding one observation against the previous one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Transition {
    /// One edge in the counting direction (+1).
    Forward,
    /// One edge against the counting direction (−1).
    Backward,
    /// Neither channel changed.
    Unchanged,
    /// Both channels changed between observations; at least one edge was missed.
    Invalid,
}

impl Transition {
    /// Signed count delta, or `None` for [`Transition::Invalid`].
    pub const fn delta(self) -> Option<i32> {
        match self {
            Transition::Forward => Some(1),
            Transition::Backward => Some(-1),
            Transition::Unchanged => Some(0),
            Transition::Invalid => None,
        }
    }
}

/// Decode the transition from `old` to `new`.
///
/// Pure and stateless. Calling it with `old == new` is harmless and returns
/// [`Transition::Unchanged`].
pub const fn decode(old: Levels, new: Levels) -> Transition {
    let a_changed = old.a != new.a;
    let b_changed = old.b != new.b;

    match (a_changed, b_changed) {
        (false, false) => Transition::Unchanged,
        (true, true) => Transition::Invalid,
        // A edge: rising counts up when B is high, falling counts up when B is low.
        (true, false) => {
            if new.a == old.b {
                Transition::Forward
            } else {
                Transition::Backward
            }
        }
        // B edge: rising counts up when A is low, falling counts up when A is high.
        (false, true) => {
            if new.b != old.a {
                Transition::Forward
            } else {
                Transition::Backward
            }
        }
    }
}

// ── Unit Tests ───────────────────────────────────────────────────────
