//! Core Score trait definition

use std::fmt::{Debug, Display};
use std::ops::{Add, Neg, Sub};

use super::ScoreLevel;

/// Core trait for all score types in ScoreFlow.
///
/// Scores represent the quality of a planning solution. The incremental
/// network relies on three properties:
/// - Addition is associative and commutative, with `zero()` as identity
/// - Every score has an exact additive inverse (`Neg`)
/// - Comparison is a total order with higher-priority levels first
///
/// The second property is what makes retraction exact: undoing a match is
/// `total - contribution`, and because all level arithmetic is `i64`,
/// incremental and from-scratch totals can never diverge.
pub trait Score:
    Clone
    + Debug
    + Display
    + Default
    + Send
    + Sync
    + PartialEq
    + Eq
    + PartialOrd
    + Ord
    + Add<Output = Self>
    + Sub<Output = Self>
    + Neg<Output = Self>
    + 'static
{
    /// Returns true if this score represents a feasible solution.
    ///
    /// A solution is feasible when all hard constraints are satisfied
    /// (i.e., every hard level is >= 0).
    fn is_feasible(&self) -> bool;

    /// Returns the zero score (identity element for addition).
    fn zero() -> Self;

    /// Returns the number of score levels.
    ///
    /// For example:
    /// - SimpleScore: 1 level
    /// - HardSoftScore: 2 levels
    /// - HardMediumSoftScore: 3 levels
    fn levels_count(&self) -> usize;

    /// Returns the score values as a vector of i64.
    ///
    /// The order is from highest priority to lowest priority.
    /// For HardSoftScore: [hard, soft]
    fn to_level_numbers(&self) -> Vec<i64>;

    /// Returns the semantic label for the score level at the given index.
    ///
    /// Level indices follow the same order as `to_level_numbers()`:
    /// highest priority first.
    ///
    /// # Panics
    /// Panics if `index >= levels_count()`.
    fn level_label(&self, index: usize) -> ScoreLevel;

    /// Returns true if this score is better than the other score.
    ///
    /// In optimization, "better" means higher.
    fn is_better_than(&self, other: &Self) -> bool {
        self > other
    }

    /// Returns true if this score is worse than the other score.
    fn is_worse_than(&self, other: &Self) -> bool {
        self < other
    }
}
