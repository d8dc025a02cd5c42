//! SimpleScore - Single-level score implementation

use std::cmp::Ordering;
use std::fmt;
use std::ops::{Add, Neg, Sub};

use super::traits::Score;
use super::ScoreLevel;

/// A simple score with a single integer value.
///
/// This is the simplest score type, useful when there's only one
/// type of constraint to optimize.
///
/// # Examples
///
/// ```
/// use scoreflow_core::{Score, SimpleScore};
///
/// let score1 = SimpleScore::of(-5);
/// let score2 = SimpleScore::of(-3);
///
/// assert!(score2 > score1);  // -3 is better than -5
/// assert!(!score1.is_feasible());  // Negative scores are not feasible
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct SimpleScore {
    score: i64,
}

impl SimpleScore {
    /// The zero score.
    pub const ZERO: SimpleScore = SimpleScore { score: 0 };

    /// A score of 1 (useful for unit weights).
    pub const ONE: SimpleScore = SimpleScore { score: 1 };

    /// Creates a new SimpleScore with the given value.
    #[inline]
    pub const fn of(score: i64) -> Self {
        SimpleScore { score }
    }

    /// Returns the score value.
    #[inline]
    pub const fn score(&self) -> i64 {
        self.score
    }
}

impl Score for SimpleScore {
    #[inline]
    fn is_feasible(&self) -> bool {
        self.score >= 0
    }

    #[inline]
    fn zero() -> Self {
        SimpleScore::ZERO
    }

    #[inline]
    fn levels_count(&self) -> usize {
        1
    }

    fn to_level_numbers(&self) -> Vec<i64> {
        vec![self.score]
    }

    fn level_label(&self, index: usize) -> ScoreLevel {
        assert_eq!(index, 0, "SimpleScore has exactly 1 level");
        ScoreLevel::Soft
    }
}

impl Ord for SimpleScore {
    fn cmp(&self, other: &Self) -> Ordering {
        self.score.cmp(&other.score)
    }
}

impl PartialOrd for SimpleScore {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Add for SimpleScore {
    type Output = Self;

    #[inline]
    fn add(self, rhs: Self) -> Self {
        SimpleScore::of(self.score + rhs.score)
    }
}

impl Sub for SimpleScore {
    type Output = Self;

    #[inline]
    fn sub(self, rhs: Self) -> Self {
        SimpleScore::of(self.score - rhs.score)
    }
}

impl Neg for SimpleScore {
    type Output = Self;

    #[inline]
    fn neg(self) -> Self {
        SimpleScore::of(-self.score)
    }
}

impl fmt::Display for SimpleScore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.score)
    }
}

impl fmt::Debug for SimpleScore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SimpleScore({})", self.score)
    }
}
