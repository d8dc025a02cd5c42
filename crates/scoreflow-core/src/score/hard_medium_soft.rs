//! HardMediumSoftScore - Three-level score implementation

use std::cmp::Ordering;
use std::fmt;
use std::ops::{Add, Neg, Sub};

use super::traits::Score;
use super::ScoreLevel;

/// A score with hard, medium and soft constraint levels.
///
/// Useful when two tiers of optimization objectives exist below the
/// feasibility line. Comparison considers hard first, then medium, then
/// soft.
///
/// # Examples
///
/// ```
/// use scoreflow_core::HardMediumSoftScore;
///
/// let a = HardMediumSoftScore::of(0, -1, 0);
/// let b = HardMediumSoftScore::of(0, 0, -100);
///
/// // A single medium unit outweighs any soft amount
/// assert!(b > a);
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct HardMediumSoftScore {
    hard: i64,
    medium: i64,
    soft: i64,
}

impl HardMediumSoftScore {
    /// The zero score.
    pub const ZERO: HardMediumSoftScore = HardMediumSoftScore {
        hard: 0,
        medium: 0,
        soft: 0,
    };

    /// Creates a new HardMediumSoftScore.
    #[inline]
    pub const fn of(hard: i64, medium: i64, soft: i64) -> Self {
        HardMediumSoftScore { hard, medium, soft }
    }

    /// Creates a score with only a hard component.
    #[inline]
    pub const fn of_hard(hard: i64) -> Self {
        HardMediumSoftScore::of(hard, 0, 0)
    }

    /// Creates a score with only a medium component.
    #[inline]
    pub const fn of_medium(medium: i64) -> Self {
        HardMediumSoftScore::of(0, medium, 0)
    }

    /// Creates a score with only a soft component.
    #[inline]
    pub const fn of_soft(soft: i64) -> Self {
        HardMediumSoftScore::of(0, 0, soft)
    }

    /// Returns the hard score component.
    #[inline]
    pub const fn hard(&self) -> i64 {
        self.hard
    }

    /// Returns the medium score component.
    #[inline]
    pub const fn medium(&self) -> i64 {
        self.medium
    }

    /// Returns the soft score component.
    #[inline]
    pub const fn soft(&self) -> i64 {
        self.soft
    }
}

impl Score for HardMediumSoftScore {
    #[inline]
    fn is_feasible(&self) -> bool {
        self.hard >= 0
    }

    #[inline]
    fn zero() -> Self {
        HardMediumSoftScore::ZERO
    }

    #[inline]
    fn levels_count(&self) -> usize {
        3
    }

    fn to_level_numbers(&self) -> Vec<i64> {
        vec![self.hard, self.medium, self.soft]
    }

    fn level_label(&self, index: usize) -> ScoreLevel {
        match index {
            0 => ScoreLevel::Hard,
            1 => ScoreLevel::Medium,
            2 => ScoreLevel::Soft,
            _ => panic!("HardMediumSoftScore has exactly 3 levels, got index {index}"),
        }
    }
}

impl Ord for HardMediumSoftScore {
    fn cmp(&self, other: &Self) -> Ordering {
        self.hard
            .cmp(&other.hard)
            .then_with(|| self.medium.cmp(&other.medium))
            .then_with(|| self.soft.cmp(&other.soft))
    }
}

impl PartialOrd for HardMediumSoftScore {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Add for HardMediumSoftScore {
    type Output = Self;

    #[inline]
    fn add(self, rhs: Self) -> Self {
        HardMediumSoftScore::of(
            self.hard + rhs.hard,
            self.medium + rhs.medium,
            self.soft + rhs.soft,
        )
    }
}

impl Sub for HardMediumSoftScore {
    type Output = Self;

    #[inline]
    fn sub(self, rhs: Self) -> Self {
        HardMediumSoftScore::of(
            self.hard - rhs.hard,
            self.medium - rhs.medium,
            self.soft - rhs.soft,
        )
    }
}

impl Neg for HardMediumSoftScore {
    type Output = Self;

    #[inline]
    fn neg(self) -> Self {
        HardMediumSoftScore::of(-self.hard, -self.medium, -self.soft)
    }
}

impl fmt::Display for HardMediumSoftScore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}hard/{}medium/{}soft",
            self.hard, self.medium, self.soft
        )
    }
}

impl fmt::Debug for HardMediumSoftScore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "HardMediumSoftScore({}hard/{}medium/{}soft)",
            self.hard, self.medium, self.soft
        )
    }
}
