//! BendableScore - Runtime-configurable multi-level score

use std::cmp::Ordering;
use std::fmt;
use std::ops::{Add, Neg, Sub};

use super::traits::Score;
use super::ScoreLevel;

/// A score with a configurable number of hard and soft levels.
///
/// Unlike `HardSoftScore`, the number of levels is determined at runtime.
/// This is useful when the constraint structure varies between problem
/// instances.
///
/// The generic `Score::zero()` cannot know the level counts, so it returns
/// the dimensionless zero (no levels). The dimensionless zero acts as the
/// identity for addition and subtraction against any level shape; mixing
/// two non-zero scores of different shapes is a caller bug and panics.
///
/// # Examples
///
/// ```
/// use scoreflow_core::score::{BendableScore, Score};
///
/// // Create a score with 2 hard levels and 3 soft levels
/// let score = BendableScore::of(vec![-1, -2], vec![-10, -20, -30]);
///
/// assert_eq!(score.hard_levels_count(), 2);
/// assert_eq!(score.soft_levels_count(), 3);
/// assert!(!score.is_feasible());  // Negative hard scores
///
/// let total = BendableScore::zero() + score.clone();
/// assert_eq!(total, score);
/// ```
#[derive(Clone, Default)]
pub struct BendableScore {
    hard_scores: Vec<i64>,
    soft_scores: Vec<i64>,
}

impl BendableScore {
    /// Creates a new BendableScore with the given hard and soft score vectors.
    pub fn of(hard_scores: Vec<i64>, soft_scores: Vec<i64>) -> Self {
        BendableScore {
            hard_scores,
            soft_scores,
        }
    }

    /// Creates a zero score with the specified number of levels.
    pub fn zero_with_levels(hard_levels: usize, soft_levels: usize) -> Self {
        BendableScore {
            hard_scores: vec![0; hard_levels],
            soft_scores: vec![0; soft_levels],
        }
    }

    /// Returns the number of hard score levels.
    pub fn hard_levels_count(&self) -> usize {
        self.hard_scores.len()
    }

    /// Returns the number of soft score levels.
    pub fn soft_levels_count(&self) -> usize {
        self.soft_scores.len()
    }

    /// Returns all hard scores as a slice.
    pub fn hard_scores(&self) -> &[i64] {
        &self.hard_scores
    }

    /// Returns all soft scores as a slice.
    pub fn soft_scores(&self) -> &[i64] {
        &self.soft_scores
    }

    fn is_dimensionless_zero(&self) -> bool {
        self.hard_scores.is_empty() && self.soft_scores.is_empty()
    }

    fn assert_same_shape(&self, other: &Self) {
        assert!(
            self.hard_scores.len() == other.hard_scores.len()
                && self.soft_scores.len() == other.soft_scores.len(),
            "BendableScore level mismatch: {}h/{}s vs {}h/{}s",
            self.hard_scores.len(),
            self.soft_scores.len(),
            other.hard_scores.len(),
            other.soft_scores.len(),
        );
    }
}

impl Score for BendableScore {
    fn is_feasible(&self) -> bool {
        self.hard_scores.iter().all(|&s| s >= 0)
    }

    fn zero() -> Self {
        BendableScore::default()
    }

    fn levels_count(&self) -> usize {
        self.hard_scores.len() + self.soft_scores.len()
    }

    fn to_level_numbers(&self) -> Vec<i64> {
        let mut levels = Vec::with_capacity(self.levels_count());
        levels.extend_from_slice(&self.hard_scores);
        levels.extend_from_slice(&self.soft_scores);
        levels
    }

    fn level_label(&self, index: usize) -> ScoreLevel {
        assert!(
            index < self.levels_count(),
            "BendableScore has {} levels, got index {index}",
            self.levels_count()
        );
        if index < self.hard_scores.len() {
            ScoreLevel::Hard
        } else {
            ScoreLevel::Soft
        }
    }
}

impl Ord for BendableScore {
    fn cmp(&self, other: &Self) -> Ordering {
        // The dimensionless zero compares as an all-zero score of the
        // other side's shape; both sides are padded with zero levels to
        // the same length before the lexicographic comparison.
        if !self.is_dimensionless_zero() && !other.is_dimensionless_zero() {
            self.assert_same_shape(other);
        }
        let lhs = self.to_level_numbers();
        let rhs = other.to_level_numbers();
        let len = lhs.len().max(rhs.len());
        for i in 0..len {
            let a = lhs.get(i).copied().unwrap_or(0);
            let b = rhs.get(i).copied().unwrap_or(0);
            match a.cmp(&b) {
                Ordering::Equal => {}
                unequal => return unequal,
            }
        }
        Ordering::Equal
    }
}

impl PartialOrd for BendableScore {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for BendableScore {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for BendableScore {}

impl Add for BendableScore {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        if self.is_dimensionless_zero() {
            return rhs;
        }
        if rhs.is_dimensionless_zero() {
            return self;
        }
        self.assert_same_shape(&rhs);
        BendableScore {
            hard_scores: self
                .hard_scores
                .iter()
                .zip(&rhs.hard_scores)
                .map(|(a, b)| a + b)
                .collect(),
            soft_scores: self
                .soft_scores
                .iter()
                .zip(&rhs.soft_scores)
                .map(|(a, b)| a + b)
                .collect(),
        }
    }
}

impl Sub for BendableScore {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        self + (-rhs)
    }
}

impl Neg for BendableScore {
    type Output = Self;

    fn neg(self) -> Self {
        BendableScore {
            hard_scores: self.hard_scores.iter().map(|s| -s).collect(),
            soft_scores: self.soft_scores.iter().map(|s| -s).collect(),
        }
    }
}

impl fmt::Display for BendableScore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fmt_levels = |v: &[i64]| {
            v.iter()
                .map(|s| s.to_string())
                .collect::<Vec<_>>()
                .join("/")
        };
        write!(
            f,
            "[{}]hard/[{}]soft",
            fmt_levels(&self.hard_scores),
            fmt_levels(&self.soft_scores)
        )
    }
}

impl fmt::Debug for BendableScore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BendableScore({self})")
    }
}
