//! Score types for representing solution quality
//!
//! Scores are used to compare solutions and to accumulate constraint
//! impacts incrementally. All score arithmetic is integer-level, so an
//! impact followed by its exact undo always restores the previous total.

mod bendable;
mod hard_medium_soft;
mod hard_soft;
mod simple;
mod traits;


pub use bendable::BendableScore;
pub use hard_medium_soft::HardMediumSoftScore;
pub use hard_soft::HardSoftScore;
pub use simple::SimpleScore;
pub use traits::Score;

/// Score level representing different constraint priorities.
///
/// Used by [`Score::level_label`] to classify what a given level index
/// represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScoreLevel {
    /// Hard constraints - must be satisfied for feasibility
    Hard,
    /// Medium constraints - secondary priority
    Medium,
    /// Soft constraints - optimization objectives
    Soft,
}
