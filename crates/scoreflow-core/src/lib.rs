//! ScoreFlow Core - Score types and constraint identification
//!
//! This crate provides the fundamental abstractions shared by the
//! incremental evaluation network:
//! - Score types for representing solution quality
//! - Constraint identification types
//! - The common error taxonomy

pub mod constraint;
pub mod error;
pub mod score;

pub use constraint::{ConstraintRef, ImpactType};
pub use error::{Result, ScoreFlowError};
pub use score::{
    BendableScore, HardMediumSoftScore, HardSoftScore, Score, ScoreLevel, SimpleScore,
};
