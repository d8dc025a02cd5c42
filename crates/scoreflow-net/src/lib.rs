//! ScoreFlow Net - the incremental constraint evaluation network
//!
//! A constraint topology is compiled once with [`TopologyBuilder`] and
//! shared immutably across sessions; each [`Session`] then maintains
//! every constraint's matches incrementally as facts are inserted,
//! updated and retracted, so recomputing the score after a change costs
//! work proportional to what the change actually touched.
//!
//! ```
//! use std::any::Any;
//! use std::rc::Rc;
//! use scoreflow_core::SimpleScore;
//! use scoreflow_net::fact::{Fact, FactId, FactRef, FactSliceExt};
//! use scoreflow_net::session::{Session, SessionConfig};
//! use scoreflow_net::topology::TopologyBuilder;
//!
//! #[derive(Debug)]
//! struct Task { id: u64, late: bool }
//! impl Fact for Task {
//!     fn fact_id(&self) -> FactId { self.id }
//!     fn as_any(&self) -> &dyn Any { self }
//! }
//!
//! let mut builder = TopologyBuilder::<SimpleScore>::new();
//! let tasks = builder.for_each::<Task>();
//! let late = builder.filter(tasks, |facts| facts.fact::<Task>(0).late);
//! builder.penalize(late, "Late task", |_| SimpleScore::ONE);
//! let topology = builder.build().unwrap();
//!
//! let mut session = Session::new(topology, SessionConfig::default());
//! let a: FactRef = Rc::new(Task { id: 1, late: true });
//! let b: FactRef = Rc::new(Task { id: 2, late: false });
//! session.insert(a).unwrap();
//! session.insert(b.clone()).unwrap();
//! assert_eq!(session.calculate_score(SimpleScore::ZERO).unwrap(), SimpleScore::of(-1));
//!
//! // Updating the second task to be late only propagates that change.
//! session.update(Rc::new(Task { id: 2, late: true })).unwrap();
//! assert_eq!(session.calculate_score(SimpleScore::ZERO).unwrap(), SimpleScore::of(-2));
//! ```

#![allow(clippy::type_complexity)]

pub mod analysis;
pub mod collector;
pub mod fact;
pub mod index;
mod nodes;
pub mod queue;
mod scheduler;
pub mod session;
pub mod state;
pub mod topology;
pub mod tuple;

pub use analysis::{ConstraintMatch, ConstraintMatchTotal, Indictment, IndictmentMap};
pub use fact::{Fact, FactId, FactKey, FactRef, FactSliceExt};
pub use index::IndexKey;
pub use session::{Session, SessionConfig};
pub use topology::{StreamRef, Topology, TopologyBuilder};

#[cfg(test)]
mod test_utils;

#[cfg(test)]
mod tests;
