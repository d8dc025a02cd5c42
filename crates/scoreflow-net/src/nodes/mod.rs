//! Per-session node state machines.
//!
//! The compiled [`Topology`](crate::topology::Topology) is read-only; all
//! mutable bookkeeping a node needs (join indexes, group accumulators,
//! derived-tuple maps, score accumulators) lives here, one `NodeState`
//! per node per session.
//!
//! Every state machine follows the same contract: on an upstream insert
//! it derives zero or more out tuples and enqueues them on its own
//! propagation queue; on an upstream update it emits the membership
//! delta (updates, plus inserts for newly matching and retracts for no
//! longer matching); on an upstream retract it retracts every tuple it
//! derived from that input.

mod concat;
mod distinct;
mod filter;
mod flatten;
mod group;
mod join;
mod map;
mod scorer;
mod source;

pub(crate) use concat::ConcatState;
pub(crate) use distinct::DistinctState;
pub(crate) use filter::FilterState;
pub(crate) use flatten::FlatMapState;
pub(crate) use group::GroupState;
pub(crate) use join::{JoinSide, JoinState};
pub(crate) use map::MapState;
pub(crate) use scorer::ScorerState;
pub(crate) use source::SourceState;

use scoreflow_core::Score;

use crate::topology::{NodeKind, NodeSpec};

/// Session-side state of one node.
pub(crate) enum NodeState<S: Score> {
    Source(SourceState),
    Filter(FilterState),
    Join(JoinState),
    Group(GroupState),
    Map(MapState),
    FlatMap(FlatMapState),
    Distinct(DistinctState),
    Concat(ConcatState),
    Scorer(ScorerState<S>),
}

impl<S: Score> NodeState<S> {
    pub(crate) fn for_spec(spec: &NodeSpec<S>, match_tracking: bool) -> Self {
        match &spec.kind {
            NodeKind::Source { .. } => NodeState::Source(SourceState::new()),
            NodeKind::Filter { .. } => NodeState::Filter(FilterState::new()),
            NodeKind::Join { .. } => NodeState::Join(JoinState::new()),
            NodeKind::GroupBy { .. } => NodeState::Group(GroupState::new()),
            NodeKind::Map { .. } => NodeState::Map(MapState::new()),
            NodeKind::FlatMap { .. } => NodeState::FlatMap(FlatMapState::new()),
            NodeKind::Distinct => NodeState::Distinct(DistinctState::new()),
            NodeKind::Concat => NodeState::Concat(ConcatState::new()),
            NodeKind::Scorer { .. } => NodeState::Scorer(ScorerState::new(match_tracking)),
        }
    }
}
