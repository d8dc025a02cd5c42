//! The compiled, immutable node/layer topology.
//!
//! A topology is built once per constraint definition and shared
//! (read-only, behind an `Arc`) by every session evaluating it. All
//! per-solution mutable state lives in the session.

mod builder;

pub use builder::{StreamRef, TopologyBuilder};

use std::sync::Arc;

use smallvec::SmallVec;

use scoreflow_core::{ConstraintRef, ImpactType, Score};

use crate::collector::Collector;
use crate::fact::{Fact, FactRef};
use crate::index::IndexKey;

/// Index of a node in the topology's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(u32);

impl NodeId {
    pub(crate) fn new(index: u32) -> Self {
        NodeId(index)
    }

    #[inline]
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

/// Which input of a two-input node an edge feeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Port {
    Single,
    Left,
    Right,
}

/// Index of a constraint in the topology's constraint table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConstraintId(u32);

impl ConstraintId {
    pub(crate) fn new(index: u32) -> Self {
        ConstraintId(index)
    }

    #[inline]
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

pub type FactPredicate = Arc<dyn Fn(&dyn Fact) -> bool + Send + Sync>;
pub type TuplePredicate = Arc<dyn Fn(&[FactRef]) -> bool + Send + Sync>;
pub type KeyFn = Arc<dyn Fn(&[FactRef]) -> IndexKey + Send + Sync>;
pub type GroupKeyFn = Arc<dyn Fn(&[FactRef]) -> FactRef + Send + Sync>;
pub type MapFn = Arc<dyn Fn(&[FactRef]) -> Vec<FactRef> + Send + Sync>;
pub type FlatMapFn = Arc<dyn Fn(&[FactRef]) -> Vec<Vec<FactRef>> + Send + Sync>;
pub type WeightFn<S> = Arc<dyn Fn(&[FactRef]) -> S + Send + Sync>;

/// The behavior of one node. Closures are shared, facts are not: a
/// topology serves sessions on any number of threads, each session is
/// single-threaded.
pub enum NodeKind<S: Score> {
    /// Receives external insert/update/retract calls for facts matching
    /// its acceptance predicate.
    Source { accepts: FactPredicate, label: String },
    /// Keeps tuples matching a predicate.
    Filter { predicate: TuplePredicate },
    /// Keyed equi-join of a left tuple (any arity) with a right uni
    /// tuple. Higher arities are chains of these.
    Join { left_key: KeyFn, right_key: KeyFn },
    /// Groups tuples by an optional key and folds an optional collector.
    /// At least one of the two is present.
    GroupBy {
        key: Option<GroupKeyFn>,
        collector: Option<Arc<dyn Collector>>,
    },
    /// Rewrites each tuple's facts, preserving one-out-per-in.
    Map { mapper: MapFn },
    /// Expands each tuple into zero or more out tuples.
    FlatMap { mapper: FlatMapFn },
    /// Emits one out tuple per distinct fact-identity combination.
    Distinct,
    /// Merges two same-arity streams.
    Concat,
    /// Terminal sink: accumulates one constraint's weighted matches.
    Scorer {
        constraint: ConstraintId,
        weight: WeightFn<S>,
    },
}

/// One compiled node: behavior, layer, downstream subscriptions.
pub struct NodeSpec<S: Score> {
    pub kind: NodeKind<S>,
    /// Longest distance from a source. Sources are layer 0.
    pub layer: u32,
    /// Output arity (number of facts per out tuple).
    pub arity: u8,
    /// Downstream consumers, in subscription order.
    pub downstream: SmallVec<[(NodeId, Port); 2]>,
}

/// One constraint's identity and impact direction. The weight function
/// lives on the scorer node.
pub struct ConstraintDef {
    pub constraint_ref: ConstraintRef,
    pub impact_type: ImpactType,
}

/// The compiled network: node arena, drain layers, constraint table.
pub struct Topology<S: Score> {
    nodes: Vec<NodeSpec<S>>,
    /// Node ids grouped by layer, in deterministic drain order.
    layers: Vec<Vec<NodeId>>,
    sources: Vec<NodeId>,
    constraints: Vec<ConstraintDef>,
}

impl<S: Score> Topology<S> {
    pub(crate) fn new(
        nodes: Vec<NodeSpec<S>>,
        layers: Vec<Vec<NodeId>>,
        sources: Vec<NodeId>,
        constraints: Vec<ConstraintDef>,
    ) -> Self {
        Topology {
            nodes,
            layers,
            sources,
            constraints,
        }
    }

    #[inline]
    pub fn node(&self, id: NodeId) -> &NodeSpec<S> {
        &self.nodes[id.index()]
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Drain order: all nodes grouped by layer, layer 0 first.
    pub fn layers(&self) -> &[Vec<NodeId>] {
        &self.layers
    }

    pub fn sources(&self) -> &[NodeId] {
        &self.sources
    }

    pub fn constraints(&self) -> &[ConstraintDef] {
        &self.constraints
    }

    #[inline]
    pub fn constraint(&self, id: ConstraintId) -> &ConstraintDef {
        &self.constraints[id.index()]
    }

    /// Iterates `(node id, scorer constraint id)` pairs.
    pub(crate) fn scorers(&self) -> impl Iterator<Item = (NodeId, ConstraintId)> + '_ {
        self.nodes.iter().enumerate().filter_map(|(i, spec)| {
            if let NodeKind::Scorer { constraint, .. } = &spec.kind {
                Some((NodeId::new(i as u32), *constraint))
            } else {
                None
            }
        })
    }
}
