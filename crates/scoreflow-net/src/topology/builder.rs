//! Programmatic construction of a compiled topology.
//!
//! The builder is how an external constraint compiler hands the network
//! its graph: streams are appended leaves-first, every stream must end in
//! a penalize/reward scorer, and `build()` computes the layer schedule and
//! validates the result.
//!
//! # Example
//!
//! ```
//! use std::any::Any;
//! use scoreflow_core::SimpleScore;
//! use scoreflow_net::fact::{Fact, FactId, FactSliceExt};
//! use scoreflow_net::topology::TopologyBuilder;
//!
//! #[derive(Debug)]
//! struct Task { id: u64, unassigned: bool }
//! impl Fact for Task {
//!     fn fact_id(&self) -> FactId { self.id }
//!     fn as_any(&self) -> &dyn Any { self }
//! }
//!
//! let mut builder = TopologyBuilder::<SimpleScore>::new();
//! let tasks = builder.for_each::<Task>();
//! let unassigned = builder.filter(tasks, |facts| facts.fact::<Task>(0).unassigned);
//! builder.penalize(unassigned, "Unassigned task", |_| SimpleScore::ONE);
//! let topology = builder.build().unwrap();
//! assert_eq!(topology.node_count(), 3);
//! ```

use std::sync::Arc;

use smallvec::SmallVec;

use scoreflow_core::{ConstraintRef, ImpactType, Result, Score, ScoreFlowError};

use crate::collector::Collector;
use crate::fact::{Fact, FactRef};
use crate::index::IndexKey;
use crate::topology::{
    ConstraintDef, ConstraintId, NodeId, NodeKind, NodeSpec, Port, Topology,
};

/// Handle to a stream (the output of one node) during building.
#[derive(Debug, Clone, Copy)]
pub struct StreamRef {
    node: NodeId,
    arity: u8,
}

impl StreamRef {
    /// Output arity of the underlying node.
    pub fn arity(&self) -> u8 {
        self.arity
    }
}

struct PendingNode<S: Score> {
    kind: NodeKind<S>,
    arity: u8,
    upstream: SmallVec<[(NodeId, Port); 2]>,
}

/// Builds a [`Topology`].
///
/// Stream-shape misuse (joining on a non-uni right side, concatenating
/// different arities) is a defect in the constraint compiler driving the
/// builder and panics immediately; graph-level problems (dangling
/// streams, no constraints) are reported by [`TopologyBuilder::build`].
pub struct TopologyBuilder<S: Score> {
    nodes: Vec<PendingNode<S>>,
    constraints: Vec<ConstraintDef>,
}

impl<S: Score> Default for TopologyBuilder<S> {
    fn default() -> Self {
        TopologyBuilder::new()
    }
}

impl<S: Score> TopologyBuilder<S> {
    pub fn new() -> Self {
        TopologyBuilder {
            nodes: Vec::new(),
            constraints: Vec::new(),
        }
    }

    fn push(&mut self, node: PendingNode<S>) -> StreamRef {
        let id = NodeId::new(self.nodes.len() as u32);
        let arity = node.arity;
        self.nodes.push(node);
        StreamRef { node: id, arity }
    }

    /// Declares a source stream of every inserted fact of concrete type
    /// `T`.
    pub fn for_each<T: Fact>(&mut self) -> StreamRef {
        self.for_each_matching(
            std::any::type_name::<T>(),
            |fact| fact.as_any().is::<T>(),
        )
    }

    /// Declares a source stream with an arbitrary acceptance predicate.
    ///
    /// This is the supertype/interface subscription form: the predicate
    /// is consulted once per distinct concrete fact type and the decision
    /// is cached by the session's dispatch index.
    pub fn for_each_matching(
        &mut self,
        label: impl Into<String>,
        accepts: impl Fn(&dyn Fact) -> bool + Send + Sync + 'static,
    ) -> StreamRef {
        self.push(PendingNode {
            kind: NodeKind::Source {
                accepts: Arc::new(accepts),
                label: label.into(),
            },
            arity: 1,
            upstream: SmallVec::new(),
        })
    }

    /// Keeps tuples for which `predicate` holds.
    pub fn filter(
        &mut self,
        source: StreamRef,
        predicate: impl Fn(&[FactRef]) -> bool + Send + Sync + 'static,
    ) -> StreamRef {
        self.push(PendingNode {
            kind: NodeKind::Filter {
                predicate: Arc::new(predicate),
            },
            arity: source.arity,
            upstream: smallvec::smallvec![(source.node, Port::Single)],
        })
    }

    /// Equi-joins `left` (any arity) with `right` (must be a uni stream)
    /// on equal keys. The out arity is `left.arity + 1`.
    ///
    /// # Panics
    /// Panics if `right` is not a uni stream.
    pub fn join(
        &mut self,
        left: StreamRef,
        right: StreamRef,
        left_key: impl Fn(&[FactRef]) -> IndexKey + Send + Sync + 'static,
        right_key: impl Fn(&[FactRef]) -> IndexKey + Send + Sync + 'static,
    ) -> StreamRef {
        assert_eq!(
            right.arity, 1,
            "join right side must be a uni stream; chain joins for higher arities"
        );
        self.push(PendingNode {
            kind: NodeKind::Join {
                left_key: Arc::new(left_key),
                right_key: Arc::new(right_key),
            },
            arity: left.arity + 1,
            upstream: smallvec::smallvec![(left.node, Port::Left), (right.node, Port::Right)],
        })
    }

    /// Groups by a key fact and folds a collector. The out tuples are
    /// `(key, result)` pairs.
    pub fn group_by(
        &mut self,
        source: StreamRef,
        key: impl Fn(&[FactRef]) -> FactRef + Send + Sync + 'static,
        collector: Arc<dyn Collector>,
    ) -> StreamRef {
        self.push(PendingNode {
            kind: NodeKind::GroupBy {
                key: Some(Arc::new(key)),
                collector: Some(collector),
            },
            arity: 2,
            upstream: smallvec::smallvec![(source.node, Port::Single)],
        })
    }

    /// Groups by a key fact without a collector. The out tuples are the
    /// distinct keys.
    pub fn group_by_key(
        &mut self,
        source: StreamRef,
        key: impl Fn(&[FactRef]) -> FactRef + Send + Sync + 'static,
    ) -> StreamRef {
        self.push(PendingNode {
            kind: NodeKind::GroupBy {
                key: Some(Arc::new(key)),
                collector: None,
            },
            arity: 1,
            upstream: smallvec::smallvec![(source.node, Port::Single)],
        })
    }

    /// Folds the whole stream into one aggregate tuple.
    pub fn group_collect(
        &mut self,
        source: StreamRef,
        collector: Arc<dyn Collector>,
    ) -> StreamRef {
        self.push(PendingNode {
            kind: NodeKind::GroupBy {
                key: None,
                collector: Some(collector),
            },
            arity: 1,
            upstream: smallvec::smallvec![(source.node, Port::Single)],
        })
    }

    /// Rewrites each tuple's facts. `out_arity` is the mapper's fixed
    /// output arity.
    pub fn map(
        &mut self,
        source: StreamRef,
        out_arity: u8,
        mapper: impl Fn(&[FactRef]) -> Vec<FactRef> + Send + Sync + 'static,
    ) -> StreamRef {
        self.push(PendingNode {
            kind: NodeKind::Map {
                mapper: Arc::new(mapper),
            },
            arity: out_arity,
            upstream: smallvec::smallvec![(source.node, Port::Single)],
        })
    }

    /// Expands each tuple into zero or more out tuples of `out_arity`.
    pub fn flat_map(
        &mut self,
        source: StreamRef,
        out_arity: u8,
        mapper: impl Fn(&[FactRef]) -> Vec<Vec<FactRef>> + Send + Sync + 'static,
    ) -> StreamRef {
        self.push(PendingNode {
            kind: NodeKind::FlatMap {
                mapper: Arc::new(mapper),
            },
            arity: out_arity,
            upstream: smallvec::smallvec![(source.node, Port::Single)],
        })
    }

    /// Deduplicates tuples by the identity of their facts.
    pub fn distinct(&mut self, source: StreamRef) -> StreamRef {
        self.push(PendingNode {
            kind: NodeKind::Distinct,
            arity: source.arity,
            upstream: smallvec::smallvec![(source.node, Port::Single)],
        })
    }

    /// Merges two streams of the same arity.
    ///
    /// # Panics
    /// Panics if the arities differ.
    pub fn concat(&mut self, left: StreamRef, right: StreamRef) -> StreamRef {
        assert_eq!(
            left.arity, right.arity,
            "concat requires equal arities ({} vs {})",
            left.arity, right.arity
        );
        self.push(PendingNode {
            kind: NodeKind::Concat,
            arity: left.arity,
            upstream: smallvec::smallvec![(left.node, Port::Left), (right.node, Port::Right)],
        })
    }

    /// Terminates a stream in a penalizing constraint.
    pub fn penalize(
        &mut self,
        source: StreamRef,
        name: impl Into<String>,
        weight: impl Fn(&[FactRef]) -> S + Send + Sync + 'static,
    ) -> ConstraintId {
        self.impact(source, ConstraintRef::new("", name), ImpactType::Penalty, weight)
    }

    /// Terminates a stream in a rewarding constraint.
    pub fn reward(
        &mut self,
        source: StreamRef,
        name: impl Into<String>,
        weight: impl Fn(&[FactRef]) -> S + Send + Sync + 'static,
    ) -> ConstraintId {
        self.impact(source, ConstraintRef::new("", name), ImpactType::Reward, weight)
    }

    /// Terminates a stream in a scorer with an explicit constraint
    /// reference and impact direction.
    pub fn impact(
        &mut self,
        source: StreamRef,
        constraint_ref: ConstraintRef,
        impact_type: ImpactType,
        weight: impl Fn(&[FactRef]) -> S + Send + Sync + 'static,
    ) -> ConstraintId {
        let constraint = ConstraintId::new(self.constraints.len() as u32);
        self.constraints.push(ConstraintDef {
            constraint_ref,
            impact_type,
        });
        self.push(PendingNode {
            kind: NodeKind::Scorer {
                constraint,
                weight: Arc::new(weight),
            },
            arity: source.arity,
            upstream: smallvec::smallvec![(source.node, Port::Single)],
        });
        constraint
    }

    /// Compiles the accumulated streams into an immutable topology.
    ///
    /// Computes each node's layer (`1 + max(upstream layers)`, sources 0)
    /// and the per-layer drain order, and rejects graphs with no
    /// constraints or with streams that feed nothing.
    pub fn build(self) -> Result<Arc<Topology<S>>> {
        if self.constraints.is_empty() {
            return Err(ScoreFlowError::Topology(
                "a topology needs at least one constraint".into(),
            ));
        }

        let mut nodes: Vec<NodeSpec<S>> = Vec::with_capacity(self.nodes.len());
        let mut sources = Vec::new();

        // Upstream nodes are always appended before their consumers, so a
        // single forward pass settles every layer.
        for (i, pending) in self.nodes.into_iter().enumerate() {
            let id = NodeId::new(i as u32);
            let layer = pending
                .upstream
                .iter()
                .map(|&(up, _)| nodes[up.index()].layer + 1)
                .max()
                .unwrap_or(0);
            if let NodeKind::Source { .. } = pending.kind {
                sources.push(id);
            }
            nodes.push(NodeSpec {
                kind: pending.kind,
                layer,
                arity: pending.arity,
                downstream: SmallVec::new(),
            });
            for &(up, port) in &pending.upstream {
                // Re-borrow: upstream indexes are strictly below `i`.
                nodes[up.index()].downstream.push((id, port));
            }
        }

        for (i, spec) in nodes.iter().enumerate() {
            let is_scorer = matches!(spec.kind, NodeKind::Scorer { .. });
            if !is_scorer && spec.downstream.is_empty() {
                return Err(ScoreFlowError::Topology(format!(
                    "node {i} is a dangling stream: it feeds no consumer and no scorer"
                )));
            }
        }

        let max_layer = nodes.iter().map(|n| n.layer).max().unwrap_or(0);
        let mut layers = vec![Vec::new(); max_layer as usize + 1];
        for (i, spec) in nodes.iter().enumerate() {
            layers[spec.layer as usize].push(NodeId::new(i as u32));
        }

        Ok(Arc::new(Topology::new(
            nodes,
            layers,
            sources,
            self.constraints,
        )))
    }
}
