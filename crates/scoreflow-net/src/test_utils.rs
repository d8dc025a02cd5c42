//! Shared fixtures for the scenario test suites.

use std::any::Any;
use std::rc::Rc;
use std::sync::Arc;

use scoreflow_core::SimpleScore;

use crate::fact::{Fact, FactId, FactRef, FactSliceExt};
use crate::index::IndexKey;
use crate::topology::{Topology, TopologyBuilder};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ValueFact {
    pub id: u64,
    pub value: i64,
}

impl Fact for ValueFact {
    fn fact_id(&self) -> FactId {
        self.id
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

pub(crate) fn value_fact(id: u64, value: i64) -> FactRef {
    Rc::new(ValueFact { id, value })
}

/// Self-join on equal `value`, deduplicated by `left.id < right.id`,
/// one penalty point per surviving pair.
pub(crate) fn equal_pair_topology() -> Arc<Topology<SimpleScore>> {
    let mut builder = TopologyBuilder::new();
    let facts = builder.for_each::<ValueFact>();
    let pairs = builder.join(
        facts,
        facts,
        |f| IndexKey::Int(f.fact::<ValueFact>(0).value),
        |f| IndexKey::Int(f.fact::<ValueFact>(0).value),
    );
    let ordered = builder.filter(pairs, |f| {
        f.fact::<ValueFact>(0).id < f.fact::<ValueFact>(1).id
    });
    builder.penalize(ordered, "Equal pair", |_| SimpleScore::ONE);
    builder.build().unwrap()
}

/// Groups by `value` and penalizes each group by the square of its size.
pub(crate) fn count_square_topology() -> Arc<Topology<SimpleScore>> {
    let mut builder = TopologyBuilder::new();
    let facts = builder.for_each::<ValueFact>();
    let groups = builder.group_by(
        facts,
        |f| Rc::new(f.fact::<ValueFact>(0).value) as FactRef,
        crate::collector::count(),
    );
    builder.penalize(groups, "Crowded value", |f| {
        let count = *f.fact::<i64>(1);
        SimpleScore::of(count * count)
    });
    builder.build().unwrap()
}

/// Diamond with a join head: equal-value pairs fan out into two filters
/// whose outputs merge into a single counted group.
pub(crate) fn join_diamond_topology() -> Arc<Topology<SimpleScore>> {
    let mut builder = TopologyBuilder::new();
    let facts = builder.for_each::<ValueFact>();
    let pairs = builder.join(
        facts,
        facts,
        |f| IndexKey::Int(f.fact::<ValueFact>(0).value),
        |f| IndexKey::Int(f.fact::<ValueFact>(0).value),
    );
    let ordered = builder.filter(pairs, |f| {
        f.fact::<ValueFact>(0).id < f.fact::<ValueFact>(1).id
    });
    let even_ids = builder.filter(pairs, |f| {
        (f.fact::<ValueFact>(0).id + f.fact::<ValueFact>(1).id) % 2 == 0
    });
    let merged = builder.concat(ordered, even_ids);
    let counted = builder.group_collect(merged, crate::collector::count());
    builder.penalize(counted, "Flagged pairs", |f| {
        SimpleScore::of(*f.fact::<i64>(0))
    });
    builder.build().unwrap()
}

/// Diamond: one source fans out into two filters whose outputs merge
/// into a single counted group.
pub(crate) fn diamond_topology() -> Arc<Topology<SimpleScore>> {
    let mut builder = TopologyBuilder::new();
    let facts = builder.for_each::<ValueFact>();
    let small = builder.filter(facts, |f| f.fact::<ValueFact>(0).value < 10);
    let even = builder.filter(facts, |f| f.fact::<ValueFact>(0).value % 2 == 0);
    let merged = builder.concat(small, even);
    let counted = builder.group_collect(merged, crate::collector::count());
    builder.penalize(counted, "Flagged facts", |f| {
        SimpleScore::of(*f.fact::<i64>(0))
    });
    builder.build().unwrap()
}
