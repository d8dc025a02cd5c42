//! Group-by/aggregate nodes.
//!
//! One running aggregate per group key. Inserting into a fresh group
//! emits the group tuple; further inserts and retracts adjust the
//! aggregate and emit updates; when the last member leaves, the group
//! tuple is retracted and the group entry removed. The out tuple's
//! result fact is finalized from the accumulator at drain time, so
//! downstream always observes the settled aggregate.

use std::collections::HashMap;
use std::sync::Arc;

use smallvec::SmallVec;

use scoreflow_core::{Result, ScoreFlowError};

use crate::collector::{Accumulator, Collector, UndoId};
use crate::fact::FactRef;
use crate::index::IndexKey;
use crate::queue::PropagationQueue;
use crate::topology::{GroupKeyFn, NodeId};
use crate::tuple::{TupleArena, TupleId};

struct Group {
    out: TupleId,
    key_fact: Option<FactRef>,
    member_count: usize,
    accumulator: Option<Box<dyn Accumulator>>,
}

pub(crate) struct GroupState {
    groups: HashMap<IndexKey, Group>,
    /// Input tuple -> (its group key, its accumulator undo handle).
    membership: HashMap<TupleId, (IndexKey, Option<UndoId>)>,
    /// Out tuple -> group key, for drain-time finalization.
    out_keys: HashMap<TupleId, IndexKey>,
}

impl GroupState {
    pub(crate) fn new() -> Self {
        GroupState {
            groups: HashMap::new(),
            membership: HashMap::new(),
            out_keys: HashMap::new(),
        }
    }

    fn key_of(key_fn: &Option<GroupKeyFn>, facts: &[FactRef]) -> (IndexKey, Option<FactRef>) {
        match key_fn {
            Some(f) => {
                let key_fact = f(facts);
                (IndexKey::from_fact(&*key_fact), Some(key_fact))
            }
            None => (IndexKey::Unit, None),
        }
    }

    pub(crate) fn insert(
        &mut self,
        key_fn: &Option<GroupKeyFn>,
        collector: &Option<Arc<dyn Collector>>,
        arena: &mut TupleArena,
        queue: &mut PropagationQueue,
        own: NodeId,
        input: TupleId,
    ) -> Result<()> {
        let facts = arena.get(input)?.facts.clone();
        let (key, key_fact) = Self::key_of(key_fn, &facts);

        if !self.groups.contains_key(&key) {
            let initial: SmallVec<[FactRef; 4]> = key_fact.iter().cloned().collect();
            let out = arena.allocate(own, initial, SmallVec::new());
            queue.enqueue_insert(arena, out)?;
            self.out_keys.insert(out, key.clone());
            self.groups.insert(
                key.clone(),
                Group {
                    out,
                    key_fact,
                    member_count: 0,
                    accumulator: collector.as_ref().map(|c| c.create()),
                },
            );
        } else {
            let group = &self.groups[&key];
            queue.enqueue_update(arena, group.out)?;
        }

        let group = self
            .groups
            .get_mut(&key)
            .ok_or_else(|| ScoreFlowError::Internal("group vanished during insert".into()))?;
        group.member_count += 1;
        let undo = group
            .accumulator
            .as_mut()
            .map(|acc| acc.accumulate(&facts));
        self.membership.insert(input, (key, undo));
        Ok(())
    }

    pub(crate) fn update(
        &mut self,
        key_fn: &Option<GroupKeyFn>,
        collector: &Option<Arc<dyn Collector>>,
        arena: &mut TupleArena,
        queue: &mut PropagationQueue,
        own: NodeId,
        input: TupleId,
    ) -> Result<()> {
        let facts = arena.get(input)?.facts.clone();
        let (new_key, _) = Self::key_of(key_fn, &facts);
        let (old_key, old_undo) = self
            .membership
            .get(&input)
            .cloned()
            .ok_or_else(|| {
                ScoreFlowError::Internal(format!("group update for unknown input {input:?}"))
            })?;

        if old_key == new_key {
            let group = self.groups.get_mut(&old_key).ok_or_else(|| {
                ScoreFlowError::Internal("group missing for live membership".into())
            })?;
            if let Some(acc) = &mut group.accumulator {
                let undo = old_undo.ok_or_else(|| {
                    ScoreFlowError::Internal("missing undo handle for collected group".into())
                })?;
                acc.retract(undo);
                let new_undo = acc.accumulate(&facts);
                self.membership.insert(input, (old_key, Some(new_undo)));
            }
            queue.enqueue_update(arena, group.out)
        } else {
            self.retract(arena, queue, input)?;
            self.insert(key_fn, collector, arena, queue, own, input)
        }
    }

    pub(crate) fn retract(
        &mut self,
        arena: &mut TupleArena,
        queue: &mut PropagationQueue,
        input: TupleId,
    ) -> Result<()> {
        let (key, undo) = self.membership.remove(&input).ok_or_else(|| {
            ScoreFlowError::Internal(format!("group retract for unknown input {input:?}"))
        })?;
        let group = self
            .groups
            .get_mut(&key)
            .ok_or_else(|| ScoreFlowError::Internal("group missing for live membership".into()))?;
        if let Some(acc) = &mut group.accumulator {
            let undo = undo.ok_or_else(|| {
                ScoreFlowError::Internal("missing undo handle for collected group".into())
            })?;
            acc.retract(undo);
        }
        group.member_count -= 1;

        if group.member_count == 0 {
            let out = group.out;
            self.groups.remove(&key);
            self.out_keys.remove(&out);
            queue.enqueue_retract(arena, out)
        } else {
            queue.enqueue_update(arena, group.out)
        }
    }

    /// Rebuilds the out tuple's facts from the settled aggregate. Called
    /// by the scheduler just before the tuple's insert/update propagates.
    pub(crate) fn finalize(&self, arena: &mut TupleArena, out: TupleId) -> Result<()> {
        let key = self.out_keys.get(&out).ok_or_else(|| {
            ScoreFlowError::Internal(format!("finalize of unknown group tuple {out:?}"))
        })?;
        let group = self
            .groups
            .get(key)
            .ok_or_else(|| ScoreFlowError::Internal("group missing at finalize".into()))?;
        if let Some(acc) = &group.accumulator {
            let mut facts: SmallVec<[FactRef; 4]> = group.key_fact.iter().cloned().collect();
            facts.push(acc.result());
            arena.get_mut(out)?.facts = facts;
        }
        Ok(())
    }
}
