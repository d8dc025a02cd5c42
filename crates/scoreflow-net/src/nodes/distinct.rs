//! Distinct nodes: one out tuple per distinct fact-identity combination.
//!
//! Reference-counted like a group with no collector. The first input
//! carrying a combination emits the out tuple; duplicates only bump the
//! count; the out tuple is retracted when the last carrier leaves. An
//! upstream update that changes the combination moves the input between
//! buckets; one that keeps it refreshes the representative in place.

use std::collections::HashMap;

use smallvec::smallvec;

use scoreflow_core::{Result, ScoreFlowError};

use crate::index::IndexKey;
use crate::queue::PropagationQueue;
use crate::topology::NodeId;
use crate::tuple::{TupleArena, TupleId};

pub(crate) struct DistinctState {
    groups: HashMap<IndexKey, (TupleId, usize)>,
    membership: HashMap<TupleId, IndexKey>,
}

impl DistinctState {
    pub(crate) fn new() -> Self {
        DistinctState {
            groups: HashMap::new(),
            membership: HashMap::new(),
        }
    }

    pub(crate) fn insert(
        &mut self,
        arena: &mut TupleArena,
        queue: &mut PropagationQueue,
        own: NodeId,
        input: TupleId,
    ) -> Result<()> {
        let facts = arena.get(input)?.facts.clone();
        let key = IndexKey::of_facts(&facts);
        self.membership.insert(input, key.clone());
        match self.groups.get_mut(&key) {
            Some((_, count)) => {
                *count += 1;
                Ok(())
            }
            None => {
                let out = arena.allocate(own, facts, smallvec![input]);
                self.groups.insert(key, (out, 1));
                queue.enqueue_insert(arena, out)
            }
        }
    }

    pub(crate) fn update(
        &mut self,
        arena: &mut TupleArena,
        queue: &mut PropagationQueue,
        own: NodeId,
        input: TupleId,
    ) -> Result<()> {
        let facts = arena.get(input)?.facts.clone();
        let new_key = IndexKey::of_facts(&facts);
        let old_key = self.membership.get(&input).ok_or_else(|| {
            ScoreFlowError::Internal(format!("distinct update for unknown input {input:?}"))
        })?;
        if *old_key == new_key {
            // Identity keys survive content changes, so the combination
            // can stay put while the facts behind it moved on. Refresh
            // the representative and propagate the update.
            let (out, _) = self.groups.get(&new_key).ok_or_else(|| {
                ScoreFlowError::Internal("distinct bucket missing for live membership".into())
            })?;
            let out = *out;
            arena.get_mut(out)?.facts = facts;
            return queue.enqueue_update(arena, out);
        }
        self.retract(arena, queue, input)?;
        self.insert(arena, queue, own, input)
    }

    pub(crate) fn retract(
        &mut self,
        arena: &mut TupleArena,
        queue: &mut PropagationQueue,
        input: TupleId,
    ) -> Result<()> {
        let key = self.membership.remove(&input).ok_or_else(|| {
            ScoreFlowError::Internal(format!("distinct retract for unknown input {input:?}"))
        })?;
        let (out, count) = self.groups.get_mut(&key).ok_or_else(|| {
            ScoreFlowError::Internal("distinct bucket missing for live membership".into())
        })?;
        *count -= 1;
        if *count == 0 {
            let out = *out;
            self.groups.remove(&key);
            queue.enqueue_retract(arena, out)
        } else {
            Ok(())
        }
    }
}
