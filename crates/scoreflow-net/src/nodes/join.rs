//! Keyed equi-join nodes.
//!
//! Each side keeps a tuple index keyed by its join key. An insert probes
//! the opposite index and emits one joined tuple per match, which keeps
//! the cost of a single operation proportional to the number of matches
//! rather than the total tuple count. An update with an unchanged key
//! refreshes the joined tuples in place; a key change is a retract
//! followed by a re-insert. A retract removes the input from its index
//! and retracts every joined tuple derived from it.

use std::collections::HashMap;

use smallvec::{smallvec, SmallVec};

use scoreflow_core::{Result, ScoreFlowError};

use crate::fact::FactRef;
use crate::index::{IndexKey, TupleIndex};
use crate::queue::PropagationQueue;
use crate::topology::{KeyFn, NodeId};
use crate::tuple::{TupleArena, TupleId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum JoinSide {
    Left,
    Right,
}

pub(crate) struct JoinState {
    left_index: TupleIndex,
    right_index: TupleIndex,
    left_keys: HashMap<TupleId, IndexKey>,
    right_keys: HashMap<TupleId, IndexKey>,
    /// Joined tuples by the input tuple they were derived from, one map
    /// per side; every joined tuple appears in both.
    outs_by_left: HashMap<TupleId, Vec<TupleId>>,
    outs_by_right: HashMap<TupleId, Vec<TupleId>>,
}

impl JoinState {
    pub(crate) fn new() -> Self {
        JoinState {
            left_index: TupleIndex::new(),
            right_index: TupleIndex::new(),
            left_keys: HashMap::new(),
            right_keys: HashMap::new(),
            outs_by_left: HashMap::new(),
            outs_by_right: HashMap::new(),
        }
    }

    fn key_fn<'a>(side: JoinSide, left_key: &'a KeyFn, right_key: &'a KeyFn) -> &'a KeyFn {
        match side {
            JoinSide::Left => left_key,
            JoinSide::Right => right_key,
        }
    }

    pub(crate) fn insert(
        &mut self,
        left_key: &KeyFn,
        right_key: &KeyFn,
        arena: &mut TupleArena,
        queue: &mut PropagationQueue,
        own: NodeId,
        side: JoinSide,
        input: TupleId,
    ) -> Result<()> {
        let facts = arena.get(input)?.facts.clone();
        let key = Self::key_fn(side, left_key, right_key)(&facts);

        let (own_index, own_keys, other_index) = match side {
            JoinSide::Left => (&mut self.left_index, &mut self.left_keys, &self.right_index),
            JoinSide::Right => (&mut self.right_index, &mut self.right_keys, &self.left_index),
        };
        let matches: Vec<TupleId> = other_index.get(&key).to_vec();
        own_index.put(key.clone(), input);
        own_keys.insert(input, key);

        for other in matches {
            let (left, right) = match side {
                JoinSide::Left => (input, other),
                JoinSide::Right => (other, input),
            };
            self.create_out(arena, queue, own, left, right)?;
        }
        Ok(())
    }

    fn create_out(
        &mut self,
        arena: &mut TupleArena,
        queue: &mut PropagationQueue,
        own: NodeId,
        left: TupleId,
        right: TupleId,
    ) -> Result<()> {
        let mut facts: SmallVec<[FactRef; 4]> = arena.get(left)?.facts.clone();
        facts.extend(arena.get(right)?.facts.iter().cloned());
        let out = arena.allocate(own, facts, smallvec![left, right]);
        self.outs_by_left.entry(left).or_default().push(out);
        self.outs_by_right.entry(right).or_default().push(out);
        queue.enqueue_insert(arena, out)
    }

    pub(crate) fn update(
        &mut self,
        left_key: &KeyFn,
        right_key: &KeyFn,
        arena: &mut TupleArena,
        queue: &mut PropagationQueue,
        own: NodeId,
        side: JoinSide,
        input: TupleId,
    ) -> Result<()> {
        let facts = arena.get(input)?.facts.clone();
        let new_key = Self::key_fn(side, left_key, right_key)(&facts);
        let old_key = match side {
            JoinSide::Left => self.left_keys.get(&input),
            JoinSide::Right => self.right_keys.get(&input),
        }
        .ok_or_else(|| {
            ScoreFlowError::Internal(format!("join update for unknown input {input:?}"))
        })?;

        if *old_key == new_key {
            // Same bucket: refresh the joined facts and propagate updates.
            let outs = match side {
                JoinSide::Left => self.outs_by_left.get(&input),
                JoinSide::Right => self.outs_by_right.get(&input),
            }
            .cloned()
            .unwrap_or_default();
            for out in outs {
                self.refresh_out(arena, out)?;
                queue.enqueue_update(arena, out)?;
            }
            Ok(())
        } else {
            self.remove_input(arena, queue, side, input)?;
            self.insert(left_key, right_key, arena, queue, own, side, input)
        }
    }

    fn refresh_out(&self, arena: &mut TupleArena, out: TupleId) -> Result<()> {
        let (left, right) = {
            let tuple = arena.get(out)?;
            (tuple.parents[0], tuple.parents[1])
        };
        let mut facts: SmallVec<[FactRef; 4]> = arena.get(left)?.facts.clone();
        facts.extend(arena.get(right)?.facts.iter().cloned());
        arena.get_mut(out)?.facts = facts;
        Ok(())
    }

    pub(crate) fn retract(
        &mut self,
        arena: &mut TupleArena,
        queue: &mut PropagationQueue,
        side: JoinSide,
        input: TupleId,
    ) -> Result<()> {
        self.remove_input(arena, queue, side, input)
    }

    /// Unindexes the input and retracts every joined tuple derived from
    /// it, unlinking those tuples from the opposite side's out map.
    fn remove_input(
        &mut self,
        arena: &mut TupleArena,
        queue: &mut PropagationQueue,
        side: JoinSide,
        input: TupleId,
    ) -> Result<()> {
        let (own_index, own_keys, own_outs) = match side {
            JoinSide::Left => (&mut self.left_index, &mut self.left_keys, &mut self.outs_by_left),
            JoinSide::Right => (
                &mut self.right_index,
                &mut self.right_keys,
                &mut self.outs_by_right,
            ),
        };
        let key = own_keys.remove(&input).ok_or_else(|| {
            ScoreFlowError::Internal(format!("join retract for unknown input {input:?}"))
        })?;
        own_index.remove(&key, input)?;
        let outs = own_outs.remove(&input).unwrap_or_default();

        let other_outs = match side {
            JoinSide::Left => &mut self.outs_by_right,
            JoinSide::Right => &mut self.outs_by_left,
        };
        for out in outs {
            let other_parent = {
                let tuple = arena.get(out)?;
                match side {
                    JoinSide::Left => tuple.parents[1],
                    JoinSide::Right => tuple.parents[0],
                }
            };
            if let Some(list) = other_outs.get_mut(&other_parent) {
                list.retain(|&t| t != out);
                if list.is_empty() {
                    other_outs.remove(&other_parent);
                }
            }
            queue.enqueue_retract(arena, out)?;
        }
        Ok(())
    }
}
