//! Flatten (flat-map) nodes: zero or more out tuples per input tuple.
//!
//! An upstream update re-expands from scratch: every previous out tuple
//! is retracted and the new expansion inserted. Pairing old and new
//! expansions element-wise is not possible in general because the
//! expansion size may change.

use std::collections::HashMap;

use smallvec::{smallvec, SmallVec};

use scoreflow_core::{Result, ScoreFlowError};

use crate::fact::FactRef;
use crate::queue::PropagationQueue;
use crate::topology::{FlatMapFn, NodeId};
use crate::tuple::{TupleArena, TupleId};

pub(crate) struct FlatMapState {
    outs: HashMap<TupleId, Vec<TupleId>>,
}

impl FlatMapState {
    pub(crate) fn new() -> Self {
        FlatMapState {
            outs: HashMap::new(),
        }
    }

    pub(crate) fn insert(
        &mut self,
        mapper: &FlatMapFn,
        arena: &mut TupleArena,
        queue: &mut PropagationQueue,
        own: NodeId,
        input: TupleId,
    ) -> Result<()> {
        let facts = arena.get(input)?.facts.clone();
        let mut outs = Vec::new();
        for expansion in mapper(&facts) {
            let out_facts: SmallVec<[FactRef; 4]> = expansion.into_iter().collect();
            let out = arena.allocate(own, out_facts, smallvec![input]);
            queue.enqueue_insert(arena, out)?;
            outs.push(out);
        }
        self.outs.insert(input, outs);
        Ok(())
    }

    pub(crate) fn update(
        &mut self,
        mapper: &FlatMapFn,
        arena: &mut TupleArena,
        queue: &mut PropagationQueue,
        own: NodeId,
        input: TupleId,
    ) -> Result<()> {
        self.retract(arena, queue, input)?;
        self.insert(mapper, arena, queue, own, input)
    }

    pub(crate) fn retract(
        &mut self,
        arena: &mut TupleArena,
        queue: &mut PropagationQueue,
        input: TupleId,
    ) -> Result<()> {
        let outs = self.outs.remove(&input).ok_or_else(|| {
            ScoreFlowError::Internal(format!("flatten retract for unknown input {input:?}"))
        })?;
        for out in outs {
            queue.enqueue_retract(arena, out)?;
        }
        Ok(())
    }
}
