//! Concat nodes: pass-through merge of two same-arity streams.
//!
//! Both inputs feed the same state; out tuples are plain copies, so an
//! input present in both upstream streams yields two out tuples.

use std::collections::HashMap;

use smallvec::smallvec;

use scoreflow_core::{Result, ScoreFlowError};

use crate::queue::PropagationQueue;
use crate::topology::NodeId;
use crate::tuple::{TupleArena, TupleId};

pub(crate) struct ConcatState {
    outs: HashMap<TupleId, TupleId>,
}

impl ConcatState {
    pub(crate) fn new() -> Self {
        ConcatState {
            outs: HashMap::new(),
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
        let out = arena.allocate(own, facts, smallvec![input]);
        self.outs.insert(input, out);
        queue.enqueue_insert(arena, out)
    }

    pub(crate) fn update(
        &mut self,
        arena: &mut TupleArena,
        queue: &mut PropagationQueue,
        input: TupleId,
    ) -> Result<()> {
        let facts = arena.get(input)?.facts.clone();
        let out = *self.outs.get(&input).ok_or_else(|| {
            ScoreFlowError::Internal(format!("concat update for unknown input {input:?}"))
        })?;
        arena.get_mut(out)?.facts = facts;
        queue.enqueue_update(arena, out)
    }

    pub(crate) fn retract(
        &mut self,
        arena: &mut TupleArena,
        queue: &mut PropagationQueue,
        input: TupleId,
    ) -> Result<()> {
        let out = self.outs.remove(&input).ok_or_else(|| {
            ScoreFlowError::Internal(format!("concat retract for unknown input {input:?}"))
        })?;
        queue.enqueue_retract(arena, out)
    }
}
