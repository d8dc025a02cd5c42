//! Map nodes: one rewritten out tuple per input tuple.

use std::collections::HashMap;

use smallvec::{smallvec, SmallVec};

use scoreflow_core::{Result, ScoreFlowError};

use crate::fact::FactRef;
use crate::queue::PropagationQueue;
use crate::topology::{MapFn, NodeId};
use crate::tuple::{TupleArena, TupleId};

pub(crate) struct MapState {
    outs: HashMap<TupleId, TupleId>,
}

impl MapState {
    pub(crate) fn new() -> Self {
        MapState {
            outs: HashMap::new(),
        }
    }

    pub(crate) fn insert(
        &mut self,
        mapper: &MapFn,
        arena: &mut TupleArena,
        queue: &mut PropagationQueue,
        own: NodeId,
        input: TupleId,
    ) -> Result<()> {
        let facts = arena.get(input)?.facts.clone();
        let mapped: SmallVec<[FactRef; 4]> = mapper(&facts).into_iter().collect();
        let out = arena.allocate(own, mapped, smallvec![input]);
        self.outs.insert(input, out);
        queue.enqueue_insert(arena, out)
    }

    pub(crate) fn update(
        &mut self,
        mapper: &MapFn,
        arena: &mut TupleArena,
        queue: &mut PropagationQueue,
        input: TupleId,
    ) -> Result<()> {
        let facts = arena.get(input)?.facts.clone();
        let out = *self.outs.get(&input).ok_or_else(|| {
            ScoreFlowError::Internal(format!("map update for unknown input {input:?}"))
        })?;
        arena.get_mut(out)?.facts = mapper(&facts).into_iter().collect();
        queue.enqueue_update(arena, out)
    }

    pub(crate) fn retract(
        &mut self,
        arena: &mut TupleArena,
        queue: &mut PropagationQueue,
        input: TupleId,
    ) -> Result<()> {
        let out = self.outs.remove(&input).ok_or_else(|| {
            ScoreFlowError::Internal(format!("map retract for unknown input {input:?}"))
        })?;
        queue.enqueue_retract(arena, out)
    }
}
