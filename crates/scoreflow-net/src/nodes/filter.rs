//! Filter nodes.

use std::collections::HashMap;

use smallvec::smallvec;

use scoreflow_core::Result;

use crate::queue::PropagationQueue;
use crate::topology::{NodeId, TuplePredicate};
use crate::tuple::{TupleArena, TupleId};

/// Tracks which inputs currently pass the predicate and the out tuple
/// each passing input produced.
pub(crate) struct FilterState {
    outs: HashMap<TupleId, TupleId>,
}

impl FilterState {
    pub(crate) fn new() -> Self {
        FilterState {
            outs: HashMap::new(),
        }
    }

    pub(crate) fn insert(
        &mut self,
        predicate: &TuplePredicate,
        arena: &mut TupleArena,
        queue: &mut PropagationQueue,
        own: NodeId,
        input: TupleId,
    ) -> Result<()> {
        let facts = arena.get(input)?.facts.clone();
        if !predicate(&facts) {
            return Ok(());
        }
        let out = arena.allocate(own, facts, smallvec![input]);
        self.outs.insert(input, out);
        queue.enqueue_insert(arena, out)
    }

    pub(crate) fn update(
        &mut self,
        predicate: &TuplePredicate,
        arena: &mut TupleArena,
        queue: &mut PropagationQueue,
        own: NodeId,
        input: TupleId,
    ) -> Result<()> {
        let facts = arena.get(input)?.facts.clone();
        let passes = predicate(&facts);
        match self.outs.get(&input).copied() {
            Some(out) if passes => {
                arena.get_mut(out)?.facts = facts;
                queue.enqueue_update(arena, out)
            }
            Some(out) => {
                self.outs.remove(&input);
                queue.enqueue_retract(arena, out)
            }
            None if passes => {
                let out = arena.allocate(own, facts, smallvec![input]);
                self.outs.insert(input, out);
                queue.enqueue_insert(arena, out)
            }
            None => Ok(()),
        }
    }

    pub(crate) fn retract(
        &mut self,
        arena: &mut TupleArena,
        queue: &mut PropagationQueue,
        input: TupleId,
    ) -> Result<()> {
        match self.outs.remove(&input) {
            Some(out) => queue.enqueue_retract(arena, out),
            None => Ok(()),
        }
    }
}
