//! Source nodes: the only entry points for external fact notifications.

use std::collections::HashMap;

use smallvec::{smallvec, SmallVec};

use scoreflow_core::{Result, ScoreFlowError};

use crate::fact::{FactKey, FactRef};
use crate::queue::PropagationQueue;
use crate::topology::NodeId;
use crate::tuple::{TupleArena, TupleId};

/// One uni tuple per inserted fact, keyed by external fact identity.
pub(crate) struct SourceState {
    tuples: HashMap<FactKey, TupleId>,
}

impl SourceState {
    pub(crate) fn new() -> Self {
        SourceState {
            tuples: HashMap::new(),
        }
    }

    pub(crate) fn insert(
        &mut self,
        arena: &mut TupleArena,
        queue: &mut PropagationQueue,
        own: NodeId,
        fact: FactRef,
    ) -> Result<()> {
        let key = FactKey::of(&*fact);
        if self.tuples.contains_key(&key) {
            return Err(ScoreFlowError::Structural(format!(
                "fact {fact:?} was already inserted into this source node"
            )));
        }
        let facts: SmallVec<[FactRef; 4]> = smallvec![fact];
        let id = arena.allocate(own, facts, SmallVec::new());
        self.tuples.insert(key, id);
        queue.enqueue_insert(arena, id)
    }

    pub(crate) fn update(
        &mut self,
        arena: &mut TupleArena,
        queue: &mut PropagationQueue,
        fact: FactRef,
    ) -> Result<()> {
        let key = FactKey::of(&*fact);
        let id = *self.tuples.get(&key).ok_or_else(|| {
            ScoreFlowError::Structural(format!(
                "update of fact {fact:?} which was never inserted (or already retracted)"
            ))
        })?;
        arena.get_mut(id)?.facts[0] = fact;
        queue.enqueue_update(arena, id)
    }

    pub(crate) fn retract(
        &mut self,
        arena: &mut TupleArena,
        queue: &mut PropagationQueue,
        fact: &FactRef,
    ) -> Result<()> {
        let key = FactKey::of(&**fact);
        let id = self.tuples.remove(&key).ok_or_else(|| {
            ScoreFlowError::Structural(format!(
                "retract of fact {fact:?} which was never inserted (or already retracted)"
            ))
        })?;
        queue.enqueue_retract(arena, id)
    }
}
