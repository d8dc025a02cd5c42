//! Tuples and the generational tuple arena.
//!
//! Every tuple is exclusively owned by the node that created it and lives
//! in the session's arena. Downstream references are plain [`TupleId`]s:
//! non-owning, and safe against reuse because a freed slot bumps its
//! generation.

use smallvec::SmallVec;

use scoreflow_core::{Result, ScoreFlowError};

use crate::fact::FactRef;
use crate::state::TupleState;
use crate::topology::NodeId;

/// Identifier of a live tuple in the arena.
///
/// Never reused: the generation is bumped when the slot is freed, so an
/// id held past its tuple's death fails to resolve instead of aliasing a
/// newer tuple.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TupleId {
    index: u32,
    generation: u32,
}

/// An ordered, fixed-arity list of fact references produced by one node.
#[derive(Debug)]
pub struct Tuple {
    /// The node that created (and owns) this tuple.
    pub node: NodeId,
    /// Lifecycle / queue-membership state.
    pub state: TupleState,
    /// The fact references, upstream-first.
    pub facts: SmallVec<[FactRef; 4]>,
    /// Upstream tuples this one was derived from, used to refresh facts
    /// on update. Empty for source and group tuples.
    pub parents: SmallVec<[TupleId; 2]>,
}

struct Slot {
    generation: u32,
    tuple: Option<Tuple>,
}

/// Slab arena of tuples with a free list and per-slot generations.
#[derive(Default)]
pub struct TupleArena {
    slots: Vec<Slot>,
    free: Vec<u32>,
}

impl TupleArena {
    pub fn new() -> Self {
        TupleArena::default()
    }

    /// Allocates a new tuple in `Creating` state.
    pub fn allocate(
        &mut self,
        node: NodeId,
        facts: SmallVec<[FactRef; 4]>,
        parents: SmallVec<[TupleId; 2]>,
    ) -> TupleId {
        let tuple = Tuple {
            node,
            state: TupleState::Creating,
            facts,
            parents,
        };
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.tuple = Some(tuple);
            TupleId {
                index,
                generation: slot.generation,
            }
        } else {
            let index = self.slots.len() as u32;
            self.slots.push(Slot {
                generation: 0,
                tuple: Some(tuple),
            });
            TupleId {
                index,
                generation: 0,
            }
        }
    }

    pub fn get(&self, id: TupleId) -> Result<&Tuple> {
        self.slots
            .get(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.tuple.as_ref())
            .ok_or_else(|| stale(id))
    }

    pub fn get_mut(&mut self, id: TupleId) -> Result<&mut Tuple> {
        self.slots
            .get_mut(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.tuple.as_mut())
            .ok_or_else(|| stale(id))
    }

    /// Frees a fully retracted tuple. The slot's generation is bumped so
    /// the id can never resolve again.
    pub fn free(&mut self, id: TupleId) -> Result<()> {
        let slot = self
            .slots
            .get_mut(id.index as usize)
            .filter(|slot| slot.generation == id.generation && slot.tuple.is_some())
            .ok_or_else(|| stale(id))?;
        slot.tuple = None;
        slot.generation += 1;
        self.free.push(id.index);
        Ok(())
    }

    /// Number of live tuples. Zero after every derived tuple has been
    /// retracted and drained.
    pub fn live_count(&self) -> usize {
        self.slots.len() - self.free.len()
    }
}

fn stale(id: TupleId) -> ScoreFlowError {
    ScoreFlowError::Internal(format!("stale or dead tuple id {id:?}"))
}
