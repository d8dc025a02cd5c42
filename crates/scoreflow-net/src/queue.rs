//! Per-node propagation queues.
//!
//! Each node buffers its own dirty out-tuples in three lanes (retract,
//! update, insert) between drain passes. Queue membership is encoded in
//! the tuple state, which is what enforces the collapse rules: a tuple
//! identity is pending in at most one lane at any time.

use scoreflow_core::{Result, ScoreFlowError};

use crate::state::TupleState;
use crate::tuple::{TupleArena, TupleId};

/// The three externally visible tuple operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TupleOp {
    Insert,
    Update,
    Retract,
}

/// Pending tuple operations for one node.
///
/// Lanes are FIFO; together with the fixed layer order this makes a drain
/// exactly reproducible for a fixed external call sequence.
#[derive(Default)]
pub struct PropagationQueue {
    retracts: Vec<TupleId>,
    updates: Vec<TupleId>,
    inserts: Vec<TupleId>,
}

impl PropagationQueue {
    pub fn new() -> Self {
        PropagationQueue::default()
    }

    /// Enqueues a freshly allocated tuple for insert propagation.
    ///
    /// The tuple must be in `Creating` state (the arena allocates in that
    /// state and nothing else may have touched it).
    pub fn enqueue_insert(&mut self, arena: &TupleArena, id: TupleId) -> Result<()> {
        let tuple = arena.get(id)?;
        if tuple.state != TupleState::Creating {
            return Err(impossible("insert", tuple.state, id));
        }
        self.inserts.push(id);
        Ok(())
    }

    /// Marks a tuple changed.
    ///
    /// Collapse rules: an update on a tuple whose insert is still pending
    /// stays an insert (the insert will propagate the newest facts); an
    /// update on a tuple already pending update is a no-op; an update on
    /// a tuple pending retract is dropped, the retract wins.
    pub fn enqueue_update(&mut self, arena: &mut TupleArena, id: TupleId) -> Result<()> {
        let tuple = arena.get_mut(id)?;
        match tuple.state {
            TupleState::Creating | TupleState::Updating => Ok(()),
            TupleState::Ok => {
                tuple.state = TupleState::Updating;
                self.updates.push(id);
                Ok(())
            }
            // Retract precedence: once dying, a tuple stays dying. The
            // upstream re-insert produces a fresh tuple identity instead.
            TupleState::Dying | TupleState::Aborting => Ok(()),
            TupleState::Dead => Err(impossible("update", tuple.state, id)),
        }
    }

    /// Marks a tuple retracted.
    ///
    /// A retract on a tuple whose insert is still pending cancels both:
    /// the tuple aborts and never propagates downstream.
    pub fn enqueue_retract(&mut self, arena: &mut TupleArena, id: TupleId) -> Result<()> {
        let tuple = arena.get_mut(id)?;
        match tuple.state {
            TupleState::Creating => {
                tuple.state = TupleState::Aborting;
                Ok(())
            }
            TupleState::Ok | TupleState::Updating => {
                // An Updating tuple stays in the update lane too; the
                // update drain skips anything no longer in Updating state.
                tuple.state = TupleState::Dying;
                self.retracts.push(id);
                Ok(())
            }
            TupleState::Dying | TupleState::Aborting => Ok(()),
            TupleState::Dead => Err(impossible("retract", tuple.state, id)),
        }
    }

    pub fn take_retracts(&mut self) -> Vec<TupleId> {
        std::mem::take(&mut self.retracts)
    }

    pub fn take_updates(&mut self) -> Vec<TupleId> {
        std::mem::take(&mut self.updates)
    }

    pub fn take_inserts(&mut self) -> Vec<TupleId> {
        std::mem::take(&mut self.inserts)
    }

    pub fn is_empty(&self) -> bool {
        self.retracts.is_empty() && self.updates.is_empty() && self.inserts.is_empty()
    }
}

fn impossible(op: &str, state: TupleState, id: TupleId) -> ScoreFlowError {
    ScoreFlowError::Internal(format!(
        "impossible {op} on tuple {id:?} in state {state:?}"
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fact::FactRef;
    use crate::topology::NodeId;
    use smallvec::{smallvec, SmallVec};
    use std::rc::Rc;

    fn new_tuple(arena: &mut TupleArena) -> TupleId {
        let facts: SmallVec<[FactRef; 4]> = smallvec![Rc::new(0i64) as FactRef];
        arena.allocate(NodeId::new(0), facts, SmallVec::new())
    }

    #[test]
    fn retract_after_pending_insert_cancels_both() {
        let mut arena = TupleArena::new();
        let mut queue = PropagationQueue::new();
        let id = new_tuple(&mut arena);
        queue.enqueue_insert(&arena, id).unwrap();
        queue.enqueue_retract(&mut arena, id).unwrap();
        assert_eq!(arena.get(id).unwrap().state, TupleState::Aborting);
        // Still physically in the insert lane; the drain frees it there.
        assert_eq!(queue.take_inserts(), vec![id]);
        assert!(queue.take_retracts().is_empty());
    }

    #[test]
    fn update_after_pending_insert_collapses_to_insert() {
        let mut arena = TupleArena::new();
        let mut queue = PropagationQueue::new();
        let id = new_tuple(&mut arena);
        queue.enqueue_insert(&arena, id).unwrap();
        queue.enqueue_update(&mut arena, id).unwrap();
        assert_eq!(arena.get(id).unwrap().state, TupleState::Creating);
        assert!(queue.take_updates().is_empty());
        assert_eq!(queue.take_inserts(), vec![id]);
    }

    #[test]
    fn update_then_retract_keeps_only_the_retract_live() {
        let mut arena = TupleArena::new();
        let mut queue = PropagationQueue::new();
        let id = new_tuple(&mut arena);
        arena.get_mut(id).unwrap().state = TupleState::Ok;

        queue.enqueue_update(&mut arena, id).unwrap();
        queue.enqueue_retract(&mut arena, id).unwrap();
        assert_eq!(arena.get(id).unwrap().state, TupleState::Dying);
        // The stale update-lane entry is skipped by the drain.
        assert_eq!(queue.take_updates(), vec![id]);
        assert_eq!(queue.take_retracts(), vec![id]);
    }

    #[test]
    fn update_after_retract_is_dropped() {
        let mut arena = TupleArena::new();
        let mut queue = PropagationQueue::new();
        let id = new_tuple(&mut arena);
        arena.get_mut(id).unwrap().state = TupleState::Ok;

        queue.enqueue_retract(&mut arena, id).unwrap();
        queue.enqueue_update(&mut arena, id).unwrap();
        assert_eq!(arena.get(id).unwrap().state, TupleState::Dying);
        assert!(queue.take_updates().is_empty());
    }

    #[test]
    fn dead_tuple_operations_are_internal_errors() {
        let mut arena = TupleArena::new();
        let mut queue = PropagationQueue::new();
        let id = new_tuple(&mut arena);
        arena.get_mut(id).unwrap().state = TupleState::Dead;
        assert!(queue.enqueue_update(&mut arena, id).is_err());
        assert!(queue.enqueue_retract(&mut arena, id).is_err());
    }
}
