//! Tuple lifecycle states.

/// Lifecycle state of a tuple.
///
/// The state doubles as the tuple's propagation-queue membership marker:
/// `Creating` means the tuple sits in its node's insert lane, `Updating`
/// in the update lane, `Dying` in the retract lane. `Aborting` is a
/// cancelled insert: the tuple is still physically in the insert lane but
/// is freed at drain time without ever propagating downstream.
///
/// Transitions:
///
/// ```text
/// (new) -> Creating -> Ok
/// Ok -> Updating -> Ok
/// Ok | Updating -> Dying -> Dead
/// Creating -> Aborting -> Dead
/// ```
///
/// A dead tuple is never reused; its arena slot generation is bumped on
/// free, so stale ids cannot resolve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TupleState {
    /// Freshly derived; pending insert propagation.
    Creating,
    /// Settled; visible to downstream nodes.
    Ok,
    /// Changed while settled; pending update propagation.
    Updating,
    /// Retracted while settled; pending retract propagation.
    Dying,
    /// Retracted while still pending insert; dies without propagating.
    Aborting,
    /// Fully retracted. Terminal.
    Dead,
}

impl TupleState {
    /// True while the tuple sits in one of its node's propagation lanes.
    #[inline]
    pub fn is_dirty(self) -> bool {
        matches!(
            self,
            TupleState::Creating | TupleState::Updating | TupleState::Dying | TupleState::Aborting
        )
    }

    /// True if downstream nodes may currently hold derived state for it.
    #[inline]
    pub fn is_visible(self) -> bool {
        matches!(self, TupleState::Ok | TupleState::Updating | TupleState::Dying)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dirty_states() {
        assert!(TupleState::Creating.is_dirty());
        assert!(TupleState::Updating.is_dirty());
        assert!(TupleState::Dying.is_dirty());
        assert!(TupleState::Aborting.is_dirty());
        assert!(!TupleState::Ok.is_dirty());
        assert!(!TupleState::Dead.is_dirty());
    }

    #[test]
    fn visibility() {
        assert!(!TupleState::Creating.is_visible());
        assert!(TupleState::Ok.is_visible());
        assert!(TupleState::Dying.is_visible());
        assert!(!TupleState::Aborting.is_visible());
    }
}
