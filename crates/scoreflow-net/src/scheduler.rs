//! The layer-ordered drain.
//!
//! Dirty tuples propagate strictly layer by layer, and within a layer
//! strictly phase by phase: every pending retract in the layer, then
//! every pending update, then every pending insert. Retracts going first
//! means downstream nodes never observe a state in which a dying tuple
//! and its replacement coexist; a single-node layer collapses to
//! draining that node's three lanes back to back.
//!
//! Delivery within a layer only ever enqueues into strictly later
//! layers, since a node's layer is one past its furthest upstream.

use tracing::trace;

use scoreflow_core::{Result, Score, ScoreFlowError};

use crate::nodes::{JoinSide, NodeState};
use crate::queue::{PropagationQueue, TupleOp};
use crate::state::TupleState;
use crate::topology::{NodeId, NodeKind, Port, Topology};
use crate::tuple::{TupleArena, TupleId};

/// Propagates every pending operation through the network, in layer and
/// phase order, until all queues are empty.
pub(crate) fn drain<S: Score>(
    topology: &Topology<S>,
    states: &mut [NodeState<S>],
    queues: &mut [PropagationQueue],
    arena: &mut TupleArena,
) -> Result<()> {
    for (depth, layer) in topology.layers().iter().enumerate() {
        trace!(event = "drain_layer", depth, nodes = layer.len());
        for op in [TupleOp::Retract, TupleOp::Update, TupleOp::Insert] {
            for &node in layer {
                drain_lane(topology, states, queues, arena, node, op)?;
            }
        }
    }
    Ok(())
}

fn drain_lane<S: Score>(
    topology: &Topology<S>,
    states: &mut [NodeState<S>],
    queues: &mut [PropagationQueue],
    arena: &mut TupleArena,
    node: NodeId,
    op: TupleOp,
) -> Result<()> {
    let lane = match op {
        TupleOp::Retract => queues[node.index()].take_retracts(),
        TupleOp::Update => queues[node.index()].take_updates(),
        TupleOp::Insert => queues[node.index()].take_inserts(),
    };
    if lane.is_empty() {
        return Ok(());
    }
    let downstream = topology.node(node).downstream.clone();

    for id in lane {
        match op {
            TupleOp::Retract => {
                let state = arena.get(id)?.state;
                if state != TupleState::Dying {
                    return Err(lane_corruption(node, id, state, op));
                }
                for &(target, port) in &downstream {
                    deliver(topology, states, queues, arena, target, port, op, id)?;
                }
                arena.get_mut(id)?.state = TupleState::Dead;
                arena.free(id)?;
            }
            TupleOp::Update => {
                // A tuple retracted after its update was queued stays in
                // the update lane as a stale entry; the retract phase of
                // this same drain already propagated the retract and freed
                // the slot, so an unresolvable id here is expected.
                let state = match arena.get(id) {
                    Ok(tuple) => tuple.state,
                    Err(_) => continue,
                };
                if state != TupleState::Updating {
                    continue;
                }
                finalize_if_group(states, arena, node, id)?;
                for &(target, port) in &downstream {
                    deliver(topology, states, queues, arena, target, port, op, id)?;
                }
                arena.get_mut(id)?.state = TupleState::Ok;
            }
            TupleOp::Insert => {
                let state = arena.get(id)?.state;
                if state == TupleState::Aborting {
                    // Insert and retract cancelled out before anything
                    // downstream saw the tuple.
                    arena.free(id)?;
                    continue;
                }
                if state != TupleState::Creating {
                    return Err(lane_corruption(node, id, state, op));
                }
                finalize_if_group(states, arena, node, id)?;
                for &(target, port) in &downstream {
                    deliver(topology, states, queues, arena, target, port, op, id)?;
                }
                arena.get_mut(id)?.state = TupleState::Ok;
            }
        }
    }
    Ok(())
}

/// Group out tuples carry their settled aggregate only from drain time
/// on; everything else propagates its facts as written.
fn finalize_if_group<S: Score>(
    states: &[NodeState<S>],
    arena: &mut TupleArena,
    node: NodeId,
    id: TupleId,
) -> Result<()> {
    if let NodeState::Group(group) = &states[node.index()] {
        group.finalize(arena, id)?;
    }
    Ok(())
}

/// Routes one tuple operation into a downstream node's state machine.
#[allow(clippy::too_many_arguments)]
fn deliver<S: Score>(
    topology: &Topology<S>,
    states: &mut [NodeState<S>],
    queues: &mut [PropagationQueue],
    arena: &mut TupleArena,
    target: NodeId,
    port: Port,
    op: TupleOp,
    input: TupleId,
) -> Result<()> {
    let spec = topology.node(target);
    let queue = &mut queues[target.index()];
    match (&mut states[target.index()], &spec.kind) {
        (NodeState::Filter(state), NodeKind::Filter { predicate }) => match op {
            TupleOp::Insert => state.insert(predicate, arena, queue, target, input),
            TupleOp::Update => state.update(predicate, arena, queue, target, input),
            TupleOp::Retract => state.retract(arena, queue, input),
        },
        (NodeState::Join(state), NodeKind::Join { left_key, right_key }) => {
            let side = match port {
                Port::Left => JoinSide::Left,
                Port::Right => JoinSide::Right,
                Port::Single => {
                    return Err(ScoreFlowError::Internal(format!(
                        "join node {target:?} subscribed on a single port"
                    )))
                }
            };
            match op {
                TupleOp::Insert => {
                    state.insert(left_key, right_key, arena, queue, target, side, input)
                }
                TupleOp::Update => {
                    state.update(left_key, right_key, arena, queue, target, side, input)
                }
                TupleOp::Retract => state.retract(arena, queue, side, input),
            }
        }
        (NodeState::Group(state), NodeKind::GroupBy { key, collector }) => match op {
            TupleOp::Insert => state.insert(key, collector, arena, queue, target, input),
            TupleOp::Update => state.update(key, collector, arena, queue, target, input),
            TupleOp::Retract => state.retract(arena, queue, input),
        },
        (NodeState::Map(state), NodeKind::Map { mapper }) => match op {
            TupleOp::Insert => state.insert(mapper, arena, queue, target, input),
            TupleOp::Update => state.update(mapper, arena, queue, input),
            TupleOp::Retract => state.retract(arena, queue, input),
        },
        (NodeState::FlatMap(state), NodeKind::FlatMap { mapper }) => match op {
            TupleOp::Insert => state.insert(mapper, arena, queue, target, input),
            TupleOp::Update => state.update(mapper, arena, queue, target, input),
            TupleOp::Retract => state.retract(arena, queue, input),
        },
        (NodeState::Distinct(state), NodeKind::Distinct) => match op {
            TupleOp::Insert => state.insert(arena, queue, target, input),
            TupleOp::Update => state.update(arena, queue, target, input),
            TupleOp::Retract => state.retract(arena, queue, input),
        },
        (NodeState::Concat(state), NodeKind::Concat) => match op {
            TupleOp::Insert => state.insert(arena, queue, target, input),
            TupleOp::Update => state.update(arena, queue, input),
            TupleOp::Retract => state.retract(arena, queue, input),
        },
        (NodeState::Scorer(state), NodeKind::Scorer { constraint, weight }) => {
            let impact_type = topology.constraint(*constraint).impact_type;
            match op {
                TupleOp::Insert => state.insert(weight, impact_type, arena, input),
                TupleOp::Update => state.update(weight, impact_type, arena, input),
                TupleOp::Retract => state.retract(input),
            }
        }
        _ => Err(ScoreFlowError::Internal(format!(
            "node state and topology disagree about node {target:?}"
        ))),
    }
}

fn lane_corruption(
    node: NodeId,
    id: TupleId,
    state: TupleState,
    op: TupleOp,
) -> ScoreFlowError {
    ScoreFlowError::Internal(format!(
        "tuple {id:?} of node {node:?} found in {op:?} lane in state {state:?}"
    ))
}
