//! The session: one mutable evaluation of a compiled topology.
//!
//! A session owns every piece of per-solution state (tuple arena, node
//! states, propagation queues, fact registry) and is single-threaded; any
//! number of sessions can share one [`Topology`] across worker threads.
//!
//! Error discipline: every error poisons the session. A failed drain
//! leaves tuples half-propagated and there is no way to repair that in
//! place, so all later calls report [`ScoreFlowError::CorruptedSession`]
//! and the caller rebuilds from the topology.

use std::any::TypeId;
use std::collections::HashMap;
use std::rc::Rc;
use std::sync::Arc;

use tracing::{debug, trace};

use scoreflow_core::{Result, Score, ScoreFlowError};

use crate::analysis::{indict, ConstraintMatch, ConstraintMatchTotal, IndictmentMap};
use crate::fact::{Fact, FactKey, FactRef};
use crate::nodes::NodeState;
use crate::queue::PropagationQueue;
use crate::scheduler::drain;
use crate::topology::{NodeId, NodeKind, Topology};
use crate::tuple::TupleArena;

/// Per-session switches.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Keep fact snapshots per live constraint match, enabling
    /// [`Session::constraint_match_totals`] and [`Session::indictment_map`].
    pub match_tracking: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            match_tracking: true,
        }
    }
}

/// One evaluation session over a shared topology.
pub struct Session<S: Score> {
    topology: Arc<Topology<S>>,
    states: Vec<NodeState<S>>,
    queues: Vec<PropagationQueue>,
    arena: TupleArena,
    /// Every externally live fact, by identity. Drives from-scratch
    /// recalculation.
    registry: HashMap<FactKey, FactRef>,
    /// Concrete fact type -> source nodes that accept it. Filled lazily,
    /// one scan of the source list per distinct type.
    dispatch: HashMap<TypeId, Rc<[NodeId]>>,
    corrupted: bool,
    config: SessionConfig,
}

impl<S: Score> Session<S> {
    pub fn new(topology: Arc<Topology<S>>, config: SessionConfig) -> Self {
        let states = (0..topology.node_count())
            .map(|i| NodeState::for_spec(topology.node(NodeId::new(i as u32)), config.match_tracking))
            .collect();
        let queues = (0..topology.node_count())
            .map(|_| PropagationQueue::new())
            .collect();
        Session {
            topology,
            states,
            queues,
            arena: TupleArena::new(),
            registry: HashMap::new(),
            dispatch: HashMap::new(),
            corrupted: false,
            config,
        }
    }

    fn guard(&self) -> Result<()> {
        if self.corrupted {
            Err(ScoreFlowError::CorruptedSession(
                "a previous operation on this session failed; rebuild it from the topology"
                    .into(),
            ))
        } else {
            Ok(())
        }
    }

    /// Runs `f` with the corruption flag raised; the flag is lowered only
    /// on success. A panic in user code (predicate, key fn, weight fn)
    /// unwinds past the lowering, so a caught panic leaves the session
    /// poisoned just like an error does.
    fn poisoning<T>(&mut self, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        self.guard()?;
        self.corrupted = true;
        let value = f(self)?;
        self.corrupted = false;
        Ok(value)
    }

    fn dispatch_targets(&mut self, fact: &dyn Fact) -> Rc<[NodeId]> {
        let type_id = fact.as_any().type_id();
        if let Some(targets) = self.dispatch.get(&type_id) {
            return Rc::clone(targets);
        }
        let targets: Rc<[NodeId]> = self
            .topology
            .sources()
            .iter()
            .copied()
            .filter(|&node| match &self.topology.node(node).kind {
                NodeKind::Source { accepts, .. } => accepts(fact),
                _ => false,
            })
            .collect();
        trace!(event = "dispatch_resolved", sources = targets.len());
        self.dispatch.insert(type_id, Rc::clone(&targets));
        targets
    }

    /// Notifies the network of a new fact.
    ///
    /// A fact no source accepts is still registered (and participates in
    /// from-scratch recalculation bookkeeping); re-inserting a live fact
    /// identity is a structural error.
    pub fn insert(&mut self, fact: FactRef) -> Result<()> {
        self.poisoning(|session| {
            let key = FactKey::of(&*fact);
            if session.registry.contains_key(&key) {
                return Err(ScoreFlowError::Structural(format!(
                    "double insert of fact {fact:?}"
                )));
            }
            trace!(event = "fact_insert", fact = ?fact);
            let targets = session.dispatch_targets(&*fact);
            for &node in targets.iter() {
                match &mut session.states[node.index()] {
                    NodeState::Source(source) => source.insert(
                        &mut session.arena,
                        &mut session.queues[node.index()],
                        node,
                        Rc::clone(&fact),
                    )?,
                    _ => return Err(non_source(node)),
                }
            }
            session.registry.insert(key, fact);
            Ok(())
        })
    }

    /// Notifies the network that a live fact's contents changed. The
    /// passed reference replaces the registered one.
    pub fn update(&mut self, fact: FactRef) -> Result<()> {
        self.poisoning(|session| {
            let key = FactKey::of(&*fact);
            if !session.registry.contains_key(&key) {
                return Err(ScoreFlowError::Structural(format!(
                    "update of fact {fact:?} which was never inserted (or already retracted)"
                )));
            }
            trace!(event = "fact_update", fact = ?fact);
            let targets = session.dispatch_targets(&*fact);
            for &node in targets.iter() {
                match &mut session.states[node.index()] {
                    NodeState::Source(source) => source.update(
                        &mut session.arena,
                        &mut session.queues[node.index()],
                        Rc::clone(&fact),
                    )?,
                    _ => return Err(non_source(node)),
                }
            }
            session.registry.insert(key, fact);
            Ok(())
        })
    }

    /// Notifies the network that a fact left the working set.
    pub fn retract(&mut self, fact: &FactRef) -> Result<()> {
        self.poisoning(|session| {
            let key = FactKey::of(&**fact);
            if session.registry.remove(&key).is_none() {
                return Err(ScoreFlowError::Structural(format!(
                    "retract of fact {fact:?} which was never inserted (or already retracted)"
                )));
            }
            trace!(event = "fact_retract", fact = ?fact);
            let targets = session.dispatch_targets(&**fact);
            for &node in targets.iter() {
                match &mut session.states[node.index()] {
                    NodeState::Source(source) => source.retract(
                        &mut session.arena,
                        &mut session.queues[node.index()],
                        fact,
                    )?,
                    _ => return Err(non_source(node)),
                }
            }
            Ok(())
        })
    }

    /// Drains every pending propagation and returns `init` plus the sum
    /// of all constraint totals.
    pub fn calculate_score(&mut self, init: S) -> Result<S> {
        self.poisoning(|session| {
            drain(
                &session.topology,
                &mut session.states,
                &mut session.queues,
                &mut session.arena,
            )?;
            let score = session.summed_score(init);
            debug!(event = "score_calculated", score = %score, live_tuples = session.arena.live_count());
            Ok(score)
        })
    }

    fn summed_score(&self, init: S) -> S {
        let mut score = init;
        for (node, _) in self.topology.scorers() {
            if let NodeState::Scorer(scorer) = &self.states[node.index()] {
                score = score + scorer.total();
            }
        }
        score
    }

    /// Replays the current fact registry through a fresh session of the
    /// same topology and returns the from-scratch score.
    pub fn recalculate_from_scratch(&self, init: S) -> Result<S> {
        self.guard()?;
        let mut fresh = Session::new(
            Arc::clone(&self.topology),
            SessionConfig {
                match_tracking: false,
            },
        );
        for fact in self.registry.values() {
            fresh.insert(Rc::clone(fact))?;
        }
        fresh.calculate_score(init)
    }

    /// Drains, then cross-checks the incremental score against a
    /// from-scratch recomputation. A mismatch means a node's incremental
    /// bookkeeping is defective; the session is poisoned and
    /// [`ScoreFlowError::ScoreCorruption`] reports both values.
    pub fn assert_score_consistent(&mut self, init: S) -> Result<S> {
        let incremental = self.calculate_score(init.clone())?;
        let scratch = self.recalculate_from_scratch(init)?;
        if incremental != scratch {
            self.corrupted = true;
            return Err(ScoreFlowError::ScoreCorruption(format!(
                "incremental score {incremental} != from-scratch score {scratch}"
            )));
        }
        Ok(incremental)
    }

    /// Snapshot of every constraint's live matches. Requires match
    /// tracking and a drained session (call after `calculate_score`).
    pub fn constraint_match_totals(&self) -> Result<Vec<ConstraintMatchTotal<S>>> {
        self.guard()?;
        if !self.config.match_tracking {
            return Err(ScoreFlowError::Structural(
                "constraint match analysis requires match tracking to be enabled".into(),
            ));
        }
        let mut totals = Vec::new();
        for (node, constraint) in self.topology.scorers() {
            let scorer = match &self.states[node.index()] {
                NodeState::Scorer(scorer) => scorer,
                _ => return Err(non_source(node)),
            };
            let def = self.topology.constraint(constraint);
            let matches: Vec<ConstraintMatch<S>> = scorer
                .tracked_matches()?
                .map(|(facts, impact)| ConstraintMatch {
                    constraint_ref: def.constraint_ref.clone(),
                    facts: facts.to_vec(),
                    score: impact.clone(),
                })
                .collect();
            totals.push(ConstraintMatchTotal {
                constraint_ref: def.constraint_ref.clone(),
                impact_type: def.impact_type,
                score: scorer.total(),
                matches,
            });
        }
        Ok(totals)
    }

    /// Snapshot of which facts are implicated in which matches.
    pub fn indictment_map(&self) -> Result<IndictmentMap<S>> {
        Ok(indict(&self.constraint_match_totals()?))
    }

    /// Number of live tuples in the arena. Zero derived tuples remain
    /// after every fact has been retracted and drained.
    pub fn live_tuple_count(&self) -> usize {
        self.arena.live_count()
    }
}

fn non_source(node: NodeId) -> ScoreFlowError {
    ScoreFlowError::Internal(format!(
        "node state and topology disagree about node {node:?}"
    ))
}
