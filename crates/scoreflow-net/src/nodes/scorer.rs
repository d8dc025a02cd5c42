//! Scorer nodes: terminal sinks that fold one constraint's matches into
//! a running score.
//!
//! Exact undo: the signed impact of every live match is stored alongside
//! the running total, so a retract subtracts precisely what the insert
//! added, with no drift and no rescan. Match tracking additionally keeps
//! a snapshot of each match's facts for analysis; it is optional because
//! the snapshots cost memory on every live match.

use std::collections::HashMap;

use scoreflow_core::{ImpactType, Result, Score, ScoreFlowError};

use crate::fact::FactRef;
use crate::topology::WeightFn;
use crate::tuple::{TupleArena, TupleId};

pub(crate) struct ScorerState<S: Score> {
    total: S,
    impacts: HashMap<TupleId, S>,
    /// Facts snapshot per live match, kept only when match tracking is on.
    matches: Option<HashMap<TupleId, Vec<FactRef>>>,
}

impl<S: Score> ScorerState<S> {
    pub(crate) fn new(match_tracking: bool) -> Self {
        ScorerState {
            total: S::zero(),
            impacts: HashMap::new(),
            matches: match_tracking.then(HashMap::new),
        }
    }

    fn signed_impact(
        weight: &WeightFn<S>,
        impact_type: ImpactType,
        facts: &[FactRef],
    ) -> S {
        let magnitude = weight(facts);
        match impact_type {
            ImpactType::Penalty => -magnitude,
            ImpactType::Reward => magnitude,
        }
    }

    pub(crate) fn insert(
        &mut self,
        weight: &WeightFn<S>,
        impact_type: ImpactType,
        arena: &TupleArena,
        input: TupleId,
    ) -> Result<()> {
        let facts = arena.get(input)?.facts.clone();
        let impact = Self::signed_impact(weight, impact_type, &facts);
        self.total = self.total.clone() + impact.clone();
        self.impacts.insert(input, impact);
        if let Some(matches) = &mut self.matches {
            matches.insert(input, facts.to_vec());
        }
        Ok(())
    }

    pub(crate) fn update(
        &mut self,
        weight: &WeightFn<S>,
        impact_type: ImpactType,
        arena: &TupleArena,
        input: TupleId,
    ) -> Result<()> {
        let old = self.impacts.get(&input).cloned().ok_or_else(|| {
            ScoreFlowError::Internal(format!("scorer update for unknown match {input:?}"))
        })?;
        let facts = arena.get(input)?.facts.clone();
        let new = Self::signed_impact(weight, impact_type, &facts);
        self.total = self.total.clone() - old + new.clone();
        self.impacts.insert(input, new);
        if let Some(matches) = &mut self.matches {
            matches.insert(input, facts.to_vec());
        }
        Ok(())
    }

    pub(crate) fn retract(&mut self, input: TupleId) -> Result<()> {
        let impact = self.impacts.remove(&input).ok_or_else(|| {
            ScoreFlowError::Internal(format!("scorer retract for unknown match {input:?}"))
        })?;
        self.total = self.total.clone() - impact;
        if let Some(matches) = &mut self.matches {
            matches.remove(&input);
        }
        Ok(())
    }

    pub(crate) fn total(&self) -> S {
        self.total.clone()
    }

    /// Live matches as `(facts, signed impact)` pairs. Errors when match
    /// tracking is disabled for the session.
    pub(crate) fn tracked_matches(&self) -> Result<impl Iterator<Item = (&[FactRef], &S)>> {
        let matches = self.matches.as_ref().ok_or_else(|| {
            ScoreFlowError::Structural(
                "constraint match analysis requires match tracking to be enabled".into(),
            )
        })?;
        Ok(matches.iter().filter_map(|(id, facts)| {
            self.impacts.get(id).map(|impact| (facts.as_slice(), impact))
        }))
    }
}
