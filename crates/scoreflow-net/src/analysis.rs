//! Read-only score analysis snapshots.
//!
//! Built on demand from the scorer states of a session with match
//! tracking enabled. Snapshots are plain owned values: they stay valid
//! (and stale) after the session moves on.

use std::collections::HashMap;

use scoreflow_core::{ConstraintRef, ImpactType, Score};

use crate::fact::{FactKey, FactRef};

/// One live constraint match: the matched facts and the signed score
/// contribution they committed.
#[derive(Debug, Clone)]
pub struct ConstraintMatch<S: Score> {
    pub constraint_ref: ConstraintRef,
    pub facts: Vec<FactRef>,
    pub score: S,
}

/// Aggregate view of one constraint across all its live matches.
#[derive(Debug, Clone)]
pub struct ConstraintMatchTotal<S: Score> {
    pub constraint_ref: ConstraintRef,
    pub impact_type: ImpactType,
    /// Sum of all match contributions, already signed.
    pub score: S,
    pub matches: Vec<ConstraintMatch<S>>,
}

impl<S: Score> ConstraintMatchTotal<S> {
    pub fn match_count(&self) -> usize {
        self.matches.len()
    }
}

/// Everything one fact is implicated in: the matches it participates in
/// and their summed contribution.
#[derive(Debug, Clone)]
pub struct Indictment<S: Score> {
    pub fact: FactRef,
    pub score: S,
    pub matches: Vec<ConstraintMatch<S>>,
}

/// Per-fact indictments, keyed by external fact identity.
pub type IndictmentMap<S> = HashMap<FactKey, Indictment<S>>;

/// Folds constraint matches into an indictment map. A fact appearing
/// several times in one match is indicted once for it.
pub fn indict<S: Score>(
    totals: &[ConstraintMatchTotal<S>],
) -> IndictmentMap<S> {
    let mut map: IndictmentMap<S> = HashMap::new();
    for total in totals {
        for m in &total.matches {
            let mut seen_in_match: Vec<FactKey> = Vec::new();
            for fact in &m.facts {
                let key = FactKey::of(&**fact);
                if seen_in_match.contains(&key) {
                    continue;
                }
                seen_in_match.push(key);
                let entry = map.entry(key).or_insert_with(|| Indictment {
                    fact: fact.clone(),
                    score: S::zero(),
                    matches: Vec::new(),
                });
                entry.score = entry.score.clone() + m.score.clone();
                entry.matches.push(m.clone());
            }
        }
    }
    map
}

#[cfg(test)]
mod tests {
    use super::*;
    use scoreflow_core::SimpleScore;
    use std::rc::Rc;

    fn simple_match(name: &str, facts: Vec<FactRef>, value: i64) -> ConstraintMatch<SimpleScore> {
        ConstraintMatch {
            constraint_ref: ConstraintRef::new("", name),
            facts,
            score: SimpleScore::of(value),
        }
    }

    #[test]
    fn indictments_sum_across_constraints() {
        let shared: FactRef = Rc::new(1i64);
        let other: FactRef = Rc::new(2i64);
        let totals = vec![
            ConstraintMatchTotal {
                constraint_ref: ConstraintRef::new("", "a"),
                impact_type: ImpactType::Penalty,
                score: SimpleScore::of(-3),
                matches: vec![simple_match("a", vec![shared.clone(), other.clone()], -3)],
            },
            ConstraintMatchTotal {
                constraint_ref: ConstraintRef::new("", "b"),
                impact_type: ImpactType::Penalty,
                score: SimpleScore::of(-2),
                matches: vec![simple_match("b", vec![shared.clone()], -2)],
            },
        ];

        let map = indict(&totals);
        let shared_key = FactKey::of(&*shared);
        let other_key = FactKey::of(&*other);
        assert_eq!(map[&shared_key].score, SimpleScore::of(-5));
        assert_eq!(map[&shared_key].matches.len(), 2);
        assert_eq!(map[&other_key].score, SimpleScore::of(-3));
    }

    #[test]
    fn repeated_fact_in_one_match_is_indicted_once() {
        let fact: FactRef = Rc::new(7i64);
        let totals = vec![ConstraintMatchTotal {
            constraint_ref: ConstraintRef::new("", "self-pair"),
            impact_type: ImpactType::Penalty,
            score: SimpleScore::of(-1),
            matches: vec![simple_match("self-pair", vec![fact.clone(), fact.clone()], -1)],
        }];

        let map = indict(&totals);
        let indictment = &map[&FactKey::of(&*fact)];
        assert_eq!(indictment.matches.len(), 1);
        assert_eq!(indictment.score, SimpleScore::of(-1));
    }
}
