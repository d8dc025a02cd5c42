use std::rc::Rc;

use scoreflow_core::{HardSoftScore, ScoreFlowError, SimpleScore};

use crate::fact::{Fact, FactKey, FactRef, FactSliceExt};
use crate::session::{Session, SessionConfig};
use crate::test_utils::{equal_pair_topology, value_fact, ValueFact};
use crate::topology::TopologyBuilder;

#[test]
fn double_insert_is_structural_and_poisons_the_session() {
    let mut session = Session::new(equal_pair_topology(), SessionConfig::default());
    session.insert(value_fact(1, 1)).unwrap();
    assert!(matches!(
        session.insert(value_fact(1, 9)),
        Err(ScoreFlowError::Structural(_))
    ));
    // Everything after the failure reports the poisoned session.
    assert!(matches!(
        session.calculate_score(SimpleScore::ZERO),
        Err(ScoreFlowError::CorruptedSession(_))
    ));
    assert!(matches!(
        session.insert(value_fact(2, 1)),
        Err(ScoreFlowError::CorruptedSession(_))
    ));
}

#[test]
fn update_of_unknown_fact_is_structural() {
    let mut session = Session::new(equal_pair_topology(), SessionConfig::default());
    assert!(matches!(
        session.update(value_fact(1, 1)),
        Err(ScoreFlowError::Structural(_))
    ));
}

#[test]
fn retract_of_unknown_fact_is_structural() {
    let mut session = Session::new(equal_pair_topology(), SessionConfig::default());
    session.insert(value_fact(1, 1)).unwrap();
    session.retract(&value_fact(1, 1)).unwrap();
    assert!(matches!(
        session.retract(&value_fact(1, 1)),
        Err(ScoreFlowError::Structural(_))
    ));
}

#[test]
fn facts_of_foreign_types_are_registered_but_unscored() {
    let mut session = Session::new(equal_pair_topology(), SessionConfig::default());
    session.insert(Rc::new(42i64) as FactRef).unwrap();
    session.insert(value_fact(1, 1)).unwrap();
    session.insert(value_fact(2, 1)).unwrap();
    assert_eq!(
        session.calculate_score(SimpleScore::ZERO).unwrap(),
        SimpleScore::of(-1)
    );
}

#[test]
fn match_totals_and_indictments() {
    let mut session = Session::new(equal_pair_topology(), SessionConfig::default());
    let a = value_fact(1, 1);
    let b = value_fact(2, 1);
    session.insert(a.clone()).unwrap();
    session.insert(b.clone()).unwrap();
    session.insert(value_fact(3, 2)).unwrap();
    session.calculate_score(SimpleScore::ZERO).unwrap();

    let totals = session.constraint_match_totals().unwrap();
    assert_eq!(totals.len(), 1);
    let total = &totals[0];
    assert_eq!(total.constraint_ref.full_name(), "Equal pair");
    assert_eq!(total.score, SimpleScore::of(-1));
    assert_eq!(total.match_count(), 1);
    assert_eq!(total.matches[0].facts.len(), 2);

    let indictments = session.indictment_map().unwrap();
    assert_eq!(indictments[&FactKey::of(&*a)].score, SimpleScore::of(-1));
    assert_eq!(indictments[&FactKey::of(&*b)].score, SimpleScore::of(-1));
    assert!(!indictments.contains_key(&FactKey::of(&*value_fact(3, 2))));
}

#[test]
fn analysis_requires_match_tracking() {
    let config = SessionConfig {
        match_tracking: false,
    };
    let mut session = Session::new(equal_pair_topology(), config);
    session.insert(value_fact(1, 1)).unwrap();
    session.insert(value_fact(2, 1)).unwrap();
    assert_eq!(
        session.calculate_score(SimpleScore::ZERO).unwrap(),
        SimpleScore::of(-1)
    );
    assert!(matches!(
        session.constraint_match_totals(),
        Err(ScoreFlowError::Structural(_))
    ));
}

#[test]
fn retracting_everything_leaves_an_empty_arena() {
    let mut session = Session::new(equal_pair_topology(), SessionConfig::default());
    let facts: Vec<FactRef> = (1..=4).map(|id| value_fact(id, 1)).collect();
    for fact in &facts {
        session.insert(fact.clone()).unwrap();
    }
    session.calculate_score(SimpleScore::ZERO).unwrap();
    assert!(session.live_tuple_count() > 0);

    for fact in &facts {
        session.retract(fact).unwrap();
    }
    assert_eq!(
        session.calculate_score(SimpleScore::ZERO).unwrap(),
        SimpleScore::ZERO
    );
    assert_eq!(session.live_tuple_count(), 0);
}

#[test]
fn multi_level_scores_undo_exactly() {
    let mut builder = TopologyBuilder::<HardSoftScore>::new();
    let facts = builder.for_each::<ValueFact>();
    let negative = builder.filter(facts, |f| f.fact::<ValueFact>(0).value < 0);
    builder.penalize(negative, "Negative value", |_| HardSoftScore::of_hard(1));
    let all = builder.for_each::<ValueFact>();
    builder.penalize(all, "Total value", |f| {
        HardSoftScore::of_soft(f.fact::<ValueFact>(0).value.abs())
    });
    let topology = builder.build().unwrap();

    let mut session = Session::new(topology, SessionConfig::default());
    session.insert(value_fact(1, -5)).unwrap();
    session.insert(value_fact(2, 3)).unwrap();
    assert_eq!(
        session.calculate_score(HardSoftScore::ZERO).unwrap(),
        HardSoftScore::of(-1, -8)
    );

    session.update(value_fact(1, 5)).unwrap();
    assert_eq!(
        session.assert_score_consistent(HardSoftScore::ZERO).unwrap(),
        HardSoftScore::of(0, -8)
    );

    session.retract(&value_fact(2, 3)).unwrap();
    assert_eq!(
        session.assert_score_consistent(HardSoftScore::ZERO).unwrap(),
        HardSoftScore::of(0, -5)
    );
}

#[test]
fn predicate_sources_accept_several_concrete_types() {
    #[derive(Debug)]
    struct Tagged {
        id: u64,
    }
    impl crate::fact::Fact for Tagged {
        fn fact_id(&self) -> crate::fact::FactId {
            self.id
        }
        fn as_any(&self) -> &dyn std::any::Any {
            self
        }
    }

    let mut builder = TopologyBuilder::<SimpleScore>::new();
    let anything = builder.for_each_matching("interesting", |fact| {
        fact.as_any().is::<ValueFact>() || fact.as_any().is::<Tagged>()
    });
    builder.penalize(anything, "Interesting fact", |_| SimpleScore::ONE);
    let topology = builder.build().unwrap();

    let mut session = Session::new(topology, SessionConfig::default());
    session.insert(value_fact(1, 1)).unwrap();
    session.insert(Rc::new(Tagged { id: 1 }) as FactRef).unwrap();
    session.insert(Rc::new(99i64) as FactRef).unwrap(); // not accepted
    assert_eq!(
        session.calculate_score(SimpleScore::ZERO).unwrap(),
        SimpleScore::of(-2)
    );
}

#[test]
fn dispatch_routes_by_concrete_type() {
    #[derive(Debug)]
    struct Other {
        id: u64,
    }
    impl crate::fact::Fact for Other {
        fn fact_id(&self) -> crate::fact::FactId {
            self.id
        }
        fn as_any(&self) -> &dyn std::any::Any {
            self
        }
    }

    let mut builder = TopologyBuilder::<SimpleScore>::new();
    let values = builder.for_each::<ValueFact>();
    builder.penalize(values, "Values", |_| SimpleScore::ONE);
    let others = builder.for_each::<Other>();
    builder.penalize(others, "Others", |_| SimpleScore::of(10));
    let topology = builder.build().unwrap();

    let mut session = Session::new(topology, SessionConfig::default());
    session.insert(value_fact(1, 1)).unwrap();
    session.insert(Rc::new(Other { id: 1 }) as FactRef).unwrap();
    session.insert(Rc::new(Other { id: 2 }) as FactRef).unwrap();
    assert_eq!(
        session.calculate_score(SimpleScore::ZERO).unwrap(),
        SimpleScore::of(-21)
    );
}
