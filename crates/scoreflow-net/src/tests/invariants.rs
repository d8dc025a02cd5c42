use scoreflow_core::SimpleScore;

use crate::session::{Session, SessionConfig};
use crate::test_utils::{count_square_topology, equal_pair_topology, value_fact};

#[test]
fn incremental_matches_from_scratch_throughout() {
    let mut session = Session::new(equal_pair_topology(), SessionConfig::default());
    let steps: [&dyn Fn(&mut Session<SimpleScore>); 6] = [
        &|s| {
            s.insert(value_fact(1, 1)).unwrap();
            s.insert(value_fact(2, 1)).unwrap();
        },
        &|s| s.insert(value_fact(3, 2)).unwrap(),
        &|s| s.update(value_fact(3, 1)).unwrap(),
        &|s| s.retract(&value_fact(2, 1)).unwrap(),
        &|s| s.update(value_fact(1, 2)).unwrap(),
        &|s| s.insert(value_fact(4, 2)).unwrap(),
    ];
    for step in steps {
        step(&mut session);
        session.assert_score_consistent(SimpleScore::ZERO).unwrap();
    }
}

#[test]
fn retract_then_identical_reinsert_restores_the_score() {
    let mut session = Session::new(count_square_topology(), SessionConfig::default());
    for (id, value) in [(1, 1), (2, 1), (3, 2)] {
        session.insert(value_fact(id, value)).unwrap();
    }
    let before = session.calculate_score(SimpleScore::ZERO).unwrap();

    session.retract(&value_fact(2, 1)).unwrap();
    session.calculate_score(SimpleScore::ZERO).unwrap();
    session.insert(value_fact(2, 1)).unwrap();

    assert_eq!(session.calculate_score(SimpleScore::ZERO).unwrap(), before);
    session.assert_score_consistent(SimpleScore::ZERO).unwrap();
}

#[test]
fn retract_and_reinsert_within_one_batch() {
    let mut session = Session::new(equal_pair_topology(), SessionConfig::default());
    session.insert(value_fact(1, 1)).unwrap();
    session.insert(value_fact(2, 1)).unwrap();
    let before = session.calculate_score(SimpleScore::ZERO).unwrap();

    // The old tuple's retract and the replacement's insert drain in the
    // same pass; downstream sees retract first.
    session.retract(&value_fact(2, 1)).unwrap();
    session.insert(value_fact(2, 1)).unwrap();
    assert_eq!(session.calculate_score(SimpleScore::ZERO).unwrap(), before);
    session.assert_score_consistent(SimpleScore::ZERO).unwrap();
}

#[test]
fn insertion_order_does_not_change_the_score() {
    let facts = [(1, 1), (2, 1), (3, 1), (4, 2), (5, 2)];
    let forward = {
        let mut session = Session::new(equal_pair_topology(), SessionConfig::default());
        for (id, value) in facts {
            session.insert(value_fact(id, value)).unwrap();
        }
        session.calculate_score(SimpleScore::ZERO).unwrap()
    };
    let backward = {
        let mut session = Session::new(equal_pair_topology(), SessionConfig::default());
        for (id, value) in facts.iter().rev() {
            session.insert(value_fact(*id, *value)).unwrap();
        }
        session.calculate_score(SimpleScore::ZERO).unwrap()
    };
    assert_eq!(forward, backward);
}

#[test]
fn update_queued_before_retract_is_superseded() {
    let mut session = Session::new(equal_pair_topology(), SessionConfig::default());
    session.insert(value_fact(1, 1)).unwrap();
    session.insert(value_fact(2, 1)).unwrap();
    session.calculate_score(SimpleScore::ZERO).unwrap();

    // The update is still pending when the retract arrives; the retract
    // wins, the pair disappears entirely, and the stale update-lane
    // entry is skipped rather than aborting the drain.
    session.update(value_fact(2, 1)).unwrap();
    session.retract(&value_fact(2, 1)).unwrap();
    assert_eq!(
        session.calculate_score(SimpleScore::ZERO).unwrap(),
        SimpleScore::ZERO
    );
    // Only fact 1's source tuple survives; the retracted tuple's slot
    // was freed during the same drain.
    assert_eq!(session.live_tuple_count(), 1);
    session.assert_score_consistent(SimpleScore::ZERO).unwrap();
}

#[test]
fn insert_then_retract_before_draining_is_a_no_op() {
    let mut session = Session::new(count_square_topology(), SessionConfig::default());
    session.insert(value_fact(1, 1)).unwrap();
    session.retract(&value_fact(1, 1)).unwrap();
    assert_eq!(
        session.calculate_score(SimpleScore::ZERO).unwrap(),
        SimpleScore::ZERO
    );
    assert_eq!(session.live_tuple_count(), 0);
}
