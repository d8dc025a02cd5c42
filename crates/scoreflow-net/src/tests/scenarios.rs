use scoreflow_core::SimpleScore;

use crate::session::{Session, SessionConfig};
use crate::test_utils::{
    count_square_topology, diamond_topology, equal_pair_topology, join_diamond_topology,
    value_fact,
};

#[test]
fn equal_pairs_follow_value_updates() {
    let mut session = Session::new(equal_pair_topology(), SessionConfig::default());
    session.insert(value_fact(1, 1)).unwrap();
    session.insert(value_fact(2, 1)).unwrap();
    session.insert(value_fact(3, 2)).unwrap();
    assert_eq!(
        session.calculate_score(SimpleScore::ZERO).unwrap(),
        SimpleScore::of(-1)
    );

    // Fact 3 joins the crowd: three equal values, three ordered pairs.
    session.update(value_fact(3, 1)).unwrap();
    assert_eq!(
        session.calculate_score(SimpleScore::ZERO).unwrap(),
        SimpleScore::of(-3)
    );

    session.update(value_fact(3, 2)).unwrap();
    assert_eq!(
        session.calculate_score(SimpleScore::ZERO).unwrap(),
        SimpleScore::of(-1)
    );
}

#[test]
fn group_count_square_follows_retraction() {
    let mut session = Session::new(count_square_topology(), SessionConfig::default());
    for (id, value) in [(1, 1), (2, 1), (3, 1), (4, 2), (5, 2)] {
        session.insert(value_fact(id, value)).unwrap();
    }
    // 3² + 2² = 13
    assert_eq!(
        session.calculate_score(SimpleScore::ZERO).unwrap(),
        SimpleScore::of(-13)
    );

    session.retract(&value_fact(3, 1)).unwrap();
    // 2² + 2² = 8
    assert_eq!(
        session.calculate_score(SimpleScore::ZERO).unwrap(),
        SimpleScore::of(-8)
    );
}

#[test]
fn emptied_group_disappears_and_comes_back_fresh() {
    let mut session = Session::new(count_square_topology(), SessionConfig::default());
    session.insert(value_fact(1, 7)).unwrap();
    assert_eq!(
        session.calculate_score(SimpleScore::ZERO).unwrap(),
        SimpleScore::of(-1)
    );

    session.retract(&value_fact(1, 7)).unwrap();
    assert_eq!(
        session.calculate_score(SimpleScore::ZERO).unwrap(),
        SimpleScore::ZERO
    );
    assert_eq!(session.live_tuple_count(), 0);

    session.insert(value_fact(2, 7)).unwrap();
    assert_eq!(
        session.calculate_score(SimpleScore::ZERO).unwrap(),
        SimpleScore::of(-1)
    );
}

#[test]
fn join_headed_diamond_follows_pair_churn() {
    let mut session = Session::new(join_diamond_topology(), SessionConfig::default());
    session.insert(value_fact(1, 1)).unwrap();
    session.insert(value_fact(2, 1)).unwrap();
    session.insert(value_fact(3, 1)).unwrap();
    // Nine equal-value pairs; 3 survive the ordering filter, 5 the
    // even-sum filter, and the shared group counts both branches.
    assert_eq!(
        session.assert_score_consistent(SimpleScore::ZERO).unwrap(),
        SimpleScore::of(-8)
    );

    // Fact 2 leaves the crowd: every pair touching it on either join
    // side is torn down, and (2,2) re-forms in the new value bucket.
    session.update(value_fact(2, 2)).unwrap();
    assert_eq!(
        session.assert_score_consistent(SimpleScore::ZERO).unwrap(),
        SimpleScore::of(-6)
    );

    session.retract(&value_fact(3, 1)).unwrap();
    assert_eq!(
        session.assert_score_consistent(SimpleScore::ZERO).unwrap(),
        SimpleScore::of(-2)
    );
}

#[test]
fn diamond_counts_each_branch_hit() {
    let mut session = Session::new(diamond_topology(), SessionConfig::default());
    session.insert(value_fact(1, 4)).unwrap(); // small and even
    session.insert(value_fact(2, 3)).unwrap(); // small only
    session.insert(value_fact(3, 12)).unwrap(); // even only
    session.insert(value_fact(4, 15)).unwrap(); // neither
    assert_eq!(
        session.assert_score_consistent(SimpleScore::ZERO).unwrap(),
        SimpleScore::of(-4)
    );

    // Fact 2 moves from the small branch to the even branch: the two
    // filter deltas meet again in the shared group without double counting.
    session.update(value_fact(2, 20)).unwrap();
    assert_eq!(
        session.assert_score_consistent(SimpleScore::ZERO).unwrap(),
        SimpleScore::of(-4)
    );

    session.update(value_fact(2, 15)).unwrap();
    assert_eq!(
        session.assert_score_consistent(SimpleScore::ZERO).unwrap(),
        SimpleScore::of(-3)
    );

    // Staying in both branches is an in-place update, not a membership
    // change.
    session.update(value_fact(1, 6)).unwrap();
    assert_eq!(
        session.assert_score_consistent(SimpleScore::ZERO).unwrap(),
        SimpleScore::of(-3)
    );
}
