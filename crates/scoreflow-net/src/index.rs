//! Join/group/distinct index keys and the per-side tuple index.

use std::collections::HashMap;
use std::rc::Rc;

use scoreflow_core::{Result, ScoreFlowError};

use crate::fact::{Fact, FactKey, FactRef};
use crate::tuple::TupleId;

/// A small dynamic key value used for join probing, group-by keys and
/// distinct reference counting.
///
/// Primitive carriers compare by value; every other fact type compares by
/// its [`FactKey`] identity, so a custom key type controls its own
/// equality through `fact_id`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum IndexKey {
    Unit,
    Bool(bool),
    Int(i64),
    Text(Rc<str>),
    Fact(FactKey),
    Composite(Rc<[IndexKey]>),
}

impl IndexKey {
    /// Derives a key from a fact: by value for primitive carriers, by
    /// identity for everything else.
    pub fn from_fact(fact: &dyn Fact) -> IndexKey {
        let any = fact.as_any();
        if let Some(i) = any.downcast_ref::<i64>() {
            IndexKey::Int(*i)
        } else if let Some(i) = any.downcast_ref::<u64>() {
            IndexKey::Int(*i as i64)
        } else if let Some(i) = any.downcast_ref::<i32>() {
            IndexKey::Int(i64::from(*i))
        } else if let Some(i) = any.downcast_ref::<u32>() {
            IndexKey::Int(i64::from(*i))
        } else if let Some(i) = any.downcast_ref::<usize>() {
            IndexKey::Int(*i as i64)
        } else if let Some(b) = any.downcast_ref::<bool>() {
            IndexKey::Bool(*b)
        } else if let Some(s) = any.downcast_ref::<String>() {
            IndexKey::Text(Rc::from(s.as_str()))
        } else {
            IndexKey::Fact(FactKey::of(fact))
        }
    }

    /// Derives the identity key of a whole fact slice, used by distinct
    /// nodes.
    pub fn of_facts(facts: &[FactRef]) -> IndexKey {
        IndexKey::Composite(facts.iter().map(|f| IndexKey::from_fact(&**f)).collect())
    }

    pub fn composite(keys: impl IntoIterator<Item = IndexKey>) -> IndexKey {
        IndexKey::Composite(keys.into_iter().collect())
    }
}

impl From<i64> for IndexKey {
    fn from(value: i64) -> Self {
        IndexKey::Int(value)
    }
}

impl From<bool> for IndexKey {
    fn from(value: bool) -> Self {
        IndexKey::Bool(value)
    }
}

impl From<&str> for IndexKey {
    fn from(value: &str) -> Self {
        IndexKey::Text(Rc::from(value))
    }
}

/// One side of a join node: tuples bucketed by their key.
///
/// Probing returns only the bucket for the probe key, which is what keeps
/// per-operation join cost proportional to the number of matches.
#[derive(Default)]
pub struct TupleIndex {
    buckets: HashMap<IndexKey, Vec<TupleId>>,
}

impl TupleIndex {
    pub fn new() -> Self {
        TupleIndex::default()
    }

    pub fn put(&mut self, key: IndexKey, id: TupleId) {
        self.buckets.entry(key).or_default().push(id);
    }

    pub fn remove(&mut self, key: &IndexKey, id: TupleId) -> Result<()> {
        let bucket = self.buckets.get_mut(key).ok_or_else(|| {
            ScoreFlowError::Internal(format!("index bucket missing for key {key:?}"))
        })?;
        let position = bucket.iter().position(|&t| t == id).ok_or_else(|| {
            ScoreFlowError::Internal(format!("tuple {id:?} missing from bucket {key:?}"))
        })?;
        bucket.swap_remove(position);
        if bucket.is_empty() {
            self.buckets.remove(key);
        }
        Ok(())
    }

    pub fn get(&self, key: &IndexKey) -> &[TupleId] {
        self.buckets.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topology::NodeId;
    use crate::tuple::TupleArena;
    use smallvec::SmallVec;

    #[test]
    fn value_keys_for_primitives_identity_for_the_rest() {
        let a = IndexKey::from_fact(&5i64);
        let b = IndexKey::from_fact(&5u32);
        assert_eq!(a, b);
        assert_eq!(
            IndexKey::from_fact(&String::from("x")),
            IndexKey::from_fact(&String::from("x"))
        );
    }

    #[test]
    fn put_get_remove() {
        let mut arena = TupleArena::new();
        let mut index = TupleIndex::new();
        let id = arena.allocate(NodeId::new(0), SmallVec::new(), SmallVec::new());
        let key = IndexKey::Int(3);

        index.put(key.clone(), id);
        assert_eq!(index.get(&key), &[id]);
        index.remove(&key, id).unwrap();
        assert!(index.get(&key).is_empty());
        assert!(index.is_empty());
        assert!(index.remove(&key, id).is_err());
    }
}
