//! Dynamic fact model.
//!
//! The network is compiled at runtime from a declarative topology, so the
//! tuples flowing through it carry type-erased fact references. A fact is
//! any `'static` value that can report a stable identity; the session
//! resolves which source nodes accept it once per concrete type.

use std::any::{Any, TypeId};
use std::fmt::Debug;
use std::rc::Rc;

/// Stable identity of a fact within its concrete type.
///
/// The external caller (the score director) owns identity discipline:
/// the same logical fact must report the same id across its
/// insert/update/retract lifetime, and ids are never reused for a new
/// fact of the same type within one session.
pub type FactId = u64;

/// A runtime fact: any debuggable `'static` value with a stable identity.
///
/// Sessions are single-threaded, so facts are shared via [`Rc`].
pub trait Fact: Any + Debug {
    /// Returns this fact's identity within its concrete type.
    fn fact_id(&self) -> FactId;

    /// Upcast for concrete-type downcasting.
    fn as_any(&self) -> &dyn Any;
}

/// Shared reference to a fact, as stored in tuples.
pub type FactRef = Rc<dyn Fact>;

/// External identity of a fact: concrete type plus per-type id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FactKey {
    pub type_id: TypeId,
    pub fact_id: FactId,
}

impl FactKey {
    /// Builds the identity key of a fact.
    pub fn of(fact: &dyn Fact) -> Self {
        FactKey {
            type_id: fact.as_any().type_id(),
            fact_id: fact.fact_id(),
        }
    }
}

/// Convenience accessors for the fact slice of a tuple.
///
/// Used inside user-supplied predicates, key functions and weight
/// functions. A wrong index or type is a defect in the constraint
/// definition and panics, which aborts the in-flight drain and leaves the
/// session unusable (it reports `CorruptedSession` from then on).
pub trait FactSliceExt {
    /// Downcasts the fact at `index` to `T`.
    fn fact<T: Any>(&self, index: usize) -> &T;

    /// Downcasts the fact at `index` to `T`, or `None` on a type mismatch.
    fn try_fact<T: Any>(&self, index: usize) -> Option<&T>;
}

impl FactSliceExt for [FactRef] {
    fn fact<T: Any>(&self, index: usize) -> &T {
        self[index]
            .as_any()
            .downcast_ref::<T>()
            .unwrap_or_else(|| {
                panic!(
                    "fact at index {index} is {:?}, not a {}",
                    self[index],
                    std::any::type_name::<T>()
                )
            })
    }

    fn try_fact<T: Any>(&self, index: usize) -> Option<&T> {
        self.get(index).and_then(|f| f.as_any().downcast_ref::<T>())
    }
}

macro_rules! impl_fact_for_int {
    ($($ty:ty),*) => {
        $(impl Fact for $ty {
            fn fact_id(&self) -> FactId {
                *self as FactId
            }
            fn as_any(&self) -> &dyn Any {
                self
            }
        })*
    };
}

// Primitive carriers, used mostly for group keys and aggregate results.
impl_fact_for_int!(i64, u64, i32, u32, usize);

impl Fact for bool {
    fn fact_id(&self) -> FactId {
        *self as FactId
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Fact for String {
    fn fact_id(&self) -> FactId {
        use std::hash::{Hash, Hasher};
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        self.hash(&mut hasher);
        hasher.finish()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Shift {
        id: u64,
    }

    impl Fact for Shift {
        fn fact_id(&self) -> FactId {
            self.id
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    #[test]
    fn fact_key_distinguishes_types() {
        let shift = Shift { id: 7 };
        let number = 7i64;
        assert_ne!(FactKey::of(&shift), FactKey::of(&number));
        assert_eq!(FactKey::of(&shift).fact_id, FactKey::of(&number).fact_id);
    }

    #[test]
    fn fact_slice_downcast() {
        let facts: Vec<FactRef> = vec![Rc::new(Shift { id: 1 }), Rc::new(42i64)];
        assert_eq!(facts.fact::<Shift>(0).id, 1);
        assert_eq!(*facts.fact::<i64>(1), 42);
        assert!(facts.try_fact::<Shift>(1).is_none());
    }
}
