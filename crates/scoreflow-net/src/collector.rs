//! Group-by collectors.
//!
//! A collector lives in the compiled topology (shared, `Send + Sync`) and
//! manufactures one accumulator per live group inside a session. Every
//! accumulation returns an undo handle; retracting the handle restores the
//! aggregate exactly, which is what keeps group results identical to a
//! from-scratch recomputation.

use std::collections::HashMap;
use std::rc::Rc;
use std::sync::Arc;

use crate::fact::FactRef;

/// Handle to one accumulated contribution, returned by
/// [`Accumulator::accumulate`] and consumed by [`Accumulator::retract`].
pub type UndoId = u64;

/// Factory for per-group accumulators. Lives in the topology.
pub trait Collector: Send + Sync {
    fn create(&self) -> Box<dyn Accumulator>;
}

/// Mutable aggregate of one group. Lives in a session.
pub trait Accumulator {
    /// Folds a tuple's facts into the aggregate.
    fn accumulate(&mut self, facts: &[FactRef]) -> UndoId;

    /// Exactly undoes a previous accumulation.
    fn retract(&mut self, undo: UndoId);

    /// Materializes the current aggregate as a fact.
    fn result(&self) -> FactRef;
}

/// Counts tuples in the group. The result fact is an `i64`.
///
/// # Example
///
/// ```
/// use scoreflow_net::collector::{count, Collector};
/// use scoreflow_net::fact::Fact;
///
/// let collector = count();
/// let mut acc = collector.create();
/// let undo = acc.accumulate(&[]);
/// acc.accumulate(&[]);
/// acc.retract(undo);
/// assert_eq!(acc.result().as_any().downcast_ref::<i64>(), Some(&1));
/// ```
pub fn count() -> Arc<dyn Collector> {
    Arc::new(CountCollector)
}

struct CountCollector;

impl Collector for CountCollector {
    fn create(&self) -> Box<dyn Accumulator> {
        Box::new(CountAccumulator { count: 0 })
    }
}

struct CountAccumulator {
    count: i64,
}

impl Accumulator for CountAccumulator {
    fn accumulate(&mut self, _facts: &[FactRef]) -> UndoId {
        self.count += 1;
        0
    }

    fn retract(&mut self, _undo: UndoId) {
        self.count -= 1;
    }

    fn result(&self) -> FactRef {
        Rc::new(self.count)
    }
}

/// Sums an `i64` extracted from each tuple. The result fact is an `i64`.
///
/// The extracted value is remembered per undo handle, so a retract after
/// the underlying fact mutated still subtracts the value that was
/// actually added.
pub fn sum_i64(
    extract: impl Fn(&[FactRef]) -> i64 + Send + Sync + 'static,
) -> Arc<dyn Collector> {
    Arc::new(SumCollector {
        extract: Arc::new(extract),
    })
}

struct SumCollector {
    extract: Arc<dyn Fn(&[FactRef]) -> i64 + Send + Sync>,
}

impl Collector for SumCollector {
    fn create(&self) -> Box<dyn Accumulator> {
        Box::new(SumAccumulator {
            extract: Arc::clone(&self.extract),
            sum: 0,
            contributions: HashMap::new(),
            next_undo: 0,
        })
    }
}

struct SumAccumulator {
    extract: Arc<dyn Fn(&[FactRef]) -> i64 + Send + Sync>,
    sum: i64,
    contributions: HashMap<UndoId, i64>,
    next_undo: UndoId,
}

impl Accumulator for SumAccumulator {
    fn accumulate(&mut self, facts: &[FactRef]) -> UndoId {
        let value = (self.extract)(facts);
        self.sum += value;
        let undo = self.next_undo;
        self.next_undo += 1;
        self.contributions.insert(undo, value);
        undo
    }

    fn retract(&mut self, undo: UndoId) {
        if let Some(value) = self.contributions.remove(&undo) {
            self.sum -= value;
        }
    }

    fn result(&self) -> FactRef {
        Rc::new(self.sum)
    }
}
