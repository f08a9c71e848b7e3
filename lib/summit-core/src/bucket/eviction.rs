use std::collections::VecDeque;

use rand::Rng as _;
use summit_stats::Reducer;

/// A sample retained by an [`AccumulatingBucket`][super::AccumulatingBucket].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RetainedSample {
    value: f64,
    priority: i64,
}

impl RetainedSample {
    pub(super) fn new(value: f64, priority: i64) -> Self {
        Self { value, priority }
    }

    /// Returns the observed value.
    pub fn value(&self) -> f64 {
        self.value
    }

    /// Returns the insertion priority.
    ///
    /// Priorities strictly decrease with arrival order: the earliest retained sample has the highest priority.
    pub fn priority(&self) -> i64 {
        self.priority
    }
}

/// Proof that exactly one retained sample was removed by an [`EvictionPolicy`].
///
/// Only the mutating methods on [`Eviction`] can create one.
#[derive(Debug)]
#[must_use]
pub struct Evicted {
    _private: (),
}

impl Evicted {
    fn new() -> Self {
        Self { _private: () }
    }
}

/// A one-shot handle over the samples retained by a full bucket.
///
/// Samples are exposed in priority order, from the earliest arrival (highest priority) to the latest. Every method that
/// removes a sample consumes the handle, so a policy removes exactly one sample per eviction.
pub struct Eviction<'a> {
    samples: &'a mut VecDeque<RetainedSample>,
}

impl<'a> Eviction<'a> {
    pub(super) fn new(samples: &'a mut VecDeque<RetainedSample>) -> Self {
        debug_assert!(!samples.is_empty(), "eviction requires at least one retained sample");
        Self { samples }
    }

    /// Returns the number of retained samples.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Returns `true` if there are no retained samples.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Returns the retained sample at `position`, where position 0 is the earliest arrival.
    pub fn get(&self, position: usize) -> Option<&RetainedSample> {
        self.samples.get(position)
    }

    /// Returns an iterator over the retained samples, from the earliest arrival to the latest.
    pub fn samples(&self) -> impl Iterator<Item = &RetainedSample> + '_ {
        self.samples.iter()
    }

    /// Removes the earliest retained sample.
    pub fn remove_oldest(self) -> Evicted {
        self.samples.pop_front();
        Evicted::new()
    }

    /// Removes the latest retained sample.
    pub fn remove_newest(self) -> Evicted {
        self.samples.pop_back();
        Evicted::new()
    }

    /// Removes the retained sample at `position`.
    ///
    /// # Panics
    ///
    /// Panics if `position` is out of bounds.
    pub fn remove_at(self, position: usize) -> Evicted {
        assert!(
            position < self.samples.len(),
            "eviction position {} out of bounds for {} retained samples",
            position,
            self.samples.len()
        );

        self.samples.remove(position);
        Evicted::new()
    }

    /// Replaces the two earliest retained samples with a single sample holding `reducer` applied to both values.
    ///
    /// The combined sample keeps the priority of the later of the two, so the priority order is preserved. With only a
    /// single retained sample, it is removed outright.
    pub fn coalesce_oldest(self, reducer: Reducer) -> Evicted {
        match (self.samples.pop_front(), self.samples.pop_front()) {
            (Some(first), Some(second)) => {
                let value = reducer(&[first.value, second.value]);
                self.samples.push_front(RetainedSample::new(value, second.priority));
            }
            _ => {}
        }

        Evicted::new()
    }
}

/// A strategy for making room in a full [`AccumulatingBucket`][super::AccumulatingBucket].
///
/// The policy decides the sampling bias of the retained reservoir, and so what later quantile queries actually
/// estimate. It runs while the bucket's exclusive lock is held, so it must not touch shared state.
///
/// Any `Fn(Eviction<'_>) -> Evicted` closure is also an eviction policy.
pub trait EvictionPolicy: Send + Sync {
    /// Removes exactly one retained sample.
    fn evict(&self, eviction: Eviction<'_>) -> Evicted;
}

impl<F> EvictionPolicy for F
where
    F: Fn(Eviction<'_>) -> Evicted + Send + Sync,
{
    fn evict(&self, eviction: Eviction<'_>) -> Evicted {
        self(eviction)
    }
}

/// Evicts the most recently added sample.
///
/// Once full, the reservoir stops changing: it keeps the first samples ever observed plus whichever sample arrived
/// last.
#[derive(Clone, Copy, Debug, Default)]
pub struct EvictNewest;

impl EvictionPolicy for EvictNewest {
    fn evict(&self, eviction: Eviction<'_>) -> Evicted {
        eviction.remove_newest()
    }
}

/// Evicts the least recently added sample.
///
/// The reservoir becomes a sliding window over the most recent observations.
#[derive(Clone, Copy, Debug, Default)]
pub struct EvictOldest;

impl EvictionPolicy for EvictOldest {
    fn evict(&self, eviction: Eviction<'_>) -> Evicted {
        eviction.remove_oldest()
    }
}

/// Evicts a sample chosen uniformly at random.
#[derive(Clone, Copy, Debug, Default)]
pub struct EvictRandom;

impl EvictionPolicy for EvictRandom {
    fn evict(&self, eviction: Eviction<'_>) -> Evicted {
        let position = rand::rng().random_range(0..eviction.len());
        eviction.remove_at(position)
    }
}

/// Evicts the sample with the smallest value, preferring the oldest among equal values.
#[derive(Clone, Copy, Debug, Default)]
pub struct EvictSmallest;

impl EvictionPolicy for EvictSmallest {
    fn evict(&self, eviction: Eviction<'_>) -> Evicted {
        let position = extreme_position(&eviction, |candidate, current| candidate < current);
        eviction.remove_at(position)
    }
}

/// Evicts the sample with the largest value, preferring the oldest among equal values.
#[derive(Clone, Copy, Debug, Default)]
pub struct EvictLargest;

impl EvictionPolicy for EvictLargest {
    fn evict(&self, eviction: Eviction<'_>) -> Evicted {
        let position = extreme_position(&eviction, |candidate, current| candidate > current);
        eviction.remove_at(position)
    }
}

fn extreme_position<F>(eviction: &Eviction<'_>, replaces: F) -> usize
where
    F: Fn(f64, f64) -> bool,
{
    let mut position = 0;
    let mut current = f64::NAN;
    for (i, sample) in eviction.samples().enumerate() {
        if current.is_nan() || replaces(sample.value(), current) {
            position = i;
            current = sample.value();
        }
    }

    position
}

/// Folds the two oldest samples into one using a reducer.
///
/// This keeps a trace of old observations in the reservoir instead of dropping them outright.
#[derive(Clone, Copy)]
pub struct CoalesceOldest(pub Reducer);

impl EvictionPolicy for CoalesceOldest {
    fn evict(&self, eviction: Eviction<'_>) -> Evicted {
        eviction.coalesce_oldest(self.0)
    }
}
