//! Reducers over unordered sets of samples.

use indexmap::IndexMap;
use ordered_float::OrderedFloat;

/// A function that reduces a set of samples to a single value.
pub type Reducer = fn(&[f64]) -> f64;

/// Returns the arithmetic mean of the samples, or NaN if there are none.
pub fn average(samples: &[f64]) -> f64 {
    if samples.is_empty() {
        return f64::NAN;
    }

    samples.iter().sum::<f64>() / samples.len() as f64
}

/// Returns the most frequent sample, or NaN if there are none.
///
/// When several values share the highest frequency, the one that appears first in `samples` wins. The input order
/// matters here, not the numeric order.
pub fn first_mode(samples: &[f64]) -> f64 {
    // Insertion-ordered so that iterating the counts visits values in order of first appearance.
    let mut counts = IndexMap::<OrderedFloat<f64>, usize>::with_capacity(samples.len());
    for sample in samples {
        *counts.entry(OrderedFloat(*sample)).or_insert(0) += 1;
    }

    let mut mode: Option<(f64, usize)> = None;
    for (value, count) in counts {
        match mode {
            Some((_, best)) if count <= best => {}
            _ => mode = Some((value.into_inner(), count)),
        }
    }

    mode.map_or(f64::NAN, |(value, _)| value)
}

/// Returns the sample at the given percentile using the nearest-rank method, or NaN if there are none.
///
/// The samples are sorted in ascending order and the element at index `⌊n · percentile / 100⌋` is selected, clamped to
/// the last element. This makes `0` select the minimum, `100` select the maximum, and `50` select the upper median for
/// even-sized inputs.
///
/// # Panics
///
/// Panics if `percentile` is not within `[0, 100]`.
pub fn nearest_rank(samples: &[f64], percentile: f64) -> f64 {
    assert!(
        (0.0..=100.0).contains(&percentile),
        "percentile must be within [0, 100], got {}",
        percentile
    );

    if samples.is_empty() {
        return f64::NAN;
    }

    let mut sorted = samples.to_vec();
    sorted.sort_unstable_by(f64::total_cmp);

    let last = sorted.len() - 1;
    let rank = (sorted.len() as f64 * (percentile / 100.0)).floor() as usize;
    sorted[rank.min(last)]
}

/// Returns the median of the samples, or NaN if there are none.
///
/// This is the 50th percentile as computed by [`nearest_rank`].
pub fn median(samples: &[f64]) -> f64 {
    nearest_rank(samples, 50.0)
}

/// Returns the smallest sample, or NaN if there are none.
pub fn minimum(samples: &[f64]) -> f64 {
    if samples.is_empty() {
        return f64::NAN;
    }

    samples.iter().copied().fold(f64::INFINITY, f64::min)
}

/// Returns the largest sample, or NaN if there are none.
pub fn maximum(samples: &[f64]) -> f64 {
    if samples.is_empty() {
        return f64::NAN;
    }

    samples.iter().copied().fold(f64::NEG_INFINITY, f64::max)
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn ascending_run(len: usize) -> Vec<f64> {
        (1..=len).map(|i| i as f64).collect()
    }

    #[test]
    fn average_values() {
        assert!(average(&[]).is_nan());
        assert_eq!(average(&[5.0]), 5.0);
        assert_eq!(average(&[5.0, 15.0]), 10.0);
    }

    #[test]
    fn first_mode_values() {
        assert!(first_mode(&[]).is_nan());
        assert_eq!(first_mode(&[5.0]), 5.0);
        assert_eq!(first_mode(&[1.0, 2.0, 3.0, 4.0, 3.0]), 3.0);
    }

    #[test]
    fn first_mode_ties_go_to_first_occurrence() {
        // 9 and 1 both appear twice; 9 appears first even though it is numerically larger.
        assert_eq!(first_mode(&[9.0, 1.0, 1.0, 9.0]), 9.0);
        assert_eq!(first_mode(&[1.0, 9.0, 9.0, 1.0]), 1.0);

        // Without repeats, every value is a mode and the first one wins.
        assert_eq!(first_mode(&[4.0, 2.0, 8.0]), 4.0);
    }

    #[test]
    fn nearest_rank_empty() {
        assert!(nearest_rank(&[], 0.0).is_nan());
        assert!(nearest_rank(&[], 50.0).is_nan());
        assert!(nearest_rank(&[], 100.0).is_nan());
    }

    #[test]
    fn nearest_rank_singleton_and_pair() {
        for percentile in [0.0, 50.0, 100.0] {
            assert_eq!(nearest_rank(&[5.0], percentile), 5.0);
            assert_eq!(nearest_rank(&[5.0, 5.0], percentile), 5.0);
        }
    }

    #[test]
    fn nearest_rank_even_count() {
        let input = ascending_run(100);

        assert_eq!(nearest_rank(&input, 0.0), 1.0);
        assert_eq!(nearest_rank(&input, 50.0), 51.0);
        assert_eq!(nearest_rank(&input, 100.0), 100.0);
    }

    #[test]
    fn nearest_rank_odd_count() {
        let input = ascending_run(101);

        assert_eq!(nearest_rank(&input, 0.0), 1.0);
        assert_eq!(nearest_rank(&input, 50.0), 51.0);
        assert_eq!(nearest_rank(&input, 100.0), 101.0);
    }

    #[test]
    fn nearest_rank_ignores_input_order() {
        let input = [40.0, 10.0, 30.0, 20.0];
        assert_eq!(nearest_rank(&input, 0.0), 10.0);
        assert_eq!(nearest_rank(&input, 25.0), 20.0);
        assert_eq!(nearest_rank(&input, 100.0), 40.0);
    }

    #[test]
    #[should_panic(expected = "percentile must be within [0, 100]")]
    fn nearest_rank_rejects_out_of_range_percentile() {
        nearest_rank(&[1.0, 2.0], 101.0);
    }

    #[test]
    fn median_minimum_maximum() {
        assert_eq!(median(&[1.0, 2.0, 3.0]), 2.0);

        let input = [5.0, 1.0, 10.0, 1.1, 4.0];
        assert_eq!(minimum(&input), 1.0);
        assert_eq!(maximum(&input), 10.0);

        assert!(median(&[]).is_nan());
        assert!(minimum(&[]).is_nan());
        assert!(maximum(&[]).is_nan());
    }

    proptest! {
        #[test]
        fn property_test_nearest_rank_is_a_sample(samples in proptest::collection::vec(-1.0e6..1.0e6f64, 1..200), percentile in 0.0..=100.0f64) {
            let value = nearest_rank(&samples, percentile);

            prop_assert!(samples.contains(&value));
            prop_assert!(value >= minimum(&samples));
            prop_assert!(value <= maximum(&samples));
        }

        #[test]
        fn property_test_nearest_rank_monotonic(samples in proptest::collection::vec(-1.0e6..1.0e6f64, 1..200), a in 0.0..=100.0f64, b in 0.0..=100.0f64) {
            let (low, high) = if a <= b { (a, b) } else { (b, a) };

            prop_assert!(nearest_rank(&samples, low) <= nearest_rank(&samples, high));
        }
    }
}
