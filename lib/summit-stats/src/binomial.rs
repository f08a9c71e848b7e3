//! Binomial distribution helpers and confidence intervals for sample quantiles.
//!
//! The probability mass function is computed exactly while the factorials involved fit in a `u128`, and in log space
//! beyond that, so that large observation counts neither overflow nor lose all precision. The log-space path costs the
//! same no matter how large the counts get.

use std::f64::consts::PI;

/// Largest argument whose factorial fits in a `u128`.
const MAX_EXACT_FACTORIAL: u64 = 34;

/// A range of sample ranks that brackets a population quantile with a given probability.
///
/// Ranks are indices into the sorted samples, in the same `[0, observations]` domain accepted by bucket index lookups.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RankInterval {
    /// Lowest rank in the interval, inclusive.
    pub lower: u64,

    /// Highest rank in the interval, inclusive.
    pub upper: u64,

    /// Binomial probability mass covered by the interval.
    pub coverage: f64,
}

/// Computes `of!`.
///
/// The factorial of any non-positive argument is defined as 1. Returns `None` if the result does not fit in a `u128`,
/// which happens for arguments above 34.
pub fn factorial(of: i64) -> Option<u128> {
    if of <= 0 {
        return Some(1);
    }

    (1..=of as u128).try_fold(1u128, |acc, i| acc.checked_mul(i))
}

fn exact_binomial_coefficient(n: u64, k: u64) -> Option<f64> {
    let n_fact = i64::try_from(n).ok().and_then(factorial)?;
    let k_fact = factorial(k as i64)?;
    let rest_fact = factorial((n - k) as i64)?;

    // `k! * (n - k)!` divides `n!`, so the product cannot overflow once `n!` itself fits.
    Some((n_fact / (k_fact * rest_fact)) as f64)
}

/// Computes `ln(m!)`.
///
/// Small arguments use the exact factorial. Larger ones use Stirling's series for `ln Γ(m + 1)`, whose truncation
/// error past this point is far below `f64` precision.
fn ln_factorial(m: u64) -> f64 {
    if m <= MAX_EXACT_FACTORIAL {
        return factorial(m as i64).map_or(f64::NAN, |exact| (exact as f64).ln());
    }

    let x = (m + 1) as f64;
    let x2 = x * x;
    let x3 = x2 * x;
    (x - 0.5) * x.ln() - x + 0.5 * (2.0 * PI).ln() + 1.0 / (12.0 * x) - 1.0 / (360.0 * x3) + 1.0 / (1260.0 * x3 * x2)
        - 1.0 / (1680.0 * x3 * x3 * x)
}

fn ln_binomial_coefficient(n: u64, k: u64) -> f64 {
    ln_factorial(n) - ln_factorial(k) - ln_factorial(n - k)
}

/// Computes the binomial coefficient `n choose k`.
///
/// # Panics
///
/// Panics if `k > n`.
pub fn binomial_coefficient(n: u64, k: u64) -> f64 {
    assert!(k <= n, "k must not exceed n (k={}, n={})", k, n);

    exact_binomial_coefficient(n, k).unwrap_or_else(|| ln_binomial_coefficient(n, k).exp())
}

/// Computes the probability of exactly `k` successes in `n` independent trials with success probability `p`.
///
/// `binomial_pdf(0, 0, p)` is 1 for every `p`.
///
/// # Panics
///
/// Panics if `k > n`, or if `p` is not within `[0, 1]`.
pub fn binomial_pdf(k: u64, n: u64, p: f64) -> f64 {
    assert!(k <= n, "k must not exceed n (k={}, n={})", k, n);
    assert!((0.0..=1.0).contains(&p), "p must be within [0, 1], got {}", p);

    let failures = n - k;
    if let Some(coefficient) = exact_binomial_coefficient(n, k) {
        // `powf` treats `0^0` as 1, which covers the degenerate `p == 0` and `p == 1` cases.
        return coefficient * p.powf(k as f64) * (1.0 - p).powf(failures as f64);
    }

    if p == 0.0 {
        return if k == 0 { 1.0 } else { 0.0 };
    }
    if p == 1.0 {
        return if failures == 0 { 1.0 } else { 0.0 };
    }

    let ln_pdf = ln_binomial_coefficient(n, k) + k as f64 * p.ln() + failures as f64 * (1.0 - p).ln();
    ln_pdf.exp()
}

/// Computes the probability of at most `k` successes in `n` independent trials with success probability `p`.
///
/// # Panics
///
/// Panics if `k > n`, or if `p` is not within `[0, 1]`.
pub fn binomial_cdf(k: u64, n: u64, p: f64) -> f64 {
    assert!(k <= n, "k must not exceed n (k={}, n={})", k, n);

    (0..=k).map(|i| binomial_pdf(i, n, p)).sum::<f64>().min(1.0)
}

/// Finds the narrowest rank interval around the expected rank of `quantile` that covers at least `confidence` of the
/// binomial probability mass.
///
/// The number of samples falling below the true `quantile` of a population follows `Binomial(n, quantile)`. Starting
/// from the mode of that distribution, the interval grows one rank at a time toward whichever neighbour carries more
/// mass until the accumulated mass reaches `confidence`, or until it spans every rank.
///
/// Returns `None` when there are no samples.
///
/// # Panics
///
/// Panics if `quantile` is not within `[0, 1]`, or if `confidence` is not within `(0, 1]`.
pub fn quantile_rank_interval(n: u64, quantile: f64, confidence: f64) -> Option<RankInterval> {
    assert!(
        (0.0..=1.0).contains(&quantile),
        "quantile must be within [0, 1], got {}",
        quantile
    );
    assert!(
        confidence > 0.0 && confidence <= 1.0,
        "confidence must be within (0, 1], got {}",
        confidence
    );

    if n == 0 {
        return None;
    }

    let mode = (((n + 1) as f64 * quantile).floor() as u64).min(n);
    let mode_mass = binomial_pdf(mode, n, quantile);

    let mut interval = RankInterval {
        lower: mode,
        upper: mode,
        coverage: mode_mass,
    };

    // At the extremes all of the mass sits on the mode, and the ratio recurrence below would divide by zero.
    if quantile == 0.0 || quantile == 1.0 {
        return Some(interval);
    }

    let odds = quantile / (1.0 - quantile);
    let mut lower_mass = mode_mass;
    let mut upper_mass = mode_mass;

    while interval.coverage < confidence && (interval.lower > 0 || interval.upper < n) {
        // pmf(k - 1) = pmf(k) * k / (n - k + 1) / odds
        let below = (interval.lower > 0)
            .then(|| lower_mass * interval.lower as f64 / (n - interval.lower + 1) as f64 / odds);
        // pmf(k + 1) = pmf(k) * (n - k) / (k + 1) * odds
        let above = (interval.upper < n)
            .then(|| upper_mass * (n - interval.upper) as f64 / (interval.upper + 1) as f64 * odds);

        let added = match (below, above) {
            (Some(below), Some(above)) if above > below => {
                interval.upper += 1;
                upper_mass = above;
                above
            }
            (Some(below), _) => {
                interval.lower -= 1;
                lower_mass = below;
                below
            }
            (None, Some(above)) => {
                interval.upper += 1;
                upper_mass = above;
                above
            }
            (None, None) => break,
        };

        interval.coverage = (interval.coverage + added).min(1.0);
    }

    Some(interval)
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use float_cmp::ApproxEqRatio as _;
    use proptest::prelude::*;

    use super::*;

    const RATIO_ERROR: f64 = 0.000000001;

    fn float_eq(a: f64, b: f64) -> bool {
        a.approx_eq_ratio(&b, RATIO_ERROR)
    }

    #[test]
    fn factorial_values() {
        assert_eq!(factorial(-5), Some(1));
        assert_eq!(factorial(0), Some(1));
        assert_eq!(factorial(1), Some(1));
        assert_eq!(factorial(5), Some(120));
        assert_eq!(factorial(20), Some(2_432_902_008_176_640_000));
        assert!(factorial(34).is_some());
        assert_eq!(factorial(35), None);
    }

    #[test]
    fn binomial_coefficient_values() {
        assert_eq!(binomial_coefficient(0, 0), 1.0);
        assert_eq!(binomial_coefficient(10, 0), 1.0);
        assert_eq!(binomial_coefficient(10, 3), 120.0);
        assert_eq!(binomial_coefficient(34, 17), 2_333_606_220.0);

        // Past the exact range, the log-space path takes over and stays close to the true value.
        assert!(float_eq(binomial_coefficient(40, 20), 137_846_528_820.0));
    }

    #[test]
    fn binomial_pdf_degenerate_trials() {
        for p in [0.0, 0.25, 0.5, 1.0] {
            assert_eq!(binomial_pdf(0, 0, p), 1.0);
        }
    }

    #[test]
    fn binomial_pdf_values() {
        assert_eq!(binomial_pdf(5, 10, 0.5), 252.0 / 1024.0);
        assert_eq!(binomial_pdf(0, 10, 0.0), 1.0);
        assert_eq!(binomial_pdf(3, 10, 0.0), 0.0);
        assert_eq!(binomial_pdf(10, 10, 1.0), 1.0);
        assert_eq!(binomial_pdf(9, 10, 1.0), 0.0);

        assert!(float_eq(binomial_pdf(20, 40, 0.5), 137_846_528_820.0 / 2f64.powi(40)));
        assert_eq!(binomial_pdf(0, 1000, 0.0), 1.0);
        assert_eq!(binomial_pdf(1000, 1000, 1.0), 1.0);
        assert_eq!(binomial_pdf(999, 1000, 1.0), 0.0);
    }

    #[test]
    #[should_panic(expected = "k must not exceed n")]
    fn binomial_pdf_rejects_k_above_n() {
        binomial_pdf(3, 2, 0.5);
    }

    #[test]
    #[should_panic(expected = "p must be within [0, 1]")]
    fn binomial_pdf_rejects_invalid_probability() {
        binomial_pdf(1, 2, 1.5);
    }

    #[test]
    fn binomial_cdf_values() {
        assert_eq!(binomial_cdf(10, 10, 0.3), 1.0);
        assert!(float_eq(binomial_cdf(5, 10, 0.5), 638.0 / 1024.0));
    }

    #[test]
    fn rank_interval_without_samples() {
        assert_eq!(quantile_rank_interval(0, 0.5, 0.95), None);
    }

    #[test]
    fn rank_interval_extreme_quantiles() {
        let interval = quantile_rank_interval(50, 0.0, 0.95).unwrap();
        assert_eq!((interval.lower, interval.upper), (0, 0));
        assert_eq!(interval.coverage, 1.0);

        let interval = quantile_rank_interval(50, 1.0, 0.95).unwrap();
        assert_eq!((interval.lower, interval.upper), (50, 50));
        assert_eq!(interval.coverage, 1.0);
    }

    #[test]
    fn rank_interval_median_of_ten() {
        let interval = quantile_rank_interval(10, 0.5, 0.9).unwrap();

        // Ranks 2..=7 carry 957/1024 of the mass; the symmetric tie at each step is broken toward the lower rank.
        assert_eq!((interval.lower, interval.upper), (2, 7));
        assert!(float_eq(interval.coverage, 957.0 / 1024.0));
    }

    #[test]
    fn rank_interval_full_confidence_spans_everything() {
        let interval = quantile_rank_interval(8, 0.3, 1.0).unwrap();
        assert_eq!((interval.lower, interval.upper), (0, 8));
    }

    #[test]
    fn ln_factorial_continues_exact_values() {
        for m in [0, 1, 5, 20, 34] {
            let exact = factorial(m as i64).unwrap() as f64;
            assert!(float_eq(ln_factorial(m), exact.ln()));
        }

        // 35! = 35 * 34!, just past the exact range.
        let expected = 35f64.ln() + (factorial(34).unwrap() as f64).ln();
        assert!(float_eq(ln_factorial(35), expected));

        // ln(1000!) to eleven significant digits.
        assert!(ln_factorial(1000).approx_eq_ratio(&5_912.128_178_9, 0.000_000_001));
    }

    #[test]
    fn large_trial_counts() {
        // The mode mass of Binomial(n, 1/2) approaches sqrt(2 / (pi * n)).
        let n = 200_000_000;
        let mode_mass = binomial_pdf(n / 2, n, 0.5);
        assert!(mode_mass.approx_eq_ratio(&(2.0 / (PI * n as f64)).sqrt(), 0.000_01));

        let started = Instant::now();
        let interval = quantile_rank_interval(n, 0.5, 0.95).unwrap();
        let elapsed = started.elapsed();

        // The 95% interval spans about 1.96 standard deviations (sqrt(n) / 2) on each side of the mode.
        let half_width = 1.96 * (n as f64).sqrt() / 2.0;
        let width = (interval.upper - interval.lower) as f64;
        assert!((width - 2.0 * half_width).abs() < 10.0, "width={}", width);
        assert!(interval.coverage >= 0.95 && interval.coverage < 0.951);
        assert!(elapsed < Duration::from_millis(500), "took {:?}", elapsed);
    }

    proptest! {
        #[test]
        fn property_test_pdf_symmetry(n in 0u64..60, k_seed in 0u64..60, p in 0.05..0.95f64) {
            let k = k_seed % (n + 1);

            let forward = binomial_pdf(k, n, p);
            let mirrored = binomial_pdf(n - k, n, 1.0 - p);
            prop_assert!(float_eq(forward, mirrored), "forward={} mirrored={}", forward, mirrored);
        }

        #[test]
        fn property_test_pdf_sums_to_one(n in 0u64..80, p in 0.0..=1.0f64) {
            let total: f64 = (0..=n).map(|k| binomial_pdf(k, n, p)).sum();
            prop_assert!((total - 1.0).abs() < 1e-9, "total={}", total);
        }

        #[test]
        fn property_test_rank_interval_reaches_confidence(n in 1u64..200, quantile in 0.01..0.99f64, confidence in 0.5..0.99f64) {
            let interval = quantile_rank_interval(n, quantile, confidence).unwrap();

            prop_assert!(interval.lower <= interval.upper);
            prop_assert!(interval.upper <= n);

            let mass: f64 = (interval.lower..=interval.upper).map(|k| binomial_pdf(k, n, quantile)).sum();
            prop_assert!((mass - interval.coverage).abs() < 1e-9, "mass={} coverage={}", mass, interval.coverage);
            prop_assert!(interval.coverage >= confidence - 1e-9);
        }
    }
}
