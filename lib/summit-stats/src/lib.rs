//! Pure statistical helpers used by the summary engine.
//!
//! Everything in this crate is a pure function over its inputs: no locking, no shared state, and no error returns.
//! Functions over sample sets return NaN when given no samples; callers are expected to check for it.

pub mod binomial;
pub use self::binomial::{binomial_cdf, binomial_coefficient, binomial_pdf, factorial, quantile_rank_interval, RankInterval};

pub mod reducers;
pub use self::reducers::{average, first_mode, maximum, median, minimum, nearest_rank, Reducer};
