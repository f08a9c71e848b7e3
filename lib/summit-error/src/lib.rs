//! Error primitives shared by the Summit binaries and bootstrap code.
//!
//! Library crates define their own typed errors with `snafu`. Once an error crosses into application code, where the
//! only remaining options are "log it" or "exit", it is converted into a [`GenericError`].

use std::fmt::Display;

/// An opaque, type-erased error.
///
/// Any error implementing `std::error::Error + Send + Sync + 'static` converts into `GenericError` with `?`.
pub type GenericError = anyhow::Error;

/// Constructs a [`GenericError`].
///
/// Accepts a string literal, a format string with arguments (as with `std::format!`), or any value implementing
/// `Debug` and `Display`. When given an existing `std::error::Error`, that error becomes the source of the new one.
#[macro_export]
macro_rules! generic_error {
    ($msg:literal $(,)?) => { $crate::_anyhow!($msg) };
    ($err:expr $(,)?) => { $crate::_anyhow!($err) };
    ($fmt:expr, $($arg:tt)*) => { $crate::_anyhow!($fmt, $($arg)*) };
}

#[doc(hidden)]
pub use anyhow::anyhow as _anyhow;

mod private {
    pub trait Sealed {}

    impl<T, E> Sealed for Result<T, E> {}
}

/// Extension methods for attaching human-readable context to a failed `Result`.
///
/// This wraps `anyhow::Context` under a name that does not collide with `snafu::ResultExt::context`, so both traits
/// can be imported in the same module.
pub trait ErrorContext<T, E>: private::Sealed {
    /// Wraps the error value with the given context.
    fn error_context<C>(self, context: C) -> Result<T, GenericError>
    where
        C: Display + Send + Sync + 'static;

    /// Wraps the error value with context produced lazily, only when an error actually occurred.
    fn with_error_context<C, F>(self, f: F) -> Result<T, GenericError>
    where
        C: Display + Send + Sync + 'static,
        F: FnOnce() -> C;
}

impl<T, E> ErrorContext<T, E> for Result<T, E>
where
    Result<T, E>: anyhow::Context<T, E>,
{
    fn error_context<C>(self, context: C) -> Result<T, GenericError>
    where
        C: Display + Send + Sync + 'static,
    {
        <Self as anyhow::Context<T, E>>::context(self, context)
    }

    fn with_error_context<C, F>(self, f: F) -> Result<T, GenericError>
    where
        C: Display + Send + Sync + 'static,
        F: FnOnce() -> C,
    {
        <Self as anyhow::Context<T, E>>::with_context(self, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_is_prepended_to_source() {
        let result: Result<u32, std::num::ParseIntError> = "not-a-number".parse::<u32>();
        let error = result.error_context("failed to parse sample count").unwrap_err();

        assert_eq!(error.to_string(), "failed to parse sample count");
        assert_eq!(error.chain().count(), 2);
    }

    #[test]
    fn lazy_context_only_evaluated_on_error() {
        let result: Result<u32, std::num::ParseIntError> = "42".parse::<u32>();
        let value = result
            .with_error_context(|| -> &'static str { panic!("context should not be evaluated") })
            .unwrap();

        assert_eq!(value, 42);
    }

    #[test]
    fn macro_forms() {
        let literal = generic_error!("bucket capacity exhausted");
        assert_eq!(literal.to_string(), "bucket capacity exhausted");

        let formatted = generic_error!("unknown estimator '{}'", "median");
        assert_eq!(formatted.to_string(), "unknown estimator 'median'");
    }
}
