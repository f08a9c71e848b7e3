//! High-level application primitives.
//!
//! This crate provides the pieces a binary needs to set up before doing any real work, such as initializing logging.
#![deny(missing_docs)]

#[cfg(feature = "logging")]
pub mod logging;

/// Common imports.
pub mod prelude {
    #[cfg(feature = "logging")]
    pub use super::logging::{fatal_and_exit, initialize_logging};
}
