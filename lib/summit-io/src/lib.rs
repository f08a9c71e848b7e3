//! Wire-format decoders and network plumbing for scraping exposed metrics.

pub mod deser;
pub mod net;
