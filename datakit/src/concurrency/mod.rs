//! Concurrent cache construction.

mod build;

pub use build::build_caches;
