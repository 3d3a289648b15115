//! Helpers for tests of caches, assemblers and pipelines.
//!
//! - [`source`] wraps sources to count passes or inject failures.
//! - [`row`] builds rows and tables from literals.
//! - [`database`] creates throwaway Postgres databases for source tests.

pub mod database;
pub mod row;
pub mod source;
