//! Streaming hash-join assembly of wide feature tables.
//!
//! Events flowing out of a [`source::RowSource`] are enriched, one binding at a time, with the
//! columns of in-memory [`cache::KeyedCache`]s. The [`assembler::EventAssembler`] applies the
//! bindings in order and either streams the enriched rows or collects them into a
//! [`types::ColumnTable`]. [`pipeline::AssemblyPipeline`] wires the whole thing from
//! configuration.

pub mod assembler;
pub mod cache;
pub mod concurrency;
pub mod conversions;
pub mod error;
mod macros;
pub mod pipeline;
pub mod source;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
pub mod types;
