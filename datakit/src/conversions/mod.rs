//! Decoding of source values into [`crate::types::Cell`]s.

pub mod numeric;
pub mod pg;
pub mod text;
