//! Tracing setup shared by the assembler binary and tests.

pub mod tracing;
