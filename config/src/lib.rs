//! Configuration types and loading for the feature assembler.
//!
//! Holds the serde models for Postgres connections, row sources, keyed caches and the assembly
//! run, plus the hierarchical loader used by binaries.

mod environment;
mod load;
pub mod shared;

pub use environment::Environment;
pub use load::{Config, LoadConfigError, load_config, load_config_from};
