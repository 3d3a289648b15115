//! Shared configuration types.

mod assembler;
mod assembly;
mod base;
mod cache;
mod connection;
mod source;

pub use assembler::{AssemblerConfig, OutputConfig};
pub use assembly::{AssemblyConfig, BindingConfig, CollisionPolicyConfig};
pub use base::ValidationError;
pub use cache::{CacheConfig, DuplicatePolicyConfig, KeyConfig, KeyNormalizationConfig};
pub use connection::{
    DefaultPgConnectionOptions, IntoConnectOptions, PgConnectionConfig, TlsConfig,
};
pub use source::{
    FileSourceConfig, PostgresSourceConfig, QueryConfig, SourceConfig, TableQueryConfig,
};
