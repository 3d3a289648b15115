//! Postgres helpers shared by row sources and tests.

pub mod query;
pub mod sqlx;
