//! In-memory keyed lookup tables built from a [`crate::source::RowSource`].

mod keyed;
pub mod normalize;
pub mod policy;

pub use keyed::{CacheStats, KeyedCache};
pub use normalize::KeyNormalization;
pub use policy::{CollisionPolicy, DuplicatePolicy};
