//! Ordered application of cache bindings to event rows.

mod binding;
mod core;
mod stream;

pub use binding::{Binding, KeySelector};
pub use self::core::EventAssembler;
pub use stream::AssembledStream;
