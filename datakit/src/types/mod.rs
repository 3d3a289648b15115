//! Value, row and table types flowing through sources, caches and the assembler.

mod cell;
mod key;
mod row;
mod schema;
mod table;

pub use cell::*;
pub use key::*;
pub use row::*;
pub use schema::*;
pub use table::*;
