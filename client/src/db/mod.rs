//! Database module for SQLite persistence.

mod pool;
mod rule_sets;

pub use pool::*;
pub use rule_sets::*;
