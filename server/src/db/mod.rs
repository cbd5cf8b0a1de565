//! Database module for PostgreSQL persistence.

mod entities;
mod pool;
mod references;

pub use entities::*;
pub use pool::*;
pub use references::*;
