//! Request handlers for import runs.

mod import;

pub use import::*;
