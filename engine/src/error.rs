//! Error types for the Larder engine.
//!
//! Every variant is a pre-flight failure: it is raised before any store
//! mutation and aborts the whole batch set.

use crate::{EntityKind, KeyConflict, SchemaVersion};
use thiserror::Error;

/// All possible errors from the Larder engine.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    // Document errors
    #[error("unknown entity kind: {0}")]
    UnknownKind(String),

    #[error("entity kind mismatch in {batch}: expected {expected}, got {actual}")]
    KindMismatch {
        batch: String,
        expected: EntityKind,
        actual: EntityKind,
    },

    #[error("unsupported schema version in {batch}: expected {expected}, got {actual}")]
    UnsupportedSchemaVersion {
        batch: String,
        expected: SchemaVersion,
        actual: SchemaVersion,
    },

    #[error("malformed document {batch}: {reason}")]
    MalformedDocument { batch: String, reason: String },

    // Record errors
    #[error("invalid record #{position} in {batch}: {reason}")]
    InvalidRecord {
        batch: String,
        position: usize,
        reason: String,
    },

    #[error("record #{position} in {batch} has no name")]
    MissingName { batch: String, position: usize },

    // Key space errors
    #[error("{} conflicting key(s) across import batches", .0.len())]
    Conflicts(Vec<KeyConflict>),
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, Error>;
