//! # Larder Engine
//!
//! Entity resolution and reconciliation for a recipe catalog.
//!
//! The catalog holds foods, units and the organizers that group recipes
//! (categories, tags and tools). Users feed it curated JSON batches; this
//! crate decides, for every incoming record, which stored entity it refers
//! to and what has to change, without ever creating duplicates.
//!
//! ## Design Principles
//!
//! - **No IO**: the engine never talks to a store; callers apply decisions
//! - **Deterministic**: the same store contents and batches give the same plan
//! - **Fail before writing**: conflicting input aborts before any mutation
//!
//! ## Pipeline
//!
//! 1. [`Batch`] parses and validates a document of one [`EntityKind`]
//! 2. [`find_conflicts`] rejects batch sets where two records claim one key
//! 3. [`LookupIndex`] maps ids, names and aliases to stored entities
//! 4. [`resolve`] finds at most one entity per record, in a fixed priority
//! 5. [`Reconciler`] turns each match into a [`Decision`]: create, update,
//!    unchanged, skip or conflict
//! 6. In mirror mode, [`Reconciler::orphans`] lists stored entities the
//!    batches no longer mention
//!
//! Names are compared through [`normalize()`]: trimmed and lowercased, so
//! `" Tomato "` and `"tomato"` are the same key.
//!
//! ## Quick Start
//!
//! ```rust
//! use larder_engine::{
//!     Action, Entity, EntityFields, EntityKind, ImportRecord, LookupIndex,
//!     ReconcileOptions, Reconciler,
//! };
//!
//! let mut fields = EntityFields::named("potato");
//! fields.aliases = vec!["spud".to_string()];
//! let index = LookupIndex::build(EntityKind::Food, vec![Entity::new("f-1", fields)]);
//!
//! let records = vec![
//!     ImportRecord::named("Spud"),
//!     ImportRecord::named("kumquat"),
//! ];
//! let plan = Reconciler::new(index, ReconcileOptions::import()).plan(&records);
//!
//! assert!(matches!(plan.decisions[0].action, Action::Skip { .. }));
//! assert!(matches!(plan.decisions[1].action, Action::Create { .. }));
//! assert_eq!(plan.stats.created, 1);
//! ```

pub mod batch;
pub mod change;
pub mod conflict;
pub mod entity;
pub mod error;
pub mod index;
pub mod matcher;
pub mod normalize;
pub mod reconcile;

// Re-export main types at crate root
pub use batch::{Batch, SCHEMA_VERSION};
pub use change::{
    clean_aliases, has_changed, merge_aliases, same_aliases, AliasMode, EntityPatch,
};
pub use conflict::{ensure_no_conflicts, find_conflicts, ConflictScope, KeyConflict, Occurrence};
pub use entity::{Entity, EntityFields, EntityKind, ImportRecord, KeyField};
pub use error::{Error, Result};
pub use index::{IndexCollision, KeySpace, LookupIndex, SIMULATED_ID_PREFIX};
pub use matcher::{resolve, Match, MatchMethod};
pub use normalize::normalize;
pub use reconcile::{
    Action, Decision, MatchRegistry, Plan, ReconcileOptions, Reconciler, RunStats, SyncMode,
};

/// Type aliases for clarity
pub type EntityId = String;
pub type SchemaVersion = u32;
