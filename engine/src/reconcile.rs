//! Reconciliation of import records against the store's current entities.
//!
//! The reconciler classifies each incoming record; it never talks to the
//! store itself. The caller applies the decisions and reports back what the
//! store actually created, so the index stays in step with reality.
//!
//! # Algorithm
//!
//! For every record, in input order:
//!
//! 1. Resolve it against the [`LookupIndex`] with the matcher
//! 2. If the matched entity was already claimed by an earlier record, the
//!    record is a **Conflict**
//! 3. Otherwise claim the entity in the [`MatchRegistry`]
//! 4. Unmatched records are **Create**d. Dry runs register a simulated
//!    entity at once; live runs register the created entity through
//!    [`Reconciler::confirm_created`]
//! 5. Matched records are **Skip**ped unless updates were requested, then
//!    **Unchanged** or **Update** depending on the change detector
//!
//! Orphans (mirror mode) are computed separately once every record has been
//! seen: stored entities that no record referred to by id, match, name or
//! plural name.

use crate::{
    change::{clean_aliases, merge_aliases, AliasMode, EntityPatch},
    matcher::{self, Match},
    normalize::key,
    Entity, EntityId, ImportRecord, LookupIndex,
};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Whether a run may delete entities missing from the input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SyncMode {
    /// Create and optionally update; never delete
    #[default]
    Import,
    /// Import, then delete orphans the usage guard clears
    Mirror,
}

/// Options for one reconciliation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileOptions {
    pub mode: SyncMode,
    /// Compute the plan without touching the store
    pub dry_run: bool,
    /// Update matched entities instead of skipping them
    pub update_existing: bool,
    pub alias_mode: AliasMode,
}

impl ReconcileOptions {
    /// Plain import: create new entities, skip existing ones.
    pub fn import() -> Self {
        Self::default()
    }

    /// Mirror: create, update and delete orphans.
    pub fn mirror() -> Self {
        Self {
            mode: SyncMode::Mirror,
            update_existing: true,
            ..Self::default()
        }
    }

    pub fn with_updates(mut self) -> Self {
        self.update_existing = true;
        self
    }

    pub fn with_dry_run(mut self) -> Self {
        self.dry_run = true;
        self
    }

    pub fn with_alias_mode(mut self, alias_mode: AliasMode) -> Self {
        self.alias_mode = alias_mode;
        self
    }
}

/// What should happen to one import record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum Action {
    /// No entity matched; `record` is what gets created
    Create { record: ImportRecord },
    /// Matched and changed
    #[serde(rename_all = "camelCase")]
    Update { entity_id: EntityId, patch: EntityPatch },
    #[serde(rename_all = "camelCase")]
    Unchanged { entity_id: EntityId },
    /// Matched, but updates were not requested
    #[serde(rename_all = "camelCase")]
    Skip { entity_id: EntityId },
    /// Matched an entity an earlier record already claimed
    #[serde(rename_all = "camelCase")]
    Conflict {
        entity_id: EntityId,
        claimed_by: usize,
    },
}

impl Action {
    pub fn name(&self) -> &'static str {
        match self {
            Action::Create { .. } => "create",
            Action::Update { .. } => "update",
            Action::Unchanged { .. } => "unchanged",
            Action::Skip { .. } => "skip",
            Action::Conflict { .. } => "conflict",
        }
    }

    /// Whether applying this action calls the store.
    pub fn is_mutation(&self) -> bool {
        matches!(self, Action::Create { .. } | Action::Update { .. })
    }
}

/// The classification of one record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Decision {
    /// 1-based position across every batch of the run
    pub position: usize,
    pub name: String,
    #[serde(rename = "match", skip_serializing_if = "Option::is_none")]
    pub matched: Option<Match>,
    #[serde(flatten)]
    pub action: Action,
}

/// Which record claimed which entity during this run.
#[derive(Debug, Clone, Default)]
pub struct MatchRegistry {
    claims: HashMap<EntityId, usize>,
}

impl MatchRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `id` for the record at `position`.
    ///
    /// Returns the earlier claimant's position if the entity is taken.
    pub fn claim(&mut self, id: &str, position: usize) -> Result<(), usize> {
        match self.claims.get(id) {
            Some(&earlier) if earlier != position => Err(earlier),
            Some(_) => Ok(()),
            None => {
                self.claims.insert(id.to_string(), position);
                Ok(())
            }
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.claims.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.claims.len()
    }

    pub fn is_empty(&self) -> bool {
        self.claims.is_empty()
    }
}

/// Run-scoped outcome counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunStats {
    pub created: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub skipped: usize,
    pub errors: usize,
    pub conflicts: usize,
    pub deleted: usize,
    /// Orphans the usage guard kept
    pub blocked: usize,
}

impl RunStats {
    /// Count a completed (or, in a dry run, planned) action.
    pub fn record(&mut self, action: &Action) {
        match action {
            Action::Create { .. } => self.created += 1,
            Action::Update { .. } => self.updated += 1,
            Action::Unchanged { .. } => self.unchanged += 1,
            Action::Skip { .. } => self.skipped += 1,
            Action::Conflict { .. } => self.conflicts += 1,
        }
    }

    pub fn record_error(&mut self) {
        self.errors += 1;
    }

    pub fn has_errors(&self) -> bool {
        self.errors > 0
    }

    /// Records that reached a terminal state.
    pub fn processed(&self) -> usize {
        self.created + self.updated + self.unchanged + self.skipped + self.conflicts + self.errors
    }
}

/// Dry-run result of a whole record set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Plan {
    pub decisions: Vec<Decision>,
    pub stats: RunStats,
    /// Deletion candidates; empty unless mirroring
    pub orphans: Vec<Entity>,
}

/// The reconciler classifies records against one kind's index.
pub struct Reconciler {
    index: LookupIndex,
    options: ReconcileOptions,
    registry: MatchRegistry,
    /// Ids named explicitly by incoming records
    incoming_ids: HashSet<EntityId>,
    /// Normalized names and plural names of incoming records
    incoming_names: HashSet<String>,
}

impl Reconciler {
    /// Create a reconciler over an index built from the store.
    pub fn new(index: LookupIndex, options: ReconcileOptions) -> Self {
        Self {
            index,
            options,
            registry: MatchRegistry::new(),
            incoming_ids: HashSet::new(),
            incoming_names: HashSet::new(),
        }
    }

    pub fn options(&self) -> &ReconcileOptions {
        &self.options
    }

    pub fn index(&self) -> &LookupIndex {
        &self.index
    }

    pub fn registry(&self) -> &MatchRegistry {
        &self.registry
    }

    /// Classify the record at `position` (1-based, unique within the run).
    pub fn classify(&mut self, position: usize, record: &ImportRecord) -> Decision {
        self.note_incoming(record);
        let name = record.fields.name.trim().to_string();

        let Some(matched) = matcher::resolve(record, &self.index) else {
            let mut record = record.clone();
            record.id = None;
            record.fields.aliases = clean_aliases(&record.fields);

            if self.options.dry_run {
                let id = self.index.register_simulated(&record);
                // a fresh id cannot be taken
                let _ = self.registry.claim(&id, position);
            }
            return Decision {
                position,
                name,
                matched: None,
                action: Action::Create { record },
            };
        };

        let entity_id = matched.entity_id.clone();
        if let Err(claimed_by) = self.registry.claim(&entity_id, position) {
            return Decision {
                position,
                name,
                matched: Some(matched),
                action: Action::Conflict {
                    entity_id,
                    claimed_by,
                },
            };
        }

        let action = match self.index.get(&entity_id) {
            Some(existing) if self.options.update_existing => {
                let merged = merge_aliases(existing, record, self.options.alias_mode);
                let patch = EntityPatch::between(&existing.fields, &record.fields, &merged);
                if patch.is_empty() {
                    Action::Unchanged { entity_id }
                } else {
                    Action::Update { entity_id, patch }
                }
            }
            _ => Action::Skip { entity_id },
        };

        Decision {
            position,
            name,
            matched: Some(matched),
            action,
        }
    }

    /// Register an entity the store created for the record at `position`.
    pub fn confirm_created(&mut self, position: usize, entity: Entity) {
        let _ = self.registry.claim(&entity.id, position);
        self.index.insert(entity);
    }

    /// Stored entities absent from every record seen so far, sorted by name.
    ///
    /// Always empty outside mirror mode.
    pub fn orphans(&self) -> Vec<Entity> {
        if self.options.mode != SyncMode::Mirror {
            return Vec::new();
        }

        let mut orphans: Vec<Entity> = self
            .index
            .stored_entities()
            .filter(|entity| !self.is_referenced(entity))
            .cloned()
            .collect();
        orphans.sort_by(|a, b| {
            key(a.name())
                .cmp(&key(b.name()))
                .then_with(|| a.id.cmp(&b.id))
        });
        orphans
    }

    /// Classify every record without touching a store.
    ///
    /// Creations are simulated even when the options are not a dry run, so
    /// the returned plan is exactly what a dry run would report.
    pub fn plan<'r>(mut self, records: impl IntoIterator<Item = &'r ImportRecord>) -> Plan {
        self.options.dry_run = true;
        let mut stats = RunStats::default();

        let decisions: Vec<Decision> = records
            .into_iter()
            .enumerate()
            .map(|(i, record)| {
                let decision = self.classify(i + 1, record);
                stats.record(&decision.action);
                decision
            })
            .collect();

        Plan {
            decisions,
            stats,
            orphans: self.orphans(),
        }
    }

    fn note_incoming(&mut self, record: &ImportRecord) {
        if let Some(id) = record.id.as_deref() {
            self.incoming_ids.insert(id.to_string());
        }
        let fields = &record.fields;
        for value in [Some(fields.name.as_str()), fields.plural_name.as_deref()] {
            if let Some(k) = value.and_then(key) {
                self.incoming_names.insert(k);
            }
        }
    }

    fn is_referenced(&self, entity: &Entity) -> bool {
        if self.incoming_ids.contains(&entity.id) || self.registry.contains(&entity.id) {
            return true;
        }
        // legacy records without ids are recognized by name
        [
            Some(entity.fields.name.as_str()),
            entity.fields.plural_name.as_deref(),
        ]
        .into_iter()
        .flatten()
        .filter_map(key)
        .any(|k| self.incoming_names.contains(&k))
    }
}
