//! Lookup index over the store's current entities.
//!
//! The index is built once per run and answers three questions in O(1):
//! which entity has this id, which entity is called this (name, plural name,
//! or for units an abbreviation), and which entity lists this alias.
//!
//! # Collision policy
//!
//! The store should never let two entities claim the same key. When it does
//! anyway the first writer keeps the key and the loser is recorded as an
//! [`IndexCollision`] so the caller can surface it. Names are registered in
//! passes (all primary names, then all plural names, then abbreviations) so a
//! primary name always beats someone else's plural name.

use crate::{normalize::key, Entity, EntityFields, EntityId, EntityKind, ImportRecord};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Prefix of ids fabricated for dry-run creations.
pub const SIMULATED_ID_PREFIX: &str = "simulated-";

/// Which key map a collision happened in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum KeySpace {
    Name,
    Alias,
}

/// A key claimed by two entities; the first one kept it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexCollision {
    pub key: String,
    pub space: KeySpace,
    pub kept: EntityId,
    pub ignored: EntityId,
}

/// Id, name and alias maps for one entity kind.
#[derive(Debug, Clone)]
pub struct LookupIndex {
    kind: EntityKind,
    by_id: HashMap<EntityId, Entity>,
    by_name: HashMap<String, EntityId>,
    by_alias: HashMap<String, EntityId>,
    collisions: Vec<IndexCollision>,
    simulated_seq: u64,
}

impl LookupIndex {
    /// Create an empty index.
    pub fn new(kind: EntityKind) -> Self {
        Self {
            kind,
            by_id: HashMap::new(),
            by_name: HashMap::new(),
            by_alias: HashMap::new(),
            collisions: Vec::new(),
            simulated_seq: 0,
        }
    }

    /// Build the index from every entity of one kind.
    pub fn build(kind: EntityKind, entities: impl IntoIterator<Item = Entity>) -> Self {
        let mut index = Self::new(kind);
        let entities: Vec<Entity> = entities.into_iter().collect();

        for entity in &entities {
            index.claim_name(Some(&entity.fields.name), &entity.id);
        }
        for entity in &entities {
            index.claim_name(entity.fields.plural_name.as_deref(), &entity.id);
        }
        if kind.has_abbreviations() {
            for entity in &entities {
                index.claim_name(entity.fields.abbreviation.as_deref(), &entity.id);
            }
            for entity in &entities {
                index.claim_name(entity.fields.plural_abbreviation.as_deref(), &entity.id);
            }
        }
        for entity in &entities {
            for alias in &entity.fields.aliases {
                index.claim_alias(alias, &entity.id);
            }
        }

        for entity in entities {
            index.by_id.entry(entity.id.clone()).or_insert(entity);
        }
        index
    }

    /// Register an entity created during this run.
    pub fn insert(&mut self, entity: Entity) {
        let fields = &entity.fields;
        self.claim_name(Some(&fields.name), &entity.id);
        self.claim_name(fields.plural_name.as_deref(), &entity.id);
        if self.kind.has_abbreviations() {
            self.claim_name(fields.abbreviation.as_deref(), &entity.id);
            self.claim_name(fields.plural_abbreviation.as_deref(), &entity.id);
        }
        for alias in &fields.aliases {
            self.claim_alias(alias, &entity.id);
        }
        self.by_id.insert(entity.id.clone(), entity);
    }

    /// Fabricate an id for a record that would be created, and index it.
    ///
    /// Later records in the same run then match (and conflict with) the
    /// pending creation without a round trip to the store.
    pub fn register_simulated(&mut self, record: &ImportRecord) -> EntityId {
        self.simulated_seq += 1;
        let id = format!("{}{}", SIMULATED_ID_PREFIX, self.simulated_seq);

        let mut fields: EntityFields = record.fields.clone();
        fields.restrict_to(self.kind);
        let mut entity = Entity::new(id.clone(), fields);
        entity.simulated = true;

        self.insert(entity);
        id
    }

    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    /// Look up an entity by exact id.
    pub fn get(&self, id: &str) -> Option<&Entity> {
        self.by_id.get(id)
    }

    /// Look up by name, plural name or (units) abbreviation.
    pub fn by_name(&self, value: &str) -> Option<&Entity> {
        let key = key(value)?;
        self.by_name.get(&key).and_then(|id| self.by_id.get(id))
    }

    /// Look up by alias.
    pub fn by_alias(&self, value: &str) -> Option<&Entity> {
        let key = key(value)?;
        self.by_alias.get(&key).and_then(|id| self.by_id.get(id))
    }

    /// Entities that exist in the store.
    pub fn stored_entities(&self) -> impl Iterator<Item = &Entity> {
        self.by_id.values().filter(|e| !e.simulated)
    }

    /// Keys that two entities tried to claim.
    pub fn collisions(&self) -> &[IndexCollision] {
        &self.collisions
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    fn claim_name(&mut self, value: Option<&str>, id: &EntityId) {
        if let Some(key) = value.and_then(key) {
            claim(
                &mut self.by_name,
                &mut self.collisions,
                KeySpace::Name,
                key,
                id,
            );
        }
    }

    fn claim_alias(&mut self, value: &str, id: &EntityId) {
        if let Some(key) = key(value) {
            claim(
                &mut self.by_alias,
                &mut self.collisions,
                KeySpace::Alias,
                key,
                id,
            );
        }
    }
}

fn claim(
    map: &mut HashMap<String, EntityId>,
    collisions: &mut Vec<IndexCollision>,
    space: KeySpace,
    key: String,
    id: &EntityId,
) {
    match map.get(&key) {
        None => {
            map.insert(key, id.clone());
        }
        Some(kept) if kept == id => {}
        Some(kept) => collisions.push(IndexCollision {
            key,
            space,
            kept: kept.clone(),
            ignored: id.clone(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entity(id: &str, name: &str, plural: Option<&str>, aliases: &[&str]) -> Entity {
        let mut fields = EntityFields::named(name);
        fields.plural_name = plural.map(str::to_string);
        fields.aliases = aliases.iter().map(|a| a.to_string()).collect();
        Entity::new(id, fields)
    }

    #[test]
    fn lookups_are_case_and_whitespace_insensitive() {
        let index = LookupIndex::build(
            EntityKind::Food,
            vec![entity("f-1", "Potato", Some("potatoes"), &["spud"])],
        );

        assert_eq!(index.by_name(" potato").unwrap().id, "f-1");
        assert_eq!(index.by_name("POTATOES").unwrap().id, "f-1");
        assert_eq!(index.by_alias("Spud ").unwrap().id, "f-1");
        assert!(index.by_name("spud").is_none());
        assert!(index.by_name("").is_none());
        assert_eq!(index.get("f-1").unwrap().name(), "Potato");
    }

    #[test]
    fn primary_name_beats_other_plural_name() {
        // f-1's plural collides with f-2's primary name
        let index = LookupIndex::build(
            EntityKind::Food,
            vec![
                entity("f-1", "green", Some("greens"), &[]),
                entity("f-2", "greens", None, &[]),
            ],
        );

        assert_eq!(index.by_name("greens").unwrap().id, "f-2");
        assert_eq!(
            index.collisions(),
            &[IndexCollision {
                key: "greens".into(),
                space: KeySpace::Name,
                kept: "f-2".into(),
                ignored: "f-1".into(),
            }]
        );
    }

    #[test]
    fn alias_first_writer_wins() {
        let index = LookupIndex::build(
            EntityKind::Food,
            vec![
                entity("f-1", "scallion", None, &["green onion"]),
                entity("f-2", "spring onion", None, &["Green Onion"]),
            ],
        );

        assert_eq!(index.by_alias("green onion").unwrap().id, "f-1");
        assert_eq!(index.collisions().len(), 1);
        assert_eq!(index.collisions()[0].space, KeySpace::Alias);
    }

    #[test]
    fn same_entity_repeating_a_key_is_not_a_collision() {
        let index = LookupIndex::build(
            EntityKind::Food,
            vec![entity("f-1", "fish", Some("fish"), &["fish"])],
        );
        assert!(index.collisions().is_empty());
    }

    #[test]
    fn unit_abbreviations_are_names() {
        let mut fields = EntityFields::named("tablespoon");
        fields.abbreviation = Some("tbsp".into());
        fields.plural_abbreviation = Some("tbsps".into());
        let unit = Entity::new("u-1", fields.clone());

        let index = LookupIndex::build(EntityKind::Unit, vec![unit]);
        assert_eq!(index.by_name("TBSP").unwrap().id, "u-1");
        assert_eq!(index.by_name("tbsps").unwrap().id, "u-1");

        let food_index = LookupIndex::build(EntityKind::Food, vec![Entity::new("f-1", fields)]);
        assert!(food_index.by_name("tbsp").is_none());
    }

    #[test]
    fn simulated_entities_join_every_map() {
        let mut index = LookupIndex::new(EntityKind::Food);
        let record = ImportRecord::named("kumquat")
            .with_plural("kumquats")
            .with_aliases(["cumquat"]);

        let id = index.register_simulated(&record);
        let second = index.register_simulated(&ImportRecord::named("yuzu"));

        assert_eq!(id, "simulated-1");
        assert_eq!(second, "simulated-2");
        assert_eq!(index.by_name("kumquats").unwrap().id, id);
        assert_eq!(index.by_alias("cumquat").unwrap().id, id);
        assert!(index.get(&id).unwrap().simulated);
        assert_eq!(index.stored_entities().count(), 0);
        assert_eq!(index.len(), 2);
    }

    #[test]
    fn insert_registers_created_entity() {
        let mut index = LookupIndex::new(EntityKind::Food);
        index.insert(entity("f-7", "leek", Some("leeks"), &[]));

        assert_eq!(index.by_name("leeks").unwrap().id, "f-7");
        assert!(!index.get("f-7").unwrap().simulated);
    }
}
