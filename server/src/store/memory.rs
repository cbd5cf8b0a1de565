//! In-process entity store.
//!
//! Used when no `DATABASE_URL` is configured and by the test suite. It
//! enforces the same unique-name rule as the Postgres schema.

use async_trait::async_trait;
use dashmap::DashMap;
use larder_engine::{normalize, Entity, EntityId, EntityKind, EntityPatch, ImportRecord};

use super::{EntityStore, Page, StoreError, StoreResult};

/// Entities grouped by kind, in creation order.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entities: DashMap<EntityKind, Vec<Entity>>,
    /// Reference counts by entity id
    references: DashMap<EntityId, u64>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an entity as-is, bypassing validation.
    #[cfg(test)]
    pub fn seed(&self, kind: EntityKind, entity: Entity) {
        self.entities.entry(kind).or_default().push(entity);
    }

    /// Record `count` references to an entity.
    #[cfg(test)]
    pub fn add_references(&self, id: &str, count: u64) {
        *self.references.entry(id.to_string()).or_default() += count;
    }

    /// Current entities of `kind`.
    pub fn snapshot(&self, kind: EntityKind) -> Vec<Entity> {
        self.entities
            .get(&kind)
            .map(|entities| entities.value().clone())
            .unwrap_or_default()
    }

    fn name_taken(entities: &[Entity], name: &str, except: Option<&str>) -> bool {
        let wanted = normalize(name);
        entities
            .iter()
            .filter(|e| Some(e.id.as_str()) != except)
            .any(|e| normalize(&e.fields.name) == wanted)
    }
}

#[async_trait]
impl EntityStore for MemoryStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn list(&self, kind: EntityKind, page: u32, per_page: u32) -> StoreResult<Page> {
        let entities = self.snapshot(kind);
        let start = (page.saturating_sub(1) as usize).saturating_mul(per_page as usize);

        Ok(Page {
            items: entities
                .iter()
                .skip(start)
                .take(per_page as usize)
                .cloned()
                .collect(),
            page,
            per_page,
            total: entities.len() as u64,
        })
    }

    async fn create(&self, kind: EntityKind, record: &ImportRecord) -> StoreResult<Entity> {
        let mut fields = record.fields.clone();
        fields.restrict_to(kind);
        fields.name = fields.name.trim().to_string();

        let mut entities = self.entities.entry(kind).or_default();
        if Self::name_taken(&entities, &fields.name, None) {
            return Err(StoreError::Duplicate {
                kind,
                name: fields.name,
            });
        }

        let entity = Entity::new(uuid::Uuid::new_v4().to_string(), fields);
        entities.push(entity.clone());
        Ok(entity)
    }

    async fn update(
        &self,
        kind: EntityKind,
        id: &str,
        patch: &EntityPatch,
    ) -> StoreResult<Entity> {
        let mut entities = self.entities.entry(kind).or_default();

        if let Some(name) = &patch.name {
            if Self::name_taken(&entities, name, Some(id)) {
                return Err(StoreError::Duplicate {
                    kind,
                    name: name.clone(),
                });
            }
        }

        let entity = entities
            .iter_mut()
            .find(|e| e.id == id)
            .ok_or_else(|| StoreError::NotFound {
                kind,
                id: id.to_string(),
            })?;
        patch.apply_to(&mut entity.fields);
        Ok(entity.clone())
    }

    async fn delete(&self, kind: EntityKind, id: &str) -> StoreResult<()> {
        if self.references.get(id).is_some_and(|count| *count > 0) {
            return Err(StoreError::InUse {
                kind,
                id: id.to_string(),
            });
        }

        let mut entities = self.entities.entry(kind).or_default();
        let before = entities.len();
        entities.retain(|e| e.id != id);

        if entities.len() == before {
            return Err(StoreError::NotFound {
                kind,
                id: id.to_string(),
            });
        }
        Ok(())
    }

    async fn usage_count(&self, _kind: EntityKind, id: &str) -> StoreResult<u64> {
        Ok(self.references.get(id).map(|count| *count).unwrap_or(0))
    }
}
