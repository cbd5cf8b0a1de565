//! Postgres-backed entity store.

use async_trait::async_trait;
use larder_engine::{normalize, Entity, EntityFields, EntityKind, EntityPatch, ImportRecord};

use super::{EntityStore, Page, StoreError, StoreResult};
use crate::db::{self, EntityRow, Pool};

/// Entity store over the `entities` and `entity_references` tables.
#[derive(Clone)]
pub struct PgStore {
    pool: Pool,
}

impl PgStore {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    async fn write(
        &self,
        kind: EntityKind,
        id: &str,
        fields: &EntityFields,
        insert: bool,
    ) -> StoreResult<Option<Entity>> {
        let payload = serde_json::to_value(fields)?;
        let name_key = normalize(&fields.name);
        let row = EntityRow {
            id,
            kind: kind.as_str(),
            name: fields.name.trim(),
            name_key: &name_key,
            fields: &payload,
        };

        let result = if insert {
            db::insert_entity(&self.pool, row).await.map(Some)
        } else {
            db::update_entity(&self.pool, row).await
        };

        match result {
            Ok(stored) => Ok(stored.map(|s| s.to_entity()).transpose()?),
            Err(e) if is_unique_violation(&e) => Err(StoreError::Duplicate {
                kind,
                name: fields.name.clone(),
            }),
            Err(e) => Err(store_error(e)),
        }
    }
}

#[async_trait]
impl EntityStore for PgStore {
    fn backend(&self) -> &'static str {
        "postgres"
    }

    async fn list(&self, kind: EntityKind, page: u32, per_page: u32) -> StoreResult<Page> {
        let offset = i64::from(page.saturating_sub(1)) * i64::from(per_page);
        let rows = db::list_entities(&self.pool, kind.as_str(), i64::from(per_page), offset)
            .await
            .map_err(store_error)?;
        let total = db::count_entities(&self.pool, kind.as_str())
            .await
            .map_err(store_error)?;

        let items = rows
            .iter()
            .map(|row| row.to_entity())
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Page {
            items,
            page,
            per_page,
            total: total.max(0) as u64,
        })
    }

    async fn create(&self, kind: EntityKind, record: &ImportRecord) -> StoreResult<Entity> {
        let mut fields = record.fields.clone();
        fields.restrict_to(kind);
        fields.name = fields.name.trim().to_string();

        let id = uuid::Uuid::new_v4().to_string();
        let created = self.write(kind, &id, &fields, true).await?;
        created.ok_or(StoreError::NotFound { kind, id })
    }

    async fn update(
        &self,
        kind: EntityKind,
        id: &str,
        patch: &EntityPatch,
    ) -> StoreResult<Entity> {
        let not_found = || StoreError::NotFound {
            kind,
            id: id.to_string(),
        };

        let stored = db::get_entity(&self.pool, kind.as_str(), id)
            .await
            .map_err(store_error)?
            .ok_or_else(not_found)?;
        let mut entity = stored.to_entity()?;
        patch.apply_to(&mut entity.fields);

        self.write(kind, id, &entity.fields, false)
            .await?
            .ok_or_else(not_found)
    }

    async fn delete(&self, kind: EntityKind, id: &str) -> StoreResult<()> {
        match db::delete_entity(&self.pool, kind.as_str(), id).await {
            Ok(0) => Err(StoreError::NotFound {
                kind,
                id: id.to_string(),
            }),
            Ok(_) => Ok(()),
            Err(e) if is_foreign_key_violation(&e) => Err(StoreError::InUse {
                kind,
                id: id.to_string(),
            }),
            Err(e) => Err(store_error(e)),
        }
    }

    async fn usage_count(&self, _kind: EntityKind, id: &str) -> StoreResult<u64> {
        let count = db::count_references(&self.pool, id)
            .await
            .map_err(store_error)?;
        Ok(count.max(0) as u64)
    }
}

/// Connection-level failures mean the store is unreachable, not that the
/// statement was wrong.
fn store_error(e: sqlx::Error) -> StoreError {
    match e {
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
            StoreError::Unavailable(e.to_string())
        }
        e => StoreError::Database(e),
    }
}

/// Check if a SQL error is a unique constraint violation.
fn is_unique_violation(e: &sqlx::Error) -> bool {
    has_code(e, "23505")
}

fn is_foreign_key_violation(e: &sqlx::Error) -> bool {
    has_code(e, "23503")
}

fn has_code(e: &sqlx::Error, code: &str) -> bool {
    if let sqlx::Error::Database(db_err) = e {
        db_err.code().map(|c| c == code).unwrap_or(false)
    } else {
        false
    }
}
