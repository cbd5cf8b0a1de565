//! Entity store abstraction.
//!
//! The import pipeline only ever talks to the catalog through
//! [`EntityStore`]. Two implementations exist: [`PgStore`] for Postgres and
//! [`MemoryStore`] for development and tests.

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

use async_trait::async_trait;
use larder_engine::{Entity, EntityId, EntityKind, EntityPatch, ImportRecord};

/// Errors raised by a store call.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Malformed stored entity: {0}")]
    Payload(#[from] serde_json::Error),

    #[error("{kind} '{id}' not found")]
    NotFound { kind: EntityKind, id: EntityId },

    #[error("{kind} named '{name}' already exists")]
    Duplicate { kind: EntityKind, name: String },

    #[error("{kind} '{id}' is still referenced")]
    InUse { kind: EntityKind, id: EntityId },

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// One page of a listing.
#[derive(Debug, Clone)]
pub struct Page {
    pub items: Vec<Entity>,
    /// 1-based page number
    pub page: u32,
    pub per_page: u32,
    pub total: u64,
}

/// CRUD access to the catalog.
#[async_trait]
pub trait EntityStore: Send + Sync {
    /// List one page of entities of `kind`, in creation order.
    async fn list(&self, kind: EntityKind, page: u32, per_page: u32) -> StoreResult<Page>;

    /// Create an entity from an import record and return it with its id.
    async fn create(&self, kind: EntityKind, record: &ImportRecord) -> StoreResult<Entity>;

    /// Apply a partial update; only the fields set on `patch` change.
    async fn update(&self, kind: EntityKind, id: &str, patch: &EntityPatch)
        -> StoreResult<Entity>;

    async fn delete(&self, kind: EntityKind, id: &str) -> StoreResult<()>;

    /// Number of recipes (or other records) referring to the entity.
    async fn usage_count(&self, kind: EntityKind, id: &str) -> StoreResult<u64>;

    /// Short backend label reported by the health check.
    fn backend(&self) -> &'static str {
        "custom"
    }
}

/// Drain every page of `kind`.
pub async fn fetch_all(
    store: &dyn EntityStore,
    kind: EntityKind,
    per_page: u32,
) -> StoreResult<Vec<Entity>> {
    let per_page = per_page.max(1);
    let mut entities = Vec::new();
    let mut page = 1;

    loop {
        let batch = store.list(kind, page, per_page).await?;
        let count = batch.items.len();
        entities.extend(batch.items);

        if count < per_page as usize || entities.len() as u64 >= batch.total {
            break;
        }
        page += 1;
    }

    tracing::debug!(kind = %kind, count = entities.len(), pages = page, "Fetched catalog");
    Ok(entities)
}
