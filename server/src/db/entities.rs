//! Database operations for the entities table.

use larder_engine::{Entity, EntityFields};
use sqlx::{PgPool, Row};

/// A stored entity row from the database.
#[derive(Debug)]
pub struct StoredEntity {
    pub id: String,
    pub fields: serde_json::Value,
}

impl<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow> for StoredEntity {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        Ok(StoredEntity {
            id: row.try_get("id")?,
            fields: row.try_get("fields")?,
        })
    }
}

impl StoredEntity {
    /// Convert the row into an engine entity.
    pub fn to_entity(&self) -> Result<Entity, serde_json::Error> {
        let fields: EntityFields = serde_json::from_value(self.fields.clone())?;
        Ok(Entity::new(self.id.clone(), fields))
    }
}

/// Values written for one entity row.
pub struct EntityRow<'a> {
    pub id: &'a str,
    pub kind: &'a str,
    pub name: &'a str,
    pub name_key: &'a str,
    pub fields: &'a serde_json::Value,
}

/// Get one page of entities of a kind, oldest first.
pub async fn list_entities(
    pool: &PgPool,
    kind: &str,
    limit: i64,
    offset: i64,
) -> Result<Vec<StoredEntity>, sqlx::Error> {
    sqlx::query_as::<_, StoredEntity>(
        r#"
        SELECT id, fields
        FROM entities
        WHERE kind = $1
        ORDER BY created_at, id
        LIMIT $2 OFFSET $3
        "#,
    )
    .bind(kind)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await
}

/// Count entities of a kind.
pub async fn count_entities(pool: &PgPool, kind: &str) -> Result<i64, sqlx::Error> {
    let row = sqlx::query("SELECT COUNT(*) AS total FROM entities WHERE kind = $1")
        .bind(kind)
        .fetch_one(pool)
        .await?;

    row.try_get("total")
}

/// Get an entity by kind and ID.
pub async fn get_entity(
    pool: &PgPool,
    kind: &str,
    id: &str,
) -> Result<Option<StoredEntity>, sqlx::Error> {
    sqlx::query_as::<_, StoredEntity>(
        r#"
        SELECT id, fields
        FROM entities
        WHERE kind = $1 AND id = $2
        "#,
    )
    .bind(kind)
    .bind(id)
    .fetch_optional(pool)
    .await
}

/// Insert a new entity.
pub async fn insert_entity(pool: &PgPool, row: EntityRow<'_>) -> Result<StoredEntity, sqlx::Error> {
    sqlx::query_as::<_, StoredEntity>(
        r#"
        INSERT INTO entities (id, kind, name, name_key, fields)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING id, fields
        "#,
    )
    .bind(row.id)
    .bind(row.kind)
    .bind(row.name)
    .bind(row.name_key)
    .bind(row.fields)
    .fetch_one(pool)
    .await
}

/// Overwrite an entity's fields. Returns `None` if it does not exist.
pub async fn update_entity(
    pool: &PgPool,
    row: EntityRow<'_>,
) -> Result<Option<StoredEntity>, sqlx::Error> {
    sqlx::query_as::<_, StoredEntity>(
        r#"
        UPDATE entities
        SET name = $3, name_key = $4, fields = $5, updated_at = now()
        WHERE id = $1 AND kind = $2
        RETURNING id, fields
        "#,
    )
    .bind(row.id)
    .bind(row.kind)
    .bind(row.name)
    .bind(row.name_key)
    .bind(row.fields)
    .fetch_optional(pool)
    .await
}

/// Delete an entity. Returns the number of rows removed.
pub async fn delete_entity(pool: &PgPool, kind: &str, id: &str) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM entities WHERE kind = $1 AND id = $2")
        .bind(kind)
        .bind(id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected())
}
