//! Database operations for the entity_references table.

use sqlx::{PgPool, Row};

/// Count the records that refer to an entity.
pub async fn count_references(pool: &PgPool, entity_id: &str) -> Result<i64, sqlx::Error> {
    let row = sqlx::query("SELECT COUNT(*) AS total FROM entity_references WHERE entity_id = $1")
        .bind(entity_id)
        .fetch_one(pool)
        .await?;

    row.try_get("total")
}
