// Runtime SQL queries for the mirror tables. Table names come from the
// EntityType enum, never from caller input.
use serde_json::Value;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::database::models::{EntityType, MirroredEntity};
use crate::store::UpsertOutcome;

const RETURNING_COLUMNS: &str =
    "local_id, remote_id, name, attributes, synced_at, created_at, updated_at";

fn entity_from_row(row: &PgRow) -> MirroredEntity {
    MirroredEntity {
        local_id: row.get("local_id"),
        remote_id: row.get("remote_id"),
        name: row.get("name"),
        attributes: row.get("attributes"),
        synced_at: row.get("synced_at"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

pub async fn upsert_entity(
    db: &PgPool,
    entity_type: EntityType,
    name: &str,
    remote_id: Option<&str>,
    attributes: &Value,
) -> Result<UpsertOutcome, sqlx::Error> {
    let table = entity_type.table_name();
    let mut tx = db.begin().await?;

    let existing = sqlx::query(&format!(
        "SELECT local_id FROM {} WHERE name = $1 FOR UPDATE",
        table
    ))
    .bind(name)
    .fetch_optional(&mut *tx)
    .await?;

    let (row, created) = match existing {
        Some(found) => {
            let local_id: Uuid = found.get("local_id");
            let row = sqlx::query(&format!(
                r#"
                UPDATE {}
                SET remote_id = $1, attributes = $2, synced_at = NOW(), updated_at = NOW()
                WHERE local_id = $3
                RETURNING {}
                "#,
                table, RETURNING_COLUMNS
            ))
            .bind(remote_id)
            .bind(attributes)
            .bind(local_id)
            .fetch_one(&mut *tx)
            .await?;
            (row, false)
        }
        None => {
            let row = sqlx::query(&format!(
                r#"
                INSERT INTO {} (remote_id, name, attributes, synced_at)
                VALUES ($1, $2, $3, NOW())
                RETURNING {}
                "#,
                table, RETURNING_COLUMNS
            ))
            .bind(remote_id)
            .bind(name)
            .bind(attributes)
            .fetch_one(&mut *tx)
            .await?;
            (row, true)
        }
    };

    tx.commit().await?;

    Ok(UpsertOutcome {
        entity: entity_from_row(&row),
        created,
    })
}

pub async fn find_by_name(
    db: &PgPool,
    entity_type: EntityType,
    name: &str,
) -> Result<Option<MirroredEntity>, sqlx::Error> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM {} WHERE name = $1",
        RETURNING_COLUMNS,
        entity_type.table_name()
    ))
    .bind(name)
    .fetch_optional(db)
    .await?;

    Ok(row.as_ref().map(entity_from_row))
}

pub async fn find_by_remote_id(
    db: &PgPool,
    entity_type: EntityType,
    remote_id: &str,
) -> Result<Option<MirroredEntity>, sqlx::Error> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM {} WHERE remote_id = $1",
        RETURNING_COLUMNS,
        entity_type.table_name()
    ))
    .bind(remote_id)
    .fetch_optional(db)
    .await?;

    Ok(row.as_ref().map(entity_from_row))
}

pub async fn delete_where_name_not_in(
    db: &PgPool,
    entity_type: EntityType,
    names: &[String],
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(&format!(
        "DELETE FROM {} WHERE name <> ALL($1)",
        entity_type.table_name()
    ))
    .bind(names)
    .execute(db)
    .await?;

    Ok(result.rows_affected())
}

pub async fn delete_by_local_id(
    db: &PgPool,
    entity_type: EntityType,
    local_id: Uuid,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(&format!(
        "DELETE FROM {} WHERE local_id = $1",
        entity_type.table_name()
    ))
    .bind(local_id)
    .execute(db)
    .await?;

    Ok(result.rows_affected() > 0)
}

pub async fn clear_table(db: &PgPool, entity_type: EntityType) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(&format!("DELETE FROM {}", entity_type.table_name()))
        .execute(db)
        .await?;

    Ok(result.rows_affected())
}
