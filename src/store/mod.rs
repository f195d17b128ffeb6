pub mod queries;

use async_trait::async_trait;
use serde_json::Value;
use sqlx::PgPool;
use std::collections::HashSet;
use tracing::warn;
use uuid::Uuid;

use crate::database::models::{EntityType, MirroredEntity};
use crate::error::SyncError;

/// Result of one upsert: the row as stored plus whether it was newly
/// created, so sync passes can report create/update counts.
#[derive(Debug, Clone)]
pub struct UpsertOutcome {
    pub entity: MirroredEntity,
    pub created: bool,
}

/// Durable mirror of remote entities with name-based lookup.
///
/// Every mutating call is a single transaction: a failure mid-call leaves
/// the store at its pre-call state.
#[async_trait]
pub trait EntityStore: Send + Sync {
    /// Insert if `name` is absent, otherwise refresh remote_id, attributes
    /// and synced_at. Idempotent: re-applying the same remote record has
    /// no additional effect.
    async fn upsert(
        &self,
        entity_type: EntityType,
        name: &str,
        remote_id: Option<&str>,
        attributes: &Value,
    ) -> Result<UpsertOutcome, SyncError>;

    async fn find_by_name(
        &self,
        entity_type: EntityType,
        name: &str,
    ) -> Result<Option<MirroredEntity>, SyncError>;

    async fn find_by_remote_id(
        &self,
        entity_type: EntityType,
        remote_id: &str,
    ) -> Result<Option<MirroredEntity>, SyncError>;

    /// Atomic orphan cleanup after a sync pass. An empty `names` set is a
    /// no-op, never "delete everything": a failed or empty remote listing
    /// must not wipe the cache through this path.
    async fn delete_where_name_not_in(
        &self,
        entity_type: EntityType,
        names: &HashSet<String>,
    ) -> Result<u64, SyncError>;

    async fn delete(&self, entity_type: EntityType, local_id: Uuid) -> Result<bool, SyncError>;

    /// Remove every row of one entity type. Only meaningful after a
    /// successful remote listing legitimately reported zero entities.
    async fn clear(&self, entity_type: EntityType) -> Result<u64, SyncError>;
}

/// Postgres-backed store, one table per entity type.
#[derive(Debug, Clone)]
pub struct PgEntityStore {
    db: PgPool,
}

impl PgEntityStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl EntityStore for PgEntityStore {
    async fn upsert(
        &self,
        entity_type: EntityType,
        name: &str,
        remote_id: Option<&str>,
        attributes: &Value,
    ) -> Result<UpsertOutcome, SyncError> {
        let outcome =
            queries::upsert_entity(&self.db, entity_type, name, remote_id, attributes).await?;
        Ok(outcome)
    }

    async fn find_by_name(
        &self,
        entity_type: EntityType,
        name: &str,
    ) -> Result<Option<MirroredEntity>, SyncError> {
        Ok(queries::find_by_name(&self.db, entity_type, name).await?)
    }

    async fn find_by_remote_id(
        &self,
        entity_type: EntityType,
        remote_id: &str,
    ) -> Result<Option<MirroredEntity>, SyncError> {
        Ok(queries::find_by_remote_id(&self.db, entity_type, remote_id).await?)
    }

    async fn delete_where_name_not_in(
        &self,
        entity_type: EntityType,
        names: &HashSet<String>,
    ) -> Result<u64, SyncError> {
        if names.is_empty() {
            warn!(
                "Refusing orphan cleanup for {} with an empty name set",
                entity_type
            );
            return Ok(0);
        }

        let names: Vec<String> = names.iter().cloned().collect();
        Ok(queries::delete_where_name_not_in(&self.db, entity_type, &names).await?)
    }

    async fn delete(&self, entity_type: EntityType, local_id: Uuid) -> Result<bool, SyncError> {
        Ok(queries::delete_by_local_id(&self.db, entity_type, local_id).await?)
    }

    async fn clear(&self, entity_type: EntityType) -> Result<u64, SyncError> {
        Ok(queries::clear_table(&self.db, entity_type).await?)
    }
}
