use serde_json::Value;
use tracing::warn;

use crate::database::models::EntityType;
use crate::error::SyncError;
use crate::remote::types::{ApiResponse, Operation};
use crate::sync::ReconciliationEngine;

/// A remotely created entity with a bounded lifetime: acquire with
/// [`ScopedEntity::create`], use, then [`ScopedEntity::release`] to delete
/// the remote copy. Callers that bail out early still go through
/// `release` on every exit path; a guard that is dropped unreleased only
/// logs, because an async delete cannot run from `Drop`.
pub struct ScopedEntity<'a> {
    engine: &'a ReconciliationEngine,
    entity_type: EntityType,
    name: String,
    released: bool,
}

impl std::fmt::Debug for ScopedEntity<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScopedEntity")
            .field("entity_type", &self.entity_type)
            .field("name", &self.name)
            .field("released", &self.released)
            .finish()
    }
}

impl<'a> ScopedEntity<'a> {
    /// Create the entity remotely. Fails fast when the capability table
    /// marks create unsupported; a remote refusal surfaces with its
    /// status and body.
    pub async fn create(
        engine: &'a ReconciliationEngine,
        entity_type: EntityType,
        name: &str,
        payload: &Value,
    ) -> Result<ScopedEntity<'a>, SyncError> {
        engine
            .capabilities()
            .ensure(entity_type, Operation::Create)?;

        let response = engine
            .call_by_name(entity_type, name, Operation::Create, Some(payload))
            .await?;
        if !response.is_success() {
            return Err(SyncError::RemoteRejected {
                status: response.status_code,
                body: response.raw_body,
            });
        }

        Ok(Self {
            engine,
            entity_type,
            name: entity_type.normalize_name(name),
            released: false,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn entity_type(&self) -> EntityType {
        self.entity_type
    }

    /// Delete the remote entity and consume the guard. The response is
    /// returned so callers can inspect how the remote side answered.
    pub async fn release(mut self) -> Result<ApiResponse, SyncError> {
        self.released = true;
        self.engine
            .call_by_name(self.entity_type, &self.name, Operation::Delete, None)
            .await
    }
}

impl Drop for ScopedEntity<'_> {
    fn drop(&mut self) {
        if !self.released {
            warn!(
                "Scoped {} '{}' dropped without release; the remote copy may linger",
                self.entity_type, self.name
            );
        }
    }
}
