pub mod scoped;

use reqwest::Method;
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::database::models::EntityType;
use crate::error::SyncError;
use crate::remote::capabilities::CapabilityTable;
use crate::remote::types::{ApiResponse, Operation, RemoteEntityRecord};
use crate::remote::AdminApi;
use crate::store::EntityStore;

/// Aggregate outcome of one reconciliation pass over one entity type.
#[derive(Debug, Serialize)]
pub struct SyncReport {
    pub entity: EntityType,
    pub created: u64,
    pub updated: u64,
    pub deleted: u64,
    pub errors: Vec<String>,
}

impl SyncReport {
    fn new(entity: EntityType) -> Self {
        Self {
            entity,
            created: 0,
            updated: 0,
            deleted: 0,
            errors: Vec::new(),
        }
    }
}

/// Orchestrates consistency between the remote admin API and the local
/// mirror, and resolves names to remote identifiers for operations the
/// remote API only accepts by id.
pub struct ReconciliationEngine {
    api: Arc<dyn AdminApi>,
    store: Arc<dyn EntityStore>,
    capabilities: CapabilityTable,
    // One lock per entity type: concurrent syncs of the same collection
    // would race bulk upserts against orphan deletes. Lookups stay
    // lock-free and may observe pre-sync rows.
    sync_locks: [Mutex<()>; EntityType::ALL.len()],
}

impl ReconciliationEngine {
    pub fn new(
        api: Arc<dyn AdminApi>,
        store: Arc<dyn EntityStore>,
        capabilities: CapabilityTable,
    ) -> Self {
        Self {
            api,
            store,
            capabilities,
            sync_locks: std::array::from_fn(|_| Mutex::new(())),
        }
    }

    pub fn capabilities(&self) -> &CapabilityTable {
        &self.capabilities
    }

    /// Pull the remote collection and reconcile the local mirror: upsert
    /// every listed record, then remove rows whose name the listing no
    /// longer contains.
    ///
    /// A fetch that cannot be trusted (transport fault, non-2xx) aborts
    /// the pass before anything is written, so a broken remote never
    /// empties the cache. Individual record failures are collected in the
    /// report and do not stop the pass.
    pub async fn sync(&self, entity: EntityType) -> Result<SyncReport, SyncError> {
        let _guard = self.sync_locks[entity.index()].lock().await;
        self.capabilities.ensure(entity, Operation::List)?;

        let items = self.api.list_all(entity).await?;

        let mut report = SyncReport::new(entity);
        let mut names: HashSet<String> = HashSet::new();

        for item in &items {
            let record = match RemoteEntityRecord::from_listing_item(entity, item) {
                Ok(record) => record,
                Err(reason) => {
                    report.errors.push(reason);
                    continue;
                }
            };

            names.insert(record.name.clone());
            match self
                .store
                .upsert(
                    entity,
                    &record.name,
                    record.remote_id.as_deref(),
                    &record.attributes,
                )
                .await
            {
                Ok(outcome) if outcome.created => report.created += 1,
                Ok(_) => report.updated += 1,
                Err(err) => report.errors.push(format!("{}: {}", record.name, err)),
            }
        }

        report.deleted = if items.is_empty() {
            // A successful listing with zero entities means every local
            // row is an orphan. The empty-set guard on
            // delete_where_name_not_in exists for failure paths, so the
            // purge goes through the explicit call.
            self.store.clear(entity).await?
        } else {
            // If some records failed to parse, their names are absent
            // from the set; the guard keeps a fully unparseable listing
            // from wiping the table.
            self.store.delete_where_name_not_in(entity, &names).await?
        };

        info!(
            "Synced {}: {} created, {} updated, {} deleted, {} errors",
            entity,
            report.created,
            report.updated,
            report.deleted,
            report.errors.len()
        );

        Ok(report)
    }

    /// Reconcile every entity type the capability table allows listing.
    pub async fn sync_all(&self) -> Vec<(EntityType, Result<SyncReport, SyncError>)> {
        let mut results = Vec::new();
        for entity in self.capabilities.listable() {
            let result = self.sync(entity).await;
            results.push((entity, result));
        }
        results
    }

    /// Resolve a human-readable name to the remote-assigned identifier
    /// through the local mirror.
    ///
    /// On a cache miss (no row, or a row that has never seen a sync) one
    /// reconciliation pass is attempted and the lookup retried once; the
    /// policy is bounded, never a loop. A sync failure during resolution
    /// degrades to `NotFound` so lookups fail cleanly.
    pub async fn resolve_remote_id(
        &self,
        entity: EntityType,
        name: &str,
    ) -> Result<String, SyncError> {
        let name = entity.normalize_name(name);

        if let Some(row) = self.store.find_by_name(entity, &name).await? {
            if let Some(remote_id) = row.remote_id {
                return Ok(remote_id);
            }
        }

        match self.sync(entity).await {
            Ok(report) => debug!(
                "Resolve-triggered sync of {}: {} created, {} updated",
                entity, report.created, report.updated
            ),
            Err(err) => warn!("Resolve-triggered sync of {} failed: {}", entity, err),
        }

        if let Some(row) = self.store.find_by_name(entity, &name).await? {
            if let Some(remote_id) = row.remote_id {
                return Ok(remote_id);
            }
        }

        Err(SyncError::NotFound { entity, name })
    }

    /// Invoke a remote operation addressed by name.
    ///
    /// The capability table is consulted before anything else; an
    /// unsupported pair synthesizes a 405-equivalent response without
    /// touching the network. Item operations resolve the remote id first
    /// and synthesize a 404-equivalent response when the name is unknown.
    pub async fn call_by_name(
        &self,
        entity: EntityType,
        name: &str,
        operation: Operation,
        payload: Option<&Value>,
    ) -> Result<ApiResponse, SyncError> {
        if !self.capabilities.allows(entity, operation) {
            return Ok(ApiResponse::method_not_allowed(entity, operation));
        }
        let Some(collection) = entity.collection_path() else {
            return Ok(ApiResponse::method_not_allowed(entity, operation));
        };

        match operation {
            Operation::List => self.api.request(collection, Method::GET, None).await,
            Operation::Create => {
                let response = self.api.request(collection, Method::POST, payload).await?;
                if response.is_success() {
                    self.mirror_created(entity, name, &response, payload).await;
                }
                Ok(response)
            }
            Operation::Get | Operation::Update | Operation::Delete => {
                let remote_id = match self.resolve_remote_id(entity, name).await {
                    Ok(remote_id) => remote_id,
                    Err(SyncError::NotFound { .. }) => {
                        return Ok(ApiResponse::not_found(entity, name));
                    }
                    Err(err) => return Err(err),
                };

                let path = format!("{}/{}", collection, remote_id);
                let response = self
                    .api
                    .request(&path, operation.http_method(), payload)
                    .await?;

                if operation == Operation::Delete && response.is_success() {
                    self.forget_local(entity, name).await;
                }

                Ok(response)
            }
        }
    }

    /// After a remote create succeeds, seed the mirror so the new entity
    /// resolves without waiting for the next sync pass. Best effort: the
    /// remote operation already happened, so a store failure only warns.
    async fn mirror_created(
        &self,
        entity: EntityType,
        name: &str,
        response: &ApiResponse,
        payload: Option<&Value>,
    ) {
        let item = response
            .parsed_body
            .as_ref()
            .map(|body| body.get("data").unwrap_or(body));
        let record =
            item.and_then(|value| RemoteEntityRecord::from_listing_item(entity, value).ok());

        let result = match &record {
            Some(record) => {
                self.store
                    .upsert(
                        entity,
                        &record.name,
                        record.remote_id.as_deref(),
                        &record.attributes,
                    )
                    .await
            }
            None => {
                let attributes = payload.cloned().unwrap_or_else(|| json!({}));
                self.store
                    .upsert(entity, &entity.normalize_name(name), None, &attributes)
                    .await
            }
        };

        if let Err(err) = result {
            warn!(
                "Remote create of {} '{}' succeeded but local mirror failed: {}",
                entity, name, err
            );
        }
    }

    /// Drop the local row after a remote delete was confirmed.
    async fn forget_local(&self, entity: EntityType, name: &str) {
        let name = entity.normalize_name(name);
        match self.store.find_by_name(entity, &name).await {
            Ok(Some(row)) => {
                if let Err(err) = self.store.delete(entity, row.local_id).await {
                    warn!(
                        "Remote delete of {} '{}' confirmed but local row removal failed: {}",
                        entity, name, err
                    );
                }
            }
            Ok(None) => {}
            Err(err) => warn!(
                "Could not look up {} '{}' for local cleanup: {}",
                entity, name, err
            ),
        }
    }
}
