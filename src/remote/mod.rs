pub mod capabilities;
pub mod client;
pub mod types;

use async_trait::async_trait;
use reqwest::Method;
use serde_json::Value;

use crate::database::models::EntityType;
use crate::error::SyncError;
use crate::remote::types::ApiResponse;

/// Gateway to the remote admin API.
///
/// Implementations are stateless per call and carry no retry logic; the
/// reconciliation engine owns scheduling and the capability table decides
/// which calls are worth issuing in the first place.
#[async_trait]
pub trait AdminApi: Send + Sync {
    /// Execute one HTTP request and normalize the result. Non-2xx
    /// responses come back as data; only transport-level failure is an
    /// error.
    async fn request(
        &self,
        path: &str,
        method: Method,
        body: Option<&Value>,
    ) -> Result<ApiResponse, SyncError>;

    /// Fetch the full collection for an entity type as decoded listing
    /// items. A listing that cannot be trusted (transport fault, non-2xx,
    /// non-array body) is an error: sync passes must not act on it.
    async fn list_all(&self, entity: EntityType) -> Result<Vec<Value>, SyncError>;
}
