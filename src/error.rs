use thiserror::Error;

use crate::database::models::EntityType;
use crate::remote::types::Operation;

/// Failures surfaced by the sync and lookup layer.
///
/// Non-2xx responses from the remote admin API are not errors in general;
/// only a bulk listing the engine cannot trust becomes `RemoteRejected`.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Network-level failure reaching the remote admin API (connection
    /// refused, DNS failure, timeout). Never retried by this layer.
    #[error("transport fault reaching remote admin API: {0}")]
    Transport(String),

    /// The remote admin API does not support this operation for this
    /// entity type, per the configured capability table.
    #[error("remote admin API does not support {operation} for {entity}")]
    CapabilityUnsupported {
        entity: EntityType,
        operation: Operation,
    },

    /// No remote identifier is known for the name, even after one sync.
    #[error("no remote identifier known for {entity} '{name}'")]
    NotFound { entity: EntityType, name: String },

    /// The remote admin API answered a supported operation with 4xx/5xx.
    /// The body is carried verbatim for the caller to inspect.
    #[error("remote admin API rejected request with status {status}: {body}")]
    RemoteRejected { status: u16, body: String },

    /// Persistence layer failure. Mutating store calls roll back, so the
    /// local cache is left at its pre-call state.
    #[error("local store fault: {0}")]
    LocalStore(String),
}

impl From<sqlx::Error> for SyncError {
    fn from(err: sqlx::Error) -> Self {
        SyncError::LocalStore(err.to_string())
    }
}
