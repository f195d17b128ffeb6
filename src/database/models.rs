use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// The entity collections managed by the remote admin API and mirrored
/// locally. `Template` exists only on our side; the remote endpoint for it
/// was never implemented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    Domain,
    User,
    ApiKey,
    Account,
    Template,
}

impl EntityType {
    pub const ALL: [EntityType; 5] = [
        EntityType::Domain,
        EntityType::User,
        EntityType::ApiKey,
        EntityType::Account,
        EntityType::Template,
    ];

    /// Local mirror table for this entity type.
    pub fn table_name(&self) -> &'static str {
        match self {
            EntityType::Domain => "domains",
            EntityType::User => "users",
            EntityType::ApiKey => "api_keys",
            EntityType::Account => "accounts",
            EntityType::Template => "templates",
        }
    }

    /// Bulk-listing endpoint on the remote admin API. `None` means the
    /// remote side has no endpoint for this collection at all.
    pub fn collection_path(&self) -> Option<&'static str> {
        match self {
            EntityType::Domain => Some("/pdnsadmin/zones"),
            EntityType::User => Some("/pdnsadmin/users"),
            EntityType::ApiKey => Some("/pdnsadmin/apikeys"),
            EntityType::Account => Some("/pdnsadmin/accounts"),
            EntityType::Template => None,
        }
    }

    /// Field in a remote listing item that carries the remote-assigned
    /// identifier. Zones and API keys use numeric ids; users and accounts
    /// are addressed by username/name in item paths.
    pub fn remote_key_field(&self) -> &'static str {
        match self {
            EntityType::Domain | EntityType::ApiKey => "id",
            EntityType::User => "username",
            EntityType::Account => "name",
            EntityType::Template => "id",
        }
    }

    /// Field in a remote listing item that carries the human-readable
    /// unique name callers look entities up by.
    pub fn name_field(&self) -> &'static str {
        match self {
            EntityType::Domain => "name",
            EntityType::User => "username",
            EntityType::ApiKey => "description",
            EntityType::Account => "name",
            EntityType::Template => "name",
        }
    }

    /// Canonical form of a name for storage and lookup. Zone names come
    /// back from the remote API with a trailing dot; the mirror always
    /// holds the undotted form.
    pub fn normalize_name(&self, name: &str) -> String {
        match self {
            EntityType::Domain => name.trim_end_matches('.').to_string(),
            _ => name.to_string(),
        }
    }

    pub(crate) fn index(&self) -> usize {
        match self {
            EntityType::Domain => 0,
            EntityType::User => 1,
            EntityType::ApiKey => 2,
            EntityType::Account => 3,
            EntityType::Template => 4,
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EntityType::Domain => "domain",
            EntityType::User => "user",
            EntityType::ApiKey => "api_key",
            EntityType::Account => "account",
            EntityType::Template => "template",
        };
        write!(f, "{}", name)
    }
}

impl FromStr for EntityType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "domain" | "zone" => Ok(EntityType::Domain),
            "user" => Ok(EntityType::User),
            "api_key" | "apikey" => Ok(EntityType::ApiKey),
            "account" => Ok(EntityType::Account),
            "template" => Ok(EntityType::Template),
            _ => Err(anyhow!("Unknown entity type: {}", s)),
        }
    }
}

/// One locally mirrored entity row. `attributes` is the remote record as
/// last observed, opaque to the sync engine.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct MirroredEntity {
    pub local_id: Uuid,
    pub remote_id: Option<String>,
    pub name: String,
    pub attributes: serde_json::Value,
    pub synced_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MirroredEntity {
    /// A row is resolvable once a sync has attached the remote identifier.
    pub fn is_synced(&self) -> bool {
        self.remote_id.is_some()
    }
}
