use reqwest::Method;
use serde_json::{json, Value};
use std::fmt;

use crate::database::models::EntityType;

/// CRUD operations a caller may attempt against a remote collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    List,
    Get,
    Create,
    Update,
    Delete,
}

impl Operation {
    pub fn http_method(&self) -> Method {
        match self {
            Operation::List | Operation::Get => Method::GET,
            Operation::Create => Method::POST,
            Operation::Update => Method::PUT,
            Operation::Delete => Method::DELETE,
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operation::List => "list",
            Operation::Get => "get",
            Operation::Create => "create",
            Operation::Update => "update",
            Operation::Delete => "delete",
        };
        write!(f, "{}", name)
    }
}

/// Normalized outcome of one remote admin API call. Non-2xx responses are
/// carried here as data, not raised as errors.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status_code: u16,
    pub parsed_body: Option<Value>,
    pub raw_body: String,
}

impl ApiResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status_code)
    }

    fn synthesized(status_code: u16, body: Value) -> Self {
        let raw_body = body.to_string();
        Self {
            status_code,
            parsed_body: Some(body),
            raw_body,
        }
    }

    /// 404-equivalent answer produced locally when a name cannot be
    /// resolved to a remote identifier. No remote call was made.
    pub fn not_found(entity: EntityType, name: &str) -> Self {
        Self::synthesized(
            404,
            json!({
                "error": "not_found",
                "message": format!("{} '{}' has no known remote identifier", entity, name)
            }),
        )
    }

    /// 405-equivalent answer produced locally when the capability table
    /// marks the operation unsupported. No remote call was made.
    pub fn method_not_allowed(entity: EntityType, operation: Operation) -> Self {
        Self::synthesized(
            405,
            json!({
                "error": "method_not_allowed",
                "message": format!("{} is not supported for {} by the remote admin API", operation, entity)
            }),
        )
    }
}

/// One entity as reported by a remote bulk listing, reduced to the parts
/// the sync engine cares about. Everything else rides along in
/// `attributes` untouched.
#[derive(Debug, Clone)]
pub struct RemoteEntityRecord {
    pub remote_id: Option<String>,
    pub name: String,
    pub attributes: Value,
}

impl RemoteEntityRecord {
    /// Extract a record from one item of a decoded listing array. Items
    /// without a usable name are reported as errors so a sync pass can
    /// count them without aborting.
    pub fn from_listing_item(entity: EntityType, item: &Value) -> Result<Self, String> {
        let raw_name = item
            .get(entity.name_field())
            .and_then(Value::as_str)
            .ok_or_else(|| {
                format!(
                    "{} record without usable '{}' field: {}",
                    entity,
                    entity.name_field(),
                    item
                )
            })?;

        let name = entity.normalize_name(raw_name);
        if name.is_empty() {
            return Err(format!("{} record with empty name: {}", entity, item));
        }

        let remote_id = match item.get(entity.remote_key_field()) {
            Some(Value::String(s)) => Some(s.clone()),
            Some(Value::Number(n)) => Some(n.to_string()),
            _ => None,
        };

        Ok(Self {
            remote_id,
            name,
            attributes: item.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zone_listing_item_normalizes_name_and_id() {
        let item = json!({"id": 7, "name": "example.com.", "kind": "Master", "dnssec": false});
        let record = RemoteEntityRecord::from_listing_item(EntityType::Domain, &item).unwrap();

        assert_eq!(record.remote_id.as_deref(), Some("7"));
        assert_eq!(record.name, "example.com");
        assert_eq!(record.attributes["kind"], "Master");
    }

    #[test]
    fn test_user_listing_item_keys_by_username() {
        let item = json!({"id": 12, "username": "alice", "email": "alice@example.com"});
        let record = RemoteEntityRecord::from_listing_item(EntityType::User, &item).unwrap();

        assert_eq!(record.remote_id.as_deref(), Some("alice"));
        assert_eq!(record.name, "alice");
    }

    #[test]
    fn test_listing_item_without_name_is_an_error() {
        let item = json!({"id": 3, "kind": "Master"});
        assert!(RemoteEntityRecord::from_listing_item(EntityType::Domain, &item).is_err());
    }

    #[test]
    fn test_synthesized_responses() {
        let resp = ApiResponse::not_found(EntityType::Domain, "missing.example");
        assert_eq!(resp.status_code, 404);
        assert!(!resp.is_success());
        assert_eq!(resp.parsed_body.as_ref().unwrap()["error"], "not_found");

        let resp = ApiResponse::method_not_allowed(EntityType::Domain, Operation::Update);
        assert_eq!(resp.status_code, 405);
        assert_eq!(
            resp.parsed_body.as_ref().unwrap()["error"],
            "method_not_allowed"
        );
    }
}
