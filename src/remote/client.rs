use anyhow::Result;
use async_trait::async_trait;
use reqwest::Method;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

use crate::config::{AuthType, RemoteConfig};
use crate::database::models::EntityType;
use crate::error::SyncError;
use crate::remote::types::{ApiResponse, Operation};
use crate::remote::AdminApi;

#[derive(Debug, Clone)]
enum Credential {
    ApiKey(String),
    Basic { username: String, password: String },
}

/// HTTP client for the remote admin API. One instance per configured
/// deployment; cheap to clone, stateless per call.
#[derive(Debug, Clone)]
pub struct RemoteAdminClient {
    http: reqwest::Client,
    base_url: String,
    credential: Credential,
}

impl RemoteAdminClient {
    pub fn new(config: &RemoteConfig) -> Result<Self> {
        let credential = match config.auth_type {
            AuthType::ApiKey => {
                let key = config
                    .api_key
                    .clone()
                    .ok_or_else(|| anyhow::anyhow!("api_key missing for apikey auth"))?;
                Credential::ApiKey(key)
            }
            AuthType::Basic => Credential::Basic {
                username: config
                    .username
                    .clone()
                    .ok_or_else(|| anyhow::anyhow!("username missing for basic auth"))?,
                password: config
                    .password
                    .clone()
                    .ok_or_else(|| anyhow::anyhow!("password missing for basic auth"))?,
            },
        };

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            credential,
        })
    }
}

#[async_trait]
impl AdminApi for RemoteAdminClient {
    async fn request(
        &self,
        path: &str,
        method: Method,
        body: Option<&Value>,
    ) -> Result<ApiResponse, SyncError> {
        let url = format!("{}{}", self.base_url, path);
        debug!("Remote admin request: {} {}", method, url);

        let mut request = self
            .http
            .request(method, &url)
            .header("Content-Type", "application/json");

        request = match &self.credential {
            Credential::ApiKey(key) => request.header("X-API-Key", key),
            Credential::Basic { username, password } => {
                request.basic_auth(username, Some(password))
            }
        };

        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| SyncError::Transport(e.to_string()))?;

        let status_code = response.status().as_u16();
        let raw_body = response
            .text()
            .await
            .map_err(|e| SyncError::Transport(e.to_string()))?;
        let parsed_body = serde_json::from_str(&raw_body).ok();

        Ok(ApiResponse {
            status_code,
            parsed_body,
            raw_body,
        })
    }

    async fn list_all(&self, entity: EntityType) -> Result<Vec<Value>, SyncError> {
        let path = entity
            .collection_path()
            .ok_or(SyncError::CapabilityUnsupported {
                entity,
                operation: Operation::List,
            })?;

        let response = self.request(path, Method::GET, None).await?;
        if !response.is_success() {
            return Err(SyncError::RemoteRejected {
                status: response.status_code,
                body: response.raw_body,
            });
        }

        match response.parsed_body.as_ref().and_then(Value::as_array) {
            Some(items) => Ok(items.clone()),
            None => Err(SyncError::RemoteRejected {
                status: response.status_code,
                body: format!("listing body is not a JSON array: {}", response.raw_body),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn api_key_config(base_url: &str) -> RemoteConfig {
        RemoteConfig {
            base_url: base_url.to_string(),
            auth_type: AuthType::ApiKey,
            api_key: Some("secret".to_string()),
            username: None,
            password: None,
            timeout_secs: 2,
        }
    }

    #[tokio::test]
    async fn test_list_all_sends_api_key_and_decodes_items() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/pdnsadmin/zones"))
            .and(header("X-API-Key", "secret"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"id": 7, "name": "example.com.", "kind": "Master"}
            ])))
            .mount(&server)
            .await;

        let client = RemoteAdminClient::new(&api_key_config(&server.uri())).unwrap();
        let items = client.list_all(EntityType::Domain).await.unwrap();

        assert_eq!(items.len(), 1);
        assert_eq!(items[0]["name"], "example.com.");
    }

    #[tokio::test]
    async fn test_basic_auth_credential_is_attached() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/pdnsadmin/users"))
            .and(header("Authorization", "Basic YWRtaW46c2VjcmV0"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&server)
            .await;

        let config = RemoteConfig {
            base_url: server.uri(),
            auth_type: AuthType::Basic,
            api_key: None,
            username: Some("admin".to_string()),
            password: Some("secret".to_string()),
            timeout_secs: 2,
        };
        let client = RemoteAdminClient::new(&config).unwrap();
        let items = client.list_all(EntityType::User).await.unwrap();

        assert!(items.is_empty());
    }

    #[tokio::test]
    async fn test_non_2xx_is_an_inspectable_result() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/pdnsadmin/zones/7"))
            .respond_with(
                ResponseTemplate::new(405).set_body_json(json!({"error": "method not allowed"})),
            )
            .mount(&server)
            .await;

        let client = RemoteAdminClient::new(&api_key_config(&server.uri())).unwrap();
        let response = client
            .request("/pdnsadmin/zones/7", Method::PUT, Some(&json!({"kind": "Slave"})))
            .await
            .unwrap();

        assert_eq!(response.status_code, 405);
        assert!(!response.is_success());
        assert_eq!(response.parsed_body.unwrap()["error"], "method not allowed");
    }

    #[tokio::test]
    async fn test_rejected_listing_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/pdnsadmin/users"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let client = RemoteAdminClient::new(&api_key_config(&server.uri())).unwrap();
        let err = client.list_all(EntityType::User).await.unwrap_err();

        assert!(matches!(err, SyncError::RemoteRejected { status: 500, .. }));
    }

    #[tokio::test]
    async fn test_non_array_listing_body_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/pdnsadmin/zones"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"detail": "nope"})))
            .mount(&server)
            .await;

        let client = RemoteAdminClient::new(&api_key_config(&server.uri())).unwrap();
        let err = client.list_all(EntityType::Domain).await.unwrap_err();

        assert!(matches!(err, SyncError::RemoteRejected { .. }));
    }

    #[tokio::test]
    async fn test_connection_refused_is_a_transport_fault() {
        // Grab a port that nothing is listening on
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client =
            RemoteAdminClient::new(&api_key_config(&format!("http://{}", addr))).unwrap();
        let err = client.list_all(EntityType::Domain).await.unwrap_err();

        assert!(matches!(err, SyncError::Transport(_)));
    }

    #[tokio::test]
    async fn test_slow_remote_times_out_as_transport_fault() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/pdnsadmin/zones"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!([]))
                    .set_delay(Duration::from_secs(5)),
            )
            .mount(&server)
            .await;

        let mut config = api_key_config(&server.uri());
        config.timeout_secs = 1;
        let client = RemoteAdminClient::new(&config).unwrap();
        let err = client.list_all(EntityType::Domain).await.unwrap_err();

        assert!(matches!(err, SyncError::Transport(_)));
    }

    #[tokio::test]
    async fn test_template_listing_fails_fast_without_a_request() {
        let client = RemoteAdminClient::new(&api_key_config("http://127.0.0.1:1")).unwrap();
        let err = client.list_all(EntityType::Template).await.unwrap_err();

        assert!(matches!(err, SyncError::CapabilityUnsupported { .. }));
    }
}
