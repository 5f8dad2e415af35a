//! JSON-RPC transport against the daemon's RPC port.
//!
//! The daemon speaks JSON-RPC 1.0 over HTTP with basic auth. Errors come
//! back as HTTP 500 with a JSON body whose `error` member carries the code
//! and message, so the body is decoded before the status is judged.

use async_trait::async_trait;
use reqwest::{header, Client};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use super::IdentityTransport;
use crate::config::RpcConfig;
use crate::error::TransportError;
use crate::types::{IdentityMutationRequest, IdentitySnapshot, IdentitySummary, TransactionId};

const REQUEST_ID: &str = "identity-sync";

/// JSON-RPC transport.
pub struct RpcTransport {
    client: Client,
    url: String,
    user: Option<String>,
    password: Option<String>,
}

#[derive(Debug, Serialize)]
struct RpcRequest<'a> {
    jsonrpc: &'static str,
    id: &'static str,
    method: &'a str,
    params: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<serde_json::Value>,
    #[serde(default)]
    error: Option<RpcErrorBody>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorBody {
    code: i64,
    message: String,
}

impl RpcTransport {
    /// Create a transport from RPC settings.
    pub fn new(config: &RpcConfig) -> Result<Self, TransportError> {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            header::HeaderValue::from_static("application/json"),
        );

        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| TransportError::Unreachable(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            url: config.url.clone(),
            user: config.user.clone(),
            password: config.password.clone(),
        })
    }

    /// RPC endpoint this transport talks to.
    pub fn url(&self) -> &str {
        &self.url
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Vec<serde_json::Value>,
    ) -> Result<T, TransportError> {
        debug!(method, url = %self.url, "daemon rpc call");

        let body = RpcRequest {
            jsonrpc: "1.0",
            id: REQUEST_ID,
            method,
            params,
        };

        let mut request = self.client.post(&self.url).json(&body);
        if let Some(user) = &self.user {
            request = request.basic_auth(user, self.password.as_ref());
        }

        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;

        let decoded: RpcResponse = match serde_json::from_str(&text) {
            Ok(decoded) => decoded,
            Err(e) if status.is_success() => return Err(e.into()),
            Err(_) => {
                return Err(TransportError::Unreachable(format!(
                    "HTTP {}: {}",
                    status.as_u16(),
                    text.trim()
                )))
            }
        };

        if let Some(err) = decoded.error {
            return Err(TransportError::Daemon {
                code: err.code,
                message: err.message,
            });
        }

        let result = decoded.result.ok_or_else(|| {
            TransportError::MalformedResponse(format!("{} returned neither result nor error", method))
        })?;
        Ok(serde_json::from_value(result)?)
    }
}

#[async_trait]
impl IdentityTransport for RpcTransport {
    async fn fetch_identity_content(
        &self,
        address_or_name: &str,
    ) -> Result<IdentitySnapshot, TransportError> {
        self.call("getidentitycontent", vec![address_or_name.into()])
            .await
    }

    async fn submit_identity_mutation(
        &self,
        request: &IdentityMutationRequest,
    ) -> Result<TransactionId, TransportError> {
        let params = vec![serde_json::to_value(request)?];
        self.call("updateidentity", params).await
    }

    async fn list_identities(&self) -> Result<Vec<IdentitySummary>, TransportError> {
        let rows: Vec<serde_json::Value> = self.call("listidentities", Vec::new()).await?;
        Ok(rows.iter().map(IdentitySummary::from_value).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header_exists, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(url: String) -> RpcConfig {
        RpcConfig {
            url,
            user: Some("rpcuser".into()),
            password: Some("rpcpass".into()),
            ..Default::default()
        }
    }

    fn identity_json() -> serde_json::Value {
        json!({
            "identity": {
                "version": 3,
                "flags": 0,
                "primaryaddresses": ["RAddr1"],
                "minimumsignatures": 1,
                "name": "alice",
                "identityaddress": "iAlice",
                "parent": "iParent",
                "systemid": "iParent",
                "contentmap": {},
                "contentmultimap": {},
                "revocationauthority": "iAlice",
                "recoveryauthority": "iAlice",
                "timelock": 0
            },
            "status": "active",
            "blockheight": 100
        })
    }

    #[tokio::test]
    async fn test_fetch_identity_content() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header_exists("authorization"))
            .and(body_partial_json(json!({ "method": "getidentitycontent", "params": ["alice@"] })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "result": identity_json(),
                "error": null,
                "id": REQUEST_ID
            })))
            .expect(1)
            .mount(&server)
            .await;

        let transport = RpcTransport::new(&config(server.uri())).unwrap();
        let snapshot = transport.fetch_identity_content("alice@").await.unwrap();
        assert_eq!(snapshot.identity.identity_address, "iAlice");
        assert_eq!(snapshot.block_height, Some(100));
    }

    #[tokio::test]
    async fn test_daemon_error_surfaces_verbatim() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_json(json!({
                "result": null,
                "error": { "code": -8, "message": "Identity not found" },
                "id": REQUEST_ID
            })))
            .mount(&server)
            .await;

        let transport = RpcTransport::new(&config(server.uri())).unwrap();
        let err = transport.fetch_identity_content("nobody@").await.unwrap_err();
        assert_eq!(
            err,
            TransportError::Daemon {
                code: -8,
                message: "Identity not found".into()
            }
        );
    }

    #[tokio::test]
    async fn test_submit_returns_txid() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({
                "method": "updateidentity",
                "params": [{ "name": "alice", "contentmap": { "k": "v" } }]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "result": "ab12",
                "error": null,
                "id": REQUEST_ID
            })))
            .mount(&server)
            .await;

        let request = IdentityMutationRequest {
            name: "alice".into(),
            parent: "iParent".into(),
            primary_addresses: vec!["RAddr1".into()],
            minimum_signatures: 1,
            revocation_authority: "iAlice".into(),
            recovery_authority: "iAlice".into(),
            private_address: None,
            content_map: Some([("k".to_string(), "v".to_string())].into_iter().collect()),
            content_multimap: None,
        };

        let transport = RpcTransport::new(&config(server.uri())).unwrap();
        let txid = transport.submit_identity_mutation(&request).await.unwrap();
        assert_eq!(txid, TransactionId("ab12".into()));
    }

    #[tokio::test]
    async fn test_list_identities_tolerates_odd_rows() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({ "method": "listidentities" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "result": [identity_json(), { "unexpected": true }],
                "error": null,
                "id": REQUEST_ID
            })))
            .mount(&server)
            .await;

        let transport = RpcTransport::new(&config(server.uri())).unwrap();
        let rows = transport.list_identities().await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].name.as_deref(), Some("alice"));
        assert_eq!(rows[1].name, None);
    }

    #[tokio::test]
    async fn test_unauthorized_is_unreachable() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let transport = RpcTransport::new(&config(server.uri())).unwrap();
        let err = transport.list_identities().await.unwrap_err();
        assert!(matches!(err, TransportError::Unreachable(msg) if msg.starts_with("HTTP 401")));
    }

    #[tokio::test]
    async fn test_garbage_body_is_malformed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let transport = RpcTransport::new(&config(server.uri())).unwrap();
        let err = transport.fetch_identity_content("alice@").await.unwrap_err();
        assert!(matches!(err, TransportError::MalformedResponse(_)));
    }

    #[tokio::test]
    async fn test_connection_refused_is_unreachable() {
        // nothing listens on port 9 locally
        let transport = RpcTransport::new(&config("http://127.0.0.1:9".into())).unwrap();
        let err = transport.list_identities().await.unwrap_err();
        assert!(matches!(err, TransportError::Unreachable(_)));
    }
}
