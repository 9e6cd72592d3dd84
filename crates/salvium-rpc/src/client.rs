//! Base JSON-RPC 2.0 HTTP client.
//!
//! Provides `call()` for JSON-RPC methods (POST to `/json_rpc`) and `post()`
//! for the daemon's raw JSON endpoints. Supports Basic auth, a per-request
//! timeout, and retry with exponential backoff on transient failures.
//!
//! Retries are only safe for reads. A request that timed out may still have
//! been executed, so methods with side effects go through `call_once()`.

use crate::error::RpcError;
use base64::Engine;
use log::{debug, trace};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

#[derive(Serialize)]
struct JsonRpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: &'a Value,
}

#[derive(Deserialize)]
struct JsonRpcResponse {
    result: Option<Value>,
    error: Option<JsonRpcError>,
}

#[derive(Deserialize)]
struct JsonRpcError {
    code: i64,
    message: String,
}

/// Configuration for an RPC client.
#[derive(Debug, Clone)]
pub struct RpcConfig {
    /// Base URL (e.g., `http://127.0.0.1:18081`).
    pub url: String,
    /// Optional username for Basic auth.
    pub username: Option<String>,
    /// Optional password for Basic auth.
    pub password: Option<String>,
    /// Request timeout.
    pub timeout: Duration,
    /// Number of retry attempts on transient failure.
    pub retries: u32,
    /// Initial delay between retries (doubles each attempt).
    pub retry_delay: Duration,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:18081".to_string(),
            username: None,
            password: None,
            timeout: Duration::from_secs(30),
            retries: 2,
            retry_delay: Duration::from_millis(500),
        }
    }
}

impl RpcConfig {
    /// Default configuration pointed at `url`.
    pub fn for_url(url: &str) -> Self {
        Self {
            url: url.trim_end_matches('/').to_string(),
            ..Default::default()
        }
    }
}

/// Async RPC client for JSON-RPC and raw JSON endpoints.
pub struct RpcClient {
    client: reqwest::Client,
    config: RpcConfig,
    request_id: AtomicU64,
}

impl RpcClient {
    /// Create a new client with the given URL.
    pub fn new(url: &str) -> Result<Self, RpcError> {
        Self::with_config(RpcConfig::for_url(url))
    }

    /// Create a new client with full configuration.
    pub fn with_config(mut config: RpcConfig) -> Result<Self, RpcError> {
        config.url = config.url.trim_end_matches('/').to_string();
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .pool_max_idle_per_host(4)
            .build()
            .map_err(|e| RpcError::ClientBuild(e.to_string()))?;

        Ok(Self {
            client,
            config,
            request_id: AtomicU64::new(0),
        })
    }

    /// Get the configured base URL.
    pub fn url(&self) -> &str {
        &self.config.url
    }

    /// Get the full client configuration.
    pub fn config(&self) -> &RpcConfig {
        &self.config
    }

    fn next_id(&self) -> u64 {
        self.request_id.fetch_add(1, Ordering::Relaxed)
    }

    fn auth_header(&self) -> Option<HeaderValue> {
        match (&self.config.username, &self.config.password) {
            (Some(user), Some(pass)) => {
                let creds = format!("{}:{}", user, pass);
                let encoded = base64::engine::general_purpose::STANDARD.encode(creds);
                HeaderValue::from_str(&format!("Basic {}", encoded)).ok()
            }
            _ => None,
        }
    }

    fn build_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if let Some(auth) = self.auth_header() {
            headers.insert(AUTHORIZATION, auth);
        }
        headers
    }

    /// Call a JSON-RPC 2.0 method (POST to `/json_rpc`), retrying transient
    /// failures.
    pub async fn call(&self, method: &str, params: Value) -> Result<Value, RpcError> {
        self.call_with_retries(method, params, self.config.retries)
            .await
    }

    /// Call a JSON-RPC 2.0 method exactly once, whatever the retry setting.
    pub async fn call_once(&self, method: &str, params: Value) -> Result<Value, RpcError> {
        self.call_with_retries(method, params, 0).await
    }

    async fn call_with_retries(
        &self,
        method: &str,
        params: Value,
        retries: u32,
    ) -> Result<Value, RpcError> {
        let url = format!("{}/json_rpc", self.config.url);
        let url = url.as_str();
        let params = &params;
        self.with_retries(method, retries, move || async move {
            let req = JsonRpcRequest {
                jsonrpc: "2.0",
                id: self.next_id(),
                method,
                params,
            };
            let body = self.send_json(url, method, &req).await?;
            let body: JsonRpcResponse = serde_json::from_value(body)?;

            if let Some(err) = body.error {
                if err.message == "BUSY" {
                    return Err(RpcError::Busy {
                        context: method.to_string(),
                    });
                }
                return Err(RpcError::Rpc {
                    code: err.code,
                    message: err.message,
                    method: method.to_string(),
                });
            }

            body.result.ok_or(RpcError::NoResult {
                context: method.to_string(),
            })
        })
        .await
    }

    /// Call a JSON-RPC method and decode its result into `T`.
    pub async fn call_as<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Value,
    ) -> Result<T, RpcError> {
        let val = self.call(method, params).await?;
        Ok(serde_json::from_value(val)?)
    }

    /// [`call_once`](Self::call_once) and decode its result into `T`.
    pub async fn call_once_as<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Value,
    ) -> Result<T, RpcError> {
        let val = self.call_once(method, params).await?;
        Ok(serde_json::from_value(val)?)
    }

    /// POST to a raw endpoint and decode the response into `T`.
    pub async fn post_as<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        body: &Value,
    ) -> Result<T, RpcError> {
        let val = self.post(endpoint, body).await?;
        Ok(serde_json::from_value(val)?)
    }

    /// POST JSON to a raw endpoint (not JSON-RPC).
    pub async fn post(&self, endpoint: &str, body: &Value) -> Result<Value, RpcError> {
        let url = format!("{}{}", self.config.url, endpoint);
        let url = url.as_str();
        self.with_retries(endpoint, self.config.retries, move || {
            self.send_json(url, endpoint, body)
        })
        .await
    }

    async fn with_retries<F, Fut>(
        &self,
        what: &str,
        retries: u32,
        mut attempt_fn: F,
    ) -> Result<Value, RpcError>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<Value, RpcError>>,
    {
        let attempts = retries + 1;
        let mut attempt = 0;

        loop {
            if attempt > 0 {
                let delay = self.config.retry_delay * 2u32.saturating_pow(attempt - 1);
                debug!("retrying {} in {:?} (attempt {}/{})", what, delay, attempt + 1, attempts);
                tokio::time::sleep(delay).await;
            }

            match attempt_fn().await {
                Ok(val) => return Ok(val),
                Err(e) if e.is_transient() && attempt + 1 < attempts => attempt += 1,
                Err(e) => return Err(e),
            }
        }
    }

    async fn send_json<T: Serialize + ?Sized>(
        &self,
        url: &str,
        method: &str,
        body: &T,
    ) -> Result<Value, RpcError> {
        trace!("POST {} ({})", url, method);
        let http_err = |source| RpcError::Http {
            method: method.to_string(),
            url: url.to_string(),
            source,
        };

        let resp = self
            .client
            .post(url)
            .headers(self.build_headers())
            .json(body)
            .send()
            .await
            .map_err(http_err)?;

        let status = resp.status().as_u16();

        if status == 401 {
            return Err(RpcError::AuthFailed {
                url: url.to_string(),
            });
        }

        if status >= 400 {
            let body = resp.text().await.unwrap_or_default();
            return Err(RpcError::HttpStatus {
                method: method.to_string(),
                url: url.to_string(),
                status,
                body: body.chars().take(500).collect(),
            });
        }

        resp.json().await.map_err(http_err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockReply, MockServer};
    use serde_json::json;

    /// Longer than any timeout the tests configure.
    const SLOW: Duration = Duration::from_secs(5);

    #[test]
    fn test_config_default() {
        let config = RpcConfig::default();
        assert_eq!(config.url, "http://127.0.0.1:18081");
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert_eq!(config.retries, 2);
    }

    #[test]
    fn test_client_url_trailing_slash() {
        let client = RpcClient::new("http://example.com:18081/").unwrap();
        assert_eq!(client.url(), "http://example.com:18081");
    }

    #[test]
    fn test_request_ids_increment() {
        let client = RpcClient::new("http://127.0.0.1:18081").unwrap();
        let id1 = client.next_id();
        let id2 = client.next_id();
        assert_eq!(id2, id1 + 1);
    }

    #[test]
    fn test_basic_auth_header() {
        let client = RpcClient::with_config(RpcConfig {
            username: Some("user".into()),
            password: Some("pass".into()),
            ..Default::default()
        })
        .unwrap();
        let headers = client.build_headers();
        assert_eq!(headers[AUTHORIZATION], "Basic dXNlcjpwYXNz");
    }

    #[tokio::test]
    async fn test_connection_refused_is_reported() {
        // Port 1 on localhost is never an RPC server.
        let client = RpcClient::with_config(RpcConfig {
            url: "http://127.0.0.1:1".into(),
            retries: 0,
            timeout: Duration::from_secs(2),
            ..Default::default()
        })
        .unwrap();
        let err = client
            .call("get_height", serde_json::json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, RpcError::Http { .. }), "got {:?}", err);
    }

    fn impatient(url: &str) -> RpcClient {
        RpcClient::with_config(RpcConfig {
            timeout: Duration::from_millis(300),
            retries: 2,
            retry_delay: Duration::from_millis(10),
            ..RpcConfig::for_url(url)
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_call_retries_timed_out_reads() {
        let server = MockServer::start(|_| MockReply::result(json!({})).delayed(SLOW))
            .await
            .unwrap();
        let client = impatient(server.url());

        let err = client.call("get_height", json!({})).await.unwrap_err();

        assert!(err.is_transient(), "got {:?}", err);
        assert_eq!(server.requests(), 3);
    }

    #[tokio::test]
    async fn test_call_once_is_never_resent() {
        let server = MockServer::start(|_| MockReply::result(json!({})).delayed(SLOW))
            .await
            .unwrap();
        let client = impatient(server.url());

        let err = client.call_once("transfer", json!({})).await.unwrap_err();

        assert!(err.is_transient(), "got {:?}", err);
        assert_eq!(server.requests(), 1);
    }

    #[tokio::test]
    async fn test_call_once_as_decodes_result() {
        let server = MockServer::start(|req| {
            assert_eq!(req.method(), Some("get_version"));
            MockReply::result(json!({ "version": 65562 }))
        })
        .await
        .unwrap();
        let client = RpcClient::new(server.url()).unwrap();

        let v: Value = client.call_once_as("get_version", json!({})).await.unwrap();
        assert_eq!(v["version"], 65562);
    }
}
