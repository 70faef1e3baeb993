use crate::wallet::provider::{Eip1193Provider, ProviderRpcError};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

const JSONRPC_VERSION: &str = "2.0";
const RPC_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Serialize)]
struct JsonRpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: Value,
}

#[derive(Debug, Deserialize)]
struct JsonRpcResponse {
    #[serde(default)]
    jsonrpc: Option<String>,
    #[serde(default)]
    id: Option<Value>,
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<JsonRpcErrorObject>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcErrorObject {
    code: i64,
    message: String,
    #[serde(default)]
    data: Option<Value>,
}

/// EIP-1193 provider over plain JSON-RPC HTTP, e.g. a local dev node with
/// unlocked accounts. Wallet-only methods fail with the node's own error.
pub struct HttpProvider {
    client: Client,
    url: String,
    next_id: AtomicU64,
}

impl HttpProvider {
    pub fn new(url: impl Into<String>) -> Self {
        Self::with_client(Client::new(), url)
    }

    pub fn with_client(client: Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl Eip1193Provider for HttpProvider {
    async fn request(&self, method: &str, params: Value) -> Result<Value, ProviderRpcError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let payload = JsonRpcRequest {
            jsonrpc: JSONRPC_VERSION,
            id,
            method,
            params,
        };
        log::debug!("JSON-RPC -> {} (id {})", method, id);

        let response = self
            .client
            .post(&self.url)
            .timeout(RPC_TIMEOUT)
            .json(&payload)
            .send()
            .await
            .map_err(|e| ProviderRpcError::internal(format!("{} request failed: {}", method, e)))?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| ProviderRpcError::internal(e.to_string()))?;
        if !status.is_success() {
            return Err(ProviderRpcError::internal(format!(
                "{} returned HTTP {}: {}",
                method,
                status,
                String::from_utf8_lossy(&body)
            )));
        }

        let parsed: JsonRpcResponse = serde_json::from_slice(&body)
            .map_err(|e| ProviderRpcError::internal(format!("invalid JSON-RPC response: {}", e)))?;

        if parsed.jsonrpc.as_deref() != Some(JSONRPC_VERSION) {
            return Err(ProviderRpcError::internal("wrong jsonrpc version"));
        }
        if parsed.id.as_ref().and_then(Value::as_u64) != Some(id) {
            return Err(ProviderRpcError::internal("JSON-RPC response id does not match"));
        }
        if let Some(error) = parsed.error {
            return Err(ProviderRpcError {
                code: error.code,
                message: error.message,
                data: error.data,
            });
        }
        Ok(parsed.result.unwrap_or(Value::Null))
    }
}
