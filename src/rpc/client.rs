use crate::rpc::types::{PeerEntry, TxpoolContent};
use crate::shared::error::MonitorError;
use crate::shared::types::{parse_nonce, Address};
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;

/// The RPC surface the monitoring core consumes, per builder.
///
/// Every call carries its own deadline; implementations must not block past
/// it. `close` is idempotent.
#[async_trait]
pub trait BuilderRpc: Send + Sync {
    async fn get_peers(&self, deadline: Duration) -> Result<Vec<PeerEntry>, MonitorError>;

    async fn get_txpool(&self, deadline: Duration) -> Result<TxpoolContent, MonitorError>;

    async fn pending_nonce_at(
        &self,
        addr: &Address,
        deadline: Duration,
    ) -> Result<u64, MonitorError>;

    async fn close(&self) {}
}

/// JSON-RPC 2.0 over HTTP implementation of [`BuilderRpc`].
pub struct HttpRpc {
    url: String,
    client: Client,
}

#[derive(serde::Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
    error: Option<RpcErrorBody>,
}

#[derive(serde::Deserialize)]
struct RpcErrorBody {
    code: i64,
    message: String,
}

impl HttpRpc {
    pub fn new(url: String) -> Result<Self, MonitorError> {
        let client = Client::builder()
            .build()
            .map_err(MonitorError::Http)?;
        Ok(Self { url, client })
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Value,
        deadline: Duration,
    ) -> Result<T, MonitorError> {
        let request_body = serde_json::json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
            "id": 1
        });

        let send = self
            .client
            .post(&self.url)
            .timeout(deadline)
            .json(&request_body)
            .send();

        let response = match tokio::time::timeout(deadline, send).await {
            Ok(response) => response.map_err(MonitorError::Http)?,
            Err(_) => return Err(MonitorError::Timeout(deadline)),
        };

        if !response.status().is_success() {
            return Err(MonitorError::Rpc(format!(
                "{} failed with status {}",
                method,
                response.status()
            )));
        }

        let bytes = response.bytes().await.map_err(MonitorError::Http)?;
        let body: RpcResponse<T> = serde_json::from_slice(&bytes)?;
        decode_response(method, body)
    }
}

fn decode_response<T>(method: &str, body: RpcResponse<T>) -> Result<T, MonitorError> {
    if let Some(err) = body.error {
        return Err(MonitorError::Rpc(format!(
            "{} failed: {} (code {})",
            method, err.message, err.code
        )));
    }
    body.result
        .ok_or_else(|| MonitorError::Rpc(format!("{} returned an empty result", method)))
}

#[async_trait]
impl BuilderRpc for HttpRpc {
    async fn get_peers(&self, deadline: Duration) -> Result<Vec<PeerEntry>, MonitorError> {
        self.call("admin_peers", serde_json::json!([]), deadline)
            .await
    }

    async fn get_txpool(&self, deadline: Duration) -> Result<TxpoolContent, MonitorError> {
        self.call("txpool_content", serde_json::json!([]), deadline)
            .await
    }

    async fn pending_nonce_at(
        &self,
        addr: &Address,
        deadline: Duration,
    ) -> Result<u64, MonitorError> {
        let hex: String = self
            .call(
                "eth_getTransactionCount",
                serde_json::json!([addr.to_string(), "pending"]),
                deadline,
            )
            .await?;
        parse_nonce(&hex)
    }
}
