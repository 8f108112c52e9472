use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_client::rpc_request::RpcRequest;
use tracing::trace;

use super::Commitment;
use super::error::{RpcError, RpcResult};

/// JSON-RPC 传输抽象：发送 `{jsonrpc, id, method, params}` 并返回 `result` 字段。
///
/// 响应中携带 `error` 时实现方必须返回 `Err`。
#[async_trait]
pub trait RpcTransport: Send + Sync + 'static {
    fn url(&self) -> String;

    async fn send(&self, request: RpcRequest, params: Value) -> RpcResult<Value>;
}

/// 基于 `solana_client` 非阻塞 `RpcClient` 的 HTTP 传输，每次调用都有独立超时。
pub struct HttpTransport {
    client: RpcClient,
    timeout: Duration,
}

impl fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpTransport")
            .field("url", &self.client.url())
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl HttpTransport {
    pub fn new(url: String, commitment: Commitment, timeout: Duration) -> Self {
        let client =
            RpcClient::new_with_timeout_and_commitment(url, timeout, commitment.to_config());
        Self { client, timeout }
    }
}

#[async_trait]
impl RpcTransport for HttpTransport {
    fn url(&self) -> String {
        self.client.url()
    }

    async fn send(&self, request: RpcRequest, params: Value) -> RpcResult<Value> {
        trace!(
            target: "rpc::transport",
            method = %request,
            endpoint = %self.client.url(),
            "发送 RPC 请求"
        );
        match tokio::time::timeout(self.timeout, self.client.send::<Value>(request, params)).await
        {
            Ok(result) => Ok(result?),
            Err(_) => Err(RpcError::Timeout {
                method: request.to_string(),
                timeout_ms: self.timeout.as_millis() as u64,
            }),
        }
    }
}
