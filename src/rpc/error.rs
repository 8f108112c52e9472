use solana_client::client_error::ClientError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RpcError {
    #[error("RPC 请求失败: {0}")]
    Client(#[from] ClientError),
    #[error("{method} 请求超时（{timeout_ms}ms）")]
    Timeout { method: String, timeout_ms: u64 },
    #[error("{method} 响应结构不符合预期: {detail}")]
    Schema { method: String, detail: String },
    #[error("交易 {signature} 执行失败: {detail}")]
    TransactionFailed { signature: String, detail: String },
    #[error("等待交易 {signature} 达到 {commitment} 超时（{timeout_ms}ms）")]
    ConfirmationTimeout {
        signature: String,
        commitment: String,
        timeout_ms: u64,
    },
}

impl RpcError {
    pub fn schema(method: impl ToString, detail: impl ToString) -> Self {
        Self::Schema {
            method: method.to_string(),
            detail: detail.to_string(),
        }
    }
}

pub type RpcResult<T> = Result<T, RpcError>;
