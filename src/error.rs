use solana_sdk::pubkey::Pubkey;
use thiserror::Error;

use crate::api::JupiterError;
use crate::rpc::RpcError;

/// 上游失败：链上 RPC 或聚合器 HTTP（含超时与确认失败）。
#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error(transparent)]
    Rpc(#[from] RpcError),
    #[error(transparent)]
    Aggregator(#[from] JupiterError),
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("配置缺失或非法: {0}")]
    Config(String),
    #[error("上游请求失败: {0}")]
    Upstream(#[from] UpstreamError),
    #[error("无法确定 {mint} 的精度")]
    AttributeUnavailable { mint: Pubkey },
    #[error("无可用兑换路线: {0}")]
    SwapUnavailable(String),
    #[error("参数非法: {0}")]
    Validation(String),
    #[error(transparent)]
    Signing(anyhow::Error),
}

impl SessionError {
    pub fn config(reason: impl ToString) -> Self {
        Self::Config(reason.to_string())
    }

    pub fn validation(reason: impl ToString) -> Self {
        Self::Validation(reason.to_string())
    }

    pub fn is_upstream(&self) -> bool {
        matches!(self, Self::Upstream(_))
    }
}

impl From<RpcError> for SessionError {
    fn from(err: RpcError) -> Self {
        Self::Upstream(UpstreamError::Rpc(err))
    }
}

impl From<JupiterError> for SessionError {
    fn from(err: JupiterError) -> Self {
        Self::Upstream(UpstreamError::Aggregator(err))
    }
}

pub type SessionResult<T> = Result<T, SessionError>;
