//! 外部聚合器接口：报价 / 交易构建 / 价格。

pub mod jupiter;
pub mod serde_helpers;

use async_trait::async_trait;
use rust_decimal::Decimal;
use solana_sdk::pubkey::Pubkey;

pub use jupiter::{
    JupiterApiClient, JupiterError, QuoteRequest, QuoteResponse, RoutePlanStep, SwapRequest,
};

/// 路由报价与未签名交易的提供方。
#[async_trait]
pub trait QuoteProvider: Send + Sync {
    async fn quote(&self, request: &QuoteRequest) -> Result<QuoteResponse, JupiterError>;

    /// 为报价构建发往 `user` 的未签名交易字节。
    async fn swap_transaction(
        &self,
        quote: &QuoteResponse,
        user: &Pubkey,
    ) -> Result<Vec<u8>, JupiterError>;
}

/// USD 报价与可交易性查询。
#[async_trait]
pub trait PriceOracle: Send + Sync {
    async fn price_usd(&self, mint: &Pubkey) -> Result<Decimal, JupiterError>;

    async fn is_tradable(&self, mint: &Pubkey) -> Result<bool, JupiterError>;
}
