//! 测试用的报价、价格与签名替身。

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use reqwest::StatusCode;
use rust_decimal::Decimal;
use serde_json::Value;
use solana_sdk::pubkey::Pubkey;

use super::TransactionSigner;
use crate::api::{JupiterError, PriceOracle, QuoteProvider, QuoteRequest, QuoteResponse};

#[derive(Default)]
pub(crate) struct ScriptedQuotes {
    quote: Mutex<Option<Value>>,
    rate_limited: bool,
    pub quote_calls: AtomicUsize,
    pub swap_calls: AtomicUsize,
    pub last_request: Mutex<Option<QuoteRequest>>,
    pub last_user: Mutex<Option<Pubkey>>,
}

impl ScriptedQuotes {
    pub(crate) fn returning(quote: Value) -> Self {
        Self {
            quote: Mutex::new(Some(quote)),
            ..Self::default()
        }
    }

    pub(crate) fn rate_limited() -> Self {
        Self {
            rate_limited: true,
            ..Self::default()
        }
    }
}

#[async_trait]
impl QuoteProvider for ScriptedQuotes {
    async fn quote(&self, request: &QuoteRequest) -> Result<QuoteResponse, JupiterError> {
        self.quote_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_request.lock() = Some(request.clone());
        if self.rate_limited {
            return Err(JupiterError::RateLimited {
                endpoint: "mock://quote".to_string(),
                status: StatusCode::TOO_MANY_REQUESTS,
                body: "slow down".to_string(),
            });
        }
        let value = self.quote.lock().clone().unwrap_or(Value::Null);
        QuoteResponse::from_value(value)
    }

    async fn swap_transaction(
        &self,
        _quote: &QuoteResponse,
        user: &Pubkey,
    ) -> Result<Vec<u8>, JupiterError> {
        self.swap_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_user.lock() = Some(*user);
        Ok(vec![1, 2, 3])
    }
}

pub(crate) struct StaticSigner {
    pub wallet: Pubkey,
    fail: bool,
    pub calls: AtomicUsize,
}

impl StaticSigner {
    pub(crate) fn new(fail: bool) -> Self {
        Self {
            wallet: Pubkey::new_unique(),
            fail,
            calls: AtomicUsize::new(0),
        }
    }
}

impl TransactionSigner for StaticSigner {
    fn pubkey(&self) -> Pubkey {
        self.wallet
    }

    fn sign(&self, unsigned: &[u8]) -> anyhow::Result<Vec<u8>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            anyhow::bail!("hardware wallet rejected");
        }
        let mut signed = unsigned.to_vec();
        signed.push(0xff);
        Ok(signed)
    }
}

/// 固定价格表；不在 `tradable` 中的 mint 视为不可交易。
#[derive(Default)]
pub(crate) struct FixedPrices {
    pub prices: HashMap<Pubkey, Decimal>,
    pub tradable: HashSet<Pubkey>,
}

#[async_trait]
impl PriceOracle for FixedPrices {
    async fn price_usd(&self, mint: &Pubkey) -> Result<Decimal, JupiterError> {
        self.prices
            .get(mint)
            .copied()
            .ok_or_else(|| JupiterError::schema(format!("价格响应中没有 {mint}")))
    }

    async fn is_tradable(&self, mint: &Pubkey) -> Result<bool, JupiterError> {
        Ok(self.tradable.contains(mint))
    }
}
