//! USD 价格与可交易代币列表。

use std::collections::HashSet;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde_json::Value;
use solana_sdk::pubkey::Pubkey;
use tracing::{debug, info};

use super::{JupiterApiClient, JupiterError, Stage};
use crate::api::PriceOracle;
use crate::api::serde_helpers::lenient_decimal;

/// 从 price v2 响应中取 `data[mint].price`。
pub(crate) fn extract_price(payload: &Value, mint: &Pubkey) -> Result<Decimal, JupiterError> {
    let key = mint.to_string();
    let entry = payload
        .get("data")
        .and_then(|data| data.get(&key))
        .filter(|entry| !entry.is_null())
        .ok_or_else(|| JupiterError::schema(format!("价格响应中没有 {key}")))?;
    entry
        .get("price")
        .and_then(lenient_decimal)
        .ok_or_else(|| JupiterError::schema(format!("{key} 的 price 字段缺失或非法")))
}

/// 可交易列表既可能是字符串数组，也可能是带 `address` 的对象数组。统一转小写。
pub(crate) fn parse_tradable(payload: &Value) -> Result<HashSet<String>, JupiterError> {
    let items = payload
        .as_array()
        .or_else(|| payload.get("data").and_then(Value::as_array))
        .ok_or_else(|| JupiterError::schema("可交易列表不是数组"))?;
    Ok(items
        .iter()
        .filter_map(|item| match item {
            Value::String(mint) => Some(mint.as_str()),
            other => other.get("address").and_then(Value::as_str),
        })
        .map(str::to_lowercase)
        .collect())
}

impl JupiterApiClient {
    async fn tradable_set(&self) -> Result<&HashSet<String>, JupiterError> {
        self.tradable
            .get_or_try_init(|| async {
                let builder = self.client.get(&self.tradable_url);
                let json = self
                    .execute(Stage::Tradable, &self.tradable_url, builder)
                    .await?;
                let set = parse_tradable(&json)?;
                info!(
                    target: "jupiter::price",
                    count = set.len(),
                    "已加载可交易代币列表"
                );
                Ok::<_, JupiterError>(set)
            })
            .await
    }
}

#[async_trait]
impl PriceOracle for JupiterApiClient {
    async fn price_usd(&self, mint: &Pubkey) -> Result<Decimal, JupiterError> {
        let builder = self
            .client
            .get(&self.price_url)
            .query(&[("ids", mint.to_string())]);
        let json = self.execute(Stage::Price, &self.price_url, builder).await?;
        let price = extract_price(&json, mint)?;
        debug!(target: "jupiter::price", mint = %mint, price = %price, "USD 价格");
        Ok(price)
    }

    async fn is_tradable(&self, mint: &Pubkey) -> Result<bool, JupiterError> {
        let set = self.tradable_set().await?;
        Ok(set.contains(&mint.to_string().to_lowercase()))
    }
}
