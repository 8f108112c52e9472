use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::Value;
use solana_sdk::pubkey::Pubkey;

use super::JupiterError;
use crate::api::serde_helpers::{lenient_decimal, lenient_u64};

/// `/quote` 请求，使用查询字符串传参（ExactIn）。
#[derive(Debug, Clone)]
pub struct QuoteRequest {
    pub input_mint: Pubkey,
    pub output_mint: Pubkey,
    pub amount: u64,
    pub slippage_bps: u16,
}

impl QuoteRequest {
    pub fn new(input_mint: Pubkey, output_mint: Pubkey, amount: u64, slippage_bps: u16) -> Self {
        Self {
            input_mint,
            output_mint,
            amount,
            slippage_bps,
        }
    }

    pub fn to_query_params(&self) -> Vec<(&'static str, String)> {
        vec![
            ("inputMint", self.input_mint.to_string()),
            ("outputMint", self.output_mint.to_string()),
            ("amount", self.amount.to_string()),
            ("slippageBps", self.slippage_bps.to_string()),
        ]
    }
}

/// 路由中的一跳。
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RoutePlanStep {
    pub label: Option<String>,
    pub amm_key: Option<String>,
    pub input_mint: Option<String>,
    pub output_mint: Option<String>,
    pub in_amount: Option<u64>,
    pub out_amount: Option<u64>,
    pub fee_amount: Option<u64>,
    pub fee_mint: Option<String>,
    /// 聚合器偶尔直接给出费用币种精度。
    pub fee_mint_decimals: Option<u8>,
    pub percent: Option<u8>,
}

impl RoutePlanStep {
    /// 兼容 `swapInfo` / `ammInfo` 两种包裹以及新旧字段名。
    pub fn from_value(value: &Value) -> Self {
        let info = value
            .get("swapInfo")
            .or_else(|| value.get("ammInfo"))
            .unwrap_or(value);
        let text = |keys: &[&str]| {
            keys.iter()
                .find_map(|key| info.get(*key).and_then(Value::as_str))
                .map(str::to_string)
        };
        let number = |key: &str| info.get(key).and_then(lenient_u64);
        Self {
            label: text(&["label", "dexLabel", "dex"]),
            amm_key: text(&["ammKey", "dexAddress", "source"]),
            input_mint: text(&["inputMint"]),
            output_mint: text(&["outputMint"]),
            in_amount: number("inAmount"),
            out_amount: number("outAmount"),
            fee_amount: number("feeAmount"),
            fee_mint: text(&["feeMint"]),
            fee_mint_decimals: number("feeMintDecimals").and_then(|raw| u8::try_from(raw).ok()),
            percent: value
                .get("percent")
                .and_then(lenient_u64)
                .and_then(|raw| u8::try_from(raw).ok()),
        }
    }

    /// 形如 `Raydium (58oQ…)` 的展示名。
    pub fn display_label(&self) -> String {
        let label = self.label.as_deref().unwrap_or("unknown");
        match self.amm_key.as_deref() {
            Some(key) if key.chars().count() > 4 => {
                let prefix: String = key.chars().take(4).collect();
                format!("{label} ({prefix}…)")
            }
            Some(key) => format!("{label} ({key})"),
            None => label.to_string(),
        }
    }
}

/// 宽松解析的报价：只有 `outAmount` 由调用方强制要求。
#[derive(Debug, Clone)]
pub struct QuoteResponse {
    pub in_amount: Option<u64>,
    pub out_amount: Option<u64>,
    pub slippage_bps: Option<u16>,
    pub price_impact_pct: Option<Decimal>,
    pub route_plan: Vec<RoutePlanStep>,
    /// 原始报价，构建交易时原样回传。
    pub raw: Value,
}

impl QuoteResponse {
    /// 接受平铺结构，也接受旧版 `{"data": [quote, ...]}`（取第一条）。
    pub fn from_value(value: Value) -> Result<Self, JupiterError> {
        let raw = match value {
            Value::Object(mut map) if !map.contains_key("outAmount") && map.contains_key("data") => {
                match map.remove("data") {
                    Some(Value::Array(mut items)) if !items.is_empty() => items.swap_remove(0),
                    Some(Value::Object(inner)) => Value::Object(inner),
                    _ => return Err(JupiterError::schema("data 中没有可用报价")),
                }
            }
            Value::Object(map) => Value::Object(map),
            other => {
                return Err(JupiterError::schema(format!(
                    "报价不是 JSON 对象: {}",
                    type_name(&other)
                )));
            }
        };

        let route_plan = raw
            .get("routePlan")
            .or_else(|| raw.get("marketInfos"))
            .and_then(Value::as_array)
            .map(|steps| steps.iter().map(RoutePlanStep::from_value).collect())
            .unwrap_or_default();

        Ok(Self {
            in_amount: raw.get("inAmount").and_then(lenient_u64),
            out_amount: raw.get("outAmount").and_then(lenient_u64),
            slippage_bps: raw
                .get("slippageBps")
                .and_then(lenient_u64)
                .and_then(|raw| u16::try_from(raw).ok()),
            price_impact_pct: raw.get("priceImpactPct").and_then(lenient_decimal),
            route_plan,
            raw,
        })
    }

    /// 按费用币种汇总各跳的原始费用，精度取任一跳给出的 `feeMintDecimals`。
    pub fn fee_amounts_by_mint(&self) -> BTreeMap<String, RouteFee> {
        let mut totals: BTreeMap<String, RouteFee> = BTreeMap::new();
        for step in &self.route_plan {
            if let (Some(mint), Some(amount)) = (step.fee_mint.as_ref(), step.fee_amount) {
                let entry = totals.entry(mint.clone()).or_default();
                entry.amount = entry.amount.saturating_add(amount);
                entry.decimals = entry.decimals.or(step.fee_mint_decimals);
            }
        }
        totals
    }
}

/// 同一费用币种的原始费用合计。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RouteFee {
    pub amount: u64,
    pub decimals: Option<u8>,
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
