use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::Serialize;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;

use crate::api::RoutePlanStep;
use crate::api::serde_helpers::display_string;

/// 一次成功兑换的对账结果。金额字段均为 UI 单位，`*_lamports` / `*_base_units` 为原始值。
#[derive(Debug, Clone, Serialize)]
pub struct SwapResult {
    #[serde(serialize_with = "display_string::serialize")]
    pub signature: Signature,
    #[serde(serialize_with = "display_string::serialize")]
    pub source_mint: Pubkey,
    #[serde(serialize_with = "display_string::serialize")]
    pub destination_mint: Pubkey,
    pub source_amount: Decimal,
    pub source_amount_base_units: u64,
    pub destination_amount: Decimal,
    pub destination_amount_base_units: u64,
    /// 各跳费用按各自费用币种换算后直接相加。
    pub route_fee: Decimal,
    pub route_fees_by_mint: BTreeMap<String, Decimal>,
    pub network_fee: Decimal,
    pub network_fee_lamports: u64,
    pub priority_fee: Decimal,
    pub priority_fee_lamports: u64,
    pub price_impact_pct: Option<Decimal>,
    pub route_plan: Vec<RoutePlanStep>,
}

impl SwapResult {
    pub fn route_labels(&self) -> Vec<String> {
        self.route_plan
            .iter()
            .map(RoutePlanStep::display_label)
            .collect()
    }
}
