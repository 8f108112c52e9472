//! 兑换编排：精度 → 最小单位 → 报价 → 构建 → 签名 → 发送确认 → 手续费对账。

pub mod fees;
pub mod result;
pub mod signer;

use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;
use solana_sdk::hash::Hash;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;
use tracing::{debug, info, warn};

use crate::api::{QuoteProvider, QuoteRequest, QuoteResponse};
use crate::config::SwapConfig;
use crate::error::{SessionError, SessionResult};
use crate::rpc::{Commitment, ConnectionPool};
use crate::token::{DecimalResolver, base_units_to_ui, lamports_to_sol, ui_to_base_units};

pub use result::SwapResult;
pub use signer::{KeypairSigner, TransactionSigner, parse_keypair_string};

#[derive(Clone, Debug)]
pub struct SwapSettings {
    pub slippage_bps: u16,
    pub default_base_fee_lamports: u64,
    pub confirm_commitment: Commitment,
    pub confirm_timeout: Duration,
    pub poll_interval: Duration,
}

impl SwapSettings {
    pub fn from_config(config: &SwapConfig, rpc_commitment: Commitment) -> Self {
        Self {
            slippage_bps: config.slippage_bps,
            default_base_fee_lamports: config.default_base_fee_lamports,
            confirm_commitment: config.confirm_commitment.unwrap_or(rpc_commitment),
            confirm_timeout: Duration::from_millis(config.confirm_timeout_ms),
            poll_interval: Duration::from_millis(config.poll_interval_ms),
        }
    }
}

impl Default for SwapSettings {
    fn default() -> Self {
        Self::from_config(&SwapConfig::default(), Commitment::default())
    }
}

pub struct SwapOrchestrator {
    pool: Arc<ConnectionPool>,
    resolver: Arc<DecimalResolver>,
    quotes: Arc<dyn QuoteProvider>,
    signer: Arc<dyn TransactionSigner>,
    settings: SwapSettings,
}

impl SwapOrchestrator {
    pub fn new(
        pool: Arc<ConnectionPool>,
        resolver: Arc<DecimalResolver>,
        quotes: Arc<dyn QuoteProvider>,
        signer: Arc<dyn TransactionSigner>,
        settings: SwapSettings,
    ) -> Self {
        Self {
            pool,
            resolver,
            quotes,
            signer,
            settings,
        }
    }

    pub fn settings(&self) -> &SwapSettings {
        &self.settings
    }

    pub fn wallet(&self) -> Pubkey {
        self.signer.pubkey()
    }

    /// 只报价不下单，返回目标数量（UI 单位）与原始报价。
    pub async fn preview(
        &self,
        source_mint: &Pubkey,
        destination_mint: &Pubkey,
        amount: Decimal,
    ) -> SessionResult<(Decimal, QuoteResponse)> {
        if amount <= Decimal::ZERO {
            return Err(SessionError::validation(format!("兑换数量必须为正数: {amount}")));
        }
        let source_decimals = self.resolver.discover(source_mint).await?;
        let destination_decimals = self.resolver.discover(destination_mint).await?;
        let base_units = ui_to_base_units(amount, source_decimals)?;
        let quote = self.request_quote(source_mint, destination_mint, base_units).await?;
        let out_amount = required_out_amount(&quote)?;
        Ok((base_units_to_ui(out_amount, destination_decimals), quote))
    }

    /// 执行一次 ExactIn 兑换。步骤严格按序执行，任何会改变链上状态的调用之前完成校验与换算。
    pub async fn swap(
        &self,
        source_mint: &Pubkey,
        destination_mint: &Pubkey,
        amount: Decimal,
    ) -> SessionResult<SwapResult> {
        if amount <= Decimal::ZERO {
            return Err(SessionError::validation(format!("兑换数量必须为正数: {amount}")));
        }

        let source_decimals = self.resolver.discover(source_mint).await?;
        let destination_decimals = self.resolver.discover(destination_mint).await?;
        let base_units = ui_to_base_units(amount, source_decimals)?;

        let quote = self.request_quote(source_mint, destination_mint, base_units).await?;
        let out_amount = required_out_amount(&quote)?;

        let wallet = self.signer.pubkey();
        let unsigned = self.quotes.swap_transaction(&quote, &wallet).await?;
        let signed = self.signer.sign(&unsigned).map_err(SessionError::Signing)?;

        let primary = self.pool.primary();
        let signature = primary.send_raw_transaction(&signed).await?;
        info!(
            target: "swap",
            signature = %signature,
            source_mint = %source_mint,
            destination_mint = %destination_mint,
            amount = %amount,
            "交易已提交，等待确认"
        );
        primary
            .confirm_transaction(
                &signature,
                self.settings.confirm_commitment,
                self.settings.confirm_timeout,
                self.settings.poll_interval,
            )
            .await?;

        let network_fee_lamports = self.network_fee(&signature).await;
        let base_fee_lamports = self.base_fee(&wallet).await;
        let priority_fee_lamports = fees::priority_fee(network_fee_lamports, base_fee_lamports);

        let route_fees_by_mint = self.route_fees(&quote).await;
        let route_fee: Decimal = route_fees_by_mint.values().copied().sum();

        let result = SwapResult {
            signature,
            source_mint: *source_mint,
            destination_mint: *destination_mint,
            source_amount: amount,
            source_amount_base_units: base_units,
            destination_amount: base_units_to_ui(out_amount, destination_decimals),
            destination_amount_base_units: out_amount,
            route_fee,
            route_fees_by_mint,
            network_fee: lamports_to_sol(network_fee_lamports),
            network_fee_lamports,
            priority_fee: lamports_to_sol(priority_fee_lamports),
            priority_fee_lamports,
            price_impact_pct: quote.price_impact_pct,
            route_plan: quote.route_plan,
        };
        info!(
            target: "swap",
            signature = %result.signature,
            destination_amount = %result.destination_amount,
            network_fee_lamports,
            priority_fee_lamports,
            "兑换完成"
        );
        Ok(result)
    }

    async fn request_quote(
        &self,
        source_mint: &Pubkey,
        destination_mint: &Pubkey,
        base_units: u64,
    ) -> SessionResult<QuoteResponse> {
        let request = QuoteRequest::new(
            *source_mint,
            *destination_mint,
            base_units,
            self.settings.slippage_bps,
        );
        Ok(self.quotes.quote(&request).await?)
    }

    /// 交易详情缺失或查询失败时记 0 并告警，不影响兑换结果。
    async fn network_fee(&self, signature: &Signature) -> u64 {
        match self.pool.primary().transaction(signature).await {
            Ok(Some(transaction)) => fees::extract_fee(&transaction).unwrap_or_else(|| {
                warn!(target: "swap::fees", signature = %signature, "交易详情中没有 fee 字段，按 0 计");
                0
            }),
            Ok(None) => {
                warn!(target: "swap::fees", signature = %signature, "交易详情尚不可用，手续费按 0 计");
                0
            }
            Err(err) => {
                warn!(
                    target: "swap::fees",
                    signature = %signature,
                    error = %err,
                    "查询交易详情失败，手续费按 0 计"
                );
                0
            }
        }
    }

    /// 基础费依次取：区块哈希携带的每签名费用、`getFeeForMessage`、配置默认值。
    async fn base_fee(&self, payer: &Pubkey) -> u64 {
        let blockhash: Option<Hash> = match self.pool.freshness_token().await {
            Ok(token) => {
                if let Some(lamports) = token.lamports_per_signature {
                    return lamports;
                }
                Some(token.blockhash)
            }
            Err(err) => {
                debug!(target: "swap::fees", error = %err, "获取区块哈希失败，跳过基础费询价");
                None
            }
        };

        if let Some(blockhash) = blockhash {
            let message = fees::zero_instruction_message(payer, &blockhash);
            match self.pool.primary().fee_for_message(&message).await {
                Ok(Some(lamports)) => return lamports,
                Ok(None) => {
                    debug!(target: "swap::fees", "节点无法估算空消息费用");
                }
                Err(err) => {
                    debug!(target: "swap::fees", error = %err, "getFeeForMessage 失败");
                }
            }
        }

        self.settings.default_base_fee_lamports
    }

    /// 按费用币种换算为 UI 单位；精度无法确定的币种按 0 计。
    async fn route_fees(&self, quote: &QuoteResponse) -> BTreeMap<String, Decimal> {
        let mut totals: BTreeMap<String, Decimal> = BTreeMap::new();
        for (fee_mint, fee) in quote.fee_amounts_by_mint() {
            let decimals = match fee.decimals {
                Some(decimals) => Some(decimals),
                None => match Pubkey::from_str(&fee_mint) {
                    Ok(mint) => self.resolver.discover(&mint).await.ok(),
                    Err(_) => None,
                },
            };
            let Some(decimals) = decimals else {
                warn!(
                    target: "swap::fees",
                    fee_mint = %fee_mint,
                    fee_amount = fee.amount,
                    "无法确定费用币种精度，该币种费用按 0 计"
                );
                continue;
            };
            totals.insert(fee_mint, base_units_to_ui(fee.amount, decimals));
        }
        totals
    }
}

fn required_out_amount(quote: &QuoteResponse) -> SessionResult<u64> {
    quote
        .out_amount
        .ok_or_else(|| SessionError::SwapUnavailable("报价缺少 outAmount".to_string()))
}

#[cfg(test)]
pub(crate) mod testing;
