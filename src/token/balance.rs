use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::Arc;

use rust_decimal::Decimal;
use serde_json::Value;
use solana_sdk::pubkey::Pubkey;
use tracing::{debug, warn};

use super::amount::{base_units_to_ui, lamports_to_sol};
use super::decimals::DecimalResolver;
use crate::error::SessionResult;
use crate::rpc::{ConnectionHandle, TokenAccountFilter};

/// `jsonParsed` 代币账户中的一条持仓。
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct TokenHolding {
    pub mint: Pubkey,
    pub amount: u64,
    pub decimals: Option<u8>,
}

impl TokenHolding {
    pub(crate) fn from_account(entry: &Value) -> Option<Self> {
        let info = entry.pointer("/account/data/parsed/info")?;
        let mint = Pubkey::from_str(info.get("mint")?.as_str()?).ok()?;
        let token_amount = info.get("tokenAmount")?;
        let amount = token_amount.get("amount")?.as_str()?.parse().ok()?;
        let decimals = token_amount
            .get("decimals")
            .and_then(Value::as_u64)
            .and_then(|raw| u8::try_from(raw).ok());
        Some(Self {
            mint,
            amount,
            decimals,
        })
    }
}

/// SPL Token 与 Token-2022 程序地址。
pub fn token_programs() -> [Pubkey; 2] {
    [
        Pubkey::new_from_array(spl_token::ID.to_bytes()),
        Pubkey::new_from_array(spl_token_2022::ID.to_bytes()),
    ]
}

/// 余额查询，统一走主节点。
#[derive(Clone)]
pub struct BalanceReader {
    handle: ConnectionHandle,
    resolver: Arc<DecimalResolver>,
}

impl BalanceReader {
    pub fn new(handle: ConnectionHandle, resolver: Arc<DecimalResolver>) -> Self {
        Self { handle, resolver }
    }

    /// SOL 余额。
    pub async fn native_balance(&self, owner: &Pubkey) -> SessionResult<Decimal> {
        let lamports = self.handle.balance(owner).await?;
        Ok(lamports_to_sol(lamports))
    }

    /// 某个 mint 在 owner 名下所有代币账户的合计余额。
    pub async fn ui_balance(&self, mint: &Pubkey, owner: &Pubkey) -> SessionResult<Decimal> {
        let accounts = self
            .handle
            .token_accounts_by_owner(owner, TokenAccountFilter::Mint(*mint))
            .await?;
        let mut total: u64 = 0;
        for entry in &accounts {
            match TokenHolding::from_account(entry) {
                Some(holding) => total = total.saturating_add(holding.amount),
                None => warn!(
                    target: "token::balance",
                    mint = %mint,
                    owner = %owner,
                    "代币账户结构无法解析，已跳过"
                ),
            }
        }
        let decimals = self.resolver.discover(mint).await?;
        Ok(base_units_to_ui(total, decimals))
    }

    /// 钱包在 SPL Token 与 Token-2022 下的全部持仓，按 mint 合并。
    pub async fn wallet_token_balances(
        &self,
        owner: &Pubkey,
    ) -> SessionResult<BTreeMap<Pubkey, Decimal>> {
        let mut raw_totals: BTreeMap<Pubkey, u64> = BTreeMap::new();
        for program in token_programs() {
            let accounts = self
                .handle
                .token_accounts_by_owner(owner, TokenAccountFilter::Program(program))
                .await?;
            debug!(
                target: "token::balance",
                owner = %owner,
                program = %program,
                accounts = accounts.len(),
                "已拉取代币账户"
            );
            for holding in accounts.iter().filter_map(TokenHolding::from_account) {
                if let Some(decimals) = holding.decimals {
                    self.resolver.seed(holding.mint, decimals);
                }
                let entry = raw_totals.entry(holding.mint).or_insert(0);
                *entry = entry.saturating_add(holding.amount);
            }
        }

        let mut balances = BTreeMap::new();
        for (mint, amount) in raw_totals {
            let decimals = self.resolver.discover(&mint).await?;
            balances.insert(mint, base_units_to_ui(amount, decimals));
        }
        Ok(balances)
    }
}
