use std::collections::BTreeMap;
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;
use solana_sdk::pubkey::Pubkey;
use url::Url;

use super::loader::ConfigError;
use crate::rpc::Commitment;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub rpc: RpcConfig,
    #[serde(default)]
    pub jupiter: JupiterConfig,
    #[serde(default)]
    pub swap: SwapConfig,
    #[serde(default)]
    pub wallet: WalletConfig,
    #[serde(default)]
    pub decimals: DecimalsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// 用环境变量覆盖文件配置：`RPC_PRIMARY` / `RPC_FALLBACK` / `WALLET_FILE` / `SLIPPAGE_BPS`。
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        if let Some(url) = read("RPC_PRIMARY") {
            self.rpc.primary_url = Some(url.trim().to_string());
        }
        if let Some(url) = read("RPC_FALLBACK") {
            self.rpc.backup_url = Some(url.trim().to_string());
        }
        if let Some(path) = read("WALLET_FILE") {
            self.wallet.keypair_path = path.trim().to_string();
        }
        if let Some(raw) = read("SLIPPAGE_BPS") {
            self.swap.slippage_bps = raw.trim().parse().map_err(|err| ConfigError::Env {
                key: "SLIPPAGE_BPS".to_string(),
                message: format!("{raw}: {err}"),
            })?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.rpc.primary_url().is_none() {
            return Err(ConfigError::Invalid(
                "缺少主 RPC 地址，请设置 rpc.primary_url 或 RPC_PRIMARY".to_string(),
            ));
        }
        let endpoints = [
            ("rpc.primary_url", self.rpc.primary_url()),
            ("rpc.backup_url", self.rpc.backup_url.as_deref()),
            ("jupiter.quote_url", Some(self.jupiter.quote_url.as_str())),
            ("jupiter.swap_url", Some(self.jupiter.swap_url.as_str())),
            ("jupiter.price_url", Some(self.jupiter.price_url.as_str())),
            ("jupiter.tradable_url", Some(self.jupiter.tradable_url.as_str())),
        ];
        for (field, value) in endpoints {
            let Some(raw) = value.map(str::trim).filter(|raw| !raw.is_empty()) else {
                continue;
            };
            Url::parse(raw)
                .map_err(|err| ConfigError::Invalid(format!("{field} 不是合法 URL ({raw}): {err}")))?;
        }
        if self.swap.slippage_bps > 10_000 {
            return Err(ConfigError::Invalid(format!(
                "swap.slippage_bps 超出范围: {}",
                self.swap.slippage_bps
            )));
        }
        self.decimals.parsed_overrides()?;
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RpcConfig {
    #[serde(default)]
    pub primary_url: Option<String>,
    #[serde(default)]
    pub backup_url: Option<String>,
    #[serde(default = "super::default_rpc_commitment")]
    pub commitment: Commitment,
    #[serde(default = "super::default_rpc_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            primary_url: None,
            backup_url: None,
            commitment: super::default_rpc_commitment(),
            timeout_ms: super::default_rpc_timeout_ms(),
        }
    }
}

impl RpcConfig {
    pub fn primary_url(&self) -> Option<&str> {
        self.primary_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct JupiterConfig {
    #[serde(default = "super::default_quote_url")]
    pub quote_url: String,
    #[serde(default = "super::default_swap_url")]
    pub swap_url: String,
    #[serde(default = "super::default_price_url")]
    pub price_url: String,
    #[serde(default = "super::default_tradable_url")]
    pub tradable_url: String,
    #[serde(default = "super::default_jupiter_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "super::default_slow_warn_ms")]
    pub slow_warn_ms: u64,
}

impl Default for JupiterConfig {
    fn default() -> Self {
        Self {
            quote_url: super::default_quote_url(),
            swap_url: super::default_swap_url(),
            price_url: super::default_price_url(),
            tradable_url: super::default_tradable_url(),
            timeout_ms: super::default_jupiter_timeout_ms(),
            slow_warn_ms: super::default_slow_warn_ms(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SwapConfig {
    #[serde(default = "super::default_slippage_bps")]
    pub slippage_bps: u16,
    /// 区块哈希与 `getFeeForMessage` 都拿不到基础费时使用。
    #[serde(default = "super::default_base_fee_lamports")]
    pub default_base_fee_lamports: u64,
    /// 未配置时沿用 `rpc.commitment`。
    #[serde(default)]
    pub confirm_commitment: Option<Commitment>,
    #[serde(default = "super::default_confirm_timeout_ms")]
    pub confirm_timeout_ms: u64,
    #[serde(default = "super::default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

impl Default for SwapConfig {
    fn default() -> Self {
        Self {
            slippage_bps: super::default_slippage_bps(),
            default_base_fee_lamports: super::default_base_fee_lamports(),
            confirm_commitment: None,
            confirm_timeout_ms: super::default_confirm_timeout_ms(),
            poll_interval_ms: super::default_poll_interval_ms(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct WalletConfig {
    /// JSON 字节数组文件；`private_key` 非空时忽略。
    #[serde(default = "super::default_wallet_file")]
    pub keypair_path: String,
    /// base58 或逗号分隔字节。
    #[serde(default)]
    pub private_key: Option<String>,
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self {
            keypair_path: super::default_wallet_file(),
            private_key: None,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DecimalsConfig {
    /// 追加到内置精度表的 mint → decimals。
    #[serde(default)]
    pub overrides: BTreeMap<String, u8>,
}

impl DecimalsConfig {
    pub fn parsed_overrides(&self) -> Result<Vec<(Pubkey, u8)>, ConfigError> {
        self.overrides
            .iter()
            .map(|(mint, decimals)| {
                Pubkey::from_str(mint.trim())
                    .map(|pubkey| (pubkey, *decimals))
                    .map_err(|err| {
                        ConfigError::Invalid(format!("decimals.overrides 中的 mint {mint} 非法: {err}"))
                    })
            })
            .collect()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "super::default_logging_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: super::default_logging_level(),
            json: false,
        }
    }
}
