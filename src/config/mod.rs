//! YAML 配置与环境变量覆盖。

pub mod loader;
pub mod types;

pub use loader::*;
pub use types::*;

use crate::rpc::Commitment;

pub(crate) fn default_rpc_commitment() -> Commitment {
    Commitment::Finalized
}

pub(crate) fn default_rpc_timeout_ms() -> u64 {
    8_000
}

pub(crate) fn default_quote_url() -> String {
    "https://lite-api.jup.ag/swap/v1/quote".to_string()
}

pub(crate) fn default_swap_url() -> String {
    "https://lite-api.jup.ag/swap/v1/swap".to_string()
}

pub(crate) fn default_price_url() -> String {
    "https://lite-api.jup.ag/price/v2".to_string()
}

pub(crate) fn default_tradable_url() -> String {
    "https://lite-api.jup.ag/tokens/v1/mints/tradable".to_string()
}

pub(crate) fn default_jupiter_timeout_ms() -> u64 {
    7_000
}

pub(crate) fn default_slow_warn_ms() -> u64 {
    1_500
}

pub(crate) fn default_slippage_bps() -> u16 {
    50
}

pub(crate) fn default_base_fee_lamports() -> u64 {
    5_000
}

pub(crate) fn default_confirm_timeout_ms() -> u64 {
    60_000
}

pub(crate) fn default_poll_interval_ms() -> u64 {
    500
}

pub(crate) fn default_wallet_file() -> String {
    "wallet.json".to_string()
}

pub(crate) fn default_logging_level() -> String {
    "info".to_string()
}
