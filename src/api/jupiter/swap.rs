use serde::Serialize;
use serde_json::Value;
use solana_sdk::pubkey::Pubkey;

use super::QuoteResponse;
use crate::api::serde_helpers::display_string;

/// `/swap` 请求体：原样回传报价，不自动包装/解包 SOL。
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SwapRequest<'a> {
    pub quote_response: &'a Value,
    #[serde(serialize_with = "display_string::serialize")]
    pub user_public_key: Pubkey,
    pub wrap_and_unwrap_sol: bool,
    pub as_legacy_transaction: bool,
}

impl<'a> SwapRequest<'a> {
    pub fn new(quote: &'a QuoteResponse, user_public_key: Pubkey) -> Self {
        Self {
            quote_response: &quote.raw,
            user_public_key,
            wrap_and_unwrap_sol: false,
            as_legacy_transaction: false,
        }
    }
}
