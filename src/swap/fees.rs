//! 从异构的交易详情中提取手续费，并拆分基础费与优先费。

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use serde_json::Value;
use solana_sdk::hash::Hash;
use solana_sdk::message::Message;
use solana_sdk::pubkey::Pubkey;

use crate::api::serde_helpers::lenient_u64;

/// 不同节点 / 客户端版本返回的 `fee` 所在位置。
const FEE_POINTERS: &[&str] = &[
    "/meta/fee",
    "/transaction/meta/fee",
    "/value/meta/fee",
    "/value/transaction/meta/fee",
    "/result/meta/fee",
];

pub fn extract_fee(transaction: &Value) -> Option<u64> {
    FEE_POINTERS
        .iter()
        .find_map(|pointer| transaction.pointer(pointer).and_then(lenient_u64))
}

pub fn priority_fee(actual_lamports: u64, base_lamports: u64) -> u64 {
    actual_lamports.saturating_sub(base_lamports)
}

/// 仅含付款人签名、没有任何指令的消息，用于 `getFeeForMessage` 询价。
pub fn zero_instruction_message(payer: &Pubkey, blockhash: &Hash) -> String {
    let message = Message::new_with_blockhash(&[], Some(payer), blockhash);
    BASE64.encode(message.serialize())
}
