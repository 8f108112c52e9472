use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use serde_json::{Value, json};
use solana_client::rpc_request::RpcRequest;
use solana_sdk::hash::Hash;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;
use tokio::time::Instant;
use tracing::{debug, trace};

use super::error::{RpcError, RpcResult};
use super::transport::RpcTransport;
use super::{Commitment, Role};

/// `getLatestBlockhash` 的解析结果。
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlockhashInfo {
    pub blockhash: Hash,
    pub last_valid_block_height: Option<u64>,
    /// 部分节点仍随区块哈希返回 `feeCalculator.lamportsPerSignature`。
    pub lamports_per_signature: Option<u64>,
}

/// 单笔签名的确认状态。
#[derive(Clone, Debug, PartialEq)]
pub struct SignatureState {
    pub confirmation: Option<Commitment>,
    pub err: Option<Value>,
}

/// `getTokenAccountsByOwner` 的过滤条件。
#[derive(Clone, Copy, Debug)]
pub enum TokenAccountFilter {
    Mint(Pubkey),
    Program(Pubkey),
}

impl TokenAccountFilter {
    fn to_value(self) -> Value {
        match self {
            TokenAccountFilter::Mint(mint) => json!({ "mint": mint.to_string() }),
            TokenAccountFilter::Program(program) => json!({ "programId": program.to_string() }),
        }
    }
}

/// 连接句柄：endpoint + 角色 + 一致性级别，构造后不可变，克隆共享底层传输。
#[derive(Clone)]
pub struct ConnectionHandle {
    role: Role,
    commitment: Commitment,
    transport: Arc<dyn RpcTransport>,
}

impl fmt::Debug for ConnectionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionHandle")
            .field("role", &self.role)
            .field("commitment", &self.commitment)
            .field("url", &self.transport.url())
            .finish()
    }
}

impl ConnectionHandle {
    pub fn new(role: Role, commitment: Commitment, transport: Arc<dyn RpcTransport>) -> Self {
        Self {
            role,
            commitment,
            transport,
        }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn commitment(&self) -> Commitment {
        self.commitment
    }

    pub fn url(&self) -> String {
        self.transport.url()
    }

    pub async fn call(&self, request: RpcRequest, params: Value) -> RpcResult<Value> {
        trace!(
            target: "rpc::handle",
            role = %self.role,
            method = %request,
            "RPC 调用"
        );
        self.transport.send(request, params).await
    }

    pub async fn latest_blockhash(&self) -> RpcResult<BlockhashInfo> {
        let request = RpcRequest::GetLatestBlockhash;
        let result = self
            .call(request, json!([{ "commitment": self.commitment.as_str() }]))
            .await?;
        parse_blockhash(request, &result)
    }

    pub async fn token_supply_decimals(&self, mint: &Pubkey) -> RpcResult<u8> {
        let request = RpcRequest::GetTokenSupply;
        let result = self
            .call(
                request,
                json!([mint.to_string(), { "commitment": self.commitment.as_str() }]),
            )
            .await?;
        let decimals = unwrap_value(&result)
            .get("decimals")
            .ok_or_else(|| RpcError::schema(request, "缺少 decimals 字段"))?;
        decimals_from_value(request, decimals)
    }

    pub async fn parsed_mint_decimals(&self, mint: &Pubkey) -> RpcResult<u8> {
        let request = RpcRequest::GetAccountInfo;
        let result = self
            .call(
                request,
                json!([
                    mint.to_string(),
                    { "encoding": "jsonParsed", "commitment": self.commitment.as_str() }
                ]),
            )
            .await?;
        let account = unwrap_value(&result);
        if account.is_null() {
            return Err(RpcError::schema(request, format!("账户 {mint} 不存在")));
        }
        let decimals = account
            .pointer("/data/parsed/info/decimals")
            .ok_or_else(|| RpcError::schema(request, "缺少 data.parsed.info.decimals"))?;
        decimals_from_value(request, decimals)
    }

    pub async fn raw_account_data(&self, address: &Pubkey) -> RpcResult<Vec<u8>> {
        let request = RpcRequest::GetAccountInfo;
        let result = self
            .call(
                request,
                json!([
                    address.to_string(),
                    { "encoding": "base64", "commitment": self.commitment.as_str() }
                ]),
            )
            .await?;
        let account = unwrap_value(&result);
        if account.is_null() {
            return Err(RpcError::schema(request, format!("账户 {address} 不存在")));
        }
        let encoded = match account.get("data") {
            Some(Value::Array(parts)) => parts.first().and_then(Value::as_str),
            Some(Value::String(raw)) => Some(raw.as_str()),
            _ => None,
        }
        .ok_or_else(|| RpcError::schema(request, "缺少 base64 账户数据"))?;
        BASE64
            .decode(encoded)
            .map_err(|err| RpcError::schema(request, format!("base64 解码失败: {err}")))
    }

    /// 估算消息手续费；节点无法估算时返回 `None`。
    pub async fn fee_for_message(&self, message_base64: &str) -> RpcResult<Option<u64>> {
        let request = RpcRequest::GetFeeForMessage;
        let result = self
            .call(
                request,
                json!([message_base64, { "commitment": self.commitment.as_str() }]),
            )
            .await?;
        Ok(u64_from_value(unwrap_value(&result)))
    }

    pub async fn send_raw_transaction(&self, signed: &[u8]) -> RpcResult<Signature> {
        let request = RpcRequest::SendTransaction;
        let result = self
            .call(
                request,
                json!([
                    BASE64.encode(signed),
                    {
                        "encoding": "base64",
                        "skipPreflight": false,
                        "preflightCommitment": Commitment::Processed.as_str(),
                    }
                ]),
            )
            .await?;
        let raw = result
            .as_str()
            .ok_or_else(|| RpcError::schema(request, "返回值不是签名字符串"))?;
        Signature::from_str(raw)
            .map_err(|err| RpcError::schema(request, format!("签名解析失败: {err}")))
    }

    pub async fn signature_status(&self, signature: &Signature) -> RpcResult<Option<SignatureState>> {
        let request = RpcRequest::GetSignatureStatuses;
        let result = self
            .call(
                request,
                json!([[signature.to_string()], { "searchTransactionHistory": false }]),
            )
            .await?;
        let entry = unwrap_value(&result)
            .as_array()
            .and_then(|entries| entries.first())
            .cloned()
            .unwrap_or(Value::Null);
        if entry.is_null() {
            return Ok(None);
        }
        let confirmation = entry
            .get("confirmationStatus")
            .and_then(Value::as_str)
            .and_then(Commitment::from_status);
        let err = entry.get("err").filter(|err| !err.is_null()).cloned();
        Ok(Some(SignatureState { confirmation, err }))
    }

    /// 轮询签名状态直到达到 `target`；链上执行失败或超过 `timeout` 均返回错误。
    pub async fn confirm_transaction(
        &self,
        signature: &Signature,
        target: Commitment,
        timeout: Duration,
        poll_interval: Duration,
    ) -> RpcResult<()> {
        let deadline = Instant::now() + timeout;
        loop {
            match self.signature_status(signature).await {
                Ok(Some(state)) => {
                    if let Some(err) = state.err {
                        return Err(RpcError::TransactionFailed {
                            signature: signature.to_string(),
                            detail: err.to_string(),
                        });
                    }
                    if state.confirmation.is_some_and(|level| level >= target) {
                        return Ok(());
                    }
                }
                Ok(None) => {}
                Err(err) => {
                    debug!(
                        target: "rpc::handle",
                        signature = %signature,
                        error = %err,
                        "查询签名状态失败，继续轮询"
                    );
                }
            }

            if Instant::now() + poll_interval > deadline {
                return Err(RpcError::ConfirmationTimeout {
                    signature: signature.to_string(),
                    commitment: target.to_string(),
                    timeout_ms: timeout.as_millis() as u64,
                });
            }
            tokio::time::sleep(poll_interval).await;
        }
    }

    /// 拉取交易详情；`getTransaction` 不支持 processed，至少使用 confirmed。
    pub async fn transaction(&self, signature: &Signature) -> RpcResult<Option<Value>> {
        let commitment = self.commitment.max(Commitment::Confirmed);
        let result = self
            .call(
                RpcRequest::GetTransaction,
                json!([
                    signature.to_string(),
                    {
                        "encoding": "json",
                        "commitment": commitment.as_str(),
                        "maxSupportedTransactionVersion": 0,
                    }
                ]),
            )
            .await?;
        Ok(if result.is_null() { None } else { Some(result) })
    }

    pub async fn balance(&self, owner: &Pubkey) -> RpcResult<u64> {
        let request = RpcRequest::GetBalance;
        let result = self
            .call(
                request,
                json!([owner.to_string(), { "commitment": self.commitment.as_str() }]),
            )
            .await?;
        u64_from_value(unwrap_value(&result))
            .ok_or_else(|| RpcError::schema(request, "余额字段缺失"))
    }

    pub async fn token_accounts_by_owner(
        &self,
        owner: &Pubkey,
        filter: TokenAccountFilter,
    ) -> RpcResult<Vec<Value>> {
        let request = RpcRequest::GetTokenAccountsByOwner;
        let result = self
            .call(
                request,
                json!([
                    owner.to_string(),
                    filter.to_value(),
                    { "encoding": "jsonParsed", "commitment": self.commitment.as_str() }
                ]),
            )
            .await?;
        match unwrap_value(&result) {
            Value::Array(accounts) => Ok(accounts.clone()),
            Value::Null => Ok(Vec::new()),
            _ => Err(RpcError::schema(request, "value 不是数组")),
        }
    }
}

/// RPC 响应多为 `{context, value}`，也兼容直接返回值的节点。
fn unwrap_value(result: &Value) -> &Value {
    match result {
        Value::Object(map) if map.contains_key("value") => &map["value"],
        other => other,
    }
}

fn u64_from_value(value: &Value) -> Option<u64> {
    match value {
        Value::Number(number) => number.as_u64(),
        Value::String(raw) => raw.trim().parse().ok(),
        _ => None,
    }
}

fn decimals_from_value(request: RpcRequest, value: &Value) -> RpcResult<u8> {
    let raw = u64_from_value(value)
        .ok_or_else(|| RpcError::schema(request, format!("decimals 非整数: {value}")))?;
    u8::try_from(raw).map_err(|_| RpcError::schema(request, format!("decimals 超出范围: {raw}")))
}

fn parse_blockhash(request: RpcRequest, result: &Value) -> RpcResult<BlockhashInfo> {
    let value = unwrap_value(result);
    let raw = value
        .get("blockhash")
        .and_then(Value::as_str)
        .ok_or_else(|| RpcError::schema(request, "缺少 blockhash 字段"))?;
    let blockhash = Hash::from_str(raw)
        .map_err(|err| RpcError::schema(request, format!("blockhash 解析失败: {err}")))?;
    let last_valid_block_height = value.get("lastValidBlockHeight").and_then(u64_from_value);
    let lamports_per_signature = value
        .pointer("/feeCalculator/lamportsPerSignature")
        .or_else(|| value.get("lamportsPerSignature"))
        .and_then(u64_from_value);
    Ok(BlockhashInfo {
        blockhash,
        last_valid_block_height,
        lamports_per_signature,
    })
}
