use std::collections::HashMap;
use std::str::FromStr;

use dashmap::DashMap;
use once_cell::sync::Lazy;
use solana_client::rpc_request::RpcRequest;
use solana_sdk::pubkey::Pubkey;
use tracing::{debug, trace};

use crate::error::{SessionError, SessionResult};
use crate::rpc::{ConnectionHandle, RpcError, RpcResult};

/// SPL Mint 布局中 `decimals` 字节的偏移量。
pub const MINT_DECIMALS_OFFSET: usize = 44;

static WELL_KNOWN_DECIMALS: Lazy<HashMap<Pubkey, u8>> = Lazy::new(|| {
    [
        ("So11111111111111111111111111111111111111112", 9),
        ("EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v", 6),
        ("Es9vMFrzaCERmJfrF4H2FYD4KCoNkY11McCe8BenwNYB", 6),
        ("3NZ9JMVBmGAqocybic2c7LQCJScmgsAZ6vQqTDzcqmJh", 8),
    ]
    .into_iter()
    .filter_map(|(mint, decimals)| Pubkey::from_str(mint).ok().map(|key| (key, decimals)))
    .collect()
});

/// 精度来源，按声明顺序尝试。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Source {
    TokenSupply,
    ParsedAccount,
    RawAccount,
}

impl Source {
    const CHAIN: [Source; 3] = [Source::TokenSupply, Source::ParsedAccount, Source::RawAccount];

    fn as_str(self) -> &'static str {
        match self {
            Source::TokenSupply => "getTokenSupply",
            Source::ParsedAccount => "getAccountInfo(jsonParsed)",
            Source::RawAccount => "getAccountInfo(base64)",
        }
    }

    async fn query(self, handle: &ConnectionHandle, mint: &Pubkey) -> RpcResult<u8> {
        match self {
            Source::TokenSupply => handle.token_supply_decimals(mint).await,
            Source::ParsedAccount => handle.parsed_mint_decimals(mint).await,
            Source::RawAccount => {
                let data = handle.raw_account_data(mint).await?;
                data.get(MINT_DECIMALS_OFFSET).copied().ok_or_else(|| {
                    RpcError::schema(
                        RpcRequest::GetAccountInfo,
                        format!("账户数据仅 {} 字节，不是 Mint 布局", data.len()),
                    )
                })
            }
        }
    }
}

/// 按 mint 发现并缓存代币精度。
///
/// 每一步先问主节点再问备节点，全部失败才进入下一步；链上手段用尽后查内置表。
/// 缓存条目写入后不再变化，也不会被淘汰。
pub struct DecimalResolver {
    primary: ConnectionHandle,
    backup: ConnectionHandle,
    cache: DashMap<Pubkey, u8>,
    known: HashMap<Pubkey, u8>,
}

impl DecimalResolver {
    pub fn new(primary: ConnectionHandle, backup: ConnectionHandle) -> Self {
        Self {
            primary,
            backup,
            cache: DashMap::new(),
            known: WELL_KNOWN_DECIMALS.clone(),
        }
    }

    /// 追加或覆盖内置精度表。
    pub fn with_overrides(mut self, overrides: impl IntoIterator<Item = (Pubkey, u8)>) -> Self {
        self.known.extend(overrides);
        self
    }

    pub fn cached(&self, mint: &Pubkey) -> Option<u8> {
        self.cache.get(mint).map(|entry| *entry)
    }

    /// 预置已知精度；已缓存的条目保持不变。
    pub fn seed(&self, mint: Pubkey, decimals: u8) {
        self.cache.entry(mint).or_insert(decimals);
    }

    pub async fn discover(&self, mint: &Pubkey) -> SessionResult<u8> {
        if let Some(decimals) = self.cached(mint) {
            trace!(target: "token::decimals", mint = %mint, decimals, "命中精度缓存");
            return Ok(decimals);
        }

        let decimals = self.resolve(mint).await?;
        self.cache.insert(*mint, decimals);
        Ok(decimals)
    }

    async fn resolve(&self, mint: &Pubkey) -> SessionResult<u8> {
        for source in Source::CHAIN {
            for handle in [&self.primary, &self.backup] {
                match source.query(handle, mint).await {
                    Ok(decimals) => {
                        debug!(
                            target: "token::decimals",
                            mint = %mint,
                            decimals,
                            source = source.as_str(),
                            role = %handle.role(),
                            "已确定代币精度"
                        );
                        return Ok(decimals);
                    }
                    Err(err) => {
                        debug!(
                            target: "token::decimals",
                            mint = %mint,
                            source = source.as_str(),
                            role = %handle.role(),
                            error = %err,
                            "精度查询失败，尝试下一来源"
                        );
                    }
                }
            }
        }

        if let Some(decimals) = self.known.get(mint).copied() {
            debug!(target: "token::decimals", mint = %mint, decimals, "使用内置精度表");
            return Ok(decimals);
        }

        Err(SessionError::AttributeUnavailable { mint: *mint })
    }
}
