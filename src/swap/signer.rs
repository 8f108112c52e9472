use std::fs;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::{Keypair, Signer};
use solana_sdk::transaction::VersionedTransaction;
use tracing::info;

use crate::config::WalletConfig;

/// 对聚合器返回的未签名交易签名。
pub trait TransactionSigner: Send + Sync {
    fn pubkey(&self) -> Pubkey;

    fn sign(&self, unsigned: &[u8]) -> Result<Vec<u8>>;
}

/// 本地钱包签名器。
#[derive(Clone)]
pub struct KeypairSigner {
    keypair: Arc<Keypair>,
}

impl KeypairSigner {
    pub fn new(keypair: Keypair) -> Self {
        Self {
            keypair: Arc::new(keypair),
        }
    }

    /// `private_key` 优先，否则读取 `keypair_path` 指向的文件。
    pub fn from_config(config: &WalletConfig) -> Result<Self> {
        if let Some(raw) = config
            .private_key
            .as_deref()
            .filter(|raw| !raw.trim().is_empty())
        {
            let keypair = parse_keypair_string(raw).context("解析 wallet.private_key 失败")?;
            info!(target: "swap::signer", pubkey = %keypair.pubkey(), "已从配置加载钱包");
            return Ok(Self::new(keypair));
        }
        Self::from_file(Path::new(&config.keypair_path))
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("读取钱包文件 {} 失败", path.display()))?;
        let keypair = parse_keypair_string(&contents)
            .with_context(|| format!("解析钱包文件 {} 失败", path.display()))?;
        info!(
            target: "swap::signer",
            pubkey = %keypair.pubkey(),
            path = %path.display(),
            "已从文件加载钱包"
        );
        Ok(Self::new(keypair))
    }
}

impl TransactionSigner for KeypairSigner {
    fn pubkey(&self) -> Pubkey {
        self.keypair.pubkey()
    }

    fn sign(&self, unsigned: &[u8]) -> Result<Vec<u8>> {
        let (transaction, _): (VersionedTransaction, usize) =
            bincode::serde::decode_from_slice(unsigned, bincode::config::legacy())
                .context("反序列化未签名交易失败")?;
        let payer = transaction
            .message
            .static_account_keys()
            .first()
            .copied()
            .ok_or_else(|| anyhow!("交易缺少付款账户"))?;
        if payer != self.pubkey() {
            return Err(anyhow!("交易付款账户 {payer} 与钱包 {} 不一致", self.pubkey()));
        }
        let signer: &dyn Signer = self.keypair.as_ref();
        let signed = VersionedTransaction::try_new(transaction.message, &[signer])
            .context("交易签名失败")?;
        bincode::serde::encode_to_vec(&signed, bincode::config::legacy())
            .context("序列化已签名交易失败")
    }
}

/// 支持 JSON 字节数组、逗号分隔字节与 base58 三种格式。
pub fn parse_keypair_string(raw: &str) -> Result<Keypair> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        anyhow::bail!("私钥为空");
    }

    let bytes: Vec<u8> = if trimmed.starts_with('[') {
        serde_json::from_str(trimmed).context("私钥 JSON 数组格式非法")?
    } else if trimmed.contains(',') {
        trimmed
            .split(',')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(str::parse::<u8>)
            .collect::<Result<_, _>>()
            .context("私钥字节列表格式非法")?
    } else {
        bs58::decode(trimmed)
            .into_vec()
            .context("私钥 base58 解码失败")?
    };
    Keypair::try_from(bytes.as_slice()).map_err(|err| anyhow!("私钥长度或内容非法: {err}"))
}
