//! 由配置装配出的完整会话：连接池、精度解析、余额、价格与兑换。

use std::collections::BTreeMap;
use std::sync::Arc;

use rust_decimal::Decimal;
use solana_sdk::pubkey::Pubkey;
use tracing::{debug, info};

use crate::api::{JupiterApiClient, PriceOracle, QuoteProvider, QuoteResponse};
use crate::config::AppConfig;
use crate::error::{SessionError, SessionResult};
use crate::rpc::ConnectionPool;
use crate::swap::{KeypairSigner, SwapOrchestrator, SwapResult, SwapSettings, TransactionSigner};
use crate::token::{BalanceReader, DecimalResolver};

pub struct Session {
    pool: Arc<ConnectionPool>,
    resolver: Arc<DecimalResolver>,
    balances: BalanceReader,
    prices: Arc<dyn PriceOracle>,
    orchestrator: SwapOrchestrator,
}

impl Session {
    /// 按配置建立会话，必须在 tokio 运行时内调用。
    pub fn connect(config: &AppConfig) -> SessionResult<Self> {
        config.validate().map_err(SessionError::config)?;

        let pool = Arc::new(ConnectionPool::initialize(
            config.rpc.primary_url(),
            config.rpc.backup_url.as_deref(),
            config.rpc.commitment,
            config.rpc.request_timeout(),
        )?);
        let overrides = config
            .decimals
            .parsed_overrides()
            .map_err(SessionError::config)?;
        let resolver = Arc::new(
            DecimalResolver::new(pool.primary().clone(), pool.backup().clone())
                .with_overrides(overrides),
        );
        let jupiter = Arc::new(JupiterApiClient::from_config(&config.jupiter)?);
        let signer = KeypairSigner::from_config(&config.wallet)
            .map_err(|err| SessionError::config(format!("{err:#}")))?;
        let settings = SwapSettings::from_config(&config.swap, config.rpc.commitment);

        info!(
            target: "session",
            wallet = %signer.pubkey(),
            slippage_bps = settings.slippage_bps,
            "会话已建立"
        );
        Ok(Self::from_parts(
            pool,
            resolver,
            jupiter.clone(),
            jupiter,
            Arc::new(signer),
            settings,
        ))
    }

    pub fn from_parts(
        pool: Arc<ConnectionPool>,
        resolver: Arc<DecimalResolver>,
        quotes: Arc<dyn QuoteProvider>,
        prices: Arc<dyn PriceOracle>,
        signer: Arc<dyn TransactionSigner>,
        settings: SwapSettings,
    ) -> Self {
        let balances = BalanceReader::new(pool.primary().clone(), Arc::clone(&resolver));
        let orchestrator = SwapOrchestrator::new(
            Arc::clone(&pool),
            Arc::clone(&resolver),
            quotes,
            signer,
            settings,
        );
        Self {
            pool,
            resolver,
            balances,
            prices,
            orchestrator,
        }
    }

    pub fn wallet(&self) -> Pubkey {
        self.orchestrator.wallet()
    }

    pub fn pool(&self) -> &ConnectionPool {
        &self.pool
    }

    pub fn resolver(&self) -> &DecimalResolver {
        &self.resolver
    }

    pub fn orchestrator(&self) -> &SwapOrchestrator {
        &self.orchestrator
    }

    pub async fn decimals(&self, mint: &Pubkey) -> SessionResult<u8> {
        self.resolver.discover(mint).await
    }

    pub async fn native_balance(&self) -> SessionResult<Decimal> {
        self.balances.native_balance(&self.wallet()).await
    }

    pub async fn ui_balance(&self, mint: &Pubkey) -> SessionResult<Decimal> {
        self.balances.ui_balance(mint, &self.wallet()).await
    }

    pub async fn wallet_token_balances(&self) -> SessionResult<BTreeMap<Pubkey, Decimal>> {
        self.balances.wallet_token_balances(&self.wallet()).await
    }

    pub async fn pair_balances(
        &self,
        source_mint: &Pubkey,
        destination_mint: &Pubkey,
    ) -> SessionResult<(Decimal, Decimal)> {
        let source = self.ui_balance(source_mint).await?;
        let destination = self.ui_balance(destination_mint).await?;
        Ok((source, destination))
    }

    pub async fn is_tradable(&self, mint: &Pubkey) -> SessionResult<bool> {
        Ok(self.prices.is_tradable(mint).await?)
    }

    /// 不可交易的 mint 报价为 0。
    pub async fn price_usd(&self, mint: &Pubkey) -> SessionResult<Decimal> {
        if !self.is_tradable(mint).await? {
            debug!(target: "session", mint = %mint, "mint 不可交易，价格按 0 计");
            return Ok(Decimal::ZERO);
        }
        Ok(self.prices.price_usd(mint).await?)
    }

    pub async fn quote(
        &self,
        source_mint: &Pubkey,
        destination_mint: &Pubkey,
        amount: Decimal,
    ) -> SessionResult<(Decimal, QuoteResponse)> {
        self.orchestrator
            .preview(source_mint, destination_mint, amount)
            .await
    }

    pub async fn swap(
        &self,
        source_mint: &Pubkey,
        destination_mint: &Pubkey,
        amount: Decimal,
    ) -> SessionResult<SwapResult> {
        self.orchestrator
            .swap(source_mint, destination_mint, amount)
            .await
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}
