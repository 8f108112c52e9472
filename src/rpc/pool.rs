use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use solana_sdk::hash::Hash;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{SessionError, SessionResult};

use super::error::RpcResult;
use super::handle::ConnectionHandle;
use super::transport::HttpTransport;
use super::{Commitment, Role};

/// 后台刷新周期，远小于区块哈希约 2 分钟的有效窗口。
pub const TOKEN_REFRESH_INTERVAL: Duration = Duration::from_secs(30);
/// 区块哈希在本地视为有效的时长（保守值）。
pub const TOKEN_TTL: Duration = Duration::from_secs(90);
pub const DEFAULT_BACKUP_RPC_URL: &str = "https://api.mainnet-beta.solana.com";

/// 带有效期的区块哈希快照。
#[derive(Clone, Debug)]
pub struct FreshnessToken {
    pub blockhash: Hash,
    pub last_valid_block_height: Option<u64>,
    pub lamports_per_signature: Option<u64>,
    pub acquired_at: Instant,
    pub valid_until: Instant,
}

impl FreshnessToken {
    pub fn is_valid_at(&self, now: Instant) -> bool {
        self.valid_until > now
    }
}

#[derive(Clone, Debug)]
pub struct PoolSettings {
    pub token_ttl: Duration,
    pub refresh_interval: Duration,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            token_ttl: TOKEN_TTL,
            refresh_interval: TOKEN_REFRESH_INTERVAL,
        }
    }
}

struct TokenState {
    primary: ConnectionHandle,
    token_ttl: Duration,
    cached: tokio::sync::Mutex<Option<FreshnessToken>>,
}

impl TokenState {
    async fn fetch(&self) -> RpcResult<FreshnessToken> {
        let info = self.primary.latest_blockhash().await?;
        let acquired_at = Instant::now();
        Ok(FreshnessToken {
            blockhash: info.blockhash,
            last_valid_block_height: info.last_valid_block_height,
            lamports_per_signature: info.lamports_per_signature,
            acquired_at,
            valid_until: acquired_at + self.token_ttl,
        })
    }

    /// 后台刷新：请求期间不持锁，读者继续拿到仍有效的缓存值。
    /// 只在新值比缓存更晚到期时写入。
    async fn refresh(&self) -> RpcResult<FreshnessToken> {
        let token = self.fetch().await?;
        let mut guard = self.cached.lock().await;
        if let Some(current) = guard
            .as_ref()
            .filter(|current| current.valid_until >= token.valid_until)
        {
            return Ok(current.clone());
        }
        *guard = Some(token.clone());
        Ok(token)
    }
}

/// 主备 RPC 连接池，维护一个自动刷新的区块哈希。
pub struct ConnectionPool {
    state: Arc<TokenState>,
    backup: ConnectionHandle,
    shutdown: CancellationToken,
    refresh_task: Mutex<Option<JoinHandle<()>>>,
}

impl ConnectionPool {
    /// 以 HTTP 传输构建连接池；主节点地址缺失时返回配置错误。
    ///
    /// 必须在 tokio 运行时内调用。
    pub fn initialize(
        primary_url: Option<&str>,
        backup_url: Option<&str>,
        commitment: Commitment,
        request_timeout: Duration,
    ) -> SessionResult<Self> {
        let primary_url = primary_url
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .ok_or_else(|| {
                SessionError::config("缺少主 RPC 地址，请设置 rpc.primary_url 或 RPC_PRIMARY")
            })?;
        let backup_url = backup_url
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .unwrap_or(DEFAULT_BACKUP_RPC_URL);

        let primary = ConnectionHandle::new(
            Role::Primary,
            commitment,
            Arc::new(HttpTransport::new(
                primary_url.to_string(),
                commitment,
                request_timeout,
            )),
        );
        let backup = ConnectionHandle::new(
            Role::Backup,
            commitment,
            Arc::new(HttpTransport::new(
                backup_url.to_string(),
                commitment,
                request_timeout,
            )),
        );
        info!(
            target: "rpc::pool",
            primary = %primary.url(),
            backup = %backup.url(),
            commitment = %commitment,
            "RPC 连接池初始化"
        );
        Ok(Self::from_handles(primary, backup, PoolSettings::default()))
    }

    pub fn from_handles(
        primary: ConnectionHandle,
        backup: ConnectionHandle,
        settings: PoolSettings,
    ) -> Self {
        let state = Arc::new(TokenState {
            primary,
            token_ttl: settings.token_ttl,
            cached: tokio::sync::Mutex::new(None),
        });
        let shutdown = CancellationToken::new();
        let handle = spawn_refresh_loop(
            Arc::clone(&state),
            settings.refresh_interval,
            shutdown.clone(),
        );
        Self {
            state,
            backup,
            shutdown,
            refresh_task: Mutex::new(Some(handle)),
        }
    }

    pub fn primary(&self) -> &ConnectionHandle {
        &self.state.primary
    }

    pub fn backup(&self) -> &ConnectionHandle {
        &self.backup
    }

    pub fn commitment(&self) -> Commitment {
        self.state.primary.commitment()
    }

    /// 返回保证未过期的区块哈希；缓存过期时同步刷新。
    ///
    /// 并发调用者在锁上排队，刷新完成后直接拿到新值，不会重复请求。
    /// 同步刷新只走主节点，失败即返回上游错误。
    pub async fn freshness_token(&self) -> SessionResult<FreshnessToken> {
        let mut guard = self.state.cached.lock().await;
        if let Some(token) = guard.as_ref() {
            if token.is_valid_at(Instant::now()) {
                return Ok(token.clone());
            }
        }

        debug!(target: "rpc::pool", "区块哈希已过期，同步刷新");
        let token = self.state.fetch().await?;
        *guard = Some(token.clone());
        Ok(token)
    }

    /// 停止后台刷新任务，可重复调用。在途的刷新允许自然结束，其结果被丢弃。
    pub async fn close(&self) {
        self.shutdown.cancel();
        let handle = self.refresh_task.lock().take();
        if let Some(handle) = handle {
            if let Err(err) = handle.await {
                debug!(target: "rpc::pool", error = %err, "刷新任务退出异常");
            }
            info!(target: "rpc::pool", "RPC 连接池已关闭");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.shutdown.is_cancelled()
    }
}

impl Drop for ConnectionPool {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

fn spawn_refresh_loop(
    state: Arc<TokenState>,
    period: Duration,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {}
            }
            match state.refresh().await {
                Ok(token) => {
                    debug!(
                        target: "rpc::pool",
                        blockhash = %token.blockhash,
                        last_valid_block_height = ?token.last_valid_block_height,
                        "区块哈希已刷新"
                    );
                }
                Err(err) if shutdown.is_cancelled() => {
                    debug!(target: "rpc::pool", error = %err, "关闭期间刷新失败，忽略");
                }
                Err(err) => {
                    warn!(
                        target: "rpc::pool",
                        endpoint = %state.primary.url(),
                        error = %err,
                        "后台刷新区块哈希失败，下个周期重试"
                    );
                }
            }
        }
        debug!(target: "rpc::pool", "刷新任务已退出");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rpc::testing::{MockTransport, blockhash_response, sample_hash};
    use solana_client::rpc_request::RpcRequest;

    fn build_pool(
        primary: &MockTransport,
        backup: &MockTransport,
        refresh: Duration,
    ) -> ConnectionPool {
        ConnectionPool::from_handles(
            primary.handle(Role::Primary, Commitment::Finalized),
            backup.handle(Role::Backup, Commitment::Finalized),
            PoolSettings {
                token_ttl: TOKEN_TTL,
                refresh_interval: refresh,
            },
        )
    }

    #[tokio::test]
    async fn initialize_requires_primary_url() {
        let timeout = Duration::from_secs(8);
        let err = ConnectionPool::initialize(None, None, Commitment::Finalized, timeout)
            .err()
            .expect("missing primary must fail");
        assert!(matches!(err, SessionError::Config(_)));

        let err = ConnectionPool::initialize(Some("  "), None, Commitment::Finalized, timeout)
            .err()
            .expect("blank primary must fail");
        assert!(matches!(err, SessionError::Config(_)));
    }

    #[tokio::test]
    async fn initialize_defaults_backup_endpoint() {
        let pool = ConnectionPool::initialize(
            Some("http://127.0.0.1:8899"),
            None,
            Commitment::Confirmed,
            Duration::from_secs(8),
        )
        .expect("pool");
        assert_eq!(pool.backup().url(), DEFAULT_BACKUP_RPC_URL);
        assert_eq!(pool.backup().role(), Role::Backup);
        assert_eq!(pool.commitment(), Commitment::Confirmed);
        pool.close().await;
    }

    #[tokio::test(start_paused = true)]
    async fn token_is_reused_until_ttl_lapses() {
        let primary = MockTransport::new("mock://primary");
        let backup = MockTransport::new("mock://backup");
        primary.respond(RpcRequest::GetLatestBlockhash, blockhash_response(&sample_hash(1)));
        let pool = build_pool(&primary, &backup, Duration::from_secs(3_600));

        tokio::time::sleep(Duration::from_millis(10)).await;
        let first = pool.freshness_token().await.expect("token");
        let baseline = primary.calls(RpcRequest::GetLatestBlockhash);

        tokio::time::advance(Duration::from_secs(89)).await;
        let again = pool.freshness_token().await.expect("token");
        assert_eq!(again.valid_until, first.valid_until);
        assert!(again.valid_until > Instant::now());
        assert_eq!(primary.calls(RpcRequest::GetLatestBlockhash), baseline);

        primary.respond(RpcRequest::GetLatestBlockhash, blockhash_response(&sample_hash(2)));
        tokio::time::advance(Duration::from_secs(2)).await;
        let refreshed = pool.freshness_token().await.expect("token");
        assert_eq!(refreshed.blockhash, sample_hash(2));
        assert!(refreshed.valid_until > Instant::now());
        assert_eq!(primary.calls(RpcRequest::GetLatestBlockhash), baseline + 1);
        pool.close().await;
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_callers_share_single_refresh() {
        let primary = MockTransport::new("mock://primary");
        let backup = MockTransport::new("mock://backup");
        primary.respond(RpcRequest::GetLatestBlockhash, blockhash_response(&sample_hash(3)));
        primary.set_delay(Duration::from_millis(200));
        let pool = Arc::new(build_pool(&primary, &backup, Duration::from_secs(3_600)));

        tokio::time::sleep(Duration::from_secs(1)).await;
        let baseline = primary.calls(RpcRequest::GetLatestBlockhash);
        assert_eq!(baseline, 1);

        tokio::time::advance(Duration::from_secs(91)).await;
        let mut tasks = Vec::new();
        for _ in 0..8 {
            let pool = Arc::clone(&pool);
            tasks.push(tokio::spawn(async move { pool.freshness_token().await }));
        }
        let mut deadlines = Vec::new();
        for task in tasks {
            let token = task.await.expect("join").expect("token");
            assert!(token.valid_until > Instant::now());
            deadlines.push(token.valid_until);
        }

        assert_eq!(primary.calls(RpcRequest::GetLatestBlockhash), baseline + 1);
        assert!(deadlines.windows(2).all(|pair| pair[0] == pair[1]));
        pool.close().await;
    }

    #[tokio::test(start_paused = true)]
    async fn lapsed_token_with_failing_primary_is_upstream_error() {
        let primary = MockTransport::new("mock://primary");
        let backup = MockTransport::new("mock://backup");
        primary.respond(RpcRequest::GetLatestBlockhash, blockhash_response(&sample_hash(4)));
        backup.respond(RpcRequest::GetLatestBlockhash, blockhash_response(&sample_hash(5)));
        let pool = build_pool(&primary, &backup, Duration::from_secs(3_600));
        pool.freshness_token().await.expect("token");

        primary.fail(RpcRequest::GetLatestBlockhash, "connection refused");
        tokio::time::advance(Duration::from_secs(120)).await;
        let err = pool.freshness_token().await.unwrap_err();
        assert!(err.is_upstream());
        assert_eq!(backup.total_calls(), 0);
        pool.close().await;
    }

    #[tokio::test(start_paused = true)]
    async fn background_failures_are_absorbed_and_retried() {
        let primary = MockTransport::new("mock://primary");
        let backup = MockTransport::new("mock://backup");
        primary.fail(RpcRequest::GetLatestBlockhash, "node unhealthy");
        let pool = build_pool(&primary, &backup, TOKEN_REFRESH_INTERVAL);

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(primary.calls(RpcRequest::GetLatestBlockhash), 1);
        assert!(!pool.is_closed());

        primary.respond(RpcRequest::GetLatestBlockhash, blockhash_response(&sample_hash(6)));
        tokio::time::sleep(TOKEN_REFRESH_INTERVAL).await;
        let calls = primary.calls(RpcRequest::GetLatestBlockhash);
        assert_eq!(calls, 2);

        let token = pool.freshness_token().await.expect("token from background");
        assert_eq!(token.blockhash, sample_hash(6));
        assert_eq!(primary.calls(RpcRequest::GetLatestBlockhash), calls);
        pool.close().await;
    }

    #[tokio::test(start_paused = true)]
    async fn slow_background_refresh_does_not_block_valid_token_readers() {
        let primary = MockTransport::new("mock://primary");
        let backup = MockTransport::new("mock://backup");
        primary.respond(RpcRequest::GetLatestBlockhash, blockhash_response(&sample_hash(8)));
        let pool = build_pool(&primary, &backup, TOKEN_REFRESH_INTERVAL);

        tokio::time::sleep(Duration::from_secs(1)).await;
        let first = pool.freshness_token().await.expect("initial token");
        assert_eq!(first.blockhash, sample_hash(8));

        primary.respond(RpcRequest::GetLatestBlockhash, blockhash_response(&sample_hash(9)));
        primary.set_delay(Duration::from_secs(8));
        // 后台第二次刷新在 t=30s 发起，t=38s 才返回
        tokio::time::sleep(TOKEN_REFRESH_INTERVAL).await;
        assert_eq!(primary.calls(RpcRequest::GetLatestBlockhash), 2);

        let started = Instant::now();
        let token = pool.freshness_token().await.expect("cached token");
        assert!(started.elapsed() < Duration::from_millis(100));
        assert_eq!(token.blockhash, sample_hash(8));
        assert_eq!(token.valid_until, first.valid_until);

        tokio::time::sleep(Duration::from_secs(10)).await;
        let refreshed = pool.freshness_token().await.expect("refreshed token");
        assert_eq!(refreshed.blockhash, sample_hash(9));
        assert!(refreshed.valid_until > first.valid_until);
        assert_eq!(primary.calls(RpcRequest::GetLatestBlockhash), 2);
        pool.close().await;
    }

    #[tokio::test(start_paused = true)]
    async fn close_is_idempotent() {
        let primary = MockTransport::new("mock://primary");
        let backup = MockTransport::new("mock://backup");
        primary.respond(RpcRequest::GetLatestBlockhash, blockhash_response(&sample_hash(7)));
        let pool = build_pool(&primary, &backup, TOKEN_REFRESH_INTERVAL);

        pool.close().await;
        pool.close().await;
        assert!(pool.is_closed());

        let calls = primary.calls(RpcRequest::GetLatestBlockhash);
        tokio::time::sleep(TOKEN_REFRESH_INTERVAL * 3).await;
        assert_eq!(primary.calls(RpcRequest::GetLatestBlockhash), calls);
    }
}
