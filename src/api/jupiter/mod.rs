//! Jupiter 聚合器 HTTP 客户端：报价、交易构建、USD 价格与可交易代币列表。

pub mod price;
pub mod quote;
pub mod swap;

use std::collections::HashSet;
use std::fmt;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use reqwest::StatusCode;
use serde_json::Value;
use solana_sdk::pubkey::Pubkey;
use thiserror::Error;
use tokio::sync::OnceCell;
use tracing::{debug, trace, warn};

use crate::api::QuoteProvider;
use crate::config::JupiterConfig;

pub use quote::{QuoteRequest, QuoteResponse, RouteFee, RoutePlanStep};
pub use swap::SwapRequest;

#[derive(Debug, Error)]
pub enum JupiterError {
    #[error("Jupiter API 请求失败: {0}")]
    Http(#[from] reqwest::Error),
    #[error("请求 {endpoint} 超时（{timeout_ms}ms）")]
    Timeout {
        endpoint: String,
        timeout_ms: u64,
        #[source]
        source: reqwest::Error,
    },
    #[error("响应解析失败: {0}")]
    Json(#[from] serde_json::Error),
    #[error("请求 {endpoint} 返回状态 {status}: {body}")]
    ApiStatus {
        endpoint: String,
        status: StatusCode,
        body: String,
    },
    #[error("请求 {endpoint} 被限流，状态 {status}: {body}")]
    RateLimited {
        endpoint: String,
        status: StatusCode,
        body: String,
    },
    #[error("Jupiter 响应结构不符合预期: {0}")]
    Schema(String),
}

impl JupiterError {
    pub fn schema(detail: impl Into<String>) -> Self {
        Self::Schema(detail.into())
    }
}

/// 每类请求的日志 target 与名称。
#[derive(Clone, Copy, Debug)]
pub(crate) enum Stage {
    Quote,
    Swap,
    Price,
    Tradable,
}

impl Stage {
    fn as_str(self) -> &'static str {
        match self {
            Stage::Quote => "报价",
            Stage::Swap => "交易构建",
            Stage::Price => "价格查询",
            Stage::Tradable => "可交易列表",
        }
    }
}

#[derive(Clone)]
pub struct JupiterApiClient {
    client: reqwest::Client,
    quote_url: String,
    swap_url: String,
    price_url: String,
    tradable_url: String,
    timeout: Duration,
    slow_warn_ms: u64,
    tradable: std::sync::Arc<OnceCell<HashSet<String>>>,
}

impl fmt::Debug for JupiterApiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JupiterApiClient")
            .field("quote_url", &self.quote_url)
            .field("swap_url", &self.swap_url)
            .field("price_url", &self.price_url)
            .field("tradable_url", &self.tradable_url)
            .field("timeout", &self.timeout)
            .field("tradable_loaded", &self.tradable.initialized())
            .finish()
    }
}

impl JupiterApiClient {
    pub fn new(client: reqwest::Client, config: &JupiterConfig) -> Self {
        Self {
            client,
            quote_url: config.quote_url.clone(),
            swap_url: config.swap_url.clone(),
            price_url: config.price_url.clone(),
            tradable_url: config.tradable_url.clone(),
            timeout: Duration::from_millis(config.timeout_ms),
            slow_warn_ms: config.slow_warn_ms,
            tradable: std::sync::Arc::new(OnceCell::new()),
        }
    }

    pub fn from_config(config: &JupiterConfig) -> Result<Self, JupiterError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("solana-swap/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self::new(client, config))
    }

    /// 发送请求并解析 JSON；超时、限流、非 2xx 与解码失败分别映射为独立错误。
    pub(crate) async fn execute(
        &self,
        stage: Stage,
        endpoint: &str,
        request: reqwest::RequestBuilder,
    ) -> Result<Value, JupiterError> {
        let started = Instant::now();
        let timeout_ms = self.timeout.as_millis() as u64;
        let map_transport = |err: reqwest::Error| {
            if err.is_timeout() {
                warn!(
                    target: "jupiter::http",
                    stage = stage.as_str(),
                    endpoint = %endpoint,
                    timeout_ms,
                    "Jupiter 请求超时"
                );
                JupiterError::Timeout {
                    endpoint: endpoint.to_string(),
                    timeout_ms,
                    source: err,
                }
            } else {
                warn!(
                    target: "jupiter::http",
                    stage = stage.as_str(),
                    endpoint = %endpoint,
                    error = %err,
                    "Jupiter 请求发送失败"
                );
                JupiterError::from(err)
            }
        };

        let response = request
            .timeout(self.timeout)
            .send()
            .await
            .map_err(&map_transport)?;
        let status = response.status();
        let body = response.text().await.map_err(&map_transport)?;

        if status == StatusCode::TOO_MANY_REQUESTS {
            let summary = summarize_error_body(&body);
            warn!(
                target: "jupiter::http",
                stage = stage.as_str(),
                endpoint = %endpoint,
                body = %summary,
                "Jupiter 请求命中限流"
            );
            return Err(JupiterError::RateLimited {
                endpoint: endpoint.to_string(),
                status,
                body: summary,
            });
        }
        if !status.is_success() {
            let summary = summarize_error_body(&body);
            warn!(
                target: "jupiter::http",
                stage = stage.as_str(),
                endpoint = %endpoint,
                status = status.as_u16(),
                body = %summary,
                "Jupiter 返回非 2xx 状态"
            );
            return Err(JupiterError::ApiStatus {
                endpoint: endpoint.to_string(),
                status,
                body: summary,
            });
        }

        let json: Value = serde_json::from_str(&body)?;
        let elapsed_ms = started.elapsed().as_secs_f64() * 1_000.0;
        if elapsed_ms > self.slow_warn_ms as f64 {
            debug!(
                target: "jupiter::http",
                stage = stage.as_str(),
                elapsed_ms = format_args!("{elapsed_ms:.3}"),
                threshold_ms = self.slow_warn_ms,
                "Jupiter 请求耗时较长"
            );
        } else {
            trace!(
                target: "jupiter::http",
                stage = stage.as_str(),
                elapsed_ms = format_args!("{elapsed_ms:.3}"),
                "Jupiter 请求完成"
            );
        }
        Ok(json)
    }
}

#[async_trait]
impl QuoteProvider for JupiterApiClient {
    async fn quote(&self, request: &QuoteRequest) -> Result<QuoteResponse, JupiterError> {
        trace!(
            target: "jupiter::quote",
            input_mint = %request.input_mint,
            output_mint = %request.output_mint,
            amount = request.amount,
            slippage_bps = request.slippage_bps,
            "开始请求 Jupiter 报价"
        );
        let builder = self
            .client
            .get(&self.quote_url)
            .query(&request.to_query_params());
        let json = self.execute(Stage::Quote, &self.quote_url, builder).await?;
        let quote = QuoteResponse::from_value(json)?;
        debug!(
            target: "jupiter::quote",
            in_amount = ?quote.in_amount,
            out_amount = ?quote.out_amount,
            hops = quote.route_plan.len(),
            "Jupiter 报价完成"
        );
        Ok(quote)
    }

    async fn swap_transaction(
        &self,
        quote: &QuoteResponse,
        user: &Pubkey,
    ) -> Result<Vec<u8>, JupiterError> {
        let payload = SwapRequest::new(quote, *user);
        let builder = self.client.post(&self.swap_url).json(&payload);
        let json = self.execute(Stage::Swap, &self.swap_url, builder).await?;
        let encoded = json
            .get("swapTransaction")
            .and_then(Value::as_str)
            .ok_or_else(|| JupiterError::schema("缺少 swapTransaction 字段"))?;
        let bytes = BASE64
            .decode(encoded)
            .map_err(|err| JupiterError::schema(format!("swapTransaction 解码失败: {err}")))?;
        debug!(
            target: "jupiter::swap",
            user = %user,
            bytes = bytes.len(),
            "Jupiter 交易构建完成"
        );
        Ok(bytes)
    }
}

fn summarize_error_body(body: &str) -> String {
    const MAX_LEN: usize = 512;
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return "(空响应)".to_string();
    }
    let single_line = trimmed.replace(['\n', '\r'], " ");
    match single_line.char_indices().nth(MAX_LEN) {
        Some((cut, _)) => format!("{}…", &single_line[..cut]),
        None => single_line,
    }
}
