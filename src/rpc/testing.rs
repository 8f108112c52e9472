//! 测试用的内存 RPC 传输：按方法预置响应并统计调用次数。

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{Value, json};
use solana_client::client_error::ClientErrorKind;
use solana_client::rpc_request::RpcRequest;
use solana_sdk::hash::Hash;

use super::error::{RpcError, RpcResult};
use super::handle::ConnectionHandle;
use super::transport::RpcTransport;
use super::{Commitment, Role};

#[derive(Clone)]
pub(crate) struct MockTransport {
    inner: Arc<MockInner>,
}

struct MockInner {
    url: String,
    replies: Mutex<HashMap<String, VecDeque<Result<Value, String>>>>,
    calls: Mutex<HashMap<String, usize>>,
    history: Mutex<Vec<(String, Value)>>,
    delay: Mutex<Option<Duration>>,
}

impl MockTransport {
    pub(crate) fn new(url: &str) -> Self {
        Self {
            inner: Arc::new(MockInner {
                url: url.to_string(),
                replies: Mutex::new(HashMap::new()),
                calls: Mutex::new(HashMap::new()),
                history: Mutex::new(Vec::new()),
                delay: Mutex::new(None),
            }),
        }
    }

    pub(crate) fn handle(&self, role: Role, commitment: Commitment) -> ConnectionHandle {
        ConnectionHandle::new(role, commitment, Arc::new(self.clone()))
    }

    pub(crate) fn set_delay(&self, delay: Duration) {
        *self.inner.delay.lock() = Some(delay);
    }

    pub(crate) fn respond(&self, request: RpcRequest, value: Value) {
        self.respond_keyed(&request.to_string(), value);
    }

    /// `getAccountInfo` 按编码区分：`getAccountInfo:jsonParsed` / `getAccountInfo:base64`。
    pub(crate) fn respond_keyed(&self, key: &str, value: Value) {
        self.inner
            .replies
            .lock()
            .insert(key.to_string(), VecDeque::from([Ok(value)]));
    }

    /// 依次返回给定响应，耗尽后重复最后一个。
    pub(crate) fn respond_sequence(&self, request: RpcRequest, values: Vec<Value>) {
        self.inner.replies.lock().insert(
            request.to_string(),
            values.into_iter().map(Ok).collect::<VecDeque<_>>(),
        );
    }

    pub(crate) fn fail(&self, request: RpcRequest, message: &str) {
        self.fail_keyed(&request.to_string(), message);
    }

    pub(crate) fn fail_keyed(&self, key: &str, message: &str) {
        self.inner
            .replies
            .lock()
            .insert(key.to_string(), VecDeque::from([Err(message.to_string())]));
    }

    /// 按方法统计（不区分编码）。
    pub(crate) fn calls(&self, request: RpcRequest) -> usize {
        let method = request.to_string();
        self.inner
            .calls
            .lock()
            .iter()
            .filter(|(key, _)| key.as_str() == method || key.starts_with(&format!("{method}:")))
            .map(|(_, count)| *count)
            .sum()
    }

    pub(crate) fn calls_keyed(&self, key: &str) -> usize {
        self.inner.calls.lock().get(key).copied().unwrap_or(0)
    }

    pub(crate) fn total_calls(&self) -> usize {
        self.inner.calls.lock().values().sum()
    }

    pub(crate) fn last_call(&self) -> Option<(String, Value)> {
        self.inner.history.lock().last().cloned()
    }

    pub(crate) fn history(&self) -> Vec<String> {
        self.inner
            .history
            .lock()
            .iter()
            .map(|(key, _)| key.clone())
            .collect()
    }
}

fn reply_key(request: RpcRequest, params: &Value) -> String {
    let method = request.to_string();
    if matches!(request, RpcRequest::GetAccountInfo) {
        if let Some(encoding) = params
            .as_array()
            .and_then(|items| items.get(1))
            .and_then(|config| config.get("encoding"))
            .and_then(Value::as_str)
        {
            return format!("{method}:{encoding}");
        }
    }
    method
}

#[async_trait]
impl RpcTransport for MockTransport {
    fn url(&self) -> String {
        self.inner.url.clone()
    }

    async fn send(&self, request: RpcRequest, params: Value) -> RpcResult<Value> {
        let key = reply_key(request, &params);
        *self.inner.calls.lock().entry(key.clone()).or_default() += 1;
        self.inner.history.lock().push((key.clone(), params));

        let delay = *self.inner.delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let reply = {
            let mut replies = self.inner.replies.lock();
            match replies.get_mut(&key) {
                Some(queue) if queue.len() > 1 => queue.pop_front(),
                Some(queue) => queue.front().cloned(),
                None => None,
            }
        };

        match reply {
            Some(Ok(value)) => Ok(value),
            Some(Err(message)) => Err(node_error(request, message)),
            None => Err(node_error(request, format!("mock 未配置 {key}"))),
        }
    }
}

/// 模拟节点返回的 JSON-RPC 错误。
fn node_error(request: RpcRequest, message: String) -> RpcError {
    RpcError::Client(ClientErrorKind::Custom(format!("{request}: {message}")).into())
}

pub(crate) fn sample_hash(seed: u8) -> Hash {
    Hash::new_from_array([seed; 32])
}

pub(crate) fn blockhash_response(hash: &Hash) -> Value {
    json!({
        "context": { "slot": 42 },
        "value": { "blockhash": hash.to_string(), "lastValidBlockHeight": 1_000 }
    })
}
