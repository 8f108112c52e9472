//! Solana 钱包余额查询与 Jupiter 兑换：主备 RPC 连接池、代币精度发现与兑换编排。

pub mod api;
pub mod cli;
pub mod config;
pub mod error;
pub mod report;
pub mod rpc;
pub mod session;
pub mod swap;
pub mod token;

pub use error::{SessionError, SessionResult, UpstreamError};
pub use report::TradeReport;
pub use session::Session;
pub use swap::{SwapOrchestrator, SwapResult};
