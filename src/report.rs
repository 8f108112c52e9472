//! 一次以美元计价的兑换，连同前后余额、单价与手续费的完整记录。

use std::str::FromStr;

use rust_decimal::Decimal;
use serde::Serialize;
use solana_sdk::pubkey::Pubkey;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tracing::info;

use crate::api::serde_helpers::display_string;
use crate::error::{SessionError, SessionResult};
use crate::session::Session;
use crate::swap::SwapResult;

/// SOL 价格查询所用的 wSOL mint。
pub const SOL_MINT: &str = "So11111111111111111111111111111111111111112";

/// 源币 / 目标币 / SOL 三元组。
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Triple {
    pub source: Decimal,
    pub destination: Decimal,
    pub sol: Decimal,
}

impl Triple {
    pub fn delta(&self, before: &Triple) -> Triple {
        Triple {
            source: self.source - before.source,
            destination: self.destination - before.destination,
            sol: self.sol - before.sol,
        }
    }

    /// 按单价换算为美元。
    pub fn valued_at(&self, prices: &Triple) -> Triple {
        Triple {
            source: self.source * prices.source,
            destination: self.destination * prices.destination,
            sol: self.sol * prices.sol,
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct TradeReport {
    pub timestamp: String,
    #[serde(serialize_with = "display_string::serialize")]
    pub source_mint: Pubkey,
    #[serde(serialize_with = "display_string::serialize")]
    pub destination_mint: Pubkey,
    pub usd_amount: Decimal,
    pub unit_prices_usd: Triple,
    pub before_units: Triple,
    pub after_units: Triple,
    pub delta_units: Triple,
    pub before_usd: Triple,
    pub after_usd: Triple,
    pub delta_usd: Triple,
    pub route_fee: Decimal,
    pub network_fee_sol: Decimal,
    pub priority_fee_sol: Decimal,
    pub price_impact_pct: Option<Decimal>,
    pub swap: SwapResult,
}

impl TradeReport {
    /// 以 `usd_amount` 美元的源币换成目标币，并记录前后快照。
    pub async fn execute(
        session: &Session,
        source_mint: &Pubkey,
        destination_mint: &Pubkey,
        usd_amount: Decimal,
    ) -> SessionResult<Self> {
        if usd_amount <= Decimal::ZERO {
            return Err(SessionError::validation(format!("美元金额必须为正数: {usd_amount}")));
        }
        for mint in [source_mint, destination_mint] {
            if !session.is_tradable(mint).await? {
                return Err(SessionError::validation(format!("{mint} 在聚合器上不可交易")));
            }
        }

        let sol_mint = Pubkey::from_str(SOL_MINT)
            .map_err(|err| SessionError::config(format!("SOL mint 常量非法: {err}")))?;
        let before_units = snapshot(session, source_mint, destination_mint).await?;
        let prices = Triple {
            source: session.price_usd(source_mint).await?,
            destination: session.price_usd(destination_mint).await?,
            sol: session.price_usd(&sol_mint).await?,
        };
        let Some(units) = usd_amount.checked_div(prices.source) else {
            return Err(SessionError::validation(format!("{source_mint} 的美元价格为 0")));
        };

        let swap = session.swap(source_mint, destination_mint, units).await?;

        let after_units = snapshot(session, source_mint, destination_mint).await?;
        let before_usd = before_units.valued_at(&prices);
        let after_usd = after_units.valued_at(&prices);
        let report = Self {
            timestamp: now_rfc3339(),
            source_mint: *source_mint,
            destination_mint: *destination_mint,
            usd_amount,
            unit_prices_usd: prices,
            before_units,
            after_units,
            delta_units: after_units.delta(&before_units),
            before_usd,
            after_usd,
            delta_usd: after_usd.delta(&before_usd),
            route_fee: swap.route_fee,
            network_fee_sol: swap.network_fee,
            priority_fee_sol: swap.priority_fee,
            price_impact_pct: swap.price_impact_pct,
            swap,
        };
        info!(
            target: "report",
            signature = %report.swap.signature,
            delta_source = %report.delta_units.source,
            delta_destination = %report.delta_units.destination,
            delta_usd_total = %(report.delta_usd.source + report.delta_usd.destination + report.delta_usd.sol),
            "交易报告已生成"
        );
        Ok(report)
    }
}

async fn snapshot(
    session: &Session,
    source_mint: &Pubkey,
    destination_mint: &Pubkey,
) -> SessionResult<Triple> {
    let (source, destination) = session.pair_balances(source_mint, destination_mint).await?;
    let sol = session.native_balance().await?;
    Ok(Triple {
        source,
        destination,
        sol,
    })
}

fn now_rfc3339() -> String {
    let now = OffsetDateTime::now_utc();
    now.format(&Rfc3339)
        .unwrap_or_else(|_| now.unix_timestamp().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::Ordering;

    use serde_json::json;
    use solana_client::rpc_request::RpcRequest;

    use solana_sdk::signature::Signature;

    use crate::rpc::testing::{MockTransport, sample_hash};
    use crate::rpc::{Commitment, ConnectionPool, PoolSettings, Role};
    use crate::swap::SwapSettings;
    use crate::swap::testing::{FixedPrices, ScriptedQuotes, StaticSigner};
    use crate::token::DecimalResolver;

    fn dec(raw: &str) -> Decimal {
        Decimal::from_str(raw).expect("decimal literal")
    }

    fn session(primary: &MockTransport, prices: FixedPrices, quotes: Arc<ScriptedQuotes>) -> Session {
        let backup = MockTransport::new("mock://backup");
        let pool = Arc::new(ConnectionPool::from_handles(
            primary.handle(Role::Primary, Commitment::Confirmed),
            backup.handle(Role::Backup, Commitment::Confirmed),
            PoolSettings::default(),
        ));
        let resolver = Arc::new(DecimalResolver::new(
            primary.handle(Role::Primary, Commitment::Confirmed),
            backup.handle(Role::Backup, Commitment::Confirmed),
        ));
        Session::from_parts(
            pool,
            resolver,
            quotes,
            Arc::new(prices),
            Arc::new(StaticSigner::new(false)),
            SwapSettings::default(),
        )
    }

    #[test]
    fn triples_value_and_diff() {
        let before = Triple {
            source: dec("10"),
            destination: dec("0"),
            sol: dec("1.5"),
        };
        let after = Triple {
            source: dec("8"),
            destination: dec("300"),
            sol: dec("1.49"),
        };
        let prices = Triple {
            source: dec("150"),
            destination: dec("1"),
            sol: dec("150"),
        };
        let delta = after.delta(&before);
        assert_eq!(delta.source, dec("-2"));
        assert_eq!(delta.destination, dec("300"));
        assert_eq!(delta.sol, dec("-0.01"));
        assert_eq!(delta.valued_at(&prices).sol, dec("-1.5"));
    }

    #[tokio::test]
    async fn untradable_mint_is_rejected_before_swap() {
        let primary = MockTransport::new("mock://primary");
        let source = Pubkey::new_unique();
        let destination = Pubkey::new_unique();
        let mut prices = FixedPrices::default();
        prices.tradable.insert(source);
        let quotes = Arc::new(ScriptedQuotes::default());
        let session = session(&primary, prices, Arc::clone(&quotes));

        let err = TradeReport::execute(&session, &source, &destination, dec("5"))
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::Validation(_)));
        assert_eq!(quotes.quote_calls.load(Ordering::SeqCst), 0);
        assert_eq!(primary.calls(RpcRequest::GetBalance), 0);
        session.close().await;
    }

    #[tokio::test]
    async fn zero_source_price_is_rejected() {
        let primary = MockTransport::new("mock://primary");
        primary.respond(RpcRequest::GetTokenAccountsByOwner, json!({ "value": [] }));
        primary.respond(RpcRequest::GetBalance, json!({ "value": 1_000_000_000u64 }));
        let source = Pubkey::new_unique();
        let destination = Pubkey::new_unique();
        let sol = Pubkey::from_str(SOL_MINT).expect("sol mint");
        let mut prices = FixedPrices::default();
        for mint in [source, destination, sol] {
            prices.tradable.insert(mint);
        }
        prices.prices.insert(source, Decimal::ZERO);
        prices.prices.insert(destination, Decimal::ONE);
        prices.prices.insert(sol, dec("150"));
        let quotes = Arc::new(ScriptedQuotes::default());
        let session = session(&primary, prices, Arc::clone(&quotes));
        session.resolver().seed(source, 6);
        session.resolver().seed(destination, 6);

        let err = TradeReport::execute(&session, &source, &destination, dec("5"))
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::Validation(_)));
        assert_eq!(quotes.quote_calls.load(Ordering::SeqCst), 0);
        session.close().await;
    }

    fn token_accounts(mint: &Pubkey, amount: u64) -> serde_json::Value {
        let accounts: Vec<serde_json::Value> = if amount == 0 {
            Vec::new()
        } else {
            vec![json!({
                "pubkey": Pubkey::new_unique().to_string(),
                "account": { "data": { "parsed": { "info": {
                    "mint": mint.to_string(),
                    "tokenAmount": { "amount": amount.to_string(), "decimals": 6 }
                } } } }
            })]
        };
        json!({ "value": accounts })
    }

    #[tokio::test]
    async fn usd_trade_reports_snapshots_deltas_and_fees() {
        let source = Pubkey::new_unique();
        let destination = Pubkey::new_unique();
        let sol = Pubkey::from_str(SOL_MINT).expect("sol mint");

        let primary = MockTransport::new("mock://primary");
        primary.respond(
            RpcRequest::GetLatestBlockhash,
            json!({
                "value": {
                    "blockhash": sample_hash(3).to_string(),
                    "lastValidBlockHeight": 900,
                    "feeCalculator": { "lamportsPerSignature": 5000 }
                }
            }),
        );
        // 快照顺序：源币、目标币、SOL；交易前后各一次
        primary.respond_sequence(
            RpcRequest::GetTokenAccountsByOwner,
            vec![
                token_accounts(&source, 10_000_000),
                token_accounts(&destination, 0),
                token_accounts(&source, 6_666_667),
                token_accounts(&destination, 9_900_000),
            ],
        );
        primary.respond_sequence(
            RpcRequest::GetBalance,
            vec![json!({ "value": 1_000_000_000u64 }), json!({ "value": 999_993_000u64 })],
        );
        primary.respond(
            RpcRequest::SendTransaction,
            json!(Signature::from([4u8; 64]).to_string()),
        );
        primary.respond(
            RpcRequest::GetSignatureStatuses,
            json!({ "value": [{ "confirmationStatus": "finalized", "err": null }] }),
        );
        primary.respond(
            RpcRequest::GetTransaction,
            json!({ "slot": 11, "meta": { "fee": 7000, "err": null } }),
        );

        let mut prices = FixedPrices::default();
        for (mint, price) in [(source, "3"), (destination, "1"), (sol, "150")] {
            prices.tradable.insert(mint);
            prices.prices.insert(mint, dec(price));
        }
        let quotes = Arc::new(ScriptedQuotes::returning(json!({
            "inAmount": "3333333",
            "outAmount": "9900000",
            "priceImpactPct": "0.002",
            "routePlan": [{
                "swapInfo": {
                    "label": "Meteora",
                    "ammKey": "Eo7WjKq67rjJQSZxS6z3YkapzY3eMj6Xy8X5EQVn5UaB",
                    "feeAmount": "12000",
                    "feeMint": source.to_string()
                },
                "percent": 100
            }]
        })));
        let session = session(&primary, prices, Arc::clone(&quotes));
        session.resolver().seed(source, 6);
        session.resolver().seed(destination, 6);

        let report = TradeReport::execute(&session, &source, &destination, dec("10"))
            .await
            .expect("trade report");

        let request = quotes.last_request.lock().clone().expect("quote request");
        assert_eq!(request.amount, 3_333_333);
        assert_eq!(quotes.swap_calls.load(Ordering::SeqCst), 1);

        assert_eq!(report.usd_amount, dec("10"));
        assert_eq!(report.unit_prices_usd.sol, dec("150"));
        assert_eq!(report.before_units.source, dec("10"));
        assert_eq!(report.before_units.sol, dec("1"));
        assert_eq!(report.after_units.destination, dec("9.9"));
        assert_eq!(report.delta_units.source, dec("-3.333333"));
        assert_eq!(report.delta_units.destination, dec("9.9"));
        assert_eq!(report.delta_units.sol, dec("-0.000007"));
        assert_eq!(report.delta_usd.source, dec("-9.999999"));
        assert_eq!(report.delta_usd.destination, dec("9.9"));
        assert_eq!(report.delta_usd.sol, dec("-0.00105"));

        assert_eq!(report.swap.signature, Signature::from([4u8; 64]));
        assert_eq!(report.route_fee, dec("0.012"));
        assert_eq!(report.route_fee, report.swap.route_fee);
        assert_eq!(report.network_fee_sol, dec("0.000007"));
        assert_eq!(report.priority_fee_sol, dec("0.000002"));
        assert_eq!(report.price_impact_pct, Some(dec("0.002")));
        assert_eq!(primary.calls(RpcRequest::GetTokenAccountsByOwner), 4);
        assert_eq!(primary.calls(RpcRequest::GetBalance), 2);
        session.close().await;
    }

    #[test]
    fn timestamp_is_rfc3339() {
        let stamp = now_rfc3339();
        assert!(stamp.contains('T') && stamp.ends_with('Z'), "{stamp}");
    }
}
