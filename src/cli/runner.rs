use anyhow::{Result, anyhow};
use clap::Parser;
use serde::Serialize;
use serde_json::json;
use tracing::{info, warn};

use super::context::{init_tracing, load_configuration};
use super::{Cli, Command};
use crate::report::TradeReport;
use crate::session::Session;

pub async fn run() -> Result<()> {
    let cli = Cli::parse();
    let config = load_configuration(cli.config.clone())?;
    init_tracing(&config.logging)?;

    let session = Session::connect(&config)?;
    let submits = cli.command.submits_transaction();
    let outcome = tokio::select! {
        result = dispatch(&session, cli.command) => result,
        _ = tokio::signal::ctrl_c() => {
            if submits {
                warn!(
                    target: "cli",
                    wallet = %session.wallet(),
                    "收到中断信号，交易可能已发送，结果未知，请按钱包地址核对链上记录"
                );
            } else {
                warn!(target: "cli", "收到中断信号，提前退出");
            }
            Err(anyhow!("命令被中断，未完成"))
        }
    };
    session.close().await;
    outcome
}

async fn dispatch(session: &Session, command: Command) -> Result<()> {
    match command {
        Command::Balances => {
            let sol = session.native_balance().await?;
            let tokens = session.wallet_token_balances().await?;
            let tokens: serde_json::Map<String, serde_json::Value> = tokens
                .into_iter()
                .map(|(mint, amount)| (mint.to_string(), json!(amount)))
                .collect();
            print_json(&json!({
                "wallet": session.wallet().to_string(),
                "sol": sol,
                "tokens": tokens,
            }))
        }
        Command::Balance(args) => {
            let balance = session.ui_balance(&args.mint).await?;
            print_json(&json!({ "mint": args.mint.to_string(), "balance": balance }))
        }
        Command::Decimals(args) => {
            let decimals = session.decimals(&args.mint).await?;
            print_json(&json!({ "mint": args.mint.to_string(), "decimals": decimals }))
        }
        Command::Price(args) => {
            let price = session.price_usd(&args.mint).await?;
            print_json(&json!({ "mint": args.mint.to_string(), "price_usd": price }))
        }
        Command::Quote(args) => {
            let (out_amount, quote) = session.quote(&args.input, &args.output, args.amount).await?;
            print_json(&json!({
                "input": args.input.to_string(),
                "output": args.output.to_string(),
                "amount": args.amount,
                "out_amount": out_amount,
                "price_impact_pct": quote.price_impact_pct,
                "route": quote.route_plan.iter().map(|step| step.display_label()).collect::<Vec<_>>(),
            }))
        }
        Command::Swap(args) => {
            info!(
                target: "cli",
                input = %args.input,
                output = %args.output,
                amount = %args.amount,
                "开始兑换"
            );
            let result = session.swap(&args.input, &args.output, args.amount).await?;
            print_json(&result)
        }
        Command::Trade(args) => {
            let report = TradeReport::execute(session, &args.input, &args.output, args.usd).await?;
            print_json(&report)
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
