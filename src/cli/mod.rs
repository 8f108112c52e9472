//! CLI 模块负责解析命令行参数并分发到各子命令处理逻辑。

mod runner;

pub mod context;

pub use runner::run;

use std::path::PathBuf;
use std::str::FromStr;

use clap::{Args, Parser, Subcommand};
use rust_decimal::Decimal;
use solana_sdk::pubkey::Pubkey;

#[derive(Parser, Debug)]
#[command(name = "solana-swap", version, about = "Solana 钱包余额查询与 Jupiter 兑换")]
pub struct Cli {
    #[arg(
        short,
        long,
        value_name = "FILE",
        help = "配置文件路径（默认查找 solana-swap.yaml 或 config/solana-swap.yaml）"
    )]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// 列出钱包的 SOL 与全部代币余额
    Balances,
    /// 查询单个代币余额
    Balance(MintArgs),
    /// 查询代币精度
    Decimals(MintArgs),
    /// 查询代币美元价格
    Price(MintArgs),
    /// 只报价不下单
    Quote(PairArgs),
    /// 按源币数量执行兑换
    Swap(PairArgs),
    /// 按美元金额执行兑换并输出前后对账报告
    Trade(TradeArgs),
}

impl Command {
    /// 是否会向链上发送交易；中断后其结果无法确定。
    pub fn submits_transaction(&self) -> bool {
        matches!(self, Command::Swap(_) | Command::Trade(_))
    }
}

#[derive(Args, Debug)]
pub struct MintArgs {
    #[arg(long, value_parser = parse_pubkey, help = "代币 Mint 地址")]
    pub mint: Pubkey,
}

#[derive(Args, Debug)]
pub struct PairArgs {
    #[arg(long, value_parser = parse_pubkey, help = "输入代币的 Mint 地址")]
    pub input: Pubkey,
    #[arg(long, value_parser = parse_pubkey, help = "输出代币的 Mint 地址")]
    pub output: Pubkey,
    #[arg(long, value_parser = parse_decimal, help = "输入数量（UI 单位，例如 0.5）")]
    pub amount: Decimal,
}

#[derive(Args, Debug)]
pub struct TradeArgs {
    #[arg(long, value_parser = parse_pubkey, help = "输入代币的 Mint 地址")]
    pub input: Pubkey,
    #[arg(long, value_parser = parse_pubkey, help = "输出代币的 Mint 地址")]
    pub output: Pubkey,
    #[arg(long, value_parser = parse_decimal, help = "兑换金额（美元）")]
    pub usd: Decimal,
}

fn parse_pubkey(raw: &str) -> Result<Pubkey, String> {
    Pubkey::from_str(raw.trim()).map_err(|err| format!("Mint 地址非法: {err}"))
}

fn parse_decimal(raw: &str) -> Result<Decimal, String> {
    let trimmed = raw.trim();
    Decimal::from_str(trimmed)
        .or_else(|_| Decimal::from_scientific(trimmed))
        .map_err(|err| format!("数量非法: {err}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_swap_command() {
        let input = Pubkey::new_unique();
        let output = Pubkey::new_unique();
        let cli = Cli::try_parse_from([
            "solana-swap",
            "--config",
            "custom.yaml",
            "swap",
            "--input",
            &input.to_string(),
            "--output",
            &output.to_string(),
            "--amount",
            "0.25",
        ])
        .expect("parse");
        assert_eq!(cli.config, Some(PathBuf::from("custom.yaml")));
        match cli.command {
            Command::Swap(args) => {
                assert_eq!(args.input, input);
                assert_eq!(args.output, output);
                assert_eq!(args.amount, Decimal::new(25, 2));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn only_swap_and_trade_submit_transactions() {
        let mint = Pubkey::new_unique().to_string();
        let parse = |args: &[&str]| Cli::try_parse_from(args).expect("parse").command;
        let swap = parse(&[
            "solana-swap", "swap", "--input", &mint, "--output", &mint, "--amount", "1",
        ]);
        let trade = parse(&[
            "solana-swap", "trade", "--input", &mint, "--output", &mint, "--usd", "5",
        ]);
        let quote = parse(&[
            "solana-swap", "quote", "--input", &mint, "--output", &mint, "--amount", "1",
        ]);
        assert!(swap.submits_transaction());
        assert!(trade.submits_transaction());
        assert!(!quote.submits_transaction());
        assert!(!parse(&["solana-swap", "balances"]).submits_transaction());
    }

    #[test]
    fn rejects_bad_mint_and_amount() {
        assert!(Cli::try_parse_from(["solana-swap", "decimals", "--mint", "nope"]).is_err());
        let mint = Pubkey::new_unique().to_string();
        assert!(
            Cli::try_parse_from([
                "solana-swap", "quote", "--input", &mint, "--output", &mint, "--amount", "abc"
            ])
            .is_err()
        );
    }
}
