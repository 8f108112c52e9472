#[tokio::main]
async fn main() -> anyhow::Result<()> {
    solana_swap::cli::run().await
}
