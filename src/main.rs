use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    refpilot_cli::cli::run().await
}
