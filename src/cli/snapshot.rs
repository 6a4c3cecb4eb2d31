use anyhow::Result;
use clap::Args;
use perceiver_structural::metrics as structural_metrics;

use crate::cli::context::CliContext;
use crate::pilot::snapshot_page;

#[derive(Args, Clone, Debug)]
pub struct SnapshotArgs {
    /// Page to open
    #[arg(long)]
    pub url: String,

    /// Print the catalog as JSON
    #[arg(long)]
    pub json: bool,

    /// Append driver and snapshot-pipeline metrics
    #[arg(long)]
    pub metrics: bool,

    /// Run Chrome with a visible window instead of headless mode
    #[arg(long)]
    pub headful: bool,
}

pub async fn cmd_snapshot(args: SnapshotArgs, ctx: &CliContext) -> Result<()> {
    let browser = ctx.launch(args.headful).await?;
    let rendered = snapshot_page(&browser.executor, Some(&args.url), args.json, ctx.config()).await;
    browser.close().await;

    println!("{}", rendered?);
    if args.metrics {
        println!("\n[driver metrics]");
        print!("{}", cdp_adapter::metrics::gather_text());
        println!("\n[snapshot metrics]");
        println!(
            "{}",
            serde_json::to_string_pretty(&structural_metrics::snapshot())?
        );
    }
    Ok(())
}
