use action_flow::RetryOrchestrator;
use anyhow::Result;
use clap::Args;

use crate::cli::context::CliContext;
use crate::pilot::{act_once, parse_action};

#[derive(Args, Clone, Debug)]
pub struct ActArgs {
    /// Page to open before acting
    #[arg(long)]
    pub url: String,

    /// Action as JSON, e.g. '{"action":"click","ref":"e3"}'
    #[arg(long)]
    pub action: String,

    /// Retry failures with the configured retry policy
    #[arg(long)]
    pub retry: bool,

    /// Run Chrome with a visible window instead of headless mode
    #[arg(long)]
    pub headful: bool,
}

pub async fn cmd_act(args: ActArgs, ctx: &CliContext) -> Result<()> {
    let action = parse_action(&args.action)?;
    let orchestrator = args
        .retry
        .then(|| RetryOrchestrator::new(ctx.config().retry.clone()));

    let browser = ctx.launch(args.headful).await?;
    let output = act_once(
        &browser.executor,
        Some(&args.url),
        &action,
        orchestrator.as_ref(),
    )
    .await;
    browser.close().await;

    println!("{}", serde_json::to_string_pretty(&output?)?);
    Ok(())
}
