use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use action_flow::RetryOrchestrator;
use agent_core::{OpenAiPlanner, Planner, ScriptedPlanner};
use anyhow::{Context, Result};
use clap::Args;
use tokio::fs;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::cli::context::CliContext;
use crate::config::AppConfig;
use crate::pilot::{run_goal, GoalRun};

#[derive(Args, Clone, Debug)]
pub struct RunArgs {
    /// What the planner should accomplish
    #[arg(long)]
    pub goal: String,

    /// Page to open before the first step
    #[arg(long)]
    pub url: Option<String>,

    /// Step budget (overrides the config file)
    #[arg(long)]
    pub max_steps: Option<u32>,

    /// Send the full catalog every step instead of diffs
    #[arg(long)]
    pub no_diff: bool,

    /// Route actions through the retry orchestrator
    #[arg(long)]
    pub retry: bool,

    /// Per-step planner timeout, e.g. "90s" or "2m"
    #[arg(long, value_parser = humantime::parse_duration)]
    pub step_timeout: Option<Duration>,

    /// Replay planner replies from a file (one JSON reply per line) instead of calling a model
    #[arg(long, value_name = "FILE")]
    pub script: Option<PathBuf>,

    /// Run Chrome with a visible window instead of headless mode
    #[arg(long)]
    pub headful: bool,
}

pub async fn cmd_run(args: RunArgs, ctx: &CliContext) -> Result<()> {
    let config = apply_run_args(ctx.config(), &args);
    debug!(config = %ctx.config_path().display(), "effective agent config: {:?}", config.agent);
    let planner = build_planner(&config, args.script.as_ref()).await?;

    let cancel = CancellationToken::new();
    let ctrl_c = tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("interrupt received; cancelling run");
                cancel.cancel();
            }
        }
    });

    let browser = ctx.launch(args.headful).await?;
    let outcome = run_goal(
        browser.executor.clone(),
        planner,
        &config,
        GoalRun {
            goal: &args.goal,
            start_url: args.url.as_deref(),
            retry: args.retry.then(|| RetryOrchestrator::new(config.retry.clone())),
            cancel,
        },
    )
    .await;
    ctrl_c.abort();
    browser.close().await;

    let result = outcome?;
    info!(status = ?result.status, steps = result.steps, "run finished");
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

pub fn apply_run_args(base: &AppConfig, args: &RunArgs) -> AppConfig {
    let mut config = base.clone();
    if let Some(max_steps) = args.max_steps {
        config.agent.max_steps = max_steps;
    }
    if args.no_diff {
        config.agent.diff_mode = false;
    }
    if let Some(timeout) = args.step_timeout {
        config.agent.step_timeout_ms = timeout.as_millis() as u64;
    }
    config
}

async fn build_planner(config: &AppConfig, script: Option<&PathBuf>) -> Result<Arc<dyn Planner>> {
    if let Some(path) = script {
        let content = fs::read_to_string(path)
            .await
            .with_context(|| format!("reading planner script {}", path.display()))?;
        let replies: Vec<String> = content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect();
        info!(replies = replies.len(), "using scripted planner");
        return Ok(Arc::new(ScriptedPlanner::new(replies)));
    }
    let planner = OpenAiPlanner::new(config.planner.clone())
        .context("Planner unavailable (set REFPILOT_API_KEY)")?;
    Ok(Arc::new(planner))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct Harness {
        #[command(flatten)]
        run: RunArgs,
    }

    #[test]
    fn flags_override_the_agent_section() {
        let harness = Harness::parse_from([
            "refpilot",
            "--goal",
            "find the docs",
            "--max-steps",
            "4",
            "--no-diff",
            "--step-timeout",
            "1m 30s",
        ]);
        let config = apply_run_args(&AppConfig::default(), &harness.run);

        assert_eq!(config.agent.max_steps, 4);
        assert!(!config.agent.diff_mode);
        assert_eq!(config.agent.step_timeout_ms, 90_000);
    }

    #[test]
    fn defaults_come_from_the_config() {
        let harness = Harness::parse_from(["refpilot", "--goal", "x"]);
        let mut base = AppConfig::default();
        base.agent.max_steps = 12;
        let config = apply_run_args(&base, &harness.run);
        assert_eq!(config.agent.max_steps, 12);
        assert!(config.agent.diff_mode);
    }

    #[tokio::test]
    async fn script_file_feeds_a_scripted_planner() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("replies.jsonl");
        std::fs::write(&path, "{\"action\":\"wait\",\"ms\":1}\n\n{\"action\":\"done\"}\n").unwrap();

        let planner = build_planner(&AppConfig::default(), Some(&path)).await.unwrap();
        let input = agent_core::PlannerInput {
            goal: "g".into(),
            step: 1,
            state: String::new(),
            history: Vec::new(),
        };
        assert_eq!(planner.decide(&input).await.unwrap(), "{\"action\":\"wait\",\"ms\":1}");
        assert_eq!(planner.decide(&input).await.unwrap(), "{\"action\":\"done\"}");
    }
}
