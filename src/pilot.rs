//! Browser-facing bodies of the `run`, `snapshot` and `act` commands.
//!
//! Everything here takes an already connected driver so the same paths run against Chromium and
//! against the scripted driver in tests.

use std::sync::Arc;

use action_flow::{RetryOrchestrator, RetryOutcome};
use action_primitives::{ActionExecutor, ActionResult, BrowserAction, IsoDateInputHandler};
use agent_core::{AgentLoopController, AgentLoopResult, Planner, StateFormatter};
use anyhow::{anyhow, bail, Context, Result};
use cdp_adapter::BrowserDriver;
use perceiver_structural::{BrowserSession, Capabilities};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::AppConfig;

/// Session plus executor wired from the app config, with the bundled date-input handler.
pub fn build_executor(driver: Arc<dyn BrowserDriver>, config: &AppConfig) -> Arc<ActionExecutor> {
    let capabilities = Capabilities::none().with_date_input(Arc::new(IsoDateInputHandler::new()));
    let session =
        BrowserSession::new(driver, config.session.clone()).with_capabilities(capabilities);
    Arc::new(ActionExecutor::new(
        Arc::new(session),
        config.executor.clone(),
    ))
}

pub async fn open(executor: &ActionExecutor, url: &str) -> Result<()> {
    let navigate = BrowserAction::Navigate {
        url: url.to_string(),
        timeout: None,
    };
    let result = executor.execute(&navigate).await;
    if !result.success {
        bail!(
            "failed to open {}: {}",
            url,
            result.error.unwrap_or_else(|| "unknown error".into())
        );
    }
    info!(url, "page opened");
    Ok(())
}

/// Renders the current page's catalog, as the planner would see it or as JSON.
pub async fn snapshot_page(
    executor: &ActionExecutor,
    url: Option<&str>,
    json: bool,
    config: &AppConfig,
) -> Result<String> {
    if let Some(url) = url {
        open(executor, url).await?;
    }
    let view = executor
        .session()
        .snapshot(true)
        .await
        .context("Failed to capture snapshot")?;

    if json {
        return serde_json::to_string_pretty(view.catalog.as_ref())
            .context("Failed to serialize catalog");
    }
    Ok(StateFormatter::new(&config.agent).format_catalog(&view.catalog))
}

#[derive(Debug, Clone, Serialize)]
pub struct ActOutput {
    pub result: ActionResult,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry: Option<RetryOutcome>,
}

/// Observes once so refs exist, then runs a single action.
pub async fn act_once(
    executor: &ActionExecutor,
    url: Option<&str>,
    action: &BrowserAction,
    retry: Option<&RetryOrchestrator>,
) -> Result<ActOutput> {
    if let Some(url) = url {
        open(executor, url).await?;
    }
    executor
        .session()
        .snapshot(false)
        .await
        .context("Failed to capture snapshot")?;

    let output = match retry {
        Some(orchestrator) => {
            let retried = orchestrator.execute_action(executor, action).await;
            ActOutput {
                result: retried.result,
                retry: Some(retried.outcome),
            }
        }
        None => ActOutput {
            result: executor.execute(action).await,
            retry: None,
        },
    };
    Ok(output)
}

pub fn parse_action(raw: &str) -> Result<BrowserAction> {
    serde_json::from_str(raw).map_err(|err| anyhow!("invalid action JSON: {err}"))
}

pub struct GoalRun<'a> {
    pub goal: &'a str,
    pub start_url: Option<&'a str>,
    pub retry: Option<RetryOrchestrator>,
    pub cancel: CancellationToken,
}

pub async fn run_goal(
    executor: Arc<ActionExecutor>,
    planner: Arc<dyn Planner>,
    config: &AppConfig,
    run: GoalRun<'_>,
) -> Result<AgentLoopResult> {
    if let Some(url) = run.start_url {
        open(&executor, url).await?;
    }
    let mut controller = AgentLoopController::new(executor, planner, config.agent.clone())
        .with_cancellation(run.cancel);
    if let Some(orchestrator) = run.retry {
        controller = controller.with_retry(orchestrator);
    }
    Ok(controller.run(run.goal).await)
}
