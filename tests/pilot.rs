use std::sync::Arc;

use action_flow::{BackoffKind, RetryConfig, RetryOrchestrator};
use agent_core::{AgentLoopStatus, ScriptedPlanner};
use cdp_adapter::mock::{MockDriver, MockElement, MockPage};
use cdp_adapter::{AxNode, BrowserDriver};
use refpilot_cli::pilot::{act_once, build_executor, parse_action, run_goal, snapshot_page, GoalRun};
use refpilot_cli::AppConfig;
use tokio_util::sync::CancellationToken;

fn login_page() -> MockPage {
    MockPage::new("Sign in")
        .with_tree(AxNode::new("RootWebArea", "Sign in").with_children(vec![
            AxNode::new("textbox", "Email"),
            AxNode::new("textbox", "Birthday"),
            AxNode::new("button", "Continue"),
        ]))
        .with_element(MockElement::new("h-email", "textbox", "Email"))
        .with_element(MockElement::new("h-birthday", "textbox", "Birthday").attr("type", "date"))
        .with_element(MockElement::new("h-continue", "button", "Continue"))
}

fn config() -> AppConfig {
    let mut config = AppConfig::default();
    config.session.catalog.min_ax_elements = 0;
    config
}

fn driver() -> Arc<MockDriver> {
    let driver = Arc::new(MockDriver::new("about:blank", MockPage::new("blank")));
    driver.add_page("https://app.test/login", login_page());
    driver
}

#[tokio::test]
async fn snapshot_lists_refs_for_the_opened_page() {
    let driver = driver();
    let executor = build_executor(driver.clone() as Arc<dyn BrowserDriver>, &config());

    let text = snapshot_page(&executor, Some("https://app.test/login"), false, &config())
        .await
        .unwrap();

    assert!(text.starts_with("URL: https://app.test/login"));
    assert!(text.contains("[e1] textbox \"Email\""));
    assert!(text.contains("[e3] button \"Continue\""));

    let json = snapshot_page(&executor, None, true, &config()).await.unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(value["url"], "https://app.test/login");
}

#[tokio::test]
async fn act_fills_a_date_input_in_iso_form() {
    let driver = driver();
    let executor = build_executor(driver.clone() as Arc<dyn BrowserDriver>, &config());
    let action = parse_action(r#"{"action":"type","ref":"e2","text":"03/14/2025"}"#).unwrap();

    let output = act_once(&executor, Some("https://app.test/login"), &action, None)
        .await
        .unwrap();

    assert!(output.result.success, "{:?}", output.result.error);
    assert!(output.retry.is_none());
    assert_eq!(driver.element_value("h-birthday").as_deref(), Some("2025-03-14"));
}

#[tokio::test]
async fn act_with_retry_reports_the_attempts() {
    let driver = driver();
    let executor = build_executor(driver.clone() as Arc<dyn BrowserDriver>, &config());
    let retry = RetryOrchestrator::new(RetryConfig {
        max_retries: 2,
        base_delay_ms: 1,
        max_delay_ms: 5,
        backoff: BackoffKind::Linear,
    });
    let action = parse_action(r#"{"action":"click","ref":"e42"}"#).unwrap();

    let output = act_once(&executor, Some("https://app.test/login"), &action, Some(&retry))
        .await
        .unwrap();

    assert!(!output.result.success);
    assert_eq!(output.retry.unwrap().attempts, 2);
}

#[test]
fn malformed_action_json_is_rejected() {
    let err = parse_action(r#"{"action":"fly"}"#).unwrap_err();
    assert!(err.to_string().starts_with("invalid action JSON"));
}

#[tokio::test]
async fn goal_run_opens_the_start_page_and_completes() {
    let driver = driver();
    let config = config();
    let executor = build_executor(driver.clone() as Arc<dyn BrowserDriver>, &config);
    let planner = Arc::new(ScriptedPlanner::new([
        r#"{"action":"type","ref":"e1","text":"ada@example.com"}"#,
        r#"{"action":"click","ref":"e3"}"#,
        r#"{"action":"done","summary":"signed in"}"#,
    ]));

    let result = run_goal(
        executor,
        planner.clone(),
        &config,
        GoalRun {
            goal: "sign in",
            start_url: Some("https://app.test/login"),
            retry: None,
            cancel: CancellationToken::new(),
        },
    )
    .await
    .unwrap();

    assert_eq!(result.status, AgentLoopStatus::Completed);
    assert_eq!(result.steps, 3);
    assert_eq!(driver.element_value("h-email").as_deref(), Some("ada@example.com"));
    assert!(driver.calls().contains(&"click:h-continue".to_string()));
    assert!(planner.inputs()[0].state.contains("URL: https://app.test/login"));
}
