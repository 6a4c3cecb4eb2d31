//! Wait primitive

use std::time::{Duration, Instant};

use serde_json::{json, Value};
use tracing::debug;

use crate::errors::ActionError;
use crate::primitives::ActionExecutor;

/// Sleeps for `ms`, or polls until `text` shows up on the page.
pub(crate) async fn execute_wait(
    executor: &ActionExecutor,
    ms: Option<u64>,
    text: Option<&str>,
    timeout: Option<u64>,
) -> Result<Option<Value>, ActionError> {
    let Some(text) = text.filter(|t| !t.trim().is_empty()) else {
        let ms = ms.unwrap_or(executor.config().wait_ms);
        tokio::time::sleep(Duration::from_millis(ms)).await;
        return Ok(Some(json!({ "waited_ms": ms })));
    };

    let limit = executor.action_timeout(timeout);
    let poll = Duration::from_millis(executor.config().wait_poll_ms.max(1));
    let started = Instant::now();
    loop {
        let matches = executor.driver().query_by_text(text).await?;
        if !matches.is_empty() {
            let waited_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
            return Ok(Some(json!({ "text": text, "waited_ms": waited_ms })));
        }
        if started.elapsed() >= limit {
            return Err(ActionError::Timeout(format!(
                "text '{text}' did not appear within {}ms",
                limit.as_millis()
            )));
        }
        debug!(text, "waiting for text");
        tokio::time::sleep(poll).await;
    }
}

#[cfg(test)]
mod tests {
    use crate::errors::ActionError;
    use crate::primitives::test_support::{executor_for, executor_with};
    use crate::types::{BrowserAction, ExecutorConfig};
    use cdp_adapter::mock::{MockElement, MockPage};
    use serde_json::json;

    fn wait_for(text: &str, timeout: u64) -> BrowserAction {
        BrowserAction::Wait {
            ms: None,
            text: Some(text.into()),
            timeout: Some(timeout),
        }
    }

    #[tokio::test]
    async fn finds_text_already_present() {
        let page = MockPage::new("Done").with_element(MockElement::new("h1", "status", "Saved!"));
        let (_driver, executor) = executor_for(page).await;
        let result = executor.execute(&wait_for("saved", 500)).await;
        assert!(result.success, "{:?}", result.error);
        assert_eq!(result.data_field("text"), Some(&json!("saved")));
    }

    #[tokio::test]
    async fn missing_text_times_out() {
        let config = ExecutorConfig {
            wait_poll_ms: 10,
            ..ExecutorConfig::default()
        };
        let (driver, executor) = executor_with(MockPage::new("Empty"), config).await;
        let err = executor.try_execute(&wait_for("Saved", 50)).await.unwrap_err();
        assert!(matches!(err, ActionError::Timeout(_)));
        assert!(err.to_string().contains("timeout exceeded"));
        assert!(driver.calls_matching("query_by_text").len() >= 2);
    }

    #[tokio::test]
    async fn plain_wait_sleeps() {
        let (driver, executor) = executor_for(MockPage::new("Idle")).await;
        let result = executor
            .execute(&BrowserAction::Wait {
                ms: Some(5),
                text: None,
                timeout: None,
            })
            .await;
        assert!(result.success);
        assert_eq!(result.data_field("waited_ms"), Some(&json!(5)));
        assert!(driver.calls().is_empty());
    }
}
