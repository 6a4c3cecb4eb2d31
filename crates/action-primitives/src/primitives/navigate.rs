//! Navigate primitive

use serde_json::{json, Value};
use tracing::debug;

use crate::errors::ActionError;
use crate::primitives::ActionExecutor;

/// Loads `url`. Refs from before the navigation stop resolving whatever the outcome.
pub(crate) async fn execute_navigate(
    executor: &ActionExecutor,
    url: &str,
    timeout: Option<u64>,
) -> Result<Option<Value>, ActionError> {
    if url.trim().is_empty() {
        return Err(ActionError::InvalidArgument("url must not be empty".into()));
    }
    let limit = executor.config().navigation_timeout(timeout);
    debug!(url, timeout_ms = limit.as_millis() as u64, "navigating");
    executor.session().navigate(url, limit).await?;

    let driver = executor.driver();
    let landed = driver.current_url().await?;
    let title = driver.title().await.unwrap_or_default();
    Ok(Some(json!({ "url": landed, "title": title })))
}

#[cfg(test)]
mod tests {
    use crate::errors::ActionError;
    use crate::primitives::test_support::executor_for;
    use crate::types::BrowserAction;
    use cdp_adapter::mock::{MockElement, MockPage};
    use cdp_adapter::AxNode;
    use serde_json::json;

    fn home() -> MockPage {
        MockPage::new("Home")
            .with_tree(
                AxNode::new("RootWebArea", "Home")
                    .with_children(vec![AxNode::new("link", "Docs")]),
            )
            .with_element(MockElement::new("h-docs", "link", "Docs"))
    }

    #[tokio::test]
    async fn navigation_retires_old_refs() {
        let (driver, executor) = executor_for(home()).await;
        driver.add_page("https://app.test/docs", MockPage::new("Docs"));

        let result = executor
            .execute(&BrowserAction::Navigate {
                url: "https://app.test/docs".into(),
                timeout: None,
            })
            .await;
        assert!(result.success, "{:?}", result.error);
        assert_eq!(result.data_field("title"), Some(&json!("Docs")));

        let err = executor
            .try_execute(&BrowserAction::Click {
                element_ref: "e1".parse().unwrap(),
                force: false,
                timeout: None,
            })
            .await
            .unwrap_err();
        assert!(err.is_stale_ref());
    }

    #[tokio::test]
    async fn empty_url_is_rejected_before_touching_the_browser() {
        let (driver, executor) = executor_for(home()).await;
        let err = executor
            .try_execute(&BrowserAction::Navigate {
                url: "  ".into(),
                timeout: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ActionError::InvalidArgument(_)));
        assert!(driver.calls().is_empty());
    }
}
