//! Scroll primitive

use cdp_adapter::with_timeout;
use refpilot_core_types::ElementRef;
use serde_json::{json, Value};

use crate::errors::ActionError;
use crate::primitives::ActionExecutor;
use crate::types::ScrollDirection;

/// Scrolls a ref into view, or wheels the page. Either way the page's cached snapshot is dropped
/// since lazily rendered content may have appeared.
pub(crate) async fn execute_scroll(
    executor: &ActionExecutor,
    direction: ScrollDirection,
    amount: Option<u32>,
    element_ref: Option<&ElementRef>,
) -> Result<Option<Value>, ActionError> {
    let limit = executor.action_timeout(None);
    let data = match element_ref {
        Some(element_ref) => {
            let target = executor.resolve(element_ref).await?;
            with_timeout(
                limit,
                "scroll_into_view",
                executor.driver().scroll_into_view(&target.handle),
            )
            .await?;
            json!({ "into_view": element_ref.as_str() })
        }
        None => {
            let amount = amount.unwrap_or(executor.config().scroll_amount);
            let (dx, dy) = direction.delta(amount);
            with_timeout(limit, "mouse_wheel", executor.driver().mouse_wheel(dx, dy)).await?;
            json!({ "dx": dx, "dy": dy })
        }
    };
    executor.session().invalidate_current().await?;
    Ok(Some(data))
}

#[cfg(test)]
mod tests {
    use crate::primitives::test_support::executor_for;
    use crate::types::{BrowserAction, ScrollDirection};
    use cdp_adapter::mock::{MockElement, MockPage};
    use cdp_adapter::AxNode;

    fn page() -> MockPage {
        MockPage::new("Feed")
            .with_tree(
                AxNode::new("RootWebArea", "Feed")
                    .with_children(vec![AxNode::new("link", "Older posts")]),
            )
            .with_element(MockElement::new("h-older", "link", "Older posts"))
    }

    #[tokio::test]
    async fn page_scroll_uses_default_amount_and_drops_cache() {
        let (driver, executor) = executor_for(page()).await;
        assert!(executor.session().cache().contains("https://app.test/"));

        let result = executor
            .execute(&BrowserAction::Scroll {
                direction: ScrollDirection::Up,
                amount: None,
                element_ref: None,
            })
            .await;
        assert!(result.success, "{:?}", result.error);
        assert_eq!(driver.calls_matching("mouse_wheel"), vec!["mouse_wheel:0,-600"]);
        assert!(!executor.session().cache().contains("https://app.test/"));
    }

    #[tokio::test]
    async fn ref_scroll_brings_element_into_view() {
        let (driver, executor) = executor_for(page()).await;
        let result = executor
            .execute(&BrowserAction::Scroll {
                direction: ScrollDirection::Down,
                amount: Some(100),
                element_ref: Some("e1".parse().unwrap()),
            })
            .await;
        assert!(result.success, "{:?}", result.error);
        assert_eq!(
            driver.calls_matching("scroll_into_view"),
            vec!["scroll_into_view:h-older"]
        );
        assert!(driver.calls_matching("mouse_wheel").is_empty());
    }
}
