//! Type text primitive

use std::time::Duration;

use cdp_adapter::with_timeout;
use refpilot_core_types::ElementRef;
use serde_json::{json, Value};
use tracing::debug;

use crate::errors::ActionError;
use crate::primitives::ActionExecutor;

/// Types `text` into the ref'd field, then presses Enter when `submit` is set.
///
/// Date-looking fields go to the session's date handler, if one is registered. Everything else
/// is filled in one step, falling back to key-by-key typing when the fill is rejected.
pub(crate) async fn execute_type_text(
    executor: &ActionExecutor,
    element_ref: &ElementRef,
    text: &str,
    submit: bool,
    timeout: Option<u64>,
) -> Result<Option<Value>, ActionError> {
    let target = executor.resolve(element_ref).await?;
    let driver = executor.driver();
    let limit = executor.action_timeout(timeout);

    let recorded_value = executor
        .session()
        .previous()
        .filter(|catalog| catalog.generation == target.generation)
        .and_then(|catalog| catalog.get(element_ref).and_then(|row| row.value.clone()));

    let date_handler = executor
        .session()
        .capabilities()
        .date_input
        .clone()
        .filter(|handler| {
            handler.is_date_input(&target.role, &target.name, recorded_value.as_deref(), text)
        });

    let mode = if let Some(handler) = date_handler {
        with_timeout(limit, "fill_date", handler.fill_date(driver, &target.handle, text)).await?;
        "date"
    } else {
        match with_timeout(limit, "fill", driver.fill(&target.handle, text)).await {
            Ok(()) => "fill",
            Err(err) if err.is_fatal() => return Err(err.into()),
            Err(err) => {
                debug!(element_ref = %element_ref, %err, "fill rejected; typing key by key");
                let delay = Duration::from_millis(executor.config().key_delay_ms);
                driver.focus(&target.handle).await?;
                driver.type_text(&target.handle, text, delay).await?;
                "keystrokes"
            }
        }
    };

    if submit {
        with_timeout(limit, "press", driver.press_key("Enter")).await?;
    }

    Ok(Some(json!({
        "text": text,
        "submitted": submit,
        "mode": mode,
    })))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::date::IsoDateInputHandler;
    use crate::primitives::ActionExecutor;
    use crate::primitives::test_support::executor_for;
    use crate::types::{BrowserAction, ExecutorConfig};
    use cdp_adapter::mock::{MockDriver, MockElement, MockPage};
    use cdp_adapter::{AdapterError, AdapterErrorKind, AxNode};
    use perceiver_structural::{BrowserSession, Capabilities, SessionConfig};
    use serde_json::json;

    fn search_page() -> MockPage {
        MockPage::new("Search")
            .with_tree(
                AxNode::new("RootWebArea", "Search")
                    .with_children(vec![AxNode::new("searchbox", "Search")]),
            )
            .with_element(MockElement::new("h-q", "searchbox", "Search"))
    }

    fn type_action(r: &str, text: &str, submit: bool) -> BrowserAction {
        BrowserAction::Type {
            element_ref: r.parse().unwrap(),
            text: text.into(),
            submit,
            timeout: None,
        }
    }

    #[tokio::test]
    async fn type_and_submit_presses_enter_after_filling() {
        let (driver, executor) = executor_for(search_page()).await;
        let result = executor.execute(&type_action("e1", "hello", true)).await;

        assert!(result.success, "{:?}", result.error);
        assert_eq!(result.data_field("text"), Some(&json!("hello")));
        let calls = driver.calls();
        let filled = calls.iter().position(|c| c == "fill:h-q:hello").unwrap();
        let submitted = calls.iter().position(|c| c == "press:Enter").unwrap();
        assert!(filled < submitted);
        assert_eq!(driver.element_value("h-q").as_deref(), Some("hello"));
    }

    #[tokio::test]
    async fn rejected_fill_types_sequentially() {
        let (driver, executor) = executor_for(search_page()).await;
        driver.fail_next("fill", AdapterError::new(AdapterErrorKind::CdpIo).with_hint("readonly proxy"));
        let result = executor.execute(&type_action("e1", "abc", false)).await;
        assert!(result.success);
        assert_eq!(result.data_field("mode"), Some(&json!("keystrokes")));
        assert!(driver.calls_matching("press").is_empty());
        assert_eq!(driver.element_value("h-q").as_deref(), Some("abc"));
    }

    #[tokio::test]
    async fn date_fields_go_through_the_registered_handler() {
        let page = MockPage::new("Booking")
            .with_tree(
                AxNode::new("RootWebArea", "Booking")
                    .with_children(vec![AxNode::new("textbox", "Check-in date")]),
            )
            .with_element(
                MockElement::new("h-in", "textbox", "Check-in date").attr("type", "date"),
            );
        let driver = Arc::new(MockDriver::new("https://book.test/", page));
        let session = BrowserSession::new(driver.clone(), SessionConfig::default())
            .with_capabilities(
                Capabilities::none().with_date_input(Arc::new(IsoDateInputHandler::new())),
            );
        let session = Arc::new(session);
        session.snapshot(false).await.unwrap();
        let executor = ActionExecutor::new(session, ExecutorConfig::default());

        let result = executor.execute(&type_action("e1", "03/14/2025", false)).await;
        assert!(result.success, "{:?}", result.error);
        assert_eq!(result.data_field("mode"), Some(&json!("date")));
        assert_eq!(driver.element_value("h-in").as_deref(), Some("2025-03-14"));
    }
}
