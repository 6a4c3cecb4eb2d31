//! Dropdown selection primitive

use cdp_adapter::with_timeout;
use refpilot_core_types::ElementRef;
use serde_json::{json, Value};

use crate::errors::ActionError;
use crate::primitives::ActionExecutor;

pub(crate) async fn execute_select(
    executor: &ActionExecutor,
    element_ref: &ElementRef,
    value: &str,
    timeout: Option<u64>,
) -> Result<Option<Value>, ActionError> {
    if value.is_empty() {
        return Err(ActionError::InvalidArgument(
            "select needs a non-empty option value or label".to_string(),
        ));
    }
    let target = executor.resolve(element_ref).await?;
    let limit = executor.action_timeout(timeout);
    let selected = with_timeout(
        limit,
        "select_option",
        executor.driver().select_option(&target.handle, value),
    )
    .await?;
    Ok(Some(json!({ "selected": selected })))
}

#[cfg(test)]
mod tests {
    use crate::errors::ActionError;
    use crate::primitives::test_support::executor_for;
    use crate::types::BrowserAction;
    use cdp_adapter::mock::{MockElement, MockPage};
    use cdp_adapter::AxNode;
    use serde_json::json;

    fn page() -> MockPage {
        MockPage::new("Shipping")
            .with_tree(
                AxNode::new("RootWebArea", "Shipping")
                    .with_children(vec![AxNode::new("combobox", "Country")]),
            )
            .with_element(
                MockElement::new("h-c", "combobox", "Country").with_options(&["France", "Japan"]),
            )
    }

    fn select(value: &str) -> BrowserAction {
        BrowserAction::Select {
            element_ref: "e1".parse().unwrap(),
            value: value.into(),
            timeout: None,
        }
    }

    #[tokio::test]
    async fn selects_a_known_option() {
        let (driver, executor) = executor_for(page()).await;
        let result = executor.execute(&select("Japan")).await;
        assert!(result.success, "{:?}", result.error);
        assert_eq!(result.data_field("selected"), Some(&json!(["Japan"])));
        assert_eq!(driver.element_value("h-c").as_deref(), Some("Japan"));
    }

    #[tokio::test]
    async fn unknown_option_is_reported() {
        let (_driver, executor) = executor_for(page()).await;
        let err = executor.try_execute(&select("Mars")).await.unwrap_err();
        assert!(matches!(err, ActionError::OptionNotFound(_)));
        assert!(err.to_string().contains("Mars"));
    }
}
