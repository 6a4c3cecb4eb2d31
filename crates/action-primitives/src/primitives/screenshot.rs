//! Screenshot primitive

use base64::{engine::general_purpose::STANDARD as Base64, Engine as _};
use cdp_adapter::with_timeout;
use serde_json::{json, Value};

use crate::errors::ActionError;
use crate::primitives::ActionExecutor;

pub(crate) async fn execute_screenshot(
    executor: &ActionExecutor,
    full_page: bool,
) -> Result<Option<Value>, ActionError> {
    let limit = executor.action_timeout(None);
    let bytes = with_timeout(limit, "screenshot", executor.driver().screenshot(full_page)).await?;
    Ok(Some(json!({
        "bytes": bytes.len(),
        "full_page": full_page,
        "base64": Base64.encode(&bytes),
    })))
}

#[cfg(test)]
mod tests {
    use crate::primitives::test_support::executor_for;
    use crate::types::BrowserAction;
    use base64::{engine::general_purpose::STANDARD as Base64, Engine as _};
    use cdp_adapter::mock::MockPage;
    use serde_json::json;

    #[tokio::test]
    async fn returns_encoded_png() {
        let (driver, executor) = executor_for(MockPage::new("Shot")).await;
        let result = executor
            .execute(&BrowserAction::Screenshot { full_page: true })
            .await;
        assert!(result.success);
        let encoded = result.data_field("base64").and_then(|v| v.as_str()).unwrap();
        assert_eq!(Base64.decode(encoded).unwrap(), b"\x89PNG mock");
        assert_eq!(result.data_field("full_page"), Some(&json!(true)));
        assert_eq!(driver.calls(), vec!["screenshot:full"]);
    }
}
