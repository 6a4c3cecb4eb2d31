//! Contract tests against a real Chromium. Skipped unless `REFPILOT_REAL_CHROME=1`.

use std::env;
use std::time::Duration;

use cdp_adapter::{BrowserDriver, CdpConfig, CdpDriver, ClickOptions, WaitUntil};

macro_rules! skip_without_chrome {
    () => {
        let enabled = env::var("REFPILOT_REAL_CHROME")
            .map(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
            .unwrap_or(false);
        if !enabled {
            eprintln!("skipping: set REFPILOT_REAL_CHROME=1 to run against Chromium");
            return Ok(());
        }
    };
}

const FORM_PAGE: &str = "data:text/html,<title>Form</title>\
<label for=q>Search</label><input id=q type=search>\
<button onclick=\"document.title='clicked'\">Go</button>";

#[tokio::test]
async fn navigate_snapshot_and_click() -> Result<(), Box<dyn std::error::Error>> {
    skip_without_chrome!();

    let driver = CdpDriver::launch(CdpConfig::default()).await?;
    driver
        .navigate(FORM_PAGE, WaitUntil::Load, Duration::from_secs(15))
        .await?;
    assert_eq!(driver.title().await?, "Form");

    let tree = driver
        .accessibility_snapshot(Duration::from_secs(5))
        .await?
        .expect("accessibility tree");
    assert!(!tree.children.is_empty());

    let buttons = driver.query_by_role("button", "Go", true).await?;
    assert_eq!(buttons.len(), 1);
    driver.click(&buttons[0], ClickOptions::default()).await?;
    assert_eq!(driver.title().await?, "clicked");

    let search = driver.query_by_role("searchbox", "sea", false).await?;
    assert_eq!(search.len(), 1);
    driver.fill(&search[0], "hello").await?;
    assert_eq!(
        driver.get_attribute(&search[0], "id").await?.as_deref(),
        Some("q")
    );

    driver.close().await?;
    Ok(())
}

#[tokio::test]
async fn tab_moves_focus() -> Result<(), Box<dyn std::error::Error>> {
    skip_without_chrome!();

    let driver = CdpDriver::launch(CdpConfig::default()).await?;
    driver
        .navigate(FORM_PAGE, WaitUntil::DomContentLoaded, Duration::from_secs(15))
        .await?;
    driver.press_key("Tab").await?;
    let focused = driver.focused_element().await?.expect("focused element");
    assert_eq!(focused.role, "searchbox");
    driver.close().await?;
    Ok(())
}
