//! Bundled date-input handler.

use std::time::Duration;

use async_trait::async_trait;
use cdp_adapter::{AdapterError, BrowserDriver, ElementHandle};
use chrono::NaiveDate;
use perceiver_structural::DateInputHandler;
use tracing::debug;

const DATE_WORDS: &[&str] = &[
    "date", "birthday", "dob", "check-in", "check-out", "checkin", "checkout", "departure",
    "arrival", "from", "until",
];

/// Input formats tried, in order, when normalizing typed text.
const FORMATS: &[&str] = &[
    "%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%d.%m.%Y", "%B %d, %Y", "%b %d, %Y", "%d %B %Y",
    "%d %b %Y",
];

/// Fills native `type=date` inputs with an ISO `YYYY-MM-DD` value; other date-looking fields
/// (custom pickers) get the raw text typed key by key, then Escape to close the picker.
#[derive(Debug, Clone)]
pub struct IsoDateInputHandler {
    key_delay: Duration,
}

impl Default for IsoDateInputHandler {
    fn default() -> Self {
        Self {
            key_delay: Duration::from_millis(30),
        }
    }
}

impl IsoDateInputHandler {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Parses common human date spellings into a calendar date.
pub fn parse_date(text: &str) -> Option<NaiveDate> {
    let text = text.trim();
    FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(text, format).ok())
}

#[async_trait]
impl DateInputHandler for IsoDateInputHandler {
    fn is_date_input(&self, role: &str, name: &str, value: Option<&str>, text: &str) -> bool {
        if !matches!(role, "textbox" | "combobox" | "spinbutton") {
            return false;
        }
        let name = name.to_lowercase();
        let labelled = DATE_WORDS.iter().any(|word| name.contains(word));
        let value_is_date = value.map(|v| parse_date(v).is_some()).unwrap_or(false);
        (labelled || value_is_date) && parse_date(text).is_some()
    }

    async fn fill_date(
        &self,
        driver: &dyn BrowserDriver,
        handle: &ElementHandle,
        text: &str,
    ) -> Result<(), AdapterError> {
        let input_type = driver.get_attribute(handle, "type").await?;
        if input_type.as_deref() == Some("date") {
            let date = parse_date(text).ok_or_else(|| {
                AdapterError::new(cdp_adapter::AdapterErrorKind::InvalidArgument)
                    .with_hint(format!("'{text}' is not a recognizable date"))
            })?;
            let iso = date.format("%Y-%m-%d").to_string();
            debug!(handle = handle.id(), %iso, "filling native date input");
            return driver.fill(handle, &iso).await;
        }

        debug!(handle = handle.id(), "typing into custom date field");
        driver.focus(handle).await?;
        driver.fill(handle, "").await?;
        driver.type_text(handle, text, self.key_delay).await?;
        driver.press_key("Escape").await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cdp_adapter::mock::{MockDriver, MockElement, MockPage};

    #[test]
    fn recognizes_date_fields_by_label_and_text() {
        let handler = IsoDateInputHandler::new();
        assert!(handler.is_date_input("textbox", "Departure date", None, "03/14/2025"));
        assert!(handler.is_date_input("textbox", "When", Some("2024-01-01"), "2025-02-01"));
        assert!(!handler.is_date_input("textbox", "Departure date", None, "next friday"));
        assert!(!handler.is_date_input("button", "Pick date", None, "2025-02-01"));
        assert!(!handler.is_date_input("searchbox", "Search", None, "2025-02-01"));
    }

    #[test]
    fn parses_common_spellings() {
        let expected = NaiveDate::from_ymd_opt(2025, 3, 14);
        assert_eq!(parse_date("2025-03-14"), expected);
        assert_eq!(parse_date("03/14/2025"), expected);
        assert_eq!(parse_date("March 14, 2025"), expected);
        assert_eq!(parse_date("14.03.2025"), expected);
        assert_eq!(parse_date("soon"), None);
    }

    #[tokio::test]
    async fn native_inputs_get_iso_values() {
        let driver = MockDriver::new(
            "https://d.test/",
            MockPage::new("d").with_element(
                MockElement::new("h-date", "textbox", "Check-in").attr("type", "date"),
            ),
        );
        IsoDateInputHandler::new()
            .fill_date(&driver, &ElementHandle::new("h-date"), "March 14, 2025")
            .await
            .unwrap();
        assert_eq!(driver.element_value("h-date").as_deref(), Some("2025-03-14"));
    }

    #[tokio::test]
    async fn custom_pickers_are_typed_then_dismissed() {
        let driver = MockDriver::new(
            "https://d.test/",
            MockPage::new("d").with_element(MockElement::new("h-date", "textbox", "Check-in")),
        );
        IsoDateInputHandler::new()
            .fill_date(&driver, &ElementHandle::new("h-date"), "03/14/2025")
            .await
            .unwrap();
        assert_eq!(driver.element_value("h-date").as_deref(), Some("03/14/2025"));
        assert_eq!(driver.calls().last().map(String::as_str), Some("press:Escape"));
    }
}
