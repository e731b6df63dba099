//! Page actions with explicit operation context
//!
//! Every helper takes an [`Operation`] naming the utility, locator and step,
//! so a failure message says exactly what was being attempted.

use std::fmt;

use thiserror::Error;
use tracing::{debug, info};

use crate::engine::Page;
use crate::error::{E2eError, E2eResult};

/// What a page action is doing, carried into its error
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Operation {
    pub utility: String,
    pub locator: String,
    pub step: String,
}

impl Operation {
    pub fn new(utility: impl Into<String>, locator: &str, step: impl Into<String>) -> Self {
        Self {
            utility: utility.into(),
            locator: normalize_locator(locator),
            step: step.into(),
        }
    }

    fn fail(&self, details: impl fmt::Display) -> ActionError {
        ActionError {
            utility: self.utility.clone(),
            locator: self.locator.clone(),
            step: self.step.clone(),
            details: details.to_string(),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("[{utility}] Step: {step} | Locator: {locator} | {details}")]
pub struct ActionError {
    pub utility: String,
    pub locator: String,
    pub step: String,
    pub details: String,
}

/// Bare XPath expressions get an explicit `xpath=` engine prefix
pub fn normalize_locator(locator: &str) -> String {
    let trimmed = locator.trim();
    if trimmed.starts_with("//") || trimmed.starts_with("(//") {
        format!("xpath={}", trimmed)
    } else {
        trimmed.to_string()
    }
}

pub fn click(page: &dyn Page, op: &Operation) -> E2eResult<()> {
    info!("Step: {} | click {}", op.step, op.locator);
    page.click(&op.locator).map_err(|e| op.fail(e))?;
    Ok(())
}

pub fn fill(page: &dyn Page, op: &Operation, value: &str) -> E2eResult<()> {
    info!("Step: {} | fill {}", op.step, op.locator);
    page.fill(&op.locator, value).map_err(|e| op.fail(e))?;
    Ok(())
}

/// Fail unless the element's text equals `expected` (whitespace-trimmed)
pub fn verify_text_equals(page: &dyn Page, op: &Operation, expected: &str) -> E2eResult<()> {
    let actual = page.text_content(&op.locator).map_err(|e| op.fail(e))?;
    if actual.trim() != expected.trim() {
        return Err(E2eError::AssertionFailed(format!(
            "Text mismatch @ {} | expected='{}' actual='{}'",
            op.locator,
            expected.trim(),
            actual.trim()
        )));
    }
    debug!("Text verified @ {}", op.locator);
    Ok(())
}

/// Whether the element is visible. Engine errors are returned, not turned
/// into a test failure.
pub fn probe_visible(page: &dyn Page, op: &Operation) -> E2eResult<bool> {
    page.is_visible(&op.locator).map_err(|e| E2eError::from(op.fail(e)))
}

/// Fail the test unless the element is visible
pub fn verify_visible(page: &dyn Page, op: &Operation) -> E2eResult<()> {
    if probe_visible(page, op)? {
        Ok(())
    } else {
        Err(op.fail("element not visible").into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::sync::Mutex;

    /// Page with one visible element, one hidden one and a detached one
    #[derive(Default)]
    struct StubPage {
        filled: Mutex<Vec<(String, String)>>,
    }

    impl Page for StubPage {
        fn goto(&self, _url: &str) -> E2eResult<()> {
            Ok(())
        }

        fn click(&self, _selector: &str) -> E2eResult<()> {
            Ok(())
        }

        fn fill(&self, selector: &str, value: &str) -> E2eResult<()> {
            if selector == "#detached" {
                return Err(E2eError::Timeout("Timeout 5000ms exceeded.".into()));
            }
            self.filled
                .lock()
                .unwrap()
                .push((selector.to_string(), value.to_string()));
            Ok(())
        }

        fn text_content(&self, _selector: &str) -> E2eResult<String> {
            Ok(String::new())
        }

        fn is_visible(&self, selector: &str) -> E2eResult<bool> {
            match selector {
                "#cart" => Ok(true),
                "#detached" => Err(E2eError::Browser("Target closed".into())),
                _ => Ok(false),
            }
        }

        fn screenshot(&self, _full_page: bool) -> E2eResult<Vec<u8>> {
            Ok(Vec::new())
        }

        fn video_path(&self) -> Option<PathBuf> {
            None
        }
    }

    #[test]
    fn test_normalize_locator() {
        assert_eq!(normalize_locator("//button[@id='go']"), "xpath=//button[@id='go']");
        assert_eq!(normalize_locator("(//a)[2]"), "xpath=(//a)[2]");
        assert_eq!(normalize_locator(" #submit "), "#submit");
    }

    #[test]
    fn test_action_error_format() {
        let op = Operation::new("ClickUtils", "//button", "Click - Submit");
        let err = op.fail("timeout 30000ms");
        assert_eq!(
            err.to_string(),
            "[ClickUtils] Step: Click - Submit | Locator: xpath=//button | timeout 30000ms"
        );
    }

    #[test]
    fn test_hidden_element_is_not_a_failure() {
        let page = StubPage::default();
        let hidden = Operation::new("WaitUtils", "#banner", "Check banner");
        assert!(!probe_visible(&page, &hidden).unwrap());
        assert!(probe_visible(&page, &Operation::new("WaitUtils", "#cart", "Check cart")).unwrap());
    }

    #[test]
    fn test_visibility_engine_error_keeps_context() {
        let page = StubPage::default();
        let op = Operation::new("WaitUtils", "#detached", "Check row");
        let err = probe_visible(&page, &op).unwrap_err();
        assert_eq!(
            err.to_string(),
            "[WaitUtils] Step: Check row | Locator: #detached | Browser error: Target closed"
        );
    }

    #[test]
    fn test_verify_visible_fails_on_hidden_element() {
        let page = StubPage::default();
        verify_visible(&page, &Operation::new("AssertUtils", "#cart", "Cart shown")).unwrap();

        let err = verify_visible(&page, &Operation::new("AssertUtils", "//div[@id='promo']", "Promo shown"))
            .unwrap_err();
        assert!(matches!(err, E2eError::Action(_)));
        assert_eq!(
            err.to_string(),
            "[AssertUtils] Step: Promo shown | Locator: xpath=//div[@id='promo'] | element not visible"
        );
    }

    #[test]
    fn test_fill_passes_value_and_wraps_errors() {
        let page = StubPage::default();
        fill(&page, &Operation::new("InputUtils", " #user ", "Enter user"), "standard_user").unwrap();
        assert_eq!(
            page.filled.lock().unwrap().as_slice(),
            &[("#user".to_string(), "standard_user".to_string())]
        );

        let err = fill(&page, &Operation::new("InputUtils", "#detached", "Enter password"), "secret")
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "[InputUtils] Step: Enter password | Locator: #detached | TimeoutError: Timeout 5000ms exceeded."
        );
    }
}
