use crate::config::Viewport;
use crate::core::{Condition, Driver, DriverKind, Lifecycle, NavigationEntry, NavigationLog};
use crate::core::driver::ScreenshotOptions;
use crate::errors::{BdUiError, Result};
use crate::utils::resolve_url;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use tracing::debug;

const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

/// Element state inside the mock page model.
#[derive(Debug, Clone)]
pub struct MockElement {
    pub value: Option<String>,
    pub text: String,
    pub visible: bool,
    pub options: Vec<String>,
    pub selected: Vec<String>,
}

impl Default for MockElement {
    fn default() -> Self {
        Self {
            value: None,
            text: String::new(),
            visible: true,
            options: Vec::new(),
            selected: Vec::new(),
        }
    }
}

impl MockElement {
    pub fn with_text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    pub fn with_value(value: impl Into<String>) -> Self {
        Self {
            value: Some(value.into()),
            ..Self::default()
        }
    }

    pub fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }

    pub fn with_options(mut self, options: &[&str]) -> Self {
        self.options = options.iter().map(|o| o.to_string()).collect();
        self
    }
}

#[derive(Debug)]
struct MockPage {
    url: String,
    title: String,
    back_stack: Vec<String>,
    forward_stack: Vec<String>,
    elements: HashMap<String, MockElement>,
    viewport: Viewport,
}

impl MockPage {
    fn new() -> Self {
        Self {
            url: "about:blank".to_string(),
            title: "mock".to_string(),
            back_stack: Vec::new(),
            forward_stack: Vec::new(),
            elements: HashMap::new(),
            viewport: Viewport::default(),
        }
    }
}

/// In-memory driver: records every call and answers with deterministic
/// canned state, with no native resources behind it.
///
/// Interactions (`click`, `fill`, `type_text`, `select`) materialize the
/// target element on first touch; read operations on a never-touched
/// selector fail like a real backend would. `click` marks the element
/// engaged by setting its value to `"true"`.
pub struct MockDriver {
    lifecycle: Lifecycle,
    log: NavigationLog,
    base_url: String,
    page: Mutex<MockPage>,
    calls: Mutex<Vec<String>>,
}

impl MockDriver {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            lifecycle: Lifecycle::new(),
            log: NavigationLog::new(),
            base_url: base_url.into(),
            page: Mutex::new(MockPage::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Pre-populate the page model, e.g. so `wait_for`/`get_text` have
    /// something to find before any interaction.
    pub fn seed_element(&self, selector: impl Into<String>, element: MockElement) {
        if let Ok(mut page) = self.page.lock() {
            page.elements.insert(selector.into(), element);
        }
    }

    /// Every contract call recorded in invocation order, for assertions.
    pub fn calls(&self) -> Vec<String> {
        self.calls
            .lock()
            .map(|calls| calls.clone())
            .unwrap_or_default()
    }

    fn record_call(&self, call: String) {
        debug!(target: "bdui::mock", call = %call);
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(call);
        }
    }

    fn with_page<R>(&self, f: impl FnOnce(&mut MockPage) -> Result<R>) -> Result<R> {
        let mut page = self
            .page
            .lock()
            .map_err(|_| BdUiError::Script("mock page lock poisoned".to_string()))?;
        f(&mut page)
    }

    fn read_element<R>(
        &self,
        selector: &str,
        f: impl FnOnce(&MockElement) -> R,
    ) -> Result<R> {
        self.with_page(|page| {
            page.elements
                .get(selector)
                .map(f)
                .ok_or_else(|| BdUiError::ElementNotFound(selector.to_string()))
        })
    }
}

impl Default for MockDriver {
    fn default() -> Self {
        Self::new("http://localhost:3000")
    }
}

#[async_trait]
impl Driver for MockDriver {
    fn kind(&self) -> DriverKind {
        DriverKind::Mock
    }

    async fn goto(&self, url: &str) -> Result<()> {
        self.lifecycle.ensure_active()?;
        let resolved = resolve_url(&self.base_url, url)?;
        self.record_call(format!("goto({})", resolved));
        self.with_page(|page| {
            let previous = std::mem::replace(&mut page.url, resolved.clone());
            page.back_stack.push(previous);
            page.forward_stack.clear();
            Ok(())
        })?;
        self.log.record(resolved);
        Ok(())
    }

    async fn reload(&self) -> Result<()> {
        self.lifecycle.ensure_active()?;
        self.record_call("reload()".to_string());
        let url = self.with_page(|page| Ok(page.url.clone()))?;
        self.log.record(url);
        Ok(())
    }

    async fn back(&self) -> Result<()> {
        self.lifecycle.ensure_active()?;
        self.record_call("back()".to_string());
        let url = self.with_page(|page| {
            let target = page.back_stack.pop().ok_or_else(|| {
                BdUiError::Navigation("no history entry behind the current page".to_string())
            })?;
            let current = std::mem::replace(&mut page.url, target.clone());
            page.forward_stack.push(current);
            Ok(target)
        })?;
        self.log.record(url);
        Ok(())
    }

    async fn forward(&self) -> Result<()> {
        self.lifecycle.ensure_active()?;
        self.record_call("forward()".to_string());
        let url = self.with_page(|page| {
            let target = page.forward_stack.pop().ok_or_else(|| {
                BdUiError::Navigation("no history entry ahead of the current page".to_string())
            })?;
            let current = std::mem::replace(&mut page.url, target.clone());
            page.back_stack.push(current);
            Ok(target)
        })?;
        self.log.record(url);
        Ok(())
    }

    async fn click(&self, selector: &str) -> Result<()> {
        self.lifecycle.ensure_active()?;
        self.record_call(format!("click({})", selector));
        self.with_page(|page| {
            let element = page.elements.entry(selector.to_string()).or_default();
            element.value = Some("true".to_string());
            Ok(())
        })
    }

    async fn type_text(&self, selector: &str, text: &str) -> Result<()> {
        self.lifecycle.ensure_active()?;
        self.record_call(format!("type({}, {:?})", selector, text));
        self.with_page(|page| {
            let element = page.elements.entry(selector.to_string()).or_default();
            let mut value = element.value.take().unwrap_or_default();
            value.push_str(text);
            element.value = Some(value);
            Ok(())
        })
    }

    async fn fill(&self, selector: &str, value: &str) -> Result<()> {
        self.lifecycle.ensure_active()?;
        self.record_call(format!("fill({}, {:?})", selector, value));
        self.with_page(|page| {
            let element = page.elements.entry(selector.to_string()).or_default();
            element.value = Some(value.to_string());
            Ok(())
        })
    }

    async fn select(&self, selector: &str, options: &[&str]) -> Result<()> {
        self.lifecycle.ensure_active()?;
        self.record_call(format!("select({}, {:?})", selector, options));
        self.with_page(|page| {
            let element = page.elements.entry(selector.to_string()).or_default();
            if !element.options.is_empty() {
                let missing: Vec<_> = options
                    .iter()
                    .filter(|o| !element.options.iter().any(|have| have == *o))
                    .collect();
                if !missing.is_empty() {
                    return Err(BdUiError::NotInteractable(format!(
                        "{}: options unavailable: {:?}",
                        selector, missing
                    )));
                }
            }
            element.selected = options.iter().map(|o| o.to_string()).collect();
            element.value = options.first().map(|o| o.to_string());
            Ok(())
        })
    }

    async fn wait_for(&self, selector: &str, timeout: Option<Duration>) -> Result<()> {
        self.lifecycle.ensure_active()?;
        self.record_call(format!("wait_for({})", selector));
        let found = self.with_page(|page| Ok(page.elements.contains_key(selector)))?;
        if found {
            Ok(())
        } else {
            // Nothing mutates the page concurrently, so an absent selector
            // can never appear; fail without sleeping out the window.
            let window = timeout.unwrap_or(Duration::from_millis(5000));
            Err(BdUiError::Timeout(format!(
                "{} not present within {}ms",
                selector,
                window.as_millis()
            )))
        }
    }

    async fn expect_that(&self, selector: &str, condition: Condition) -> Result<()> {
        self.lifecycle.ensure_active()?;
        self.record_call(format!("expect_that({}, {})", selector, condition));
        let visible = self
            .with_page(|page| Ok(page.elements.get(selector).map(|e| e.visible)))?;
        let holds = match condition {
            Condition::Visible => visible == Some(true),
            Condition::Hidden => !matches!(visible, Some(true)),
        };
        if holds {
            Ok(())
        } else {
            Err(BdUiError::Timeout(format!(
                "{} never became {}",
                selector, condition
            )))
        }
    }

    async fn get_text(&self, selector: &str) -> Result<String> {
        self.lifecycle.ensure_active()?;
        self.record_call(format!("get_text({})", selector));
        self.read_element(selector, |element| element.text.clone())
    }

    async fn get_value(&self, selector: &str) -> Result<String> {
        self.lifecycle.ensure_active()?;
        self.record_call(format!("get_value({})", selector));
        // An element without a value attribute reads as "", per contract.
        self.read_element(selector, |element| {
            element.value.clone().unwrap_or_default()
        })
    }

    async fn screenshot(&self, options: ScreenshotOptions) -> Result<Vec<u8>> {
        self.lifecycle.ensure_active()?;
        self.record_call("screenshot()".to_string());
        let mut bytes = PNG_SIGNATURE.to_vec();
        bytes.extend_from_slice(&[0; 8]);
        if let Some(path) = options.path {
            tokio::fs::write(&path, &bytes).await?;
        }
        Ok(bytes)
    }

    async fn set_viewport(&self, width: u32, height: u32) -> Result<()> {
        self.lifecycle.ensure_active()?;
        if width == 0 || height == 0 {
            return Err(BdUiError::Config(format!(
                "viewport dimensions must be positive, got {}x{}",
                width, height
            )));
        }
        self.record_call(format!("set_viewport({}, {})", width, height));
        self.with_page(|page| {
            page.viewport = Viewport { width, height };
            Ok(())
        })
    }

    async fn viewport(&self) -> Result<Viewport> {
        self.lifecycle.ensure_active()?;
        self.with_page(|page| Ok(page.viewport))
    }

    async fn current_url(&self) -> Result<String> {
        self.lifecycle.ensure_active()?;
        self.with_page(|page| Ok(page.url.clone()))
    }

    async fn title(&self) -> Result<String> {
        self.lifecycle.ensure_active()?;
        self.with_page(|page| Ok(page.title.clone()))
    }

    fn history(&self) -> Vec<NavigationEntry> {
        self.log.entries()
    }

    fn reset_history(&self) {
        self.log.clear();
    }

    async fn destroy(&self) -> Result<()> {
        if self.lifecycle.shut_down() {
            self.record_call("destroy()".to_string());
            if let Ok(mut page) = self.page.lock() {
                page.elements.clear();
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn click_engages_an_element() {
        let driver = MockDriver::default();
        driver.click("#demo-subscribe").await.unwrap();
        assert_eq!(driver.get_value("#demo-subscribe").await.unwrap(), "true");
    }

    #[tokio::test]
    async fn fill_replaces_and_type_appends() {
        let driver = MockDriver::default();
        driver.fill("#demo-name", "Ada").await.unwrap();
        driver.type_text("#demo-name", " Lovelace").await.unwrap();
        assert_eq!(
            driver.get_value("#demo-name").await.unwrap(),
            "Ada Lovelace"
        );

        driver.fill("#demo-name", "Grace").await.unwrap();
        assert_eq!(driver.get_value("#demo-name").await.unwrap(), "Grace");
    }

    #[tokio::test]
    async fn value_normalizes_to_empty_string() {
        let driver = MockDriver::default();
        driver.seed_element("#label", MockElement::with_text("read me"));
        assert_eq!(driver.get_value("#label").await.unwrap(), "");
        assert_eq!(driver.get_text("#label").await.unwrap(), "read me");
    }

    #[tokio::test]
    async fn untouched_selector_reads_fail() {
        let driver = MockDriver::default();
        let err = driver.get_value("#ghost").await.unwrap_err();
        assert!(matches!(err, BdUiError::ElementNotFound(_)));
    }

    #[tokio::test]
    async fn navigation_tracks_history_and_back_forward() {
        let driver = MockDriver::default();
        driver.goto("/a").await.unwrap();
        driver.goto("/b").await.unwrap();
        assert_eq!(driver.current_url().await.unwrap(), "http://localhost:3000/b");

        driver.back().await.unwrap();
        assert_eq!(driver.current_url().await.unwrap(), "http://localhost:3000/a");
        driver.forward().await.unwrap();
        assert_eq!(driver.current_url().await.unwrap(), "http://localhost:3000/b");

        let urls: Vec<_> = driver.history().into_iter().map(|e| e.url).collect();
        assert_eq!(
            urls,
            vec![
                "http://localhost:3000/a",
                "http://localhost:3000/b",
                "http://localhost:3000/a",
                "http://localhost:3000/b",
            ]
        );
    }

    #[tokio::test]
    async fn back_without_history_fails() {
        let driver = MockDriver::default();
        let err = driver.back().await.unwrap_err();
        assert!(matches!(err, BdUiError::Navigation(_)));
    }

    #[tokio::test]
    async fn select_rejects_unavailable_options() {
        let driver = MockDriver::default();
        driver.seed_element(
            "#plan",
            MockElement::default().with_options(&["free", "pro"]),
        );
        driver.select("#plan", &["pro"]).await.unwrap();
        assert_eq!(driver.get_value("#plan").await.unwrap(), "pro");

        let err = driver.select("#plan", &["enterprise"]).await.unwrap_err();
        assert!(matches!(err, BdUiError::NotInteractable(_)));
    }

    #[tokio::test]
    async fn expect_that_checks_visibility() {
        let driver = MockDriver::default();
        driver.seed_element("#banner", MockElement::with_text("hi"));
        driver.seed_element("#spinner", MockElement::default().hidden());

        driver.expect_that("#banner", Condition::Visible).await.unwrap();
        driver.expect_that("#spinner", Condition::Hidden).await.unwrap();
        driver.expect_that("#ghost", Condition::Hidden).await.unwrap();

        let err = driver
            .expect_that("#spinner", Condition::Visible)
            .await
            .unwrap_err();
        assert!(matches!(err, BdUiError::Timeout(_)));
    }

    #[tokio::test]
    async fn destroyed_driver_rejects_every_operation() {
        let driver = MockDriver::default();
        driver.goto("/a").await.unwrap();
        driver.destroy().await.unwrap();

        assert!(matches!(
            driver.goto("/b").await.unwrap_err(),
            BdUiError::DriverDestroyed
        ));
        assert!(matches!(
            driver.click("#x").await.unwrap_err(),
            BdUiError::DriverDestroyed
        ));
        assert!(matches!(
            driver.get_value("#x").await.unwrap_err(),
            BdUiError::DriverDestroyed
        ));

        // Second destroy is a no-op, not a second release.
        driver.destroy().await.unwrap();
        let destroys = driver
            .calls()
            .into_iter()
            .filter(|c| c == "destroy()")
            .count();
        assert_eq!(destroys, 1);
    }

    #[tokio::test]
    async fn reset_history_empties_the_log() {
        let driver = MockDriver::default();
        driver.goto("/a").await.unwrap();
        driver.reset_history();
        assert!(driver.history().is_empty());
    }
}
