use crate::config::{ChromeOptions, Timeouts, Viewport};
use crate::core::driver::ScreenshotOptions;
use crate::core::{Condition, Driver, DriverKind, Lifecycle, NavigationEntry, NavigationLog};
use crate::errors::{BdUiError, Result};
use crate::utils::{javascript, resolve_url};
use async_trait::async_trait;
use headless_chrome::protocol::cdp::Page::{CaptureScreenshotFormatOption, Viewport as ClipViewport};
use headless_chrome::{Browser, LaunchOptions, Tab};
use serde_json::Value;
use std::ffi::OsStr;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

const POLL_INTERVAL: Duration = Duration::from_millis(100);
const HISTORY_SETTLE_MS: u64 = 2000;

// Tab is declared first so the page handle drops before the browser
// process on destroy. The browser is held only to keep the process alive.
struct ChromeInner {
    tab: Arc<Tab>,
    _browser: Browser,
}

/// Headless Chrome backend. Interactions run as in-page evaluation
/// snippets; navigation and screenshots go through the DevTools protocol.
pub struct ChromeDriver {
    inner: Mutex<Option<ChromeInner>>,
    lifecycle: Lifecycle,
    log: NavigationLog,
    base_url: String,
    timeouts: Timeouts,
}

impl ChromeDriver {
    /// One-time launch factory. A failure after the browser process has
    /// started drops the process during unwinding, leaving nothing behind.
    pub async fn launch(options: &ChromeOptions, base_url: &str) -> Result<Self> {
        let window_size_arg = format!(
            "--window-size={},{}",
            options.viewport.width, options.viewport.height
        );

        let args = vec![
            OsStr::new("--no-sandbox"),
            OsStr::new("--disable-dev-shm-usage"),
            OsStr::new(&window_size_arg),
        ];

        let launch_options = LaunchOptions::default_builder()
            .headless(options.headless)
            .args(args)
            .build()
            .map_err(|e| BdUiError::Launch(e.to_string()))?;

        let browser =
            Browser::new(launch_options).map_err(|e| BdUiError::Launch(e.to_string()))?;

        let tab = match browser.new_tab() {
            Ok(tab) => tab,
            Err(e) => {
                drop(browser);
                return Err(BdUiError::Launch(format!("tab creation failed: {}", e)));
            }
        };

        debug!(target: "bdui::chrome", browser = %options.browser, headless = options.headless, "launched");

        Ok(Self {
            inner: Mutex::new(Some(ChromeInner {
                tab,
                _browser: browser,
            })),
            lifecycle: Lifecycle::new(),
            log: NavigationLog::new(),
            base_url: base_url.to_string(),
            timeouts: Timeouts::default(),
        })
    }

    fn with_tab<R>(&self, f: impl FnOnce(&Tab) -> Result<R>) -> Result<R> {
        self.lifecycle.ensure_active()?;
        let guard = self
            .inner
            .lock()
            .map_err(|_| BdUiError::Script("chrome handle lock poisoned".to_string()))?;
        let inner = guard.as_ref().ok_or(BdUiError::DriverDestroyed)?;
        f(&inner.tab)
    }

    fn eval(&self, script: &str) -> Result<Value> {
        self.with_tab(|tab| {
            let result = tab
                .evaluate(script, false)
                .map_err(|e| BdUiError::Script(e.to_string()))?;
            Ok(result.value.unwrap_or(Value::Null))
        })
    }

    /// Unwrap the `{ ok, value | error }` convention the snippets follow.
    fn unwrap_outcome(&self, selector: &str, outcome: Value) -> Result<Value> {
        let ok = outcome.get("ok").and_then(|v| v.as_bool()).unwrap_or(false);
        if ok {
            return Ok(outcome.get("value").cloned().unwrap_or(Value::Null));
        }
        let message = outcome
            .get("error")
            .and_then(|v| v.as_str())
            .unwrap_or("unexpected script result")
            .to_string();
        if message == "not found" {
            Err(BdUiError::ElementNotFound(selector.to_string()))
        } else {
            Err(BdUiError::NotInteractable(format!("{}: {}", selector, message)))
        }
    }

    fn record_current_url(&self) -> Result<()> {
        let url = self.with_tab(|tab| Ok(tab.get_url()))?;
        self.log.record(url);
        Ok(())
    }

    /// `history.back()`/`forward()` give no completion signal over the
    /// evaluation channel; poll the URL until it moves or the settle
    /// window runs out.
    async fn traverse_history(&self, script: &str, direction: &str) -> Result<()> {
        let before = self.with_tab(|tab| Ok(tab.get_url()))?;
        self.eval(script)?;

        let deadline = Instant::now() + Duration::from_millis(HISTORY_SETTLE_MS);
        loop {
            tokio::time::sleep(POLL_INTERVAL).await;
            let now = self.with_tab(|tab| Ok(tab.get_url()))?;
            if now != before {
                self.log.record(now);
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(BdUiError::Navigation(format!(
                    "no history entry {} the current page",
                    direction
                )));
            }
        }
    }
}

#[async_trait]
impl Driver for ChromeDriver {
    fn kind(&self) -> DriverKind {
        DriverKind::Chrome
    }

    async fn goto(&self, url: &str) -> Result<()> {
        let resolved = resolve_url(&self.base_url, url)?;
        self.with_tab(|tab| {
            tab.navigate_to(&resolved)
                .map_err(|e| BdUiError::Navigation(e.to_string()))?;
            tab.wait_until_navigated()
                .map_err(|e| BdUiError::Navigation(e.to_string()))?;
            Ok(())
        })?;
        self.record_current_url()
    }

    async fn reload(&self) -> Result<()> {
        self.with_tab(|tab| {
            tab.reload(false, None)
                .map_err(|e| BdUiError::Navigation(e.to_string()))?;
            tab.wait_until_navigated()
                .map_err(|e| BdUiError::Navigation(e.to_string()))?;
            Ok(())
        })?;
        self.record_current_url()
    }

    async fn back(&self) -> Result<()> {
        self.traverse_history("history.back()", "behind").await
    }

    async fn forward(&self) -> Result<()> {
        self.traverse_history("history.forward()", "ahead of").await
    }

    async fn click(&self, selector: &str) -> Result<()> {
        let outcome = self.eval(&javascript::click_script(selector))?;
        self.unwrap_outcome(selector, outcome)?;
        Ok(())
    }

    async fn type_text(&self, selector: &str, text: &str) -> Result<()> {
        let outcome = self.eval(&javascript::type_script(selector, text))?;
        self.unwrap_outcome(selector, outcome)?;
        Ok(())
    }

    async fn fill(&self, selector: &str, value: &str) -> Result<()> {
        let outcome = self.eval(&javascript::fill_script(selector, value))?;
        self.unwrap_outcome(selector, outcome)?;
        Ok(())
    }

    async fn select(&self, selector: &str, options: &[&str]) -> Result<()> {
        let options_json = serde_json::to_string(options)?;
        let outcome = self.eval(&javascript::select_script(selector, &options_json))?;
        self.unwrap_outcome(selector, outcome)?;
        Ok(())
    }

    async fn wait_for(&self, selector: &str, timeout: Option<Duration>) -> Result<()> {
        let window = timeout.unwrap_or(Duration::from_millis(self.timeouts.element_ms));
        let deadline = Instant::now() + window;
        let script = javascript::exists_script(selector);
        loop {
            if self.eval(&script)?.as_bool().unwrap_or(false) {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(BdUiError::Timeout(format!(
                    "{} not present within {}ms",
                    selector,
                    window.as_millis()
                )));
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    async fn expect_that(&self, selector: &str, condition: Condition) -> Result<()> {
        let deadline = Instant::now() + Duration::from_millis(self.timeouts.element_ms);
        let script = javascript::visible_script(selector);
        loop {
            let outcome = self.eval(&script)?;
            let visible = match self.unwrap_outcome(selector, outcome) {
                Ok(value) => value.as_bool().unwrap_or(false),
                // A missing element counts as hidden.
                Err(BdUiError::ElementNotFound(_)) => false,
                Err(e) => return Err(e),
            };
            let holds = match condition {
                Condition::Visible => visible,
                Condition::Hidden => !visible,
            };
            if holds {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(BdUiError::Timeout(format!(
                    "{} never became {}",
                    selector, condition
                )));
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    async fn get_text(&self, selector: &str) -> Result<String> {
        let outcome = self.eval(&javascript::text_script(selector))?;
        let value = self.unwrap_outcome(selector, outcome)?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    async fn get_value(&self, selector: &str) -> Result<String> {
        let outcome = self.eval(&javascript::value_script(selector))?;
        let value = self.unwrap_outcome(selector, outcome)?;
        // null marks "no value property"; normalize to empty.
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    async fn screenshot(&self, options: ScreenshotOptions) -> Result<Vec<u8>> {
        // Full-page capture is a clip spanning the document extent; the
        // capture itself is always taken from the surface.
        let clip = if options.full_page {
            let outcome = self.eval(&javascript::document_size_script())?;
            let value = self.unwrap_outcome("document", outcome)?;
            let width = value.get("width").and_then(|v| v.as_f64()).unwrap_or(0.0);
            let height = value.get("height").and_then(|v| v.as_f64()).unwrap_or(0.0);
            if width <= 0.0 || height <= 0.0 {
                return Err(BdUiError::Screenshot(
                    "document reports no size for a full-page capture".to_string(),
                ));
            }
            Some(ClipViewport {
                x: 0.0,
                y: 0.0,
                width,
                height,
                scale: 1.0,
            })
        } else {
            None
        };
        let bytes = self.with_tab(|tab| {
            tab.capture_screenshot(CaptureScreenshotFormatOption::Png, None, clip, true)
                .map_err(|e| BdUiError::Screenshot(e.to_string()))
        })?;
        if let Some(path) = options.path {
            tokio::fs::write(&path, &bytes).await?;
        }
        Ok(bytes)
    }

    async fn set_viewport(&self, width: u32, height: u32) -> Result<()> {
        if width == 0 || height == 0 {
            return Err(BdUiError::Config(format!(
                "viewport dimensions must be positive, got {}x{}",
                width, height
            )));
        }
        self.eval(&javascript::resize_script(width, height))?;
        Ok(())
    }

    async fn viewport(&self) -> Result<Viewport> {
        let outcome = self.eval(&javascript::viewport_script())?;
        let value = self.unwrap_outcome("window", outcome)?;
        serde_json::from_value(value)
            .map_err(|e| BdUiError::Script(format!("viewport not reported: {}", e)))
    }

    async fn current_url(&self) -> Result<String> {
        self.with_tab(|tab| Ok(tab.get_url()))
    }

    async fn title(&self) -> Result<String> {
        let value = self.eval("document.title")?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    fn history(&self) -> Vec<NavigationEntry> {
        self.log.entries()
    }

    fn reset_history(&self) {
        self.log.clear();
    }

    async fn destroy(&self) -> Result<()> {
        if !self.lifecycle.shut_down() {
            return Ok(());
        }
        let inner = match self.inner.lock() {
            Ok(mut guard) => guard.take(),
            Err(_) => None,
        };
        if let Some(inner) = inner {
            if let Err(e) = inner.tab.close(true) {
                warn!(target: "bdui::chrome", error = %e, "tab close failed during destroy");
            }
            // Dropping ChromeInner releases the tab handle, then kills the
            // browser process.
            drop(inner);
        }
        Ok(())
    }
}
