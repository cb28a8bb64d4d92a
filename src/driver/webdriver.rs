use crate::config::{Timeouts, Viewport, WebDriverOptions};
use crate::core::driver::ScreenshotOptions;
use crate::core::{Condition, Driver, DriverKind, Lifecycle, NavigationEntry, NavigationLog};
use crate::errors::{BdUiError, Result};
use crate::utils::resolve_url;
use async_trait::async_trait;
use reqwest::Method;
use serde_json::{json, Value};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

const ELEMENT_KEY: &str = "element-6066-11e4-a52e-4f735466cecf";
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Remote W3C WebDriver backend: one wire session per driver instance.
pub struct WebDriverSession {
    http: reqwest::Client,
    server_url: String,
    session_id: String,
    lifecycle: Lifecycle,
    log: NavigationLog,
    base_url: String,
    timeouts: Timeouts,
}

/// Assemble the `alwaysMatch` capability object for session creation.
/// Caller-supplied capabilities override the generated ones.
fn build_capabilities(options: &WebDriverOptions) -> Value {
    let mut caps = serde_json::Map::new();
    caps.insert("browserName".to_string(), json!(options.browser));

    if options.headless {
        match options.browser.as_str() {
            "firefox" => {
                caps.insert("moz:firefoxOptions".to_string(), json!({"args": ["-headless"]}));
            }
            _ => {
                caps.insert(
                    "goog:chromeOptions".to_string(),
                    json!({"args": ["--headless=new"]}),
                );
            }
        }
    }

    for (key, value) in &options.capabilities {
        caps.insert(key.clone(), value.clone());
    }

    Value::Object(caps)
}

/// Map a wire-level error payload (`{"value": {"error", "message"}}`) onto
/// the crate taxonomy.
fn map_wire_error(value: &Value) -> BdUiError {
    let code = value.get("error").and_then(|v| v.as_str()).unwrap_or("");
    let message = value
        .get("message")
        .and_then(|v| v.as_str())
        .unwrap_or("unknown wire error");
    match code {
        "no such element" | "stale element reference" => {
            BdUiError::ElementNotFound(message.to_string())
        }
        "element not interactable" => BdUiError::NotInteractable(message.to_string()),
        "timeout" | "script timeout" => BdUiError::Timeout(message.to_string()),
        _ => BdUiError::Protocol(format!("{}: {}", code, message)),
    }
}

impl WebDriverSession {
    /// One-time connect factory. If session setup fails after the remote
    /// session was created, the session is deleted before the error is
    /// returned.
    pub async fn connect(options: &WebDriverOptions, base_url: &str) -> Result<Self> {
        let http = reqwest::Client::new();
        let body = json!({"capabilities": {"alwaysMatch": build_capabilities(options)}});

        let response = http
            .post(format!("{}/session", options.server_url))
            .json(&body)
            .send()
            .await
            .map_err(|e| BdUiError::Connect(e.to_string()))?;
        let payload: Value = response
            .json()
            .await
            .map_err(|e| BdUiError::Connect(e.to_string()))?;

        let value = payload.get("value").cloned().unwrap_or(Value::Null);
        if value.get("error").is_some() {
            return Err(BdUiError::Connect(map_wire_error(&value).to_string()));
        }
        let session_id = value
            .get("sessionId")
            .and_then(|v| v.as_str())
            .ok_or_else(|| {
                BdUiError::Connect("session response carried no sessionId".to_string())
            })?
            .to_string();

        let session = Self {
            http,
            server_url: options.server_url.clone(),
            session_id,
            lifecycle: Lifecycle::new(),
            log: NavigationLog::new(),
            base_url: base_url.to_string(),
            timeouts: options.timeouts,
        };

        if let Err(e) = session.configure_timeouts().await {
            // Unwind the half-established session before surfacing.
            if let Err(cleanup) = session.delete_session().await {
                warn!(target: "bdui::webdriver", error = %cleanup, "session cleanup after failed connect");
            }
            return Err(e);
        }

        debug!(target: "bdui::webdriver", session = %session.session_id, "connected");
        Ok(session)
    }

    async fn configure_timeouts(&self) -> Result<()> {
        self.execute(
            Method::POST,
            "/timeouts",
            Some(json!({
                "pageLoad": self.timeouts.navigation_ms,
                "script": self.timeouts.script_ms,
                "implicit": 0,
            })),
        )
        .await?;
        Ok(())
    }

    async fn delete_session(&self) -> Result<()> {
        let url = format!("{}/session/{}", self.server_url, self.session_id);
        self.http.delete(url).send().await?;
        Ok(())
    }

    /// Send one command scoped to this session and unwrap its `value`.
    async fn execute(&self, method: Method, path: &str, body: Option<Value>) -> Result<Value> {
        self.lifecycle.ensure_active()?;
        let url = format!("{}/session/{}{}", self.server_url, self.session_id, path);
        let mut request = self.http.request(method.clone(), url);
        if method == Method::POST {
            // W3C remote ends require a JSON body on every POST.
            request = request.json(&body.unwrap_or_else(|| json!({})));
        }
        let response = request.send().await?;
        let status = response.status();
        let payload: Value = response.json().await?;
        let value = payload.get("value").cloned().unwrap_or(Value::Null);

        if !status.is_success() || value.get("error").is_some() {
            return Err(map_wire_error(&value));
        }
        Ok(value)
    }

    async fn find_element(&self, selector: &str) -> Result<String> {
        let value = self
            .execute(
                Method::POST,
                "/element",
                Some(json!({"using": "css selector", "value": selector})),
            )
            .await
            .map_err(|e| match e {
                BdUiError::ElementNotFound(_) => BdUiError::ElementNotFound(selector.to_string()),
                other => other,
            })?;
        value
            .get(ELEMENT_KEY)
            .and_then(|v| v.as_str())
            .map(|id| id.to_string())
            .ok_or_else(|| {
                BdUiError::Protocol(format!("element response carried no reference for {}", selector))
            })
    }

    async fn execute_sync(&self, script: &str, args: Value) -> Result<Value> {
        self.execute(
            Method::POST,
            "/execute/sync",
            Some(json!({"script": script, "args": args})),
        )
        .await
    }

    async fn record_current_url(&self) -> Result<()> {
        let value = self.execute(Method::GET, "/url", None).await?;
        if let Some(url) = value.as_str() {
            self.log.record(url);
        }
        Ok(())
    }

    async fn is_visible(&self, selector: &str) -> Result<Option<bool>> {
        let script = r#"
            const el = document.querySelector(arguments[0]);
            if (!el) return null;
            const rect = el.getBoundingClientRect();
            const style = window.getComputedStyle(el);
            return rect.width > 0 && rect.height > 0
                && style.visibility !== 'hidden' && style.display !== 'none';
        "#;
        let value = self.execute_sync(script, json!([selector])).await?;
        Ok(value.as_bool())
    }
}

#[async_trait]
impl Driver for WebDriverSession {
    fn kind(&self) -> DriverKind {
        DriverKind::Webdriver
    }

    async fn goto(&self, url: &str) -> Result<()> {
        let resolved = resolve_url(&self.base_url, url)?;
        self.execute(Method::POST, "/url", Some(json!({"url": resolved})))
            .await?;
        self.record_current_url().await
    }

    async fn reload(&self) -> Result<()> {
        self.execute(Method::POST, "/refresh", None).await?;
        self.record_current_url().await
    }

    async fn back(&self) -> Result<()> {
        self.execute(Method::POST, "/back", None).await?;
        self.record_current_url().await
    }

    async fn forward(&self) -> Result<()> {
        self.execute(Method::POST, "/forward", None).await?;
        self.record_current_url().await
    }

    async fn click(&self, selector: &str) -> Result<()> {
        let element = self.find_element(selector).await?;
        self.execute(Method::POST, &format!("/element/{}/click", element), None)
            .await?;
        Ok(())
    }

    async fn type_text(&self, selector: &str, text: &str) -> Result<()> {
        let element = self.find_element(selector).await?;
        // Element Send Keys appends to the current value.
        self.execute(
            Method::POST,
            &format!("/element/{}/value", element),
            Some(json!({"text": text})),
        )
        .await?;
        Ok(())
    }

    async fn fill(&self, selector: &str, value: &str) -> Result<()> {
        let element = self.find_element(selector).await?;
        self.execute(Method::POST, &format!("/element/{}/clear", element), None)
            .await?;
        self.execute(
            Method::POST,
            &format!("/element/{}/value", element),
            Some(json!({"text": value})),
        )
        .await?;
        Ok(())
    }

    async fn select(&self, selector: &str, options: &[&str]) -> Result<()> {
        let script = r#"
            const [selector, wanted] = arguments;
            const el = document.querySelector(selector);
            if (!el) return { ok: false, error: 'not found' };
            const available = Array.from(el.options).map(o => o.value);
            const missing = wanted.filter(w => !available.includes(w));
            if (missing.length > 0) {
                return { ok: false, error: 'options unavailable: ' + missing.join(', ') };
            }
            for (const option of el.options) {
                option.selected = wanted.includes(option.value);
            }
            el.dispatchEvent(new Event('change', { bubbles: true }));
            return { ok: true };
        "#;
        let value = self
            .execute_sync(script, json!([selector, options]))
            .await?;
        let ok = value.get("ok").and_then(|v| v.as_bool()).unwrap_or(false);
        if ok {
            return Ok(());
        }
        let message = value
            .get("error")
            .and_then(|v| v.as_str())
            .unwrap_or("select failed");
        if message == "not found" {
            Err(BdUiError::ElementNotFound(selector.to_string()))
        } else {
            Err(BdUiError::NotInteractable(format!("{}: {}", selector, message)))
        }
    }

    async fn wait_for(&self, selector: &str, timeout: Option<Duration>) -> Result<()> {
        let window = timeout.unwrap_or(Duration::from_millis(self.timeouts.element_ms));
        let deadline = Instant::now() + window;
        loop {
            match self.find_element(selector).await {
                Ok(_) => return Ok(()),
                Err(BdUiError::ElementNotFound(_)) => {}
                Err(e) => return Err(e),
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
        loop {
            let visible = self.is_visible(selector).await?;
            let holds = match condition {
                Condition::Visible => visible == Some(true),
                Condition::Hidden => visible != Some(true),
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
        let element = self.find_element(selector).await?;
        let value = self
            .execute(Method::GET, &format!("/element/{}/text", element), None)
            .await?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    async fn get_value(&self, selector: &str) -> Result<String> {
        let element = self.find_element(selector).await?;
        let value = self
            .execute(
                Method::GET,
                &format!("/element/{}/property/value", element),
                None,
            )
            .await?;
        // A null property means the element has no value attribute.
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    async fn screenshot(&self, options: ScreenshotOptions) -> Result<Vec<u8>> {
        let path = if options.full_page {
            "/screenshot/full"
        } else {
            "/screenshot"
        };
        let value = self.execute(Method::GET, path, None).await?;
        let encoded = value
            .as_str()
            .ok_or_else(|| BdUiError::Screenshot("no payload in response".to_string()))?;
        let bytes = base64::decode(encoded)
            .map_err(|e| BdUiError::Screenshot(format!("invalid base64 payload: {}", e)))?;
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
        self.execute(
            Method::POST,
            "/window/rect",
            Some(json!({"width": width, "height": height})),
        )
        .await?;
        Ok(())
    }

    async fn viewport(&self) -> Result<Viewport> {
        let value = self.execute(Method::GET, "/window/rect", None).await?;
        let width = value.get("width").and_then(|v| v.as_u64());
        let height = value.get("height").and_then(|v| v.as_u64());
        match (width, height) {
            (Some(width), Some(height)) => Ok(Viewport {
                width: width as u32,
                height: height as u32,
            }),
            _ => Err(BdUiError::Protocol(
                "remote end cannot report a viewport".to_string(),
            )),
        }
    }

    async fn current_url(&self) -> Result<String> {
        let value = self.execute(Method::GET, "/url", None).await?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    async fn title(&self) -> Result<String> {
        let value = self.execute(Method::GET, "/title", None).await?;
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
        if let Err(e) = self.delete_session().await {
            warn!(target: "bdui::webdriver", error = %e, "session delete failed during destroy");
        }
        Ok(())
    }
}
