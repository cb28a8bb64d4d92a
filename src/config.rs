use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Top-level run configuration, immutable once loaded.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BdUiConfig {
    #[serde(rename = "baseURL")]
    pub base_url: String,
    pub features: Vec<String>,
    pub steps: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub driver: Option<DriverConfig>,
}

/// Backend selection. `kind` is the discriminant the factory dispatches on;
/// the variant set is closed, so an unknown kind fails at deserialization.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum DriverConfig {
    Mock,
    Chrome(ChromeOptions),
    Webdriver(WebDriverOptions),
}

impl DriverConfig {
    pub fn kind(&self) -> &'static str {
        match self {
            DriverConfig::Mock => "mock",
            DriverConfig::Chrome(_) => "chrome",
            DriverConfig::Webdriver(_) => "webdriver",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChromeOptions {
    #[serde(default = "default_browser")]
    pub browser: String,
    #[serde(default = "default_true")]
    pub headless: bool,
    #[serde(default)]
    pub viewport: Viewport,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebDriverOptions {
    #[serde(default = "default_browser")]
    pub browser: String,
    #[serde(default = "default_true")]
    pub headless: bool,
    #[serde(default = "default_server_url")]
    pub server_url: String,
    #[serde(default)]
    pub capabilities: Map<String, Value>,
    #[serde(default)]
    pub timeouts: Timeouts,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Timeouts {
    pub navigation_ms: u64,
    pub element_ms: u64,
    pub script_ms: u64,
}

impl Default for BdUiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3000".to_string(),
            features: vec!["features/**/*.feature".to_string()],
            steps: vec!["bdui/steps/**/*.steps.json".to_string()],
            driver: None,
        }
    }
}

impl Default for ChromeOptions {
    fn default() -> Self {
        Self {
            browser: default_browser(),
            headless: true,
            viewport: Viewport::default(),
        }
    }
}

impl Default for WebDriverOptions {
    fn default() -> Self {
        Self {
            browser: default_browser(),
            headless: true,
            server_url: default_server_url(),
            capabilities: Map::new(),
            timeouts: Timeouts::default(),
        }
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
        }
    }
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            navigation_ms: 30000,
            element_ms: 5000,
            script_ms: 10000,
        }
    }
}

fn default_browser() -> String {
    "chromium".to_string()
}

fn default_server_url() -> String {
    "http://localhost:4444".to_string()
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn driver_config_dispatches_on_kind() {
        let config: DriverConfig = serde_json::from_str(r#"{"kind":"mock"}"#).unwrap();
        assert_eq!(config.kind(), "mock");

        let config: DriverConfig =
            serde_json::from_str(r#"{"kind":"chrome","headless":false}"#).unwrap();
        assert_eq!(config.kind(), "chrome");
        match config {
            DriverConfig::Chrome(opts) => {
                assert!(!opts.headless);
                assert_eq!(opts.viewport.width, 1280);
            }
            other => panic!("expected chrome, got {:?}", other),
        }
    }

    #[test]
    fn unknown_kind_is_rejected() {
        let result = serde_json::from_str::<DriverConfig>(r#"{"kind":"selenium"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn webdriver_options_fill_defaults() {
        let config: DriverConfig = serde_json::from_str(r#"{"kind":"webdriver"}"#).unwrap();
        match config {
            DriverConfig::Webdriver(opts) => {
                assert_eq!(opts.server_url, "http://localhost:4444");
                assert_eq!(opts.timeouts.element_ms, 5000);
                assert!(opts.capabilities.is_empty());
            }
            other => panic!("expected webdriver, got {:?}", other),
        }
    }

    #[test]
    fn config_round_trips_camel_case() {
        let json = r#"{
            "baseURL": "https://app.example.test",
            "features": ["features/*.feature"],
            "steps": ["bdui/steps/*.steps.json"],
            "driver": {"kind": "mock"}
        }"#;
        let config: BdUiConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.base_url, "https://app.example.test");
        assert_eq!(config.driver.unwrap().kind(), "mock");
    }
}
