use crate::config::Viewport;
use crate::errors::{BdUiError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Mutex;
use std::time::Duration;

/// Discriminant for the concrete backend behind a [`Driver`] handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverKind {
    Mock,
    Chrome,
    Webdriver,
}

impl std::fmt::Display for DriverKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DriverKind::Mock => write!(f, "mock"),
            DriverKind::Chrome => write!(f, "chrome"),
            DriverKind::Webdriver => write!(f, "webdriver"),
        }
    }
}

/// Closed set of element states `expect_that` can wait on.
///
/// Parsing an unrecognized condition string is a programmer error and fails
/// immediately rather than degrading to a no-op assertion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Condition {
    Visible,
    Hidden,
}

impl FromStr for Condition {
    type Err = BdUiError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "to be visible" | "visible" => Ok(Condition::Visible),
            "to be hidden" | "hidden" => Ok(Condition::Hidden),
            other => Err(BdUiError::UnsupportedCondition(other.to_string())),
        }
    }
}

impl std::fmt::Display for Condition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Condition::Visible => write!(f, "to be visible"),
            Condition::Hidden => write!(f, "to be hidden"),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ScreenshotOptions {
    pub path: Option<PathBuf>,
    pub full_page: bool,
}

/// One completed navigation, recorded with the final resolved URL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NavigationEntry {
    pub url: String,
    pub timestamp: DateTime<Utc>,
}

/// Append-only navigation audit log owned by one driver instance.
///
/// Entries are appended after the navigation that produced them completes,
/// so the sequence is ordered by completion, not by call start.
#[derive(Debug, Default)]
pub struct NavigationLog {
    entries: Mutex<Vec<NavigationEntry>>,
}

impl NavigationLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, url: impl Into<String>) {
        let entry = NavigationEntry {
            url: url.into(),
            timestamp: Utc::now(),
        };
        if let Ok(mut entries) = self.entries.lock() {
            entries.push(entry);
        }
    }

    pub fn entries(&self) -> Vec<NavigationEntry> {
        self.entries
            .lock()
            .map(|entries| entries.clone())
            .unwrap_or_default()
    }

    pub fn clear(&self) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.clear();
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|entries| entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Polymorphic handle to one live UI-automation session.
///
/// One page/session per driver; a scenario world owns exactly one instance
/// and never shares it. At most one operation is in flight per instance.
/// Every method other than `destroy` fails with
/// [`BdUiError::DriverDestroyed`] once `destroy` has completed.
#[async_trait]
pub trait Driver: Send + Sync {
    /// Which concrete backend this handle wraps.
    fn kind(&self) -> DriverKind;

    /// Navigate to an absolute URL, or a relative one resolved against the
    /// run's base URL. Waits for document-ready and records the final
    /// resolved URL in the navigation log.
    async fn goto(&self, url: &str) -> Result<()>;

    async fn reload(&self) -> Result<()>;

    /// Fails when there is no history entry behind the current page.
    async fn back(&self) -> Result<()>;

    /// Fails when there is no history entry ahead of the current page.
    async fn forward(&self) -> Result<()>;

    async fn click(&self, selector: &str) -> Result<()>;

    /// Append `text` to the element's current value.
    async fn type_text(&self, selector: &str, text: &str) -> Result<()>;

    /// Replace the element's value with `value`.
    async fn fill(&self, selector: &str, value: &str) -> Result<()>;

    /// Set the selection state of a `<select>`; multi-select semantics are
    /// delegated to the backend.
    async fn select(&self, selector: &str, options: &[&str]) -> Result<()>;

    /// Block until `selector` is present or the timeout elapses. A single
    /// continuous wait; nothing is retried internally once it expires.
    async fn wait_for(&self, selector: &str, timeout: Option<Duration>) -> Result<()>;

    /// Block until `condition` holds for `selector` or the backend's
    /// element timeout elapses.
    async fn expect_that(&self, selector: &str, condition: Condition) -> Result<()>;

    async fn get_text(&self, selector: &str) -> Result<String>;

    /// Returns the element's current value. An element that exists but has
    /// no value attribute normalizes to an empty string; every other
    /// backend error propagates.
    async fn get_value(&self, selector: &str) -> Result<String>;

    /// Returns PNG bytes; also persists to disk when a path is given.
    async fn screenshot(&self, options: ScreenshotOptions) -> Result<Vec<u8>>;

    async fn set_viewport(&self, width: u32, height: u32) -> Result<()>;

    async fn viewport(&self) -> Result<Viewport>;

    async fn current_url(&self) -> Result<String>;

    async fn title(&self) -> Result<String>;

    fn history(&self) -> Vec<NavigationEntry>;

    fn reset_history(&self);

    /// Release all native resources, innermost first. Idempotent: a second
    /// call after success is a no-op and never errors.
    async fn destroy(&self) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn condition_parses_the_closed_set() {
        assert_eq!("to be visible".parse::<Condition>().unwrap(), Condition::Visible);
        assert_eq!("hidden".parse::<Condition>().unwrap(), Condition::Hidden);
    }

    #[test]
    fn unsupported_condition_fails_to_parse() {
        let err = "to be glowing".parse::<Condition>().unwrap_err();
        assert!(matches!(err, BdUiError::UnsupportedCondition(ref s) if s == "to be glowing"));
    }

    #[test]
    fn navigation_log_preserves_completion_order() {
        let log = NavigationLog::new();
        log.record("https://a.test/");
        log.record("https://b.test/");

        let urls: Vec<_> = log.entries().into_iter().map(|e| e.url).collect();
        assert_eq!(urls, vec!["https://a.test/", "https://b.test/"]);

        log.clear();
        assert!(log.is_empty());
    }
}
