use crate::config::BdUiConfig;
use crate::core::Driver;
use crate::driver::build_driver;
use crate::errors::Result;
use serde_json::Value;
use std::collections::HashMap;
use tracing::{debug, warn};

/// Per-scenario execution context.
///
/// Owns exactly one driver and one scratch data store; neither outlives the
/// scenario, and a world is never reused across scenarios. Teardown runs
/// [`World::dispose`] on both success and failure paths.
pub struct World {
    id: String,
    driver: Box<dyn Driver>,
    data: HashMap<String, Value>,
    disposed: bool,
}

impl World {
    /// Build a world for one scenario, acquiring a fresh driver from the
    /// run configuration.
    pub async fn for_config(config: &BdUiConfig) -> Result<Self> {
        let driver = build_driver(config).await?;
        Ok(Self::with_driver(driver))
    }

    pub fn with_driver(driver: Box<dyn Driver>) -> Self {
        let id = uuid::Uuid::new_v4().to_string();
        debug!(world = %id, kind = %driver.kind(), "world created");
        Self {
            id,
            driver,
            data: HashMap::new(),
            disposed: false,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn driver(&self) -> &dyn Driver {
        self.driver.as_ref()
    }

    /// Overwrite semantics: last write wins, no merge.
    pub fn set_data(&mut self, key: impl Into<String>, value: Value) {
        self.data.insert(key.into(), value);
    }

    /// `None` means the key was never set, which is distinct from a stored
    /// null, empty string, zero or false.
    pub fn get_data(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    /// Scenario teardown: destroys the owned driver exactly once. Safe to
    /// call again; later calls are no-ops.
    pub async fn dispose(&mut self) -> Result<()> {
        if self.disposed {
            return Ok(());
        }
        self.disposed = true;
        self.data.clear();
        debug!(world = %self.id, "world disposed");
        self.driver.destroy().await
    }

    /// Teardown that never masks an earlier scenario failure: a destroy
    /// error is logged instead of returned.
    pub async fn dispose_quietly(&mut self) {
        if let Err(e) = self.dispose().await {
            warn!(world = %self.id, error = %e, "driver destroy failed during dispose");
        }
    }
}

impl Drop for World {
    fn drop(&mut self) {
        // destroy() is async and cannot run here; flag the leak instead.
        if !self.disposed {
            warn!(world = %self.id, "world dropped without dispose; driver resources may leak");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Viewport;
    use crate::core::{Condition, DriverKind, NavigationEntry, ScreenshotOptions};
    use crate::driver::MockDriver;
    use crate::errors::BdUiError;
    use async_trait::async_trait;
    use serde_json::json;
    use std::time::Duration;

    fn mock_world() -> World {
        World::with_driver(Box::new(MockDriver::default()))
    }

    /// A backend whose session is already gone at teardown time.
    struct FailingTeardown;

    #[async_trait]
    impl Driver for FailingTeardown {
        fn kind(&self) -> DriverKind {
            DriverKind::Mock
        }
        async fn goto(&self, _url: &str) -> Result<()> {
            Ok(())
        }
        async fn reload(&self) -> Result<()> {
            Ok(())
        }
        async fn back(&self) -> Result<()> {
            Ok(())
        }
        async fn forward(&self) -> Result<()> {
            Ok(())
        }
        async fn click(&self, _selector: &str) -> Result<()> {
            Ok(())
        }
        async fn type_text(&self, _selector: &str, _text: &str) -> Result<()> {
            Ok(())
        }
        async fn fill(&self, _selector: &str, _value: &str) -> Result<()> {
            Ok(())
        }
        async fn select(&self, _selector: &str, _options: &[&str]) -> Result<()> {
            Ok(())
        }
        async fn wait_for(&self, _selector: &str, _timeout: Option<Duration>) -> Result<()> {
            Ok(())
        }
        async fn expect_that(&self, _selector: &str, _condition: Condition) -> Result<()> {
            Ok(())
        }
        async fn get_text(&self, _selector: &str) -> Result<String> {
            Ok(String::new())
        }
        async fn get_value(&self, _selector: &str) -> Result<String> {
            Ok(String::new())
        }
        async fn screenshot(&self, _options: ScreenshotOptions) -> Result<Vec<u8>> {
            Ok(Vec::new())
        }
        async fn set_viewport(&self, _width: u32, _height: u32) -> Result<()> {
            Ok(())
        }
        async fn viewport(&self) -> Result<Viewport> {
            Ok(Viewport::default())
        }
        async fn current_url(&self) -> Result<String> {
            Ok(String::new())
        }
        async fn title(&self) -> Result<String> {
            Ok(String::new())
        }
        fn history(&self) -> Vec<NavigationEntry> {
            Vec::new()
        }
        fn reset_history(&self) {}
        async fn destroy(&self) -> Result<()> {
            Err(BdUiError::Protocol("session already gone".to_string()))
        }
    }

    #[tokio::test]
    async fn data_store_round_trips() {
        let mut world = mock_world();
        world.set_data("k", json!("v"));
        assert_eq!(world.get_data("k"), Some(&json!("v")));
        assert_eq!(world.get_data("missing"), None);
    }

    #[tokio::test]
    async fn absent_is_distinct_from_falsy() {
        let mut world = mock_world();
        world.set_data("empty", json!(""));
        world.set_data("zero", json!(0));
        world.set_data("null", json!(null));

        assert_eq!(world.get_data("empty"), Some(&json!("")));
        assert_eq!(world.get_data("zero"), Some(&json!(0)));
        assert_eq!(world.get_data("null"), Some(&json!(null)));
        assert!(world.get_data("never-set").is_none());
    }

    #[tokio::test]
    async fn set_data_overwrites() {
        let mut world = mock_world();
        world.set_data("k", json!("first"));
        world.set_data("k", json!("second"));
        assert_eq!(world.get_data("k"), Some(&json!("second")));
    }

    #[tokio::test]
    async fn dispose_destroys_the_driver_once() {
        let mut world = mock_world();
        world.driver().goto("/page").await.unwrap();
        world.dispose().await.unwrap();
        world.dispose().await.unwrap();

        assert!(matches!(
            world.driver().goto("/again").await.unwrap_err(),
            BdUiError::DriverDestroyed
        ));
    }

    #[tokio::test]
    async fn dispose_state_is_tracked_without_any_navigation() {
        let mut world = mock_world();
        world.driver().click("#never-navigated").await.unwrap();
        assert!(!world.is_disposed());

        world.dispose().await.unwrap();
        assert!(world.is_disposed());
    }

    #[tokio::test]
    async fn dispose_surfaces_destroy_errors() {
        let mut world = World::with_driver(Box::new(FailingTeardown));
        let err = world.dispose().await.unwrap_err();
        assert!(matches!(err, BdUiError::Protocol(_)));
    }

    #[tokio::test]
    async fn dispose_quietly_swallows_destroy_errors() {
        let mut world = World::with_driver(Box::new(FailingTeardown));
        world.dispose_quietly().await;
        assert!(world.is_disposed());
    }

    #[tokio::test]
    async fn worlds_do_not_share_state() {
        let mut first = mock_world();
        first.set_data("k", json!("v"));
        first.driver().goto("/a").await.unwrap();

        let second = mock_world();
        assert!(second.get_data("k").is_none());
        assert!(second.driver().history().is_empty());
        assert_ne!(first.id(), second.id());
    }
}
