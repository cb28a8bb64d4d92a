use crate::config::{BdUiConfig, ChromeOptions, DriverConfig};
use crate::core::Driver;
use crate::driver::{ChromeDriver, MockDriver, WebDriverSession};
use crate::errors::Result;
use tracing::info;

/// Construct a fresh driver from the run configuration.
///
/// Pure closed dispatch over the `kind` discriminant; unknown kinds are
/// rejected earlier, at config load. An absent driver section defaults to
/// the richest real backend (chrome, default options). No caching: every
/// call yields a new session.
pub async fn build_driver(config: &BdUiConfig) -> Result<Box<dyn Driver>> {
    let default_driver;
    let driver_config = match &config.driver {
        Some(driver) => driver,
        None => {
            default_driver = DriverConfig::Chrome(ChromeOptions::default());
            &default_driver
        }
    };

    info!(kind = driver_config.kind(), "building driver");

    let driver: Box<dyn Driver> = match driver_config {
        DriverConfig::Mock => Box::new(MockDriver::new(config.base_url.clone())),
        DriverConfig::Chrome(options) => {
            Box::new(ChromeDriver::launch(options, &config.base_url).await?)
        }
        DriverConfig::Webdriver(options) => {
            Box::new(WebDriverSession::connect(options, &config.base_url).await?)
        }
    };
    Ok(driver)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::DriverKind;

    #[tokio::test]
    async fn mock_variant_builds_a_mock_driver() {
        let config = BdUiConfig {
            driver: Some(DriverConfig::Mock),
            ..Default::default()
        };
        let driver = build_driver(&config).await.unwrap();
        assert_eq!(driver.kind(), DriverKind::Mock);
    }

    #[tokio::test]
    async fn factory_returns_a_fresh_driver_each_call() {
        let config = BdUiConfig {
            driver: Some(DriverConfig::Mock),
            ..Default::default()
        };
        let first = build_driver(&config).await.unwrap();
        first.destroy().await.unwrap();

        // A second build is unaffected by the first driver's lifecycle.
        let second = build_driver(&config).await.unwrap();
        second.goto("/fresh").await.unwrap();
        assert_eq!(second.history().len(), 1);
    }
}
