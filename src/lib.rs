pub mod config;
pub mod core;
pub mod driver;
pub mod errors;
pub mod loader;
pub mod scaffold;
pub mod steps;
pub mod utils;
pub mod world;

pub use config::{BdUiConfig, ChromeOptions, DriverConfig, Timeouts, Viewport, WebDriverOptions};
pub use core::{Condition, Driver, DriverKind, NavigationEntry, ScreenshotOptions};
pub use driver::{build_driver, ChromeDriver, MockDriver, WebDriverSession};
pub use errors::{BdUiError, Result};
pub use loader::{load_config, load_steps, register_loaders};
pub use steps::StepRegistrar;
pub use world::World;
