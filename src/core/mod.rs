pub mod driver;
pub mod lifecycle;

pub use driver::{Condition, Driver, DriverKind, NavigationEntry, NavigationLog, ScreenshotOptions};
pub use lifecycle::Lifecycle;
