pub mod chrome;
pub mod factory;
pub mod mock;
pub mod webdriver;

pub use chrome::ChromeDriver;
pub use factory::build_driver;
pub use mock::{MockDriver, MockElement};
pub use webdriver::WebDriverSession;
