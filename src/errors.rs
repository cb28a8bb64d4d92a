use thiserror::Error;

#[derive(Error, Debug)]
pub enum BdUiError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Unknown driver kind: {0}")]
    UnknownDriverKind(String),

    #[error("Driver has been destroyed")]
    DriverDestroyed,

    #[error("Browser launch failed: {0}")]
    Launch(String),

    #[error("Session connect failed: {0}")]
    Connect(String),

    #[error("Navigation failed: {0}")]
    Navigation(String),

    #[error("Element not found: {0}")]
    ElementNotFound(String),

    #[error("Element not interactable: {0}")]
    NotInteractable(String),

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("Unsupported condition: {0:?}")]
    UnsupportedCondition(String),

    #[error("Assertion failed: expected {expected:?}, got {actual:?}")]
    AssertionFailed { expected: String, actual: String },

    #[error("Undefined step: {0:?}")]
    UndefinedStep(String),

    #[error("Loader registration failed: {primary}; fallback: {fallback}")]
    Bootstrap { primary: String, fallback: String },

    #[error("WebDriver protocol error: {0}")]
    Protocol(String),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Screenshot failed: {0}")]
    Screenshot(String),

    #[error("Script execution failed: {0}")]
    Script(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, BdUiError>;

impl From<anyhow::Error> for BdUiError {
    fn from(err: anyhow::Error) -> Self {
        BdUiError::Script(err.to_string())
    }
}

impl From<reqwest::Error> for BdUiError {
    fn from(err: reqwest::Error) -> Self {
        BdUiError::Http(err.to_string())
    }
}
