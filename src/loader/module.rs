use crate::config::BdUiConfig;
use crate::errors::{BdUiError, Result};
use crate::loader::registry;
use serde::Deserialize;
use serde_json::Value;
use std::path::Path;

const KNOWN_KINDS: [&str; 3] = ["mock", "chrome", "webdriver"];

/// One step alias from a dynamically loaded step module: step text matching
/// `pattern` is rewritten to the built-in vocabulary `step` before
/// dispatch.
#[derive(Debug, Clone, Deserialize)]
pub struct StepAlias {
    pub pattern: String,
    pub step: String,
}

#[derive(Debug, Deserialize)]
struct StepModule {
    #[serde(default)]
    bindings: Vec<StepAlias>,
}

/// Load the run configuration, guaranteeing loader availability first so
/// every entry point gets the same bootstrap.
pub fn load_config(path: &Path) -> Result<BdUiConfig> {
    registry::register_loaders()?;
    let source = std::fs::read_to_string(path)
        .map_err(|e| BdUiError::Config(format!("cannot read {}: {}", path.display(), e)))?;
    let value = registry::global().load_value(&source)?;
    check_driver_kind(&value)?;
    serde_json::from_value(value).map_err(|e| {
        BdUiError::Config(format!("malformed configuration {}: {}", path.display(), e))
    })
}

/// Load a step module (custom step-text bindings).
pub fn load_steps(path: &Path) -> Result<Vec<StepAlias>> {
    registry::register_loaders()?;
    let source = std::fs::read_to_string(path)
        .map_err(|e| BdUiError::Config(format!("cannot read {}: {}", path.display(), e)))?;
    let value = registry::global().load_value(&source)?;
    let module: StepModule = serde_json::from_value(value).map_err(|e| {
        BdUiError::Config(format!("malformed step module {}: {}", path.display(), e))
    })?;
    Ok(module.bindings)
}

/// Fail fast, and descriptively, on unknown driver kinds rather than
/// surfacing serde's generic unknown-variant message.
fn check_driver_kind(value: &Value) -> Result<()> {
    let Some(driver) = value.get("driver") else {
        return Ok(());
    };
    match driver.get("kind").and_then(|k| k.as_str()) {
        Some(kind) if KNOWN_KINDS.contains(&kind) => Ok(()),
        Some(kind) => Err(BdUiError::UnknownDriverKind(kind.to_string())),
        None => Err(BdUiError::Config(
            "driver section is missing its `kind` discriminant".to_string(),
        )),
    }
}
