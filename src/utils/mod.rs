pub mod javascript;

use crate::errors::{BdUiError, Result};
use url::Url;

/// Resolve a possibly-relative URL against the run's base URL.
pub fn resolve_url(base_url: &str, target: &str) -> Result<String> {
    if let Ok(absolute) = Url::parse(target) {
        return Ok(absolute.to_string());
    }

    let base = Url::parse(base_url)
        .map_err(|e| BdUiError::Config(format!("invalid baseURL {:?}: {}", base_url, e)))?;
    let resolved = base
        .join(target)
        .map_err(|e| BdUiError::Navigation(format!("cannot resolve {:?}: {}", target, e)))?;
    Ok(resolved.to_string())
}
