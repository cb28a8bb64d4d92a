use crate::errors::Result;
use std::path::{Path, PathBuf};
use tracing::info;

/// Starter configuration, in the relaxed syntax the loader registry makes
/// importable.
const DEFAULT_CONFIG: &str = r#"{
  // Application under test.
  "baseURL": "http://localhost:3000",

  // Gherkin behavior scripts.
  "features": ["features/**/*.feature"],

  // Custom step-text bindings.
  "steps": ["bdui/steps/**/*.steps.json"],

  // One of: mock, chrome, webdriver. Omit for the default chrome backend.
  "driver": { "kind": "chrome", "headless": true },
}
"#;

const EXAMPLE_FEATURE: &str = r##"Feature: Newsletter signup

  Scenario: A visitor subscribes
    Given I navigate to "/signup"
    When I fill "#demo-name" with "Ada"
    And I click "#demo-subscribe"
    Then the value of "#demo-subscribe" should be "true"
"##;

const EXAMPLE_STEPS: &str = r##"{
  "bindings": [
    { "pattern": "^I subscribe$", "step": "I click \"#demo-subscribe\"" },
  ],
}
"##;

/// Which paths `init` wrote and which it left alone.
#[derive(Debug, Default)]
pub struct ScaffoldReport {
    pub created: Vec<PathBuf>,
    pub skipped: Vec<PathBuf>,
}

/// Scaffold a starter project: configuration file, `features/` and
/// `bdui/steps/` with one example each. Existing paths are never
/// overwritten, only reported as skipped.
pub async fn init(config_path: &Path) -> Result<ScaffoldReport> {
    let root = config_path.parent().unwrap_or_else(|| Path::new("."));
    let mut report = ScaffoldReport::default();

    write_if_absent(&mut report, config_path, DEFAULT_CONFIG).await?;

    let features_dir = root.join("features");
    create_dir_if_absent(&mut report, &features_dir).await?;
    write_if_absent(&mut report, &features_dir.join("example.feature"), EXAMPLE_FEATURE).await?;

    let steps_dir = root.join("bdui").join("steps");
    create_dir_if_absent(&mut report, &steps_dir).await?;
    write_if_absent(&mut report, &steps_dir.join("example.steps.json"), EXAMPLE_STEPS).await?;

    for path in &report.created {
        info!(path = %path.display(), "created");
    }
    for path in &report.skipped {
        info!(path = %path.display(), "skipped (already exists)");
    }
    Ok(report)
}

async fn write_if_absent(
    report: &mut ScaffoldReport,
    path: &Path,
    contents: &str,
) -> Result<()> {
    if tokio::fs::try_exists(path).await? {
        report.skipped.push(path.to_path_buf());
        return Ok(());
    }
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, contents).await?;
    report.created.push(path.to_path_buf());
    Ok(())
}

async fn create_dir_if_absent(report: &mut ScaffoldReport, path: &Path) -> Result<()> {
    if tokio::fs::try_exists(path).await? {
        report.skipped.push(path.to_path_buf());
        return Ok(());
    }
    tokio::fs::create_dir_all(path).await?;
    report.created.push(path.to_path_buf());
    Ok(())
}
