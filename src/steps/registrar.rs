use crate::core::Condition;
use crate::errors::{BdUiError, Result};
use crate::loader::StepAlias;
use crate::world::World;
use regex::Regex;
use std::time::Duration;
use tracing::debug;

/// The action a matched step translates into. Dispatch is a flat lookup
/// from step text to exactly one driver invocation plus assertion logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StepAction {
    Navigate,
    Reload,
    Back,
    Forward,
    Click,
    Fill,
    TypeInto,
    SelectIn,
    WaitFor,
    ExpectState,
    ValueShouldBe,
    TextShouldBe,
    UrlShouldBe,
}

/// Built-in step vocabulary: navigation, forms, gestures, assertions.
const VOCABULARY: [(&str, StepAction); 13] = [
    (r#"^I navigate to "(.+)"$"#, StepAction::Navigate),
    (r#"^I reload the page$"#, StepAction::Reload),
    (r#"^I go back$"#, StepAction::Back),
    (r#"^I go forward$"#, StepAction::Forward),
    (r#"^I click "(.+)"$"#, StepAction::Click),
    (r#"^I fill "(.+)" with "(.*)"$"#, StepAction::Fill),
    (r#"^I type "(.*)" into "(.+)"$"#, StepAction::TypeInto),
    (r#"^I select "(.+)" in "(.+)"$"#, StepAction::SelectIn),
    (
        r#"^I wait for "(.+?)"(?: within (\d+)ms)?$"#,
        StepAction::WaitFor,
    ),
    (
        r#"^"(.+)" should be (visible|hidden)$"#,
        StepAction::ExpectState,
    ),
    (
        r#"^the value of "(.+)" should be "(.*)"$"#,
        StepAction::ValueShouldBe,
    ),
    (
        r#"^the text of "(.+)" should be "(.*)"$"#,
        StepAction::TextShouldBe,
    ),
    (r#"^the current URL should be "(.+)"$"#, StepAction::UrlShouldBe),
];

struct StepPattern {
    regex: Regex,
    action: StepAction,
}

struct CompiledAlias {
    regex: Regex,
    step: String,
}

/// Binds human-readable step text to driver contract calls against the
/// active world.
pub struct StepRegistrar {
    patterns: Vec<StepPattern>,
    aliases: Vec<CompiledAlias>,
}

impl StepRegistrar {
    /// The built-in vocabulary only.
    pub fn builtin() -> Result<Self> {
        let mut patterns = Vec::with_capacity(VOCABULARY.len());
        for (pattern, action) in VOCABULARY {
            let regex = Regex::new(pattern)
                .map_err(|e| BdUiError::Config(format!("step pattern {:?}: {}", pattern, e)))?;
            patterns.push(StepPattern { regex, action });
        }
        Ok(Self {
            patterns,
            aliases: Vec::new(),
        })
    }

    /// The built-in vocabulary plus custom aliases from loaded step
    /// modules. Alias targets must themselves match the vocabulary.
    pub fn with_aliases(aliases: Vec<StepAlias>) -> Result<Self> {
        let mut registrar = Self::builtin()?;
        for alias in aliases {
            let regex = Regex::new(&alias.pattern).map_err(|e| {
                BdUiError::Config(format!("step alias {:?}: {}", alias.pattern, e))
            })?;
            registrar.aliases.push(CompiledAlias {
                regex,
                step: alias.step,
            });
        }
        Ok(registrar)
    }

    fn expand_alias(&self, text: &str) -> String {
        for alias in &self.aliases {
            if alias.regex.is_match(text) {
                return alias.step.clone();
            }
        }
        text.to_string()
    }

    /// Translate one parsed step into a driver call. Unmatched text fails
    /// with [`BdUiError::UndefinedStep`].
    pub async fn dispatch(&self, world: &World, text: &str) -> Result<()> {
        let text = self.expand_alias(text);
        debug!(target: "bdui::steps", step = %text, world = %world.id());
        for pattern in &self.patterns {
            if let Some(caps) = pattern.regex.captures(&text) {
                let first = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
                let second = caps.get(2).map(|m| m.as_str()).unwrap_or_default();
                return self.run(world, pattern.action, first, second).await;
            }
        }
        Err(BdUiError::UndefinedStep(text))
    }

    async fn run(
        &self,
        world: &World,
        action: StepAction,
        first: &str,
        second: &str,
    ) -> Result<()> {
        let driver = world.driver();
        match action {
            StepAction::Navigate => driver.goto(first).await,
            StepAction::Reload => driver.reload().await,
            StepAction::Back => driver.back().await,
            StepAction::Forward => driver.forward().await,
            StepAction::Click => driver.click(first).await,
            StepAction::Fill => driver.fill(first, second).await,
            StepAction::TypeInto => driver.type_text(second, first).await,
            StepAction::SelectIn => {
                let options: Vec<&str> = first.split(',').map(str::trim).collect();
                driver.select(second, &options).await
            }
            StepAction::WaitFor => {
                let timeout = second
                    .parse::<u64>()
                    .ok()
                    .map(Duration::from_millis);
                driver.wait_for(first, timeout).await
            }
            StepAction::ExpectState => {
                let condition: Condition = second.parse()?;
                driver.expect_that(first, condition).await
            }
            StepAction::ValueShouldBe => {
                let actual = driver.get_value(first).await?;
                assert_matches(second, &actual)
            }
            StepAction::TextShouldBe => {
                let actual = driver.get_text(first).await?;
                assert_matches(second, &actual)
            }
            StepAction::UrlShouldBe => {
                let actual = driver.current_url().await?;
                assert_matches(first, &actual)
            }
        }
    }
}

/// Mismatches carry both values so the step failure is self-describing.
fn assert_matches(expected: &str, actual: &str) -> Result<()> {
    if expected == actual {
        Ok(())
    } else {
        Err(BdUiError::AssertionFailed {
            expected: expected.to_string(),
            actual: actual.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::MockDriver;

    fn mock_world() -> World {
        World::with_driver(Box::new(MockDriver::default()))
    }

    #[tokio::test]
    async fn navigation_and_form_steps_drive_the_world() {
        let registrar = StepRegistrar::builtin().unwrap();
        let world = mock_world();

        registrar
            .dispatch(&world, r##"I navigate to "/signup""##)
            .await
            .unwrap();
        registrar
            .dispatch(&world, r##"I fill "#name" with "Ada""##)
            .await
            .unwrap();
        registrar
            .dispatch(&world, r##"I type " Lovelace" into "#name""##)
            .await
            .unwrap();
        registrar
            .dispatch(&world, r##"the value of "#name" should be "Ada Lovelace""##)
            .await
            .unwrap();
        registrar
            .dispatch(
                &world,
                r##"the current URL should be "http://localhost:3000/signup""##,
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn click_then_value_assertion() {
        let registrar = StepRegistrar::builtin().unwrap();
        let world = mock_world();

        registrar
            .dispatch(&world, r##"I click "#demo-subscribe""##)
            .await
            .unwrap();
        registrar
            .dispatch(&world, r##"the value of "#demo-subscribe" should be "true""##)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn mismatch_carries_both_values() {
        let registrar = StepRegistrar::builtin().unwrap();
        let world = mock_world();

        registrar
            .dispatch(&world, r##"I fill "#name" with "Ada""##)
            .await
            .unwrap();
        let err = registrar
            .dispatch(&world, r##"the value of "#name" should be "Grace""##)
            .await
            .unwrap_err();
        match err {
            BdUiError::AssertionFailed { expected, actual } => {
                assert_eq!(expected, "Grace");
                assert_eq!(actual, "Ada");
            }
            other => panic!("expected assertion failure, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn undefined_step_is_an_error() {
        let registrar = StepRegistrar::builtin().unwrap();
        let world = mock_world();

        let err = registrar
            .dispatch(&world, "I do a barrel roll")
            .await
            .unwrap_err();
        assert!(matches!(err, BdUiError::UndefinedStep(_)));
    }

    #[tokio::test]
    async fn waits_accept_an_explicit_window() {
        let registrar = StepRegistrar::builtin().unwrap();
        let world = mock_world();

        let err = registrar
            .dispatch(&world, r##"I wait for "#ghost" within 250ms"##)
            .await
            .unwrap_err();
        assert!(matches!(err, BdUiError::Timeout(ref msg) if msg.contains("250ms")));
    }

    #[tokio::test]
    async fn aliases_rewrite_to_the_vocabulary() {
        let registrar = StepRegistrar::with_aliases(vec![StepAlias {
            pattern: "^I subscribe$".to_string(),
            step: r##"I click "#demo-subscribe""##.to_string(),
        }])
        .unwrap();
        let world = mock_world();

        registrar.dispatch(&world, "I subscribe").await.unwrap();
        registrar
            .dispatch(&world, r##"the value of "#demo-subscribe" should be "true""##)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn visibility_steps_use_the_condition_set() {
        let registrar = StepRegistrar::builtin().unwrap();
        let world = mock_world();

        registrar
            .dispatch(&world, r##"I click "#banner""##)
            .await
            .unwrap();
        registrar
            .dispatch(&world, r##""#banner" should be visible"##)
            .await
            .unwrap();
        registrar
            .dispatch(&world, r##""#ghost" should be hidden"##)
            .await
            .unwrap();
    }
}
