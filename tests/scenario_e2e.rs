use bdui::{
    build_driver, BdUiConfig, BdUiError, Condition, DriverConfig, DriverKind, StepRegistrar,
    World,
};

fn mock_config() -> BdUiConfig {
    BdUiConfig {
        driver: Some(DriverConfig::Mock),
        ..Default::default()
    }
}

#[tokio::test]
async fn factory_builds_the_configured_kind() {
    let driver = build_driver(&mock_config()).await.unwrap();
    assert_eq!(driver.kind(), DriverKind::Mock);
}

#[tokio::test]
async fn click_then_read_value() {
    let world = World::for_config(&mock_config()).await.unwrap();
    world.driver().click("#demo-subscribe").await.unwrap();
    assert_eq!(
        world.driver().get_value("#demo-subscribe").await.unwrap(),
        "true"
    );
}

#[tokio::test]
async fn fill_then_type_appends() {
    let world = World::for_config(&mock_config()).await.unwrap();
    world.driver().fill("#demo-name", "Ada").await.unwrap();
    world
        .driver()
        .type_text("#demo-name", " Lovelace")
        .await
        .unwrap();
    assert_eq!(
        world.driver().get_value("#demo-name").await.unwrap(),
        "Ada Lovelace"
    );
}

#[tokio::test]
async fn navigation_history_is_completion_ordered() {
    let world = World::for_config(&mock_config()).await.unwrap();
    world.driver().goto("/a").await.unwrap();
    world.driver().goto("/b").await.unwrap();

    let urls: Vec<_> = world
        .driver()
        .history()
        .into_iter()
        .map(|entry| entry.url)
        .collect();
    assert_eq!(
        urls,
        vec!["http://localhost:3000/a", "http://localhost:3000/b"]
    );

    world.driver().reset_history();
    assert!(world.driver().history().is_empty());
}

#[tokio::test]
async fn teardown_makes_the_driver_unusable() {
    let mut world = World::for_config(&mock_config()).await.unwrap();
    world.driver().goto("/page").await.unwrap();
    world.dispose().await.unwrap();

    assert!(matches!(
        world.driver().goto("/later").await.unwrap_err(),
        BdUiError::DriverDestroyed
    ));

    // A second dispose, like a second destroy, is a clean no-op.
    world.dispose().await.unwrap();
}

#[tokio::test]
async fn unsupported_conditions_never_parse() {
    for condition in ["unsupported-condition", "to be sparkling", ""] {
        assert!(matches!(
            condition.parse::<Condition>(),
            Err(BdUiError::UnsupportedCondition(_))
        ));
    }
}

#[tokio::test]
async fn scripted_scenario_runs_end_to_end() {
    let registrar = StepRegistrar::builtin().unwrap();
    let mut world = World::for_config(&mock_config()).await.unwrap();

    let steps = [
        r##"I navigate to "/signup""##,
        r##"I fill "#demo-name" with "Ada""##,
        r##"I type " Lovelace" into "#demo-name""##,
        r##"I click "#demo-subscribe""##,
        r##"the value of "#demo-name" should be "Ada Lovelace""##,
        r##"the value of "#demo-subscribe" should be "true""##,
        r##"the current URL should be "http://localhost:3000/signup""##,
    ];
    for step in steps {
        registrar.dispatch(&world, step).await.unwrap();
    }

    world.dispose().await.unwrap();
}

#[tokio::test]
async fn failed_step_still_allows_teardown() {
    let registrar = StepRegistrar::builtin().unwrap();
    let mut world = World::for_config(&mock_config()).await.unwrap();

    let err = registrar
        .dispatch(&world, r##"the value of "#missing" should be "x""##)
        .await
        .unwrap_err();
    assert!(matches!(err, BdUiError::ElementNotFound(_)));

    world.dispose().await.unwrap();
}
