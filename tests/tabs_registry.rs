use chrono::{TimeDelta, TimeZone, Utc};
use tabs::{Period, Resolution, Tabs, TabsConfig, TabsError};

#[tokio::test]
async fn test_tabs_from_yaml_config_end_to_end() {
    let yaml = r#"
decimal_precision: 3
resolutions: [hour, day]
storage:
  adapter:
    class: tabs::storage::KvStore
"#;
    let config = TabsConfig::from_yaml(yaml).unwrap();
    let tabs = Tabs::from_config(config).await.unwrap();

    let start = Utc.with_ymd_and_hms(2024, 7, 1, 9, 0, 0).unwrap();
    for token in ["a", "b", "c"] {
        tabs.start_task("checkout", token, Some(start)).await.unwrap();
    }
    tabs.complete_task("checkout", "a", Some(start + TimeDelta::minutes(20)))
        .await
        .unwrap();
    tabs.complete_task("checkout", "b", Some(start + TimeDelta::minutes(40)))
        .await
        .unwrap();

    let period = Period::new(start, start + TimeDelta::days(2)).unwrap();
    let stats = tabs
        .task_stats("checkout", &period, Resolution::Day)
        .await
        .unwrap();

    assert_eq!(stats.started_within_period, 3);
    assert_eq!(stats.completed_within_period, 2);
    assert_eq!(stats.started_and_completed_within_period, 2);
    assert_eq!(stats.completion_rate, 0.667);
    assert_eq!(stats.average_completion_time_in_seconds, 1_800.0);

    // minute buckets were never recorded
    let by_minute = tabs
        .task_stats("checkout", &period, Resolution::Minute)
        .await
        .unwrap();
    assert_eq!(by_minute.started_within_period, 0);
}

#[tokio::test]
async fn test_stats_for_unknown_task() {
    let tabs = Tabs::from_config(TabsConfig::default()).await.unwrap();
    let now = Utc::now();
    let period = Period::new(now, now).unwrap();

    let err = tabs
        .task_stats("nope", &period, Resolution::Day)
        .await
        .unwrap_err();
    assert!(matches!(err, TabsError::UnknownMetric(_)));
}

#[tokio::test]
async fn test_failed_completion_leaves_registry_untouched() {
    let tabs = Tabs::from_config(TabsConfig::default()).await.unwrap();
    let err = tabs
        .complete_task("signup", "t1", None)
        .await
        .unwrap_err();
    assert!(matches!(err, TabsError::UnknownMetric(_)));
    assert!(!tabs.task_exists("signup").await.unwrap());
    assert!(tabs.list_tasks().await.unwrap().is_empty());

    tabs.start_task("signup", "t2", None).await.unwrap();
    let err = tabs
        .complete_task("signup", "t1", None)
        .await
        .unwrap_err();
    assert!(matches!(err, TabsError::UnstartedTask { .. }));
    assert_eq!(tabs.list_tasks().await.unwrap(), vec!["signup"]);
}

#[tokio::test]
async fn test_stats_serialize_to_json() {
    let tabs = Tabs::from_config(TabsConfig::default()).await.unwrap();
    tabs.start_task("signup", "t1", None).await.unwrap();

    let period = Period::last(TimeDelta::hours(1), &tabs::SystemClock).unwrap();
    let stats = tabs
        .task_stats("signup", &period, Resolution::Hour)
        .await
        .unwrap();
    let json = serde_json::to_value(&stats).unwrap();

    assert_eq!(json["started_within_period"], 1);
    assert_eq!(json["completion_rate"], 0.0);
}
