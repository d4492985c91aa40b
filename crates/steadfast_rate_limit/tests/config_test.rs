//! Tests for the configuration system.

use std::io::Write;
use std::time::Duration;
use steadfast_rate_limit::{BatchSettings, SteadfastConfig, ThrottleConfig};
use tempfile::Builder;

#[test]
fn test_load_bundled_defaults() {
    let config = SteadfastConfig::defaults().unwrap();

    let judge = config.throttle("judge").unwrap();
    assert_eq!(judge.min_delay(), Duration::from_secs(2));
    assert_eq!(judge.max_delay(), Duration::from_secs(60));
    assert_eq!(judge.growth_factor, 2.0);

    let scraper = config.throttle("scraper").unwrap();
    assert_eq!(scraper.min_delay_ms, 1_000);

    assert_eq!(config.retry.prompt_attempts, 3);
    assert_eq!(config.retry.submit_attempts, 5);
    assert_eq!(config.guard.max_critical_wait(), Duration::from_secs(30));
}

#[test]
fn test_bundled_batch_sections() {
    let config = SteadfastConfig::defaults().unwrap();

    let scrape = config.batch("scrape");
    assert_eq!(scrape.concurrency, 2);
    assert_eq!(scrape.random_delay(), Some(Duration::from_secs(15)));
    assert_eq!(scrape.rate_limit, None);

    let prompt = config.batch("prompt");
    assert_eq!(prompt.concurrency, 4);
    assert_eq!(prompt.rate_limit, Some(0.5));
    assert_eq!(prompt.breaker_threshold, 5);
}

#[test]
fn test_missing_sections_fall_back() {
    let config = SteadfastConfig::defaults().unwrap();
    assert!(config.throttle("nonexistent").is_none());
    assert_eq!(config.batch("nonexistent"), BatchSettings::default());
}

#[test]
fn test_config_from_file() {
    let mut temp_file = Builder::new().suffix(".toml").tempfile().unwrap();
    writeln!(
        temp_file,
        r#"
[throttle.judge]
min_delay_ms = 500
max_delay_ms = 5_000

[retry]
submit_attempts = 2

[batch.prompt]
concurrency = 8
rate_limit = 2.0
"#
    )
    .unwrap();

    let config = SteadfastConfig::from_file(temp_file.path()).unwrap();

    let judge = config.throttle("judge").unwrap();
    assert_eq!(judge, ThrottleConfig::new(500, 5_000, 2.0));
    assert_eq!(config.retry.submit_attempts, 2);
    assert_eq!(config.retry.check_attempts, 20);
    assert_eq!(config.batch("prompt").concurrency, 8);
    assert_eq!(config.batch("prompt").breaker_threshold, 5);
}

#[test]
fn test_invalid_file_rejected() {
    let mut temp_file = Builder::new().suffix(".toml").tempfile().unwrap();
    writeln!(
        temp_file,
        r#"
[throttle.judge]
min_delay_ms = 1_000
max_delay_ms = 5_000
growth_factor = 0.5
"#
    )
    .unwrap();

    let err = SteadfastConfig::from_file(temp_file.path()).unwrap_err();
    assert!(format!("{}", err).contains("throttle.judge"));
}

#[test]
fn test_negative_rate_rejected() {
    let mut config = SteadfastConfig::defaults().unwrap();
    config.batch.insert(
        "prompt".to_string(),
        BatchSettings {
            rate_limit: Some(-1.0),
            ..BatchSettings::default()
        },
    );
    assert!(config.validate().is_err());
}
