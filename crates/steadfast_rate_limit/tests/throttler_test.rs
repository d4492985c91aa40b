//! Tests for adaptive throttling.

use std::time::Duration;
use steadfast_rate_limit::{Throttle, ThrottleConfig, Throttler, Unthrottled};
use tokio::time::Instant;

fn throttler() -> Throttler {
    Throttler::new("test", ThrottleConfig::new(1_000, 30_000, 2.0)).unwrap()
}

#[tokio::test(start_paused = true)]
async fn test_slowdown_doubles_delay() {
    let throttle = throttler();
    assert_eq!(throttle.current_delay(), Duration::from_secs(1));

    throttle.slowdown();
    assert_eq!(throttle.current_delay(), Duration::from_secs(2));
    throttle.slowdown();
    assert_eq!(throttle.current_delay(), Duration::from_secs(4));
    throttle.slowdown();
    assert_eq!(throttle.current_delay(), Duration::from_secs(8));
}

#[tokio::test(start_paused = true)]
async fn test_slowdown_is_monotonic_and_capped() {
    let throttle = throttler();
    let mut previous = throttle.current_delay();

    for _ in 0..20 {
        throttle.slowdown();
        throttle.touch();
        let delay = throttle.current_delay();
        assert!(delay >= previous);
        assert!(delay <= Duration::from_secs(30));
        previous = delay;
    }

    assert_eq!(previous, Duration::from_secs(30));
}

#[tokio::test(start_paused = true)]
async fn test_huge_growth_factor_saturates_at_max() {
    let throttle =
        Throttler::new("steep", ThrottleConfig::new(1_000, 60_000, 1e20)).unwrap();

    throttle.slowdown();
    assert_eq!(throttle.current_delay(), Duration::from_secs(60));
    throttle.slowdown();
    assert_eq!(throttle.current_delay(), Duration::from_secs(60));

    tokio::time::advance(Duration::from_secs(61)).await;
    throttle.touch();
    assert_eq!(throttle.current_delay(), Duration::from_secs(1));
}

#[tokio::test(start_paused = true)]
async fn test_recovery_is_one_step() {
    let throttle = throttler();
    throttle.slowdown();
    throttle.slowdown();
    throttle.slowdown();
    assert_eq!(throttle.current_delay(), Duration::from_secs(8));

    // Within the recovery window nothing changes
    tokio::time::advance(Duration::from_secs(10)).await;
    throttle.touch();
    assert_eq!(throttle.current_delay(), Duration::from_secs(8));

    tokio::time::advance(Duration::from_secs(21)).await;
    throttle.touch();
    assert_eq!(throttle.current_delay(), Duration::from_secs(4));
}

#[tokio::test(start_paused = true)]
async fn test_recovery_never_drops_below_min() {
    let throttle = throttler();
    throttle.slowdown();

    for _ in 0..5 {
        tokio::time::advance(Duration::from_secs(31)).await;
        throttle.ready();
    }

    assert_eq!(throttle.current_delay(), Duration::from_secs(1));
    assert_eq!(throttle.state().min_delay(), Duration::from_secs(1));
}

#[tokio::test(start_paused = true)]
async fn test_first_attempt_never_sleeps() {
    let throttle = throttler();
    throttle.slowdown();
    throttle.slowdown();

    let start = Instant::now();
    assert!(throttle.wait(1).await);
    assert_eq!(start.elapsed(), Duration::ZERO);
}

#[tokio::test(start_paused = true)]
async fn test_later_attempts_sleep_current_delay() {
    let throttle = throttler();
    throttle.slowdown();

    let start = Instant::now();
    assert!(throttle.wait(2).await);
    assert!(start.elapsed() >= Duration::from_secs(2));
}

#[tokio::test(start_paused = true)]
async fn test_unthrottled_never_sleeps() {
    let throttle = Unthrottled;
    throttle.slowdown();

    let start = Instant::now();
    assert!(throttle.wait(5).await);
    assert_eq!(start.elapsed(), Duration::ZERO);
}

#[test]
fn test_invalid_configuration_rejected() {
    assert!(Throttler::new("flat", ThrottleConfig::new(1_000, 30_000, 1.0)).is_err());
    assert!(Throttler::new("inverted", ThrottleConfig::new(5_000, 1_000, 2.0)).is_err());
    assert!(Throttler::new("zero", ThrottleConfig::new(0, 1_000, 2.0)).is_err());

    let err = Throttler::new("nan", ThrottleConfig::new(1_000, 2_000, f64::NAN)).unwrap_err();
    assert!(err.message.contains("nan"));
}
