//! Tests for admission control and the shared request-rate limiter.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use steadfast_rate_limit::{ConcurrencyLimiter, RequestRateLimiter};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

#[tokio::test(start_paused = true)]
async fn test_limit_two_never_exceeded() {
    let limiter = ConcurrencyLimiter::new(2);
    let cancel = CancellationToken::new();
    let running = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));
    let mut tasks = JoinSet::new();

    for _ in 0..10 {
        let admission = limiter.admit(&cancel).await.unwrap();
        let running = running.clone();
        let peak = peak.clone();
        tasks.spawn(async move {
            let _admission = admission;
            let now = running.fetch_add(1, Ordering::SeqCst) + 1;
            peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(50)).await;
            running.fetch_sub(1, Ordering::SeqCst);
        });
    }

    while let Some(joined) = tasks.join_next().await {
        joined.unwrap();
    }

    assert_eq!(peak.load(Ordering::SeqCst), 2);
    assert_eq!(limiter.in_flight(), 0);
    assert_eq!(limiter.available_slots(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_admission_releases_slot_on_drop() {
    let limiter = ConcurrencyLimiter::new(1);
    let cancel = CancellationToken::new();

    let admission = limiter.admit(&cancel).await.unwrap();
    assert_eq!(limiter.in_flight(), 1);
    drop(admission);
    assert_eq!(limiter.in_flight(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_admission_cancelled_while_pool_full() {
    let limiter = ConcurrencyLimiter::new(1);
    let cancel = CancellationToken::new();
    let _held = limiter.admit(&cancel).await.unwrap();

    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(1)).await;
        trigger.cancel();
    });

    assert!(limiter.admit(&cancel).await.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_random_delay_is_bounded() {
    let limiter = ConcurrencyLimiter::new(2).with_random_delay(Duration::from_secs(15));
    let cancel = CancellationToken::new();

    let start = tokio::time::Instant::now();
    let _admission = limiter.admit(&cancel).await.unwrap();
    assert!(start.elapsed() <= Duration::from_secs(15));
}

#[tokio::test]
async fn test_rate_wait_is_cancellable() {
    // One request per 1000 seconds: the second token is far away
    let rate = RequestRateLimiter::new(0.001, 1).unwrap();
    let cancel = CancellationToken::new();

    assert!(rate.until_ready(&cancel).await);

    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let granted = tokio::time::timeout(Duration::from_secs(5), rate.until_ready(&cancel))
        .await
        .unwrap();
    assert!(!granted);
}

#[tokio::test]
async fn test_rate_limiter_shares_bucket_across_clones() {
    // One request per 1000 seconds
    let rate = RequestRateLimiter::new(0.001, 1).unwrap();
    let clone = rate.clone();
    let cancel = CancellationToken::new();

    assert!(rate.until_ready(&cancel).await);
    // The clone sees the token already spent
    let waited =
        tokio::time::timeout(Duration::from_millis(50), clone.until_ready(&cancel)).await;
    assert!(waited.is_err());
}

#[test]
fn test_invalid_rate_rejected() {
    assert!(RequestRateLimiter::new(0.0, 1).is_err());
    assert!(RequestRateLimiter::new(-2.0, 1).is_err());
    assert!(RequestRateLimiter::new(f64::INFINITY, 1).is_err());
}

#[test]
fn test_vanishing_rate_is_a_config_error() {
    // Positive, but the period does not fit in a Duration
    let err = RequestRateLimiter::new(1e-20, 1).unwrap_err();
    assert!(err.message.contains("too low"));
}

#[test]
fn test_zero_concurrency_is_unbounded() {
    let limiter = ConcurrencyLimiter::new(0);
    assert!(limiter.capacity() > 1_000);
    assert!(limiter.rate_limiter().is_none());
}
