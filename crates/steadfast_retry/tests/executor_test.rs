//! Tests for the retry executor.

use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use steadfast_error::{ErrorClass, RetryErrorKind};
use steadfast_rate_limit::{RequestRateLimiter, ThrottleConfig, Throttler, Unthrottled};
use steadfast_retry::{PollStatus, RetryExecutor, run_with_retry};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

#[derive(Debug)]
enum FakeError {
    RateLimited,
    BadRequest,
    MissingCredentials,
}

fn classify(err: &FakeError) -> ErrorClass {
    match err {
        FakeError::RateLimited => ErrorClass::Retriable("HTTP 429".to_string()),
        FakeError::BadRequest => ErrorClass::NonRetriable("HTTP 400".to_string()),
        FakeError::MissingCredentials => ErrorClass::Fatal("missing credentials".to_string()),
    }
}

fn judge() -> Throttler {
    Throttler::new("judge", ThrottleConfig::new(1_000, 30_000, 2.0)).unwrap()
}

#[tokio::test(start_paused = true)]
async fn test_first_attempt_success_does_not_sleep() {
    let throttle = judge();
    let calls = AtomicU32::new(0);
    let calls = &calls;

    let start = Instant::now();
    let value = RetryExecutor::new(&throttle, 3)
        .run(
            move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok::<_, FakeError>(42)
            },
            classify,
        )
        .await
        .unwrap();

    assert_eq!(value, 42);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(start.elapsed(), Duration::ZERO);
}

#[tokio::test(start_paused = true)]
async fn test_non_retriable_stops_immediately() {
    let throttle = judge();
    let calls = AtomicU32::new(0);
    let calls = &calls;

    let err = RetryExecutor::new(&throttle, 5)
        .run(
            move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(FakeError::BadRequest)
            },
            classify,
        )
        .await
        .unwrap_err();

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(err.attempts(), 1);
    assert_eq!(
        err.class(),
        Some(&ErrorClass::NonRetriable("HTTP 400".to_string()))
    );
    assert!(!err.aborts_batch());
    // No slowdown on rejection
    assert_eq!(throttle.current_delay(), Duration::from_secs(1));
}

#[tokio::test(start_paused = true)]
async fn test_fatal_aborts_batch() {
    let throttle = judge();

    let err = RetryExecutor::new(&throttle, 5)
        .run(
            || async { Err::<(), _>(FakeError::MissingCredentials) },
            classify,
        )
        .await
        .unwrap_err();

    assert_eq!(err.attempts(), 1);
    assert!(err.aborts_batch());
}

#[tokio::test(start_paused = true)]
async fn test_retriable_then_success_slows_down() {
    let throttle = judge();
    let calls = AtomicU32::new(0);
    let calls = &calls;

    let start = Instant::now();
    let value = RetryExecutor::new(&throttle, 3)
        .run(
            move || async move {
                if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(FakeError::RateLimited)
                } else {
                    Ok("accepted")
                }
            },
            classify,
        )
        .await
        .unwrap();

    assert_eq!(value, "accepted");
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(throttle.current_delay(), Duration::from_secs(2));
    // The second attempt waited the grown delay
    assert!(start.elapsed() >= Duration::from_secs(2));
}

#[tokio::test(start_paused = true)]
async fn test_retriable_exhausts_attempts() {
    let throttle = judge();
    let calls = AtomicU32::new(0);
    let calls = &calls;

    let err = run_with_retry(
        move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err::<(), _>(FakeError::RateLimited)
        },
        classify,
        &throttle,
        3,
    )
    .await
    .unwrap_err();

    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert_eq!(err.attempts(), 3);
    assert_eq!(
        err.kind(),
        &RetryErrorKind::Failed(ErrorClass::Retriable("HTTP 429".to_string()))
    );
    assert_eq!(throttle.current_delay(), Duration::from_secs(8));
}

#[tokio::test(start_paused = true)]
async fn test_zero_attempts_means_one() {
    let calls = AtomicU32::new(0);
    let calls = &calls;

    let executor = RetryExecutor::new(&Unthrottled, 0);
    assert_eq!(executor.max_attempts(), 1);

    let err = executor
        .run(
            move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(FakeError::RateLimited)
            },
            classify,
        )
        .await
        .unwrap_err();

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(err.attempts(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_cancelled_before_first_attempt() {
    let cancel = CancellationToken::new();
    cancel.cancel();
    let calls = AtomicU32::new(0);
    let calls = &calls;

    let err = RetryExecutor::new(&Unthrottled, 3)
        .with_cancellation(cancel)
        .run(
            move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok::<_, FakeError>(())
            },
            classify,
        )
        .await
        .unwrap_err();

    assert!(err.is_cancelled());
    assert!(err.aborts_batch());
    assert_eq!(err.attempts(), 0);
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn test_cancelled_during_throttle_wait() {
    let throttle = Throttler::new("slow", ThrottleConfig::new(10_000, 60_000, 2.0)).unwrap();
    let cancel = CancellationToken::new();
    let calls = AtomicU32::new(0);
    let calls = &calls;

    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(1)).await;
        trigger.cancel();
    });

    let start = Instant::now();
    let err = RetryExecutor::new(&throttle, 3)
        .with_cancellation(cancel)
        .run(
            move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(FakeError::RateLimited)
            },
            classify,
        )
        .await
        .unwrap_err();

    assert!(err.is_cancelled());
    assert_eq!(err.attempts(), 1);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(start.elapsed() < Duration::from_secs(20));
}

#[tokio::test]
async fn test_rate_limited_executor_takes_tokens() {
    let rate = RequestRateLimiter::new(1_000.0, 1).unwrap();

    let value = RetryExecutor::new(&Unthrottled, 2)
        .with_rate_limit(rate)
        .run(|| async { Ok::<_, FakeError>("ok") }, classify)
        .await
        .unwrap();

    assert_eq!(value, "ok");
}

#[tokio::test(start_paused = true)]
async fn test_poll_until_ready_without_slowdown() {
    let throttle = judge();
    let checks = AtomicU32::new(0);
    let checks = &checks;

    let verdict = RetryExecutor::new(&throttle, 20)
        .poll(
            move || async move {
                if checks.fetch_add(1, Ordering::SeqCst) < 2 {
                    Ok::<_, FakeError>(PollStatus::Pending)
                } else {
                    Ok(PollStatus::Ready("Accepted"))
                }
            },
            classify,
        )
        .await
        .unwrap();

    assert_eq!(verdict, "Accepted");
    assert_eq!(checks.load(Ordering::SeqCst), 3);
    assert_eq!(throttle.current_delay(), Duration::from_secs(1));
}

#[tokio::test(start_paused = true)]
async fn test_poll_exhausted_while_pending() {
    let throttle = judge();

    let err = RetryExecutor::new(&throttle, 3)
        .poll(
            || async { Ok::<PollStatus<()>, FakeError>(PollStatus::Pending) },
            classify,
        )
        .await
        .unwrap_err();

    assert_eq!(err.attempts(), 3);
    assert_eq!(
        err.class(),
        Some(&ErrorClass::Retriable(
            "still pending after 3 checks".to_string()
        ))
    );
}
