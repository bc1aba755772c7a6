use super::*;
use std::sync::atomic::{AtomicUsize, Ordering};

fn assert_elapsed(started: tokio::time::Instant, expected: Duration) {
    let got = started.elapsed();
    assert!(
        got >= expected && got < expected + Duration::from_millis(10),
        "elapsed {got:?}, expected {expected:?}"
    );
}

fn failing(kind: BackendErrorKind) -> BackendError {
    BackendError::new(kind, "boom")
}

#[tokio::test(start_paused = true)]
async fn transient_failures_use_all_attempts_then_rethrow() {
    let calls = AtomicUsize::new(0);
    let calls_ref = &calls;
    let started = tokio::time::Instant::now();

    let res: Result<(), _> = with_retry(RetryPolicy::default(), "test", move || async move {
        calls_ref.fetch_add(1, Ordering::SeqCst);
        Err(failing(BackendErrorKind::Transient))
    })
    .await;

    assert_eq!(res.unwrap_err().kind, BackendErrorKind::Transient);
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    // 1s after the first failure, 2s after the second.
    assert_elapsed(started, Duration::from_secs(3));
}

#[tokio::test(start_paused = true)]
async fn rate_limits_back_off_on_the_longer_base() {
    let calls = AtomicUsize::new(0);
    let calls_ref = &calls;
    let started = tokio::time::Instant::now();

    let res = with_retry(RetryPolicy::default(), "test", move || async move {
        let n = calls_ref.fetch_add(1, Ordering::SeqCst);
        if n < 2 {
            Err(failing(BackendErrorKind::RateLimited))
        } else {
            Ok(n)
        }
    })
    .await;

    assert_eq!(res.unwrap(), 2);
    assert_elapsed(started, Duration::from_secs(5 + 10));
}

#[tokio::test(start_paused = true)]
async fn auth_failures_are_not_retried_and_prompt_for_credentials() {
    let calls = AtomicUsize::new(0);
    let prompts = Arc::new(AtomicUsize::new(0));
    let prompts_hook = Arc::clone(&prompts);
    let retrier = Retrier::new(RetryPolicy::default()).with_credential_prompt(Arc::new(
        move |_err: &BackendError| {
            prompts_hook.fetch_add(1, Ordering::SeqCst);
        },
    ));

    let calls_ref = &calls;
    let res: Result<(), _> = retrier
        .run("test", move || async move {
            calls_ref.fetch_add(1, Ordering::SeqCst);
            Err(failing(BackendErrorKind::Auth))
        })
        .await;

    assert_eq!(res.unwrap_err().kind, BackendErrorKind::Auth);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(prompts.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn not_found_is_fatal_too() {
    let calls = AtomicUsize::new(0);
    let calls_ref = &calls;
    let res: Result<(), _> = with_retry(RetryPolicy::default(), "test", move || async move {
        calls_ref.fetch_add(1, Ordering::SeqCst);
        Err(failing(BackendErrorKind::NotFound))
    })
    .await;
    assert!(res.is_err());
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn classification_and_delays() {
    let p = RetryPolicy::default();
    assert_eq!(
        p.delay_after(RetryClass::RateLimited, 2),
        Some(Duration::from_secs(10))
    );
    assert_eq!(
        p.delay_after(RetryClass::Transient, 3),
        Some(Duration::from_secs(3))
    );
    assert_eq!(p.delay_after(RetryClass::Fatal, 1), None);
    assert_eq!(
        RetryClass::of(&failing(BackendErrorKind::InvalidResponse)),
        RetryClass::Transient
    );
    assert_eq!(BackendErrorKind::from_status(403), BackendErrorKind::Auth);
    assert_eq!(BackendErrorKind::from_status(429), BackendErrorKind::RateLimited);
    assert_eq!(BackendErrorKind::from_status(503), BackendErrorKind::Transient);
}
