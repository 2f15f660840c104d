// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
// Virtualized under paused test time, unlike std::time::Instant.
use tokio::time::Instant;

fn counter() -> Arc<AtomicU32> {
    Arc::new(AtomicU32::new(0))
}

#[tokio::test(start_paused = true)]
async fn transient_errors_retry_on_schedule() {
    let calls = counter();
    let cancel = CancellationToken::new();
    let calls_in = Arc::clone(&calls);

    let started = Instant::now();
    let result = with_retry(&RetryPolicy::default(), &cancel, move || {
        let calls = Arc::clone(&calls_in);
        async move {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            if n < 2 {
                Err(GatewayError::Timeout)
            } else {
                Ok(n)
            }
        }
    })
    .await;

    assert_eq!(result.unwrap(), 2);
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    // Paused time auto-advances: 1s + 5s of backoff elapsed virtually.
    assert!(started.elapsed() >= Duration::from_secs(6));
}

#[tokio::test(start_paused = true)]
async fn attempts_are_exhausted_after_the_schedule() {
    let calls = counter();
    let cancel = CancellationToken::new();
    let calls_in = Arc::clone(&calls);

    let result: Result<(), _> = with_retry(&RetryPolicy::default(), &cancel, move || {
        let calls = Arc::clone(&calls_in);
        async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(GatewayError::Transport("unreachable".into()))
        }
    })
    .await;

    assert!(matches!(result, Err(GatewayError::Transport(_))));
    // Initial attempt + three retries.
    assert_eq!(calls.load(Ordering::SeqCst), 4);
}

#[tokio::test(start_paused = true)]
async fn permanent_errors_fail_immediately() {
    let calls = counter();
    let cancel = CancellationToken::new();
    let calls_in = Arc::clone(&calls);

    let result: Result<(), _> = with_retry(&RetryPolicy::default(), &cancel, move || {
        let calls = Arc::clone(&calls_in);
        async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(GatewayError::Status { code: 404, body: "missing".into() })
        }
    })
    .await;

    assert!(matches!(result, Err(GatewayError::Status { code: 404, .. })));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn cancellation_during_backoff_exits_promptly() {
    let calls = counter();
    let cancel = CancellationToken::new();
    let calls_in = Arc::clone(&calls);

    let canceller = cancel.clone();
    tokio::spawn(async move {
        // Fire mid-way through the first 1s backoff sleep.
        tokio::time::sleep(Duration::from_millis(100)).await;
        canceller.cancel();
    });

    let result: Result<(), _> = with_retry(&RetryPolicy::default(), &cancel, move || {
        let calls = Arc::clone(&calls_in);
        async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(GatewayError::Timeout)
        }
    })
    .await;

    assert!(matches!(result, Err(GatewayError::Cancelled)));
    // Cancellation interrupted the backoff: no second attempt ran.
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn pre_cancelled_token_short_circuits() {
    let cancel = CancellationToken::new();
    cancel.cancel();

    let result =
        with_retry(&RetryPolicy::immediate(), &cancel, || async { Ok::<(), GatewayError>(()) })
            .await;
    assert!(matches!(result, Err(GatewayError::Cancelled)));
}
