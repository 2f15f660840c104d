// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Exponential-backoff envelope wrapped around every external gateway call.

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::error::GatewayError;

/// Fixed backoff schedule: initial attempt plus one retry per delay.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub delays: Vec<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            delays: vec![
                Duration::from_secs(1),
                Duration::from_secs(5),
                Duration::from_secs(15),
            ],
        }
    }
}

impl RetryPolicy {
    /// Policy with no waiting, for tests that only care about attempt
    /// counting.
    pub fn immediate() -> Self {
        Self { delays: vec![Duration::ZERO; 3] }
    }

    /// Total attempts including the first.
    pub fn max_attempts(&self) -> u32 {
        self.delays.len() as u32 + 1
    }
}

/// Run `op` through the retry envelope.
///
/// Transient errors are retried on the policy's schedule; permanent errors
/// surface immediately. Cancellation during a backoff sleep returns
/// [`GatewayError::Cancelled`] within one scheduler quantum.
pub async fn with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    cancel: &CancellationToken,
    mut op: F,
) -> Result<T, GatewayError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, GatewayError>>,
{
    let mut attempt: u32 = 0;
    loop {
        if cancel.is_cancelled() {
            return Err(GatewayError::Cancelled);
        }

        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if !err.is_transient() => return Err(err),
            Err(err) => {
                let Some(delay) = policy.delays.get(attempt as usize) else {
                    return Err(err);
                };
                attempt += 1;
                tracing::warn!(
                    attempt,
                    max_attempts = policy.max_attempts(),
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "transient gateway error, backing off"
                );
                tokio::select! {
                    _ = tokio::time::sleep(*delay) => {}
                    _ = cancel.cancelled() => return Err(GatewayError::Cancelled),
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "retry_tests.rs"]
mod tests;
