// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Gateway error taxonomy.
//!
//! The retry envelope keys off [`GatewayError::is_transient`]: network
//! failures, timeouts, and 5xx-equivalents are retried; everything else
//! surfaces immediately.

use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    /// The call exceeded its deadline.
    #[error("gateway call timed out")]
    Timeout,

    /// Network/transport failure before a response was produced.
    #[error("transport error: {0}")]
    Transport(String),

    /// The remote answered with a non-success status.
    #[error("http status {code}: {body}")]
    Status { code: u16, body: String },

    /// The remote answered, but the payload made no sense.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// A subprocess-backed gateway failed to start or crashed.
    #[error("subprocess error: {0}")]
    Subprocess(String),

    /// The enclosing task was cancelled (shutdown or pause).
    #[error("cancelled")]
    Cancelled,
}

impl GatewayError {
    /// Whether the retry envelope should re-attempt this error.
    ///
    /// 429 is rate limiting and retries with the rest of the 5xx family;
    /// other 4xx-equivalents are permanent.
    pub fn is_transient(&self) -> bool {
        match self {
            GatewayError::Timeout | GatewayError::Transport(_) => true,
            GatewayError::Status { code, .. } => *code >= 500 || *code == 429,
            GatewayError::InvalidResponse(_)
            | GatewayError::Subprocess(_)
            | GatewayError::Cancelled => false,
        }
    }
}

impl From<reqwest::Error> for GatewayError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            GatewayError::Timeout
        } else if let Some(status) = err.status() {
            GatewayError::Status { code: status.as_u16(), body: err.to_string() }
        } else {
            GatewayError::Transport(err.to_string())
        }
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
