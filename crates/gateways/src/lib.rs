// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! ralph-gateways: abstract gateways to the issue tracker, the source-code
//! forge, and the code-generation worker, plus the retry envelope and
//! credential resolution they share.

pub mod codegen;
pub mod credentials;
pub mod error;
pub mod forge;
pub mod retry;
pub mod tracker;

#[cfg(any(test, feature = "test-support"))]
pub mod fakes;

pub use codegen::{BuildStream, CodegenGateway, ProcessCodegen};
pub use credentials::{resolve_secret, CredentialError, Profiles};
pub use error::GatewayError;
pub use forge::{CrStatus, ForgeGateway, HttpForge, Review, ReviewComment, ReviewVerdict};
pub use retry::{with_retry, RetryPolicy};
pub use tracker::{HttpTracker, TrackerComment, TrackerGateway, TrackerItem};

#[cfg(any(test, feature = "test-support"))]
pub use fakes::{FakeCodegen, FakeForge, FakeTracker, ScriptedBuild};
