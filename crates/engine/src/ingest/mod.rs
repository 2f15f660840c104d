// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Polling ingestors over the two external systems.
//!
//! Both run as independent tasks on a fixed, jittered cycle; per-tenant
//! and per-issue failures are recorded as activity and never abort the
//! rest of the cycle.

mod forge;
mod tracker;

pub use forge::ForgeIngestor;
pub use tracker::TrackerIngestor;

use std::time::Duration;

use rand::Rng;

/// Apply ±10% jitter to a poll interval so tenants don't align.
pub(crate) fn jittered(interval: Duration) -> Duration {
    let base = interval.as_millis() as u64;
    if base == 0 {
        return interval;
    }
    let spread = base / 10;
    let offset = rand::thread_rng().gen_range(0..=spread * 2);
    Duration::from_millis(base - spread + offset)
}

#[cfg(test)]
#[path = "../ingest_tests.rs"]
mod tests;
