// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Typed row identifiers.

crate::define_id! {
    /// Unique identifier for an issue.
    ///
    /// One issue exists per (tenant, external tracker id) pair; the id is
    /// the store's row id and is stable for the life of the deployment.
    pub struct IssueId;
}

crate::define_id! {
    /// Unique identifier for a configured tenant.
    pub struct TenantId;
}

crate::define_id! {
    /// Identifier of an activity entry (monotonic per deployment).
    pub struct ActivityId;
}

crate::define_id! {
    /// Identifier of a build-event entry (monotonic per deployment).
    pub struct BuildEventId;
}

#[cfg(test)]
#[path = "id_tests.rs"]
mod tests;
