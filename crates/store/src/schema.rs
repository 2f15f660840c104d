// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Schema creation and versioning.
//!
//! The schema version lives in SQLite's `user_version` pragma. Opening a
//! store with an unknown future version fails rather than guessing.

use rusqlite::Connection;

use crate::error::StoreError;

/// Current schema version.
pub(crate) const SCHEMA_VERSION: i64 = 1;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS tenants (
    id                INTEGER PRIMARY KEY,
    name              TEXT NOT NULL UNIQUE,
    forge_repo        TEXT NOT NULL,
    base_branch       TEXT NOT NULL,
    branch_prefix     TEXT NOT NULL,
    label_filter      TEXT,
    trusted_reviewer  INTEGER,
    approval_marker   TEXT NOT NULL,
    max_iterations    INTEGER NOT NULL,
    tracker_cursor    TEXT,
    created_at_ms     INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS issues (
    id                    INTEGER PRIMARY KEY,
    tenant_id             INTEGER NOT NULL REFERENCES tenants(id),
    external_id           TEXT NOT NULL,
    identifier            TEXT NOT NULL,
    title                 TEXT NOT NULL,
    description           TEXT NOT NULL DEFAULT '',
    plan                  TEXT,
    approved_plan         TEXT,
    state                 TEXT NOT NULL,
    workspace             TEXT,
    change_request        INTEGER,
    error                 TEXT,
    pre_failure_state     TEXT,
    paused_from           TEXT,
    refine_iterations     INTEGER NOT NULL DEFAULT 0,
    build_attempts        INTEGER NOT NULL DEFAULT 0,
    comment_cursor        INTEGER NOT NULL DEFAULT 0,
    review_cursor         INTEGER NOT NULL DEFAULT 0,
    tokens_in             INTEGER NOT NULL DEFAULT 0,
    tokens_out            INTEGER NOT NULL DEFAULT 0,
    build_active          INTEGER NOT NULL DEFAULT 0,
    build_pid             INTEGER,
    pending_comment       TEXT,
    build_outcome         TEXT,
    merge_signal          TEXT,
    feedback_requested    INTEGER NOT NULL DEFAULT 0,
    feedback_comments     TEXT,
    created_at_ms         INTEGER NOT NULL,
    updated_at_ms         INTEGER NOT NULL,
    last_tracker_check_ms INTEGER,
    last_forge_check_ms   INTEGER,
    UNIQUE (tenant_id, external_id)
);

CREATE INDEX IF NOT EXISTS idx_issues_state ON issues(state);
CREATE INDEX IF NOT EXISTS idx_issues_build_active ON issues(build_active);

CREATE TABLE IF NOT EXISTS activity (
    id            INTEGER PRIMARY KEY,
    tenant_id     INTEGER NOT NULL REFERENCES tenants(id),
    issue_id      INTEGER REFERENCES issues(id),
    kind          TEXT NOT NULL,
    detail        TEXT NOT NULL,
    created_at_ms INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_activity_issue ON activity(issue_id, id);

CREATE TABLE IF NOT EXISTS build_events (
    id            INTEGER PRIMARY KEY,
    issue_id      INTEGER NOT NULL REFERENCES issues(id),
    payload       TEXT NOT NULL,
    created_at_ms INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_build_events_issue ON build_events(issue_id, id);
";

/// Apply pragmas and create/upgrade the schema on a fresh connection.
pub(crate) fn init(conn: &Connection) -> Result<(), StoreError> {
    // journal_mode returns the resulting mode as a row, so query it.
    conn.query_row("PRAGMA journal_mode = WAL", [], |_| Ok(()))?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    conn.pragma_update(None, "foreign_keys", "ON")?;
    conn.busy_timeout(std::time::Duration::from_secs(5))?;

    let version: i64 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;
    match version {
        0 => {
            conn.execute_batch(SCHEMA)?;
            conn.pragma_update(None, "user_version", SCHEMA_VERSION)?;
        }
        SCHEMA_VERSION => {}
        other => {
            return Err(StoreError::CorruptColumn {
                column: "user_version",
                value: other.to_string(),
            });
        }
    }
    Ok(())
}
