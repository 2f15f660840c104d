// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Append-only activity and build-event tables.

use ralph_core::{
    ActivityEntry, ActivityId, ActivityKind, BuildEventEntry, BuildEventId, BuildPayload,
    BusEvent, IssueId, TenantId,
};
use rusqlite::{params, Row};

use crate::error::StoreError;
use crate::store::{epoch_ms_now, insert_activity, read_issue, Store};

impl Store {
    /// Append an audit record. `issue_id` is `None` for tenant-level
    /// entries (e.g. an ingest cycle failure with no issue to blame).
    pub fn append_activity(
        &self,
        tenant_id: TenantId,
        issue_id: Option<IssueId>,
        kind: ActivityKind,
        detail: &str,
    ) -> Result<(), StoreError> {
        let now = epoch_ms_now();
        {
            let mut conn = self.conn.lock();
            let tx = conn.transaction()?;
            insert_activity(&tx, tenant_id, issue_id, kind, detail, now)?;
            tx.commit()?;
        }
        self.bus.publish(BusEvent::ActivityAppended {
            tenant_id,
            issue_id,
            kind,
            epoch_ms: now,
        });
        Ok(())
    }

    /// Page through an issue's activity, newest first. Pass the last seen
    /// id as `before` to continue.
    pub fn list_activity(
        &self,
        issue_id: IssueId,
        before: Option<ActivityId>,
        limit: u32,
    ) -> Result<Vec<ActivityEntry>, StoreError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT id, tenant_id, issue_id, kind, detail, created_at_ms
             FROM activity
             WHERE issue_id = ?1 AND (?2 IS NULL OR id < ?2)
             ORDER BY id DESC LIMIT ?3",
        )?;
        let rows = stmt.query_map(
            params![issue_id.as_i64(), before.map(|b| b.as_i64()), limit as i64],
            map_activity_row,
        )?;
        let mut entries = Vec::new();
        for row in rows {
            entries.push(entry_from_raw(row?)?);
        }
        Ok(entries)
    }

    /// Page through a tenant's activity, newest first. Includes both
    /// issue-attributed entries and tenant-level entries (ingest cycle
    /// failures with no issue to blame).
    pub fn list_tenant_activity(
        &self,
        tenant_id: TenantId,
        before: Option<ActivityId>,
        limit: u32,
    ) -> Result<Vec<ActivityEntry>, StoreError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT id, tenant_id, issue_id, kind, detail, created_at_ms
             FROM activity
             WHERE tenant_id = ?1 AND (?2 IS NULL OR id < ?2)
             ORDER BY id DESC LIMIT ?3",
        )?;
        let rows = stmt.query_map(
            params![tenant_id.as_i64(), before.map(|b| b.as_i64()), limit as i64],
            map_activity_row,
        )?;
        let mut entries = Vec::new();
        for row in rows {
            entries.push(entry_from_raw(row?)?);
        }
        Ok(entries)
    }

    /// Total activity entries recorded for an issue.
    pub fn count_activity(&self, issue_id: IssueId) -> Result<u64, StoreError> {
        let conn = self.conn.lock();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM activity WHERE issue_id = ?1",
            params![issue_id.as_i64()],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    /// Append a live build event. Rejected unless the issue is actively
    /// building (`building` or `addressing_feedback`).
    pub fn append_build_event(
        &self,
        issue_id: IssueId,
        payload: &BuildPayload,
    ) -> Result<BuildEventId, StoreError> {
        let now = epoch_ms_now();
        let id = {
            let mut conn = self.conn.lock();
            let tx = conn.transaction()?;
            let issue = read_issue(&tx, issue_id)?;
            if !issue.state.is_build_state() {
                return Err(StoreError::NotBuilding { issue: issue_id, state: issue.state });
            }
            let json = serde_json::to_string(payload).unwrap_or_default();
            tx.execute(
                "INSERT INTO build_events (issue_id, payload, created_at_ms)
                 VALUES (?1, ?2, ?3)",
                params![issue_id.as_i64(), json, now as i64],
            )?;
            let id = BuildEventId(tx.last_insert_rowid());
            tx.commit()?;
            id
        };

        self.bus.publish(BusEvent::BuildEvent {
            issue_id,
            payload: payload.clone(),
            epoch_ms: now,
        });
        Ok(id)
    }

    /// Replay an issue's build events in insertion order, optionally after
    /// a known id.
    pub fn list_build_events(
        &self,
        issue_id: IssueId,
        after: Option<BuildEventId>,
        limit: u32,
    ) -> Result<Vec<BuildEventEntry>, StoreError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT id, issue_id, payload, created_at_ms
             FROM build_events
             WHERE issue_id = ?1 AND (?2 IS NULL OR id > ?2)
             ORDER BY id LIMIT ?3",
        )?;
        let rows = stmt.query_map(
            params![issue_id.as_i64(), after.map(|a| a.as_i64()), limit as i64],
            |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, i64>(3)?,
                ))
            },
        )?;
        let mut entries = Vec::new();
        for row in rows {
            let (id, issue, payload_json, created_at_ms) = row?;
            let payload = serde_json::from_str(&payload_json).map_err(|e| {
                StoreError::CorruptColumn { column: "payload", value: e.to_string() }
            })?;
            entries.push(BuildEventEntry {
                id: BuildEventId(id),
                issue_id: IssueId(issue),
                payload,
                created_at_ms: created_at_ms as u64,
            });
        }
        Ok(entries)
    }
}

struct RawActivity {
    id: i64,
    tenant_id: i64,
    issue_id: Option<i64>,
    kind: String,
    detail: String,
    created_at_ms: i64,
}

fn map_activity_row(row: &Row<'_>) -> rusqlite::Result<RawActivity> {
    Ok(RawActivity {
        id: row.get(0)?,
        tenant_id: row.get(1)?,
        issue_id: row.get(2)?,
        kind: row.get(3)?,
        detail: row.get(4)?,
        created_at_ms: row.get(5)?,
    })
}

fn entry_from_raw(raw: RawActivity) -> Result<ActivityEntry, StoreError> {
    let kind = ActivityKind::parse(&raw.kind).ok_or(StoreError::CorruptColumn {
        column: "kind",
        value: raw.kind.clone(),
    })?;
    Ok(ActivityEntry {
        id: ActivityId(raw.id),
        tenant_id: TenantId(raw.tenant_id),
        issue_id: raw.issue_id.map(IssueId),
        kind,
        detail: raw.detail,
        created_at_ms: raw.created_at_ms as u64,
    })
}

#[cfg(test)]
#[path = "activity_tests.rs"]
mod tests;
