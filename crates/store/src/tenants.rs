// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Tenant rows: written once at startup, read by the ingestors.

use ralph_core::{Tenant, TenantId};
use rusqlite::{params, OptionalExtension, Row};

use crate::error::StoreError;
use crate::store::{epoch_ms_now, Store, TenantConfig};

const TENANT_COLUMNS: &str = "id, name, forge_repo, base_branch, branch_prefix, \
     label_filter, trusted_reviewer, approval_marker, max_iterations, tracker_cursor";

impl Store {
    /// Insert or update a tenant by name. Secrets stay in memory: the
    /// returned `Tenant` carries the config's tokens, the row does not.
    pub fn upsert_tenant(&self, config: &TenantConfig) -> Result<Tenant, StoreError> {
        let now = epoch_ms_now();
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO tenants
               (name, forge_repo, base_branch, branch_prefix, label_filter,
                trusted_reviewer, approval_marker, max_iterations, created_at_ms)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
             ON CONFLICT (name) DO UPDATE SET
                forge_repo = excluded.forge_repo,
                base_branch = excluded.base_branch,
                branch_prefix = excluded.branch_prefix,
                label_filter = excluded.label_filter,
                trusted_reviewer = excluded.trusted_reviewer,
                approval_marker = excluded.approval_marker,
                max_iterations = excluded.max_iterations",
            params![
                config.name,
                config.forge_repo,
                config.base_branch,
                config.branch_prefix,
                config.label_filter,
                config.trusted_reviewer.map(|v| v as i64),
                config.approval_marker,
                config.max_iterations as i64,
                now as i64,
            ],
        )?;
        let sql = format!("SELECT {} FROM tenants WHERE name = ?1", TENANT_COLUMNS);
        let mut tenant = conn.query_row(&sql, params![config.name], map_tenant_row)?;
        tenant.tracker_token.clone_from(&config.tracker_token);
        tenant.forge_token.clone_from(&config.forge_token);
        Ok(tenant)
    }

    /// All configured tenants, without secrets (the daemon overlays them).
    pub fn list_tenants(&self) -> Result<Vec<Tenant>, StoreError> {
        let conn = self.conn.lock();
        let sql = format!("SELECT {} FROM tenants ORDER BY id", TENANT_COLUMNS);
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map([], map_tenant_row)?;
        let mut tenants = Vec::new();
        for row in rows {
            tenants.push(row?);
        }
        Ok(tenants)
    }

    pub fn get_tenant(&self, id: TenantId) -> Result<Tenant, StoreError> {
        let conn = self.conn.lock();
        let sql = format!("SELECT {} FROM tenants WHERE id = ?1", TENANT_COLUMNS);
        conn.query_row(&sql, params![id.as_i64()], map_tenant_row)
            .optional()?
            .ok_or_else(|| StoreError::TenantNotFound(id.to_string()))
    }

    /// Advance the tenant's tracker paging cursor. Called only after a
    /// poll cycle's items are durably observed.
    pub fn set_tracker_cursor(
        &self,
        tenant_id: TenantId,
        cursor: &str,
    ) -> Result<(), StoreError> {
        let conn = self.conn.lock();
        let changed = conn.execute(
            "UPDATE tenants SET tracker_cursor = ?2 WHERE id = ?1",
            params![tenant_id.as_i64(), cursor],
        )?;
        if changed == 0 {
            return Err(StoreError::TenantNotFound(tenant_id.to_string()));
        }
        Ok(())
    }
}

fn map_tenant_row(row: &Row<'_>) -> rusqlite::Result<Tenant> {
    Ok(Tenant {
        id: TenantId(row.get(0)?),
        name: row.get(1)?,
        forge_repo: row.get(2)?,
        base_branch: row.get(3)?,
        branch_prefix: row.get(4)?,
        label_filter: row.get(5)?,
        trusted_reviewer: row.get::<_, Option<i64>>(6)?.map(|v| v as u64),
        approval_marker: row.get(7)?,
        max_iterations: row.get::<_, i64>(8)? as u32,
        tracker_cursor: row.get(9)?,
        tracker_token: String::new(),
        forge_token: String::new(),
    })
}

#[cfg(test)]
#[path = "tenants_tests.rs"]
mod tests;
