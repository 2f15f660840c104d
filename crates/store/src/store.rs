// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The store handle and issue operations.

use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;
use ralph_core::{
    ActivityKind, BusEvent, BuildOutcome, EventBus, Issue, IssueId, IssuePatch, IssueState,
    MergeSignal, TenantId,
};
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction};

use crate::error::StoreError;
use crate::schema;

/// Validated tenant configuration handed to `upsert_tenant` at startup.
#[derive(Debug, Clone)]
pub struct TenantConfig {
    pub name: String,
    pub forge_repo: String,
    pub base_branch: String,
    pub branch_prefix: String,
    pub label_filter: Option<String>,
    pub trusted_reviewer: Option<u64>,
    pub approval_marker: String,
    pub max_iterations: u32,
    pub tracker_token: String,
    pub forge_token: String,
}

/// Single-writer durable store.
///
/// Writers are serialized through the connection mutex; SQLite WAL mode
/// supports concurrent readers in other processes. The bus handle is used
/// to publish notifications strictly after commit.
#[derive(Debug)]
pub struct Store {
    pub(crate) conn: Mutex<Connection>,
    pub(crate) bus: EventBus,
}

/// Wall-clock epoch milliseconds.
///
/// Activity ordering within an issue relies on the single writer, not on
/// clock precision.
pub(crate) fn epoch_ms_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

impl Store {
    /// Open (or create) the store file and run schema init.
    pub fn open(path: &Path, bus: EventBus) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        schema::init(&conn)?;
        Ok(Self { conn: Mutex::new(conn), bus })
    }

    /// In-memory store for tests.
    pub fn open_in_memory(bus: EventBus) -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        schema::init(&conn)?;
        Ok(Self { conn: Mutex::new(conn), bus })
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    /// Idempotent issue creation keyed on (tenant, external id).
    ///
    /// Returns the issue and whether it was created by this call. An
    /// existing issue is returned untouched. Publishes `new_issue` on
    /// creation, after commit.
    pub fn create_issue_if_absent(
        &self,
        tenant_id: TenantId,
        external_id: &str,
        identifier: &str,
        title: &str,
        description: &str,
    ) -> Result<(Issue, bool), StoreError> {
        let now = epoch_ms_now();
        let (issue, created) = {
            let mut conn = self.conn.lock();
            let tx = conn.transaction()?;
            let inserted = tx.execute(
                "INSERT INTO issues
                   (tenant_id, external_id, identifier, title, description,
                    state, created_at_ms, updated_at_ms)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)
                 ON CONFLICT (tenant_id, external_id) DO NOTHING",
                params![
                    tenant_id.as_i64(),
                    external_id,
                    identifier,
                    title,
                    description,
                    IssueState::Queued.as_str(),
                    now as i64,
                ],
            )?;
            let issue = issue_by_dedupe_key(&tx, tenant_id, external_id)?;
            tx.commit()?;
            (issue, inserted > 0)
        };

        if created {
            tracing::info!(
                issue_id = %issue.id,
                tenant_id = %tenant_id,
                identifier = %issue.identifier,
                "new issue ingested"
            );
            self.bus.publish(BusEvent::NewIssue {
                issue_id: issue.id,
                tenant_id,
                identifier: issue.identifier.clone(),
                epoch_ms: now,
            });
        }
        Ok((issue, created))
    }

    pub fn get_issue(&self, id: IssueId) -> Result<Issue, StoreError> {
        let conn = self.conn.lock();
        read_issue(&conn, id)
    }

    /// Every issue, oldest first (operator listing).
    pub fn list_issues(&self) -> Result<Vec<Issue>, StoreError> {
        self.query_issues("ORDER BY id", &[])
    }

    /// Issues the orchestrator evaluates each tick: everything that is not
    /// completed, failed, or paused.
    pub fn list_active_issues(&self) -> Result<Vec<Issue>, StoreError> {
        self.query_issues(
            "WHERE state NOT IN ('completed', 'failed', 'paused') ORDER BY id",
            &[],
        )
    }

    /// Issues the forge ingestor polls: open change-request in a
    /// review-relevant state.
    pub fn issues_awaiting_forge(&self) -> Result<Vec<Issue>, StoreError> {
        self.query_issues(
            "WHERE change_request IS NOT NULL
               AND state IN ('in_review', 'addressing_feedback', 'building')
             ORDER BY id",
            &[],
        )
    }

    /// One tenant's issues in `refining`, whose tracker comments need
    /// polling.
    pub fn issues_refining_for_tenant(
        &self,
        tenant_id: TenantId,
    ) -> Result<Vec<Issue>, StoreError> {
        self.query_issues(
            "WHERE state = 'refining' AND tenant_id = ?1 ORDER BY id",
            &[&tenant_id.as_i64()],
        )
    }

    /// Rows left with `build_active = 1`; input to the recovery sweep.
    pub fn list_recoverable_builds(&self) -> Result<Vec<Issue>, StoreError> {
        self.query_issues("WHERE build_active = 1 ORDER BY id", &[])
    }

    /// Atomic state transition with optimistic concurrency.
    ///
    /// Re-reads the row inside the transaction, rejects with `Conflict` if
    /// its state is no longer `from`, validates the edge, applies the
    /// patch, bumps `updated_at`, and appends a `state_change` activity
    /// entry — all in one commit. `state_changed` and `activity_appended`
    /// are published after the commit.
    pub fn transition(
        &self,
        issue_id: IssueId,
        from: IssueState,
        to: IssueState,
        patch: IssuePatch,
        detail: &str,
    ) -> Result<Issue, StoreError> {
        let now = epoch_ms_now();
        let issue = {
            let mut conn = self.conn.lock();
            let tx = conn.transaction()?;
            let mut issue = read_issue(&tx, issue_id)?;

            if issue.state != from {
                return Err(StoreError::Conflict {
                    issue: issue_id,
                    expected: from,
                    actual: issue.state,
                });
            }
            if !from.may_transition_to(to) {
                return Err(StoreError::IllegalTransition { issue: issue_id, from, to });
            }

            patch.apply(&mut issue);
            issue.state = to;
            issue.updated_at_ms = now;
            write_issue(&tx, &issue)?;

            insert_activity(
                &tx,
                issue.tenant_id,
                Some(issue_id),
                ActivityKind::StateChange,
                &format!("{} -> {}: {}", from, to, detail),
                now,
            )?;
            tx.commit()?;
            issue
        };

        tracing::info!(issue_id = %issue_id, %from, %to, detail, "state transition");
        self.bus.publish(BusEvent::StateChanged { issue_id, from, to, epoch_ms: now });
        self.bus.publish(BusEvent::ActivityAppended {
            tenant_id: issue.tenant_id,
            issue_id: Some(issue_id),
            kind: ActivityKind::StateChange,
            epoch_ms: now,
        });
        Ok(issue)
    }

    /// Record a freshly ingested tracker comment: advances the comment
    /// cursor, stages the comment for the orchestrator, and appends an
    /// `external_comment` activity entry, in one transaction.
    ///
    /// A comment id at or below the cursor is ignored (re-poll replay).
    pub fn record_tracker_comment(
        &self,
        issue_id: IssueId,
        comment_id: u64,
        body: &str,
    ) -> Result<bool, StoreError> {
        let now = epoch_ms_now();
        let tenant_id = {
            let mut conn = self.conn.lock();
            let tx = conn.transaction()?;
            let issue = read_issue(&tx, issue_id)?;
            if comment_id <= issue.comment_cursor {
                return Ok(false);
            }
            tx.execute(
                "UPDATE issues
                 SET comment_cursor = ?2, pending_comment = ?3,
                     last_tracker_check_ms = ?4, updated_at_ms = ?4
                 WHERE id = ?1",
                params![issue_id.as_i64(), comment_id as i64, body, now as i64],
            )?;
            insert_activity(
                &tx,
                issue.tenant_id,
                Some(issue_id),
                ActivityKind::ExternalComment,
                &format!("tracker comment {}: {}", comment_id, body),
                now,
            )?;
            tx.commit()?;
            issue.tenant_id
        };

        self.bus.publish(BusEvent::ActivityAppended {
            tenant_id,
            issue_id: Some(issue_id),
            kind: ActivityKind::ExternalComment,
            epoch_ms: now,
        });
        Ok(true)
    }

    /// Record a merge/conflict signal from the forge ingestor.
    ///
    /// Idempotent: an unchanged signal writes nothing.
    pub fn record_merge_signal(
        &self,
        issue_id: IssueId,
        signal: MergeSignal,
    ) -> Result<bool, StoreError> {
        let now = epoch_ms_now();
        let tenant_id = {
            let mut conn = self.conn.lock();
            let tx = conn.transaction()?;
            let issue = read_issue(&tx, issue_id)?;
            if issue.merge_signal == Some(signal) {
                return Ok(false);
            }
            tx.execute(
                "UPDATE issues
                 SET merge_signal = ?2, last_forge_check_ms = ?3, updated_at_ms = ?3
                 WHERE id = ?1",
                params![issue_id.as_i64(), signal.as_str(), now as i64],
            )?;
            insert_activity(
                &tx,
                issue.tenant_id,
                Some(issue_id),
                ActivityKind::ActionNote,
                &format!("forge signal: {}", signal),
                now,
            )?;
            tx.commit()?;
            issue.tenant_id
        };

        self.bus.publish(BusEvent::ActivityAppended {
            tenant_id,
            issue_id: Some(issue_id),
            kind: ActivityKind::ActionNote,
            epoch_ms: now,
        });
        Ok(true)
    }

    /// Record a trusted `changes_requested` review with its new comments.
    ///
    /// `comments_json` is the captured (id, body) list for the feedback
    /// action; `review_cursor` is the highest forge comment id seen.
    /// Idempotent: feedback triggers only when the cursor advances, so a
    /// re-poll of an unchanged review writes nothing.
    pub fn record_feedback_request(
        &self,
        issue_id: IssueId,
        comments_json: &str,
        review_cursor: u64,
    ) -> Result<bool, StoreError> {
        let now = epoch_ms_now();
        let tenant_id = {
            let mut conn = self.conn.lock();
            let tx = conn.transaction()?;
            let issue = read_issue(&tx, issue_id)?;
            if review_cursor <= issue.review_cursor {
                return Ok(false);
            }
            tx.execute(
                "UPDATE issues
                 SET feedback_requested = 1, feedback_comments = ?2, review_cursor = ?3,
                     last_forge_check_ms = ?4, updated_at_ms = ?4
                 WHERE id = ?1",
                params![issue_id.as_i64(), comments_json, review_cursor as i64, now as i64],
            )?;
            insert_activity(
                &tx,
                issue.tenant_id,
                Some(issue_id),
                ActivityKind::ExternalComment,
                "trusted reviewer requested changes",
                now,
            )?;
            tx.commit()?;
            issue.tenant_id
        };

        self.bus.publish(BusEvent::ActivityAppended {
            tenant_id,
            issue_id: Some(issue_id),
            kind: ActivityKind::ExternalComment,
            epoch_ms: now,
        });
        Ok(true)
    }

    /// Record an untrusted review as skipped. State is never changed.
    ///
    /// Idempotent per reviewer: a repeated poll of the same review writes
    /// nothing.
    pub fn record_untrusted_review(
        &self,
        issue_id: IssueId,
        reviewer_id: u64,
    ) -> Result<bool, StoreError> {
        let now = epoch_ms_now();
        let detail = format!("changes_requested from untrusted reviewer {}", reviewer_id);
        let tenant_id = {
            let mut conn = self.conn.lock();
            let tx = conn.transaction()?;
            let issue = read_issue(&tx, issue_id)?;
            let last: Option<String> = tx
                .query_row(
                    "SELECT detail FROM activity
                     WHERE issue_id = ?1 AND kind = 'untrusted_feedback_skipped'
                     ORDER BY id DESC LIMIT 1",
                    params![issue_id.as_i64()],
                    |row| row.get(0),
                )
                .optional()?;
            if last.as_deref() == Some(detail.as_str()) {
                return Ok(false);
            }
            insert_activity(
                &tx,
                issue.tenant_id,
                Some(issue_id),
                ActivityKind::UntrustedFeedbackSkipped,
                &detail,
                now,
            )?;
            tx.execute(
                "UPDATE issues SET last_forge_check_ms = ?2 WHERE id = ?1",
                params![issue_id.as_i64(), now as i64],
            )?;
            tx.commit()?;
            issue.tenant_id
        };

        self.bus.publish(BusEvent::ActivityAppended {
            tenant_id,
            issue_id: Some(issue_id),
            kind: ActivityKind::UntrustedFeedbackSkipped,
            epoch_ms: now,
        });
        Ok(true)
    }

    /// Record the pid of a dispatched build subprocess and count the
    /// attempt.
    pub fn set_build_started(
        &self,
        issue_id: IssueId,
        pid: Option<u32>,
    ) -> Result<(), StoreError> {
        let now = epoch_ms_now();
        let conn = self.conn.lock();
        let changed = conn.execute(
            "UPDATE issues
             SET build_pid = ?2, build_attempts = build_attempts + 1, updated_at_ms = ?3
             WHERE id = ?1",
            params![issue_id.as_i64(), pid.map(|p| p as i64), now as i64],
        )?;
        if changed == 0 {
            return Err(StoreError::IssueNotFound(issue_id));
        }
        Ok(())
    }

    /// Record the final outcome of a build job and release the issue from
    /// the pool (`build_active = false`). Consumed by the orchestrator on
    /// its next tick.
    pub fn record_build_outcome(
        &self,
        issue_id: IssueId,
        outcome: &BuildOutcome,
    ) -> Result<(), StoreError> {
        let now = epoch_ms_now();
        let json = serde_json::to_string(outcome).unwrap_or_default();
        let detail = match outcome {
            BuildOutcome::Success => "build finished: success".to_string(),
            BuildOutcome::Failure { error } => format!("build failed: {}", error),
        };
        let tenant_id = {
            let mut conn = self.conn.lock();
            let tx = conn.transaction()?;
            let issue = read_issue(&tx, issue_id)?;
            tx.execute(
                "UPDATE issues
                 SET build_outcome = ?2, build_active = 0, build_pid = NULL,
                     updated_at_ms = ?3
                 WHERE id = ?1",
                params![issue_id.as_i64(), json, now as i64],
            )?;
            insert_activity(
                &tx,
                issue.tenant_id,
                Some(issue_id),
                ActivityKind::BuildEvent,
                &detail,
                now,
            )?;
            tx.commit()?;
            issue.tenant_id
        };

        self.bus.publish(BusEvent::ActivityAppended {
            tenant_id,
            issue_id: Some(issue_id),
            kind: ActivityKind::BuildEvent,
            epoch_ms: now,
        });
        Ok(())
    }

    /// Clear the pool-ownership flag without recording an outcome
    /// (cancellation path: partial work stays on disk).
    pub fn clear_build_active(&self, issue_id: IssueId) -> Result<(), StoreError> {
        let now = epoch_ms_now();
        let conn = self.conn.lock();
        conn.execute(
            "UPDATE issues
             SET build_active = 0, build_pid = NULL, updated_at_ms = ?2
             WHERE id = ?1",
            params![issue_id.as_i64(), now as i64],
        )?;
        Ok(())
    }

    /// Accumulate token counts from an `invocation_done` build event.
    pub fn increment_tokens(
        &self,
        issue_id: IssueId,
        tokens_in: u64,
        tokens_out: u64,
    ) -> Result<(), StoreError> {
        if tokens_in == 0 && tokens_out == 0 {
            return Ok(());
        }
        let conn = self.conn.lock();
        let changed = conn.execute(
            "UPDATE issues
             SET tokens_in = tokens_in + ?2, tokens_out = tokens_out + ?3
             WHERE id = ?1",
            params![issue_id.as_i64(), tokens_in as i64, tokens_out as i64],
        )?;
        if changed == 0 {
            return Err(StoreError::IssueNotFound(issue_id));
        }
        Ok(())
    }

    /// Stamp a tracker poll that found nothing new.
    pub fn touch_tracker_check(&self, issue_id: IssueId) -> Result<(), StoreError> {
        let conn = self.conn.lock();
        conn.execute(
            "UPDATE issues SET last_tracker_check_ms = ?2 WHERE id = ?1",
            params![issue_id.as_i64(), epoch_ms_now() as i64],
        )?;
        Ok(())
    }

    /// Stamp a forge poll that found nothing new.
    pub fn touch_forge_check(&self, issue_id: IssueId) -> Result<(), StoreError> {
        let conn = self.conn.lock();
        conn.execute(
            "UPDATE issues SET last_forge_check_ms = ?2 WHERE id = ?1",
            params![issue_id.as_i64(), epoch_ms_now() as i64],
        )?;
        Ok(())
    }

    fn query_issues(
        &self,
        where_clause: &str,
        args: &[&dyn rusqlite::ToSql],
    ) -> Result<Vec<Issue>, StoreError> {
        let conn = self.conn.lock();
        let sql = format!("SELECT {} FROM issues {}", ISSUE_COLUMNS, where_clause);
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(args, map_issue_row)?;
        let mut issues = Vec::new();
        for row in rows {
            issues.push(issue_from_raw(row?)?);
        }
        Ok(issues)
    }
}

pub(crate) const ISSUE_COLUMNS: &str = "id, tenant_id, external_id, identifier, title, \
     description, plan, approved_plan, state, workspace, change_request, error, \
     pre_failure_state, paused_from, refine_iterations, build_attempts, comment_cursor, \
     review_cursor, tokens_in, tokens_out, build_active, build_pid, pending_comment, \
     build_outcome, merge_signal, feedback_requested, feedback_comments, created_at_ms, \
     updated_at_ms, last_tracker_check_ms, last_forge_check_ms";

/// Raw row with string-typed enums, parsed into `Issue` outside the
/// rusqlite closure so parse failures surface as `StoreError`.
pub(crate) struct RawIssue {
    id: i64,
    tenant_id: i64,
    external_id: String,
    identifier: String,
    title: String,
    description: String,
    plan: Option<String>,
    approved_plan: Option<String>,
    state: String,
    workspace: Option<String>,
    change_request: Option<i64>,
    error: Option<String>,
    pre_failure_state: Option<String>,
    paused_from: Option<String>,
    refine_iterations: i64,
    build_attempts: i64,
    comment_cursor: i64,
    review_cursor: i64,
    tokens_in: i64,
    tokens_out: i64,
    build_active: bool,
    build_pid: Option<i64>,
    pending_comment: Option<String>,
    build_outcome: Option<String>,
    merge_signal: Option<String>,
    feedback_requested: bool,
    feedback_comments: Option<String>,
    created_at_ms: i64,
    updated_at_ms: i64,
    last_tracker_check_ms: Option<i64>,
    last_forge_check_ms: Option<i64>,
}

pub(crate) fn map_issue_row(row: &Row<'_>) -> rusqlite::Result<RawIssue> {
    Ok(RawIssue {
        id: row.get(0)?,
        tenant_id: row.get(1)?,
        external_id: row.get(2)?,
        identifier: row.get(3)?,
        title: row.get(4)?,
        description: row.get(5)?,
        plan: row.get(6)?,
        approved_plan: row.get(7)?,
        state: row.get(8)?,
        workspace: row.get(9)?,
        change_request: row.get(10)?,
        error: row.get(11)?,
        pre_failure_state: row.get(12)?,
        paused_from: row.get(13)?,
        refine_iterations: row.get(14)?,
        build_attempts: row.get(15)?,
        comment_cursor: row.get(16)?,
        review_cursor: row.get(17)?,
        tokens_in: row.get(18)?,
        tokens_out: row.get(19)?,
        build_active: row.get(20)?,
        build_pid: row.get(21)?,
        pending_comment: row.get(22)?,
        build_outcome: row.get(23)?,
        merge_signal: row.get(24)?,
        feedback_requested: row.get(25)?,
        feedback_comments: row.get(26)?,
        created_at_ms: row.get(27)?,
        updated_at_ms: row.get(28)?,
        last_tracker_check_ms: row.get(29)?,
        last_forge_check_ms: row.get(30)?,
    })
}

fn parse_state(value: &str) -> Result<IssueState, StoreError> {
    IssueState::parse(value).ok_or(StoreError::CorruptColumn {
        column: "state",
        value: value.to_string(),
    })
}

fn parse_opt_state(value: Option<String>) -> Result<Option<IssueState>, StoreError> {
    value.as_deref().map(parse_state).transpose()
}

pub(crate) fn issue_from_raw(raw: RawIssue) -> Result<Issue, StoreError> {
    let merge_signal = match raw.merge_signal.as_deref() {
        None => None,
        Some("merged") => Some(MergeSignal::Merged),
        Some("conflict") => Some(MergeSignal::Conflict),
        Some(other) => {
            return Err(StoreError::CorruptColumn {
                column: "merge_signal",
                value: other.to_string(),
            })
        }
    };
    let build_outcome = raw
        .build_outcome
        .as_deref()
        .map(serde_json::from_str::<BuildOutcome>)
        .transpose()
        .map_err(|e| StoreError::CorruptColumn {
            column: "build_outcome",
            value: e.to_string(),
        })?;

    Ok(Issue {
        id: IssueId(raw.id),
        tenant_id: TenantId(raw.tenant_id),
        external_id: raw.external_id,
        identifier: raw.identifier,
        title: raw.title,
        description: raw.description,
        plan: raw.plan,
        approved_plan: raw.approved_plan,
        state: parse_state(&raw.state)?,
        workspace: raw.workspace.map(Into::into),
        change_request: raw.change_request.map(|v| v as u64),
        error: raw.error,
        pre_failure_state: parse_opt_state(raw.pre_failure_state)?,
        paused_from: parse_opt_state(raw.paused_from)?,
        refine_iterations: raw.refine_iterations as u32,
        build_attempts: raw.build_attempts as u32,
        comment_cursor: raw.comment_cursor as u64,
        review_cursor: raw.review_cursor as u64,
        tokens_in: raw.tokens_in as u64,
        tokens_out: raw.tokens_out as u64,
        build_active: raw.build_active,
        build_pid: raw.build_pid.map(|v| v as u32),
        pending_comment: raw.pending_comment,
        build_outcome,
        merge_signal,
        feedback_requested: raw.feedback_requested,
        feedback_comments: raw.feedback_comments,
        created_at_ms: raw.created_at_ms as u64,
        updated_at_ms: raw.updated_at_ms as u64,
        last_tracker_check_ms: raw.last_tracker_check_ms.map(|v| v as u64),
        last_forge_check_ms: raw.last_forge_check_ms.map(|v| v as u64),
    })
}

pub(crate) fn read_issue(conn: &Connection, id: IssueId) -> Result<Issue, StoreError> {
    let sql = format!("SELECT {} FROM issues WHERE id = ?1", ISSUE_COLUMNS);
    let raw = conn
        .query_row(&sql, params![id.as_i64()], map_issue_row)
        .optional()?
        .ok_or(StoreError::IssueNotFound(id))?;
    issue_from_raw(raw)
}

fn issue_by_dedupe_key(
    tx: &Transaction<'_>,
    tenant_id: TenantId,
    external_id: &str,
) -> Result<Issue, StoreError> {
    let sql = format!(
        "SELECT {} FROM issues WHERE tenant_id = ?1 AND external_id = ?2",
        ISSUE_COLUMNS
    );
    let raw = tx.query_row(&sql, params![tenant_id.as_i64(), external_id], map_issue_row)?;
    issue_from_raw(raw)
}

/// Write every patchable column of an in-memory issue back to its row.
fn write_issue(tx: &Transaction<'_>, issue: &Issue) -> Result<(), StoreError> {
    let build_outcome = issue
        .build_outcome
        .as_ref()
        .map(|o| serde_json::to_string(o).unwrap_or_default());
    tx.execute(
        "UPDATE issues SET
            state = ?2, plan = ?3, approved_plan = ?4, workspace = ?5,
            change_request = ?6, error = ?7, pre_failure_state = ?8, paused_from = ?9,
            refine_iterations = ?10, build_attempts = ?11, build_active = ?12,
            build_pid = ?13, pending_comment = ?14, build_outcome = ?15,
            merge_signal = ?16, feedback_requested = ?17, feedback_comments = ?18,
            updated_at_ms = ?19
         WHERE id = ?1",
        params![
            issue.id.as_i64(),
            issue.state.as_str(),
            issue.plan,
            issue.approved_plan,
            issue.workspace.as_ref().map(|p| p.display().to_string()),
            issue.change_request.map(|v| v as i64),
            issue.error,
            issue.pre_failure_state.map(|s| s.as_str()),
            issue.paused_from.map(|s| s.as_str()),
            issue.refine_iterations as i64,
            issue.build_attempts as i64,
            issue.build_active,
            issue.build_pid.map(|v| v as i64),
            issue.pending_comment,
            build_outcome,
            issue.merge_signal.map(|s| s.as_str()),
            issue.feedback_requested,
            issue.feedback_comments,
            issue.updated_at_ms as i64,
        ],
    )?;
    Ok(())
}

pub(crate) fn insert_activity(
    tx: &Transaction<'_>,
    tenant_id: TenantId,
    issue_id: Option<IssueId>,
    kind: ActivityKind,
    detail: &str,
    now: u64,
) -> Result<(), StoreError> {
    tx.execute(
        "INSERT INTO activity (tenant_id, issue_id, kind, detail, created_at_ms)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            tenant_id.as_i64(),
            issue_id.map(|id| id.as_i64()),
            kind.as_str(),
            detail,
            now as i64,
        ],
    )?;
    Ok(())
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
