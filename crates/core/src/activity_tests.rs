// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

#[parameterized(
    state_change = { ActivityKind::StateChange, "state_change" },
    external_comment = { ActivityKind::ExternalComment, "external_comment" },
    build_event = { ActivityKind::BuildEvent, "build_event" },
    gateway_error = { ActivityKind::GatewayError, "gateway_error" },
    action_note = { ActivityKind::ActionNote, "action_note" },
    untrusted = { ActivityKind::UntrustedFeedbackSkipped, "untrusted_feedback_skipped" },
)]
fn kind_display_and_parse_round_trip(kind: ActivityKind, s: &str) {
    assert_eq!(kind.as_str(), s);
    assert_eq!(kind.to_string(), s);
    assert_eq!(ActivityKind::parse(s), Some(kind));
}

#[test]
fn parse_rejects_unknown_kind() {
    assert_eq!(ActivityKind::parse("comment"), None);
}

#[test]
fn tenant_level_entries_have_no_issue() {
    let entry = ActivityEntry {
        id: ActivityId(1),
        tenant_id: TenantId(1),
        issue_id: None,
        kind: ActivityKind::GatewayError,
        detail: "tracker poll failed: timeout".to_string(),
        created_at_ms: 1,
    };
    let json = serde_json::to_value(&entry).unwrap();
    assert_eq!(json["issue_id"], serde_json::Value::Null);
    assert_eq!(json["kind"], "gateway_error");
}
