// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn sample_issue() -> Issue {
    Issue {
        id: IssueId::new("i-1"),
        title: "fix bug".into(),
        content: "detailed repro".into(),
        status: IssueStatus::Open,
        priority: Priority::Medium,
        relationships: vec![
            Relationship {
                kind: RelationshipKind::DependsOn,
                target: IssueId::new("i-0"),
            },
            Relationship {
                kind: RelationshipKind::Blocks,
                target: IssueId::new("i-2"),
            },
        ],
        created_at: 0,
        updated_at: 0,
    }
}

#[test]
fn dependency_ids_filters_to_depends_on() {
    let issue = sample_issue();
    let deps: Vec<&IssueId> = issue.dependency_ids().collect();
    assert_eq!(deps, vec![&IssueId::new("i-0")]);
}

#[test]
fn priority_orders_by_urgency() {
    assert!(Priority::Low < Priority::Medium);
    assert!(Priority::Medium < Priority::High);
    assert!(Priority::High < Priority::Urgent);
}

#[test]
fn issue_round_trips_through_json() {
    let issue = sample_issue();
    let json = serde_json::to_string(&issue).expect("serialize");
    let back: Issue = serde_json::from_str(&json).expect("deserialize");
    assert_eq!(issue, back);
}
