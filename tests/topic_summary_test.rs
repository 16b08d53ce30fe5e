//! Workflow summarizer tests — pure derivation logic, no database.
//!
//! Covers the aggregate flags, the state precedence order, the edit gate,
//! archival, and active-set selection.

use thesisflow::models::topic::summary::*;
use thesisflow::models::topic::{EntryStatus, ProposalEntry, ProposalSet};

fn entry(id: i64, status: EntryStatus) -> ProposalEntry {
    ProposalEntry {
        id,
        set_id: 1,
        title: format!("Topic {id}"),
        abstract_text: String::new(),
        problem_statement: None,
        expected_outcome: None,
        keywords: vec![],
        proposed_by: 1,
        status,
        moderator_decision: None,
        head_decision: None,
        agenda: None,
        esg: None,
        sdg: None,
        created_at: "2025-01-01T00:00:00".to_string(),
        updated_at: "2025-01-01T00:00:00".to_string(),
    }
}

fn set(id: i64, created_at: &str, entries: Vec<ProposalEntry>) -> ProposalSet {
    ProposalSet {
        id,
        group_id: 1,
        created_by: 1,
        cycle: id,
        entries,
        locked_entry_id: None,
        used_by: None,
        used_as_thesis_at: None,
        created_at: created_at.to_string(),
        updated_at: created_at.to_string(),
    }
}

#[test]
fn empty_list_is_draft_and_not_all_rejected() {
    let summary = summarize_entries(&[]);
    assert!(!summary.all_rejected);
    assert!(!summary.awaiting_moderator);
    assert!(!summary.awaiting_head);
    assert_eq!(summary.state, SetState::Draft);
}

#[test]
fn awaiting_flags_track_entry_statuses() {
    let entries = vec![
        entry(1, EntryStatus::Submitted),
        entry(2, EntryStatus::HeadReview),
        entry(3, EntryStatus::Draft),
    ];
    let summary = summarize_entries(&entries);
    assert!(summary.awaiting_moderator);
    assert!(summary.awaiting_head);
    assert_eq!(summary.state, SetState::UnderReview);
}

#[test]
fn approved_takes_precedence_over_mixed_rejection() {
    let entries = vec![
        entry(1, EntryStatus::HeadApproved),
        entry(2, EntryStatus::ModeratorRejected),
    ];
    let summary = summarize_entries(&entries);
    assert!(summary.has_approved);
    assert!(!summary.all_rejected);
    assert_eq!(summary.state, SetState::Approved);
}

#[test]
fn approved_beats_pending_review() {
    let entries = vec![
        entry(1, EntryStatus::HeadApproved),
        entry(2, EntryStatus::Submitted),
    ];
    assert_eq!(summarize_entries(&entries).state, SetState::Approved);
}

#[test]
fn all_rejected_requires_every_entry_rejected() {
    let both_stages = vec![
        entry(1, EntryStatus::ModeratorRejected),
        entry(2, EntryStatus::HeadRejected),
    ];
    let summary = summarize_entries(&both_stages);
    assert!(summary.all_rejected);
    assert_eq!(summary.state, SetState::Rejected);

    let mixed = vec![
        entry(1, EntryStatus::ModeratorRejected),
        entry(2, EntryStatus::Draft),
    ];
    assert!(!summarize_entries(&mixed).all_rejected);
}

#[test]
fn edit_gate_closes_once_any_entry_leaves_draft() {
    let editable = set(1, "2025-01-01T00:00:00", vec![
        entry(1, EntryStatus::Draft),
        entry(2, EntryStatus::Draft),
    ]);
    assert!(can_edit_set(&editable));

    let frozen = set(1, "2025-01-01T00:00:00", vec![
        entry(1, EntryStatus::Submitted),
        entry(2, EntryStatus::Draft),
        entry(3, EntryStatus::Draft),
    ]);
    assert!(!can_edit_set(&frozen));
}

#[test]
fn empty_set_is_editable_but_not_submittable() {
    let empty = set(1, "2025-01-01T00:00:00", vec![]);
    assert!(can_edit_set(&empty));
    assert!(!can_submit_set(&empty));
}

#[test]
fn archival_follows_any_adoption_marker() {
    let mut s = set(1, "2025-01-01T00:00:00", vec![entry(1, EntryStatus::HeadApproved)]);
    assert!(!is_set_archived(&s));

    s.locked_entry_id = Some(1);
    assert!(is_set_archived(&s));
    assert!(!can_edit_set(&s));

    let mut by_timestamp = set(2, "2025-01-02T00:00:00", vec![]);
    by_timestamp.used_as_thesis_at = Some("2025-01-03T00:00:00".to_string());
    assert!(is_set_archived(&by_timestamp));
}

#[test]
fn active_set_skips_archived_and_prefers_newest() {
    let mut day1 = set(1, "2025-01-01T00:00:00", vec![]);
    day1.used_as_thesis_at = Some("2025-01-05T00:00:00".to_string());
    let day2 = set(2, "2025-01-02T00:00:00", vec![]);
    let mut day3 = set(3, "2025-01-03T00:00:00", vec![]);
    day3.locked_entry_id = Some(9);

    let sets = vec![day1, day2, day3];
    let active = pick_active_set(&sets).expect("some set");
    assert_eq!(active.id, 2);
}

#[test]
fn active_set_falls_back_to_newest_when_all_archived() {
    let mut day1 = set(1, "2025-01-01T00:00:00", vec![]);
    day1.locked_entry_id = Some(1);
    let mut day2 = set(2, "2025-01-02T00:00:00", vec![]);
    day2.locked_entry_id = Some(2);

    let sets = vec![day1, day2];
    let active = pick_active_set(&sets).expect("some set");
    assert_eq!(active.id, 2);

    assert!(pick_active_set(&[]).is_none());
}

#[test]
fn new_cycle_needs_leader_and_drained_rejected_pipeline() {
    let rejected = set(1, "2025-01-01T00:00:00", vec![
        entry(1, EntryStatus::ModeratorRejected),
        entry(2, EntryStatus::HeadRejected),
    ]);
    assert!(can_start_new_cycle(&rejected, true));
    assert!(!can_start_new_cycle(&rejected, false));

    // One entry still in flight keeps the gate shut.
    let in_flight = set(2, "2025-01-02T00:00:00", vec![
        entry(1, EntryStatus::ModeratorRejected),
        entry(2, EntryStatus::HeadReview),
    ]);
    assert!(!can_start_new_cycle(&in_flight, true));

    let empty = set(3, "2025-01-03T00:00:00", vec![]);
    assert!(!can_start_new_cycle(&empty, true));
}
