//! Proposal set lifecycle tests — cycle numbering, draft editing, the
//! per-set bound, submission atomicity, and topic adoption.

mod common;

use common::*;
use thesisflow::auth::roles;
use thesisflow::errors::AppError;
use thesisflow::models::topic::queries::*;
use thesisflow::models::topic::summary::summarize_entries;
use thesisflow::models::topic::{EntryStatus, MAX_TOPIC_PROPOSALS};
use thesisflow::models::topic::decisions::{
    HeadDecisionInput, ModeratorDecisionInput, record_head_decision, record_moderator_decision,
};
use thesisflow::models::topic::ReviewDecision;

#[test]
fn cycle_numbers_are_monotonic_per_group() {
    let (_dir, mut conn) = setup_test_db();
    let leader = create_user(&conn, "leader", roles::STUDENT);
    let group_id = create_group(&conn, "Group A", leader);
    let other_leader = create_user(&conn, "other", roles::STUDENT);
    let other_group = create_group(&conn, "Group B", other_leader);

    let s1 = create_set(&mut conn, group_id, leader).expect("cycle 1");
    assert_eq!(find_set(&conn, s1).unwrap().cycle, 1);

    // Drain cycle 1 by rejecting its only entry, then start cycle 2.
    let moderator = create_user(&conn, "mod", roles::MODERATOR);
    let e1 = add_entry(&mut conn, s1, leader, &entry_content("T1")).unwrap();
    submit_set(&mut conn, s1).unwrap();
    record_moderator_decision(&mut conn, &ModeratorDecisionInput {
        set_id: s1,
        proposal_id: e1,
        reviewer_id: moderator,
        decision: ReviewDecision::Rejected,
        notes: None,
    })
    .unwrap();

    let s2 = create_set(&mut conn, group_id, leader).expect("cycle 2");
    assert_eq!(find_set(&conn, s2).unwrap().cycle, 2);

    // Another group's numbering is independent.
    let other_set = create_set(&mut conn, other_group, other_leader).unwrap();
    assert_eq!(find_set(&conn, other_set).unwrap().cycle, 1);
}

#[test]
fn next_cycle_is_max_existing_plus_one() {
    let (_dir, mut conn) = setup_test_db();
    let leader = create_user(&conn, "leader", roles::STUDENT);
    let group_id = create_group(&conn, "Group A", leader);

    // Two archived cycles on record; the next one must be 3.
    for cycle in [1, 2] {
        conn.execute(
            "INSERT INTO topic_proposal_sets \
             (group_id, created_by, cycle, locked_entry_id, used_by, used_as_thesis_at) \
             VALUES (?1, ?2, ?3, 1, ?2, '2025-01-01T00:00:00')",
            rusqlite::params![group_id, leader, cycle],
        )
        .unwrap();
    }

    let set_id = create_set(&mut conn, group_id, leader).unwrap();
    assert_eq!(find_set(&conn, set_id).unwrap().cycle, 3);
}

#[test]
fn create_set_refuses_while_a_cycle_is_in_progress() {
    let (_dir, mut conn) = setup_test_db();
    let leader = create_user(&conn, "leader", roles::STUDENT);
    let group_id = create_group(&conn, "Group A", leader);

    create_set(&mut conn, group_id, leader).unwrap();
    let err = create_set(&mut conn, group_id, leader).unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
}

#[test]
fn entry_bound_is_enforced() {
    let (_dir, mut conn) = setup_test_db();
    let leader = create_user(&conn, "leader", roles::STUDENT);
    let group_id = create_group(&conn, "Group A", leader);
    let set_id = create_set(&mut conn, group_id, leader).unwrap();

    for i in 0..MAX_TOPIC_PROPOSALS {
        add_entry(&mut conn, set_id, leader, &entry_content(&format!("T{i}"))).unwrap();
    }
    let err = add_entry(&mut conn, set_id, leader, &entry_content("T4")).unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
    assert_eq!(find_set(&conn, set_id).unwrap().entries.len(), MAX_TOPIC_PROPOSALS);
}

#[test]
fn draft_entries_can_be_edited_and_removed() {
    let (_dir, mut conn) = setup_test_db();
    let leader = create_user(&conn, "leader", roles::STUDENT);
    let group_id = create_group(&conn, "Group A", leader);
    let set_id = create_set(&mut conn, group_id, leader).unwrap();

    let e1 = add_entry(&mut conn, set_id, leader, &entry_content("Original")).unwrap();
    let mut content = entry_content("Revised");
    content.keywords = vec!["iot".to_string(), "ml".to_string()];
    update_entry(&mut conn, set_id, e1, &content).unwrap();

    let set = find_set(&conn, set_id).unwrap();
    assert_eq!(set.entries[0].title, "Revised");
    assert_eq!(set.entries[0].keywords, vec!["iot", "ml"]);

    remove_entry(&mut conn, set_id, e1).unwrap();
    assert!(find_set(&conn, set_id).unwrap().entries.is_empty());

    // Removing again is NotFound.
    let err = remove_entry(&mut conn, set_id, e1).unwrap_err();
    assert!(matches!(err, AppError::NotFound));
}

#[test]
fn submission_is_all_or_nothing_and_freezes_the_set() {
    let (_dir, mut conn) = setup_test_db();
    let leader = create_user(&conn, "leader", roles::STUDENT);
    let group_id = create_group(&conn, "Group A", leader);
    let set_id = create_set(&mut conn, group_id, leader).unwrap();

    add_entry(&mut conn, set_id, leader, &entry_content("T1")).unwrap();
    add_entry(&mut conn, set_id, leader, &entry_content("T2")).unwrap();
    submit_set(&mut conn, set_id).unwrap();

    let set = find_set(&conn, set_id).unwrap();
    assert!(set.entries.iter().all(|e| e.status == EntryStatus::Submitted));
    let summary = summarize_entries(&set.entries);
    assert!(summary.awaiting_moderator);

    // The set is frozen: no edits, no second submission.
    let err = add_entry(&mut conn, set_id, leader, &entry_content("T3")).unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
    let err = submit_set(&mut conn, set_id).unwrap_err();
    assert!(matches!(err, AppError::InvalidTransition(_)));
}

#[test]
fn submitting_an_empty_set_is_rejected() {
    let (_dir, mut conn) = setup_test_db();
    let leader = create_user(&conn, "leader", roles::STUDENT);
    let group_id = create_group(&conn, "Group A", leader);
    let set_id = create_set(&mut conn, group_id, leader).unwrap();

    let err = submit_set(&mut conn, set_id).unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
}

/// Walk one entry through the full happy path so it can be adopted.
fn approved_entry(conn: &mut rusqlite::Connection, set_id: i64, entry_id: i64) {
    let moderator = create_user(conn, &format!("mod{entry_id}"), roles::MODERATOR);
    let head = create_user(conn, &format!("head{entry_id}"), roles::HEAD);
    record_moderator_decision(conn, &ModeratorDecisionInput {
        set_id,
        proposal_id: entry_id,
        reviewer_id: moderator,
        decision: ReviewDecision::Approved,
        notes: None,
    })
    .unwrap();
    record_head_decision(conn, &HeadDecisionInput {
        set_id,
        proposal_id: entry_id,
        reviewer_id: head,
        decision: ReviewDecision::Approved,
        notes: None,
        agenda: None,
        esg: None,
        sdg: None,
    })
    .unwrap();
}

#[test]
fn adopting_a_topic_archives_the_set_atomically() {
    let (_dir, mut conn) = setup_test_db();
    let leader = create_user(&conn, "leader", roles::STUDENT);
    let group_id = create_group(&conn, "Group A", leader);
    let set_id = create_set(&mut conn, group_id, leader).unwrap();
    let e1 = add_entry(&mut conn, set_id, leader, &entry_content("T1")).unwrap();
    let e2 = add_entry(&mut conn, set_id, leader, &entry_content("T2")).unwrap();
    submit_set(&mut conn, set_id).unwrap();
    approved_entry(&mut conn, set_id, e1);
    approved_entry(&mut conn, set_id, e2);

    mark_as_thesis(&mut conn, set_id, e1, leader).unwrap();

    let set = find_set(&conn, set_id).unwrap();
    assert_eq!(set.locked_entry_id, Some(e1));
    assert_eq!(set.used_by, Some(leader));
    assert!(set.used_as_thesis_at.is_some());

    // Second adoption loses the conditional write, even for another entry.
    let err = mark_as_thesis(&mut conn, set_id, e2, leader).unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));

    let unchanged = find_set(&conn, set_id).unwrap();
    assert_eq!(unchanged.locked_entry_id, Some(e1));
}

#[test]
fn adoption_requires_head_approval() {
    let (_dir, mut conn) = setup_test_db();
    let leader = create_user(&conn, "leader", roles::STUDENT);
    let group_id = create_group(&conn, "Group A", leader);
    let set_id = create_set(&mut conn, group_id, leader).unwrap();
    let e1 = add_entry(&mut conn, set_id, leader, &entry_content("T1")).unwrap();

    // Still draft.
    let err = mark_as_thesis(&mut conn, set_id, e1, leader).unwrap_err();
    assert!(matches!(err, AppError::InvalidTransition(_)));

    // Unknown entry.
    let err = mark_as_thesis(&mut conn, set_id, 9999, leader).unwrap_err();
    assert!(matches!(err, AppError::NotFound));
}
