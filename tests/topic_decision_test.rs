//! Decision recorder tests — role ordering, precondition guards, the review
//! trail, and head classification fields.

mod common;

use common::*;
use thesisflow::auth::roles;
use thesisflow::errors::AppError;
use thesisflow::models::topic::decisions::*;
use thesisflow::models::topic::queries::*;
use thesisflow::models::topic::{EntryStatus, ReviewDecision, ReviewStage};

struct Fixture {
    set_id: i64,
    entry_id: i64,
    moderator: i64,
    head: i64,
}

/// One submitted entry plus a moderator and a head.
fn submitted_entry(conn: &mut rusqlite::Connection) -> Fixture {
    let leader = create_user(conn, "leader", roles::STUDENT);
    let group_id = create_group(conn, "Group A", leader);
    let moderator = create_user(conn, "mod", roles::MODERATOR);
    let head = create_user(conn, "head", roles::HEAD);

    let set_id = create_set(conn, group_id, leader).unwrap();
    let entry_id = add_entry(conn, set_id, leader, &entry_content("IoT irrigation")).unwrap();
    submit_set(conn, set_id).unwrap();

    Fixture { set_id, entry_id, moderator, head }
}

fn moderator_input(f: &Fixture, decision: ReviewDecision) -> ModeratorDecisionInput {
    ModeratorDecisionInput {
        set_id: f.set_id,
        proposal_id: f.entry_id,
        reviewer_id: f.moderator,
        decision,
        notes: Some("checked scope".to_string()),
    }
}

fn head_input(f: &Fixture, decision: ReviewDecision) -> HeadDecisionInput {
    HeadDecisionInput {
        set_id: f.set_id,
        proposal_id: f.entry_id,
        reviewer_id: f.head,
        decision,
        notes: None,
        agenda: Some("Smart agriculture".to_string()),
        esg: Some("E".to_string()),
        sdg: Some("SDG 2".to_string()),
    }
}

#[test]
fn moderator_approval_parks_entry_at_head_review() {
    let (_dir, mut conn) = setup_test_db();
    let f = submitted_entry(&mut conn);

    let entry =
        record_moderator_decision(&mut conn, &moderator_input(&f, ReviewDecision::Approved))
            .unwrap();
    assert_eq!(entry.status, EntryStatus::HeadReview);
    let decision = entry.moderator_decision.expect("decision recorded");
    assert_eq!(decision.reviewer_id, f.moderator);
    assert_eq!(decision.decision, ReviewDecision::Approved);
    assert_eq!(decision.notes.as_deref(), Some("checked scope"));
    assert!(entry.head_decision.is_none());
}

#[test]
fn moderator_rejection_is_terminal() {
    let (_dir, mut conn) = setup_test_db();
    let f = submitted_entry(&mut conn);

    let entry =
        record_moderator_decision(&mut conn, &moderator_input(&f, ReviewDecision::Rejected))
            .unwrap();
    assert_eq!(entry.status, EntryStatus::ModeratorRejected);

    // No further decisions apply to a terminally rejected entry.
    let err = record_moderator_decision(&mut conn, &moderator_input(&f, ReviewDecision::Approved))
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidTransition(_)));
    let err =
        record_head_decision(&mut conn, &head_input(&f, ReviewDecision::Approved)).unwrap_err();
    assert!(matches!(err, AppError::InvalidTransition(_)));
}

#[test]
fn head_decision_requires_prior_moderator_approval() {
    let (_dir, mut conn) = setup_test_db();
    let f = submitted_entry(&mut conn);

    // Straight to head while still `submitted` is rejected.
    let err =
        record_head_decision(&mut conn, &head_input(&f, ReviewDecision::Approved)).unwrap_err();
    assert!(matches!(err, AppError::InvalidTransition(_)));

    let entry = find_entry_in_set(&conn, f.set_id, f.entry_id).unwrap().unwrap();
    assert_eq!(entry.status, EntryStatus::Submitted);
}

#[test]
fn draft_entries_cannot_be_moderated() {
    let (_dir, mut conn) = setup_test_db();
    let leader = create_user(&conn, "leader", roles::STUDENT);
    let group_id = create_group(&conn, "Group A", leader);
    let moderator = create_user(&conn, "mod", roles::MODERATOR);
    let set_id = create_set(&mut conn, group_id, leader).unwrap();
    let entry_id = add_entry(&mut conn, set_id, leader, &entry_content("T1")).unwrap();

    let err = record_moderator_decision(&mut conn, &ModeratorDecisionInput {
        set_id,
        proposal_id: entry_id,
        reviewer_id: moderator,
        decision: ReviewDecision::Approved,
        notes: None,
    })
    .unwrap_err();
    assert!(matches!(err, AppError::InvalidTransition(_)));
}

#[test]
fn head_approval_attaches_classification() {
    let (_dir, mut conn) = setup_test_db();
    let f = submitted_entry(&mut conn);
    record_moderator_decision(&mut conn, &moderator_input(&f, ReviewDecision::Approved)).unwrap();

    let entry =
        record_head_decision(&mut conn, &head_input(&f, ReviewDecision::Approved)).unwrap();
    assert_eq!(entry.status, EntryStatus::HeadApproved);
    assert_eq!(entry.agenda.as_deref(), Some("Smart agriculture"));
    assert_eq!(entry.esg.as_deref(), Some("E"));
    assert_eq!(entry.sdg.as_deref(), Some("SDG 2"));
    assert_eq!(entry.head_decision.unwrap().reviewer_id, f.head);
}

#[test]
fn head_rejection_drops_classification() {
    let (_dir, mut conn) = setup_test_db();
    let f = submitted_entry(&mut conn);
    record_moderator_decision(&mut conn, &moderator_input(&f, ReviewDecision::Approved)).unwrap();

    let entry =
        record_head_decision(&mut conn, &head_input(&f, ReviewDecision::Rejected)).unwrap();
    assert_eq!(entry.status, EntryStatus::HeadRejected);
    assert!(entry.agenda.is_none());
    assert!(entry.esg.is_none());
    assert!(entry.sdg.is_none());
}

#[test]
fn decisions_append_to_the_review_trail() {
    let (_dir, mut conn) = setup_test_db();
    let f = submitted_entry(&mut conn);
    record_moderator_decision(&mut conn, &moderator_input(&f, ReviewDecision::Approved)).unwrap();
    record_head_decision(&mut conn, &head_input(&f, ReviewDecision::Rejected)).unwrap();

    let history = find_history_for_set(&conn, f.set_id).unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].stage, ReviewStage::Moderator);
    assert_eq!(history[0].decision, ReviewDecision::Approved);
    assert_eq!(history[0].reviewer_id, f.moderator);
    assert_eq!(history[1].stage, ReviewStage::Head);
    assert_eq!(history[1].decision, ReviewDecision::Rejected);
    assert_eq!(history[1].proposal_id, f.entry_id);
}

#[test]
fn unknown_set_or_entry_is_not_found() {
    let (_dir, mut conn) = setup_test_db();
    let f = submitted_entry(&mut conn);

    let mut wrong_entry = moderator_input(&f, ReviewDecision::Approved);
    wrong_entry.proposal_id = 9999;
    assert!(matches!(
        record_moderator_decision(&mut conn, &wrong_entry).unwrap_err(),
        AppError::NotFound
    ));

    let mut wrong_set = moderator_input(&f, ReviewDecision::Approved);
    wrong_set.set_id = 9999;
    assert!(matches!(
        record_moderator_decision(&mut conn, &wrong_set).unwrap_err(),
        AppError::NotFound
    ));
}

#[test]
fn review_queues_track_entry_statuses() {
    let (_dir, mut conn) = setup_test_db();
    let f = submitted_entry(&mut conn);

    let moderation = find_pending_moderation(&conn).unwrap();
    assert_eq!(moderation.len(), 1);
    assert_eq!(moderation[0].proposal_id, f.entry_id);
    assert_eq!(moderation[0].group_name, "Group A");
    assert!(find_pending_head(&conn).unwrap().is_empty());

    record_moderator_decision(&mut conn, &moderator_input(&f, ReviewDecision::Approved)).unwrap();

    assert!(find_pending_moderation(&conn).unwrap().is_empty());
    let head_queue = find_pending_head(&conn).unwrap();
    assert_eq!(head_queue.len(), 1);
    assert_eq!(head_queue[0].proposal_id, f.entry_id);
}
