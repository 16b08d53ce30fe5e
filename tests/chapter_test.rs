//! Chapter workflow tests — the student/adviser review loop and its guards.

mod common;

use common::*;
use thesisflow::auth::roles;
use thesisflow::errors::AppError;
use thesisflow::models::chapter::{self, ChapterStatus};

#[test]
fn chapter_numbers_are_unique_per_group() {
    let (_dir, conn) = setup_test_db();
    let leader = create_user(&conn, "leader", roles::STUDENT);
    let group_id = create_group(&conn, "Group A", leader);

    chapter::create(&conn, group_id, 1, "Introduction", "...").unwrap();
    let err = chapter::create(&conn, group_id, 1, "Also chapter one", "...").unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    // Same number in another group is fine.
    let other_leader = create_user(&conn, "other", roles::STUDENT);
    let other_group = create_group(&conn, "Group B", other_leader);
    chapter::create(&conn, other_group, 1, "Introduction", "...").unwrap();
}

#[test]
fn review_loop_walks_draft_submit_revise_accept() {
    let (_dir, conn) = setup_test_db();
    let leader = create_user(&conn, "leader", roles::STUDENT);
    let group_id = create_group(&conn, "Group A", leader);
    let ch = chapter::create(&conn, group_id, 1, "Introduction", "First draft").unwrap();

    let submitted = chapter::submit(&conn, ch).unwrap();
    assert_eq!(submitted.status, ChapterStatus::Submitted);

    // Adviser returns it; student may edit and resubmit.
    let returned = chapter::review(&conn, ch, false).unwrap();
    assert_eq!(returned.status, ChapterStatus::NeedsRevision);
    chapter::update_content(&conn, ch, "Introduction", "Second draft").unwrap();
    chapter::submit(&conn, ch).unwrap();

    let accepted = chapter::review(&conn, ch, true).unwrap();
    assert_eq!(accepted.status, ChapterStatus::Accepted);
}

#[test]
fn out_of_order_transitions_are_rejected() {
    let (_dir, conn) = setup_test_db();
    let leader = create_user(&conn, "leader", roles::STUDENT);
    let group_id = create_group(&conn, "Group A", leader);
    let ch = chapter::create(&conn, group_id, 1, "Introduction", "...").unwrap();

    // Review before submission.
    let err = chapter::review(&conn, ch, true).unwrap_err();
    assert!(matches!(err, AppError::InvalidTransition(_)));

    chapter::submit(&conn, ch).unwrap();

    // Editing or resubmitting while under review.
    let err = chapter::update_content(&conn, ch, "New title", "...").unwrap_err();
    assert!(matches!(err, AppError::InvalidTransition(_)));
    let err = chapter::submit(&conn, ch).unwrap_err();
    assert!(matches!(err, AppError::InvalidTransition(_)));

    // Accepted is terminal for students.
    chapter::review(&conn, ch, true).unwrap();
    let err = chapter::submit(&conn, ch).unwrap_err();
    assert!(matches!(err, AppError::InvalidTransition(_)));
}

#[test]
fn comments_join_author_names_in_order() {
    let (_dir, conn) = setup_test_db();
    let leader = create_user(&conn, "leader", roles::STUDENT);
    let group_id = create_group(&conn, "Group A", leader);
    let adviser = create_user(&conn, "adviser", roles::ADVISER);
    let ch = chapter::create(&conn, group_id, 1, "Introduction", "...").unwrap();

    chapter::add_comment(&conn, ch, leader, "Ready for a first look").unwrap();
    chapter::add_comment(&conn, ch, adviser, "Tighten the scope section").unwrap();

    let comments = chapter::find_comments(&conn, ch).unwrap();
    assert_eq!(comments.len(), 2);
    assert_eq!(comments[0].author_name, "leader");
    assert_eq!(comments[1].author_name, "adviser");
    assert_eq!(comments[1].body, "Tighten the scope section");
}

#[test]
fn pending_count_tracks_adviser_assignment() {
    let (_dir, conn) = setup_test_db();
    let leader = create_user(&conn, "leader", roles::STUDENT);
    let adviser = create_user(&conn, "adviser", roles::ADVISER);
    let group_id = create_group(&conn, "Group A", leader);
    conn.execute(
        "UPDATE thesis_groups SET adviser_id = ?1 WHERE id = ?2",
        rusqlite::params![adviser, group_id],
    )
    .unwrap();

    let ch = chapter::create(&conn, group_id, 1, "Introduction", "...").unwrap();
    assert_eq!(chapter::count_pending_for_adviser(&conn, adviser), 0);

    chapter::submit(&conn, ch).unwrap();
    assert_eq!(chapter::count_pending_for_adviser(&conn, adviser), 1);

    chapter::review(&conn, ch, true).unwrap();
    assert_eq!(chapter::count_pending_for_adviser(&conn, adviser), 0);
}
