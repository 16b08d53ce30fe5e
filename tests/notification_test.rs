//! Notification dispatcher tests — fan-out rows, unread counters, websocket
//! pushes, and the group topic snapshot stream.

mod common;

use common::*;
use thesisflow::auth::roles;
use thesisflow::models::notification;
use thesisflow::models::topic::queries as topic_queries;
use thesisflow::notify;
use thesisflow::realtime::WsHub;

#[test]
fn submission_notifies_every_moderator() {
    let (_dir, conn) = setup_test_db();
    let hub = WsHub::new();
    let m1 = create_user(&conn, "mod1", roles::MODERATOR);
    let m2 = create_user(&conn, "mod2", roles::MODERATOR);
    let student = create_user(&conn, "student", roles::STUDENT);

    notify::set_submitted(&conn, &hub, "Group A", 1).unwrap();

    assert_eq!(notification::count_unread(&conn, m1), 1);
    assert_eq!(notification::count_unread(&conn, m2), 1);
    assert_eq!(notification::count_unread(&conn, student), 0);

    let rows = notification::find_for_user(&conn, m1, 10).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].kind, "topic.submitted");
    assert_eq!(rows[0].link, "/review/moderation");
    assert!(rows[0].body.contains("Group A"));
}

#[test]
fn moderator_approval_reaches_heads_and_group_members() {
    let (_dir, conn) = setup_test_db();
    let hub = WsHub::new();
    let head = create_user(&conn, "head", roles::HEAD);
    let leader = create_user(&conn, "leader", roles::STUDENT);
    let member = create_user(&conn, "member", roles::STUDENT);
    let group_id = create_group(&conn, "Group A", leader);
    thesisflow::models::group::add_member(&conn, group_id, member).unwrap();

    notify::moderator_approved_for_head(&conn, &hub, group_id, "Group A", "IoT irrigation")
        .unwrap();

    assert_eq!(notification::count_unread(&conn, head), 1);
    assert_eq!(notification::count_unread(&conn, leader), 1);
    assert_eq!(notification::count_unread(&conn, member), 1);
}

#[test]
fn ws_subscribers_receive_count_updates() {
    let (_dir, conn) = setup_test_db();
    let hub = WsHub::new();
    let leader = create_user(&conn, "leader", roles::STUDENT);
    let group_id = create_group(&conn, "Group A", leader);
    let mut rx = hub.subscribe_user(leader);

    notify::moderator_rejected(&conn, &hub, group_id, "IoT irrigation").unwrap();

    let frame = rx.try_recv().expect("count push");
    assert!(frame.contains("\"type\":\"count_update\""));
    assert!(frame.contains("\"unread_count\":1"));
}

#[test]
fn group_stream_receives_full_set_snapshots() {
    let (_dir, mut conn) = setup_test_db();
    let hub = WsHub::new();
    let leader = create_user(&conn, "leader", roles::STUDENT);
    let group_id = create_group(&conn, "Group A", leader);
    let set_id = topic_queries::create_set(&mut conn, group_id, leader).unwrap();
    topic_queries::add_entry(&mut conn, set_id, leader, &entry_content("T1")).unwrap();

    let mut rx = hub.subscribe_group(group_id);
    notify::push_group_topics(&conn, &hub, group_id).unwrap();

    let frame = rx.try_recv().expect("snapshot push");
    let parsed: serde_json::Value = serde_json::from_str(&frame).unwrap();
    assert_eq!(parsed["type"], "topic_sets");
    assert_eq!(parsed["group_id"], group_id);
    assert_eq!(parsed["sets"].as_array().unwrap().len(), 1);
    assert_eq!(parsed["sets"][0]["state"], "draft");
    assert_eq!(parsed["sets"][0]["entries"].as_array().unwrap().len(), 1);
}

#[test]
fn mark_read_clears_the_counter() {
    let (_dir, conn) = setup_test_db();
    let user_id = create_user(&conn, "student", roles::STUDENT);
    notification::create(&conn, user_id, "topic.adopted", "Adopted", "", "/groups/1/topics")
        .unwrap();
    let second =
        notification::create(&conn, user_id, "topic.adopted", "Adopted again", "", "").unwrap();
    assert_eq!(notification::count_unread(&conn, user_id), 2);

    notification::mark_read(&conn, user_id, second).unwrap();
    assert_eq!(notification::count_unread(&conn, user_id), 1);

    // A user cannot mark someone else's rows.
    let other = create_user(&conn, "other", roles::STUDENT);
    let theirs = notification::create(&conn, other, "x", "y", "", "").unwrap();
    notification::mark_read(&conn, user_id, theirs).unwrap();
    assert_eq!(notification::count_unread(&conn, other), 1);

    notification::mark_all_read(&conn, user_id).unwrap();
    assert_eq!(notification::count_unread(&conn, user_id), 0);
}
