//! Notification dispatcher.
//!
//! Fans workflow events out to user cohorts: a row per recipient in
//! `notifications`, a fresh unread counter over each recipient's WebSocket,
//! and a full topic-set snapshot over the group stream after topic
//! mutations. Everything here is best-effort — callers log failures and
//! never roll back the mutation that triggered the dispatch.

use rusqlite::Connection;
use serde_json::json;

use crate::auth::roles;
use crate::errors::AppError;
use crate::models::topic::{self, summary};
use crate::models::{group, notification, user};
use crate::realtime::WsHub;

/// Create rows for each recipient and push their new unread counts.
pub fn notify_users(
    conn: &Connection,
    hub: &WsHub,
    user_ids: &[i64],
    kind: &str,
    title: &str,
    body: &str,
    link: &str,
) -> rusqlite::Result<()> {
    for &user_id in user_ids {
        notification::create(conn, user_id, kind, title, body, link)?;
        push_unread_count(conn, hub, user_id);
    }
    Ok(())
}

fn notify_role(
    conn: &Connection,
    hub: &WsHub,
    role: &str,
    kind: &str,
    title: &str,
    body: &str,
    link: &str,
) -> rusqlite::Result<()> {
    let ids = user::find_ids_by_role(conn, role)?;
    notify_users(conn, hub, &ids, kind, title, body, link)
}

fn notify_group(
    conn: &Connection,
    hub: &WsHub,
    group_id: i64,
    kind: &str,
    title: &str,
    body: &str,
    link: &str,
) -> rusqlite::Result<()> {
    let ids = group::member_ids(conn, group_id)?;
    notify_users(conn, hub, &ids, kind, title, body, link)
}

pub fn push_unread_count(conn: &Connection, hub: &WsHub, user_id: i64) {
    let unread = notification::count_unread(conn, user_id);
    let msg = json!({ "type": "count_update", "unread_count": unread });
    hub.send_to_user(user_id, &msg.to_string());
}

/// Push the group's full, freshly-read proposal-set list over its stream.
/// Subscribers always receive the complete current list, newest state
/// replacing whatever they held before.
pub fn push_group_topics(conn: &Connection, hub: &WsHub, group_id: i64) -> Result<(), AppError> {
    let sets = topic::queries::find_sets_by_group(conn, group_id)?;
    let payload: Vec<_> = sets
        .iter()
        .map(|set| {
            let s = summary::summarize_entries(&set.entries);
            json!({
                "id": set.id,
                "cycle": set.cycle,
                "entries": set.entries,
                "locked_entry_id": set.locked_entry_id,
                "archived": summary::is_set_archived(set),
                "awaiting_moderator": s.awaiting_moderator,
                "awaiting_head": s.awaiting_head,
                "state": s.state.as_str(),
                "updated_at": set.updated_at,
            })
        })
        .collect();
    let msg = json!({ "type": "topic_sets", "group_id": group_id, "sets": payload });
    hub.send_to_group(group_id, &msg.to_string());
    Ok(())
}

fn topics_link(group_id: i64) -> String {
    format!("/groups/{group_id}/topics")
}

/// A group submitted its set: the moderator cohort gets a work item.
pub fn set_submitted(
    conn: &Connection,
    hub: &WsHub,
    group_name: &str,
    cycle: i64,
) -> rusqlite::Result<()> {
    notify_role(
        conn,
        hub,
        roles::MODERATOR,
        "topic.submitted",
        "Topic proposals awaiting moderation",
        &format!("Group \"{group_name}\" submitted proposal cycle {cycle}"),
        "/review/moderation",
    )
}

/// Moderator approved: heads get the entry in their queue, the group sees
/// progress.
pub fn moderator_approved_for_head(
    conn: &Connection,
    hub: &WsHub,
    group_id: i64,
    group_name: &str,
    entry_title: &str,
) -> rusqlite::Result<()> {
    notify_role(
        conn,
        hub,
        roles::HEAD,
        "topic.head_review",
        "Topic awaiting head review",
        &format!("\"{entry_title}\" from group \"{group_name}\" passed moderation"),
        "/review/head",
    )?;
    notify_group(
        conn,
        hub,
        group_id,
        "topic.moderator_approved",
        "Topic forwarded to department head",
        &format!("\"{entry_title}\" passed moderation and awaits head review"),
        &topics_link(group_id),
    )
}

pub fn moderator_rejected(
    conn: &Connection,
    hub: &WsHub,
    group_id: i64,
    entry_title: &str,
) -> rusqlite::Result<()> {
    notify_group(
        conn,
        hub,
        group_id,
        "topic.moderator_rejected",
        "Topic rejected by moderator",
        &format!("\"{entry_title}\" was rejected during moderation"),
        &topics_link(group_id),
    )
}

pub fn head_decided(
    conn: &Connection,
    hub: &WsHub,
    group_id: i64,
    entry_title: &str,
    approved: bool,
) -> rusqlite::Result<()> {
    let (kind, title, body) = if approved {
        (
            "topic.head_approved",
            "Topic approved by department head",
            format!("\"{entry_title}\" was approved and can be adopted as your thesis topic"),
        )
    } else {
        (
            "topic.head_rejected",
            "Topic rejected by department head",
            format!("\"{entry_title}\" was rejected by the department head"),
        )
    };
    notify_group(conn, hub, group_id, kind, title, &body, &topics_link(group_id))
}

pub fn topic_adopted(
    conn: &Connection,
    hub: &WsHub,
    group_id: i64,
    entry_title: &str,
) -> rusqlite::Result<()> {
    notify_group(
        conn,
        hub,
        group_id,
        "topic.adopted",
        "Thesis topic locked in",
        &format!("\"{entry_title}\" is now the group's official thesis topic"),
        &topics_link(group_id),
    )
}

/// A chapter went to review: the group's adviser gets a work item.
pub fn chapter_submitted(
    conn: &Connection,
    hub: &WsHub,
    group_id: i64,
    adviser_id: Option<i64>,
    chapter_title: &str,
) -> rusqlite::Result<()> {
    if let Some(adviser_id) = adviser_id {
        notify_users(
            conn,
            hub,
            &[adviser_id],
            "chapter.submitted",
            "Chapter submitted for review",
            &format!("\"{chapter_title}\" is waiting for your review"),
            &format!("/groups/{group_id}/chapters"),
        )?;
    }
    Ok(())
}

pub fn chapter_reviewed(
    conn: &Connection,
    hub: &WsHub,
    group_id: i64,
    chapter_title: &str,
    accepted: bool,
) -> rusqlite::Result<()> {
    let (kind, title) = if accepted {
        ("chapter.accepted", "Chapter accepted")
    } else {
        ("chapter.needs_revision", "Chapter returned for revision")
    };
    notify_group(
        conn,
        hub,
        group_id,
        kind,
        title,
        &format!("Adviser reviewed \"{chapter_title}\""),
        &format!("/groups/{group_id}/chapters"),
    )
}
