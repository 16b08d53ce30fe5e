use rusqlite::{Connection, params};
use serde::Deserialize;

use crate::auth::session::Permissions;
use crate::errors::AppError;

/// Group row joined with leader/adviser names for display.
#[derive(Debug, Clone)]
pub struct GroupDisplay {
    pub id: i64,
    pub name: String,
    pub program: String,
    pub leader_id: i64,
    pub leader_name: String,
    pub adviser_id: Option<i64>,
    pub adviser_name: Option<String>,
    pub member_count: i64,
    pub created_at: String,
}

#[derive(Debug, Clone)]
pub struct GroupMember {
    pub user_id: i64,
    pub username: String,
    pub display_name: String,
}

const SELECT_GROUP: &str = "\
    SELECT g.id, g.name, g.program, g.leader_id, \
           COALESCE(l.display_name, l.username) AS leader_name, \
           g.adviser_id, COALESCE(a.display_name, a.username) AS adviser_name, \
           (SELECT COUNT(*) FROM group_members gm WHERE gm.group_id = g.id) AS member_count, \
           g.created_at \
    FROM thesis_groups g \
    JOIN users l ON g.leader_id = l.id \
    LEFT JOIN users a ON g.adviser_id = a.id";

fn row_to_group(row: &rusqlite::Row) -> rusqlite::Result<GroupDisplay> {
    Ok(GroupDisplay {
        id: row.get("id")?,
        name: row.get("name")?,
        program: row.get("program")?,
        leader_id: row.get("leader_id")?,
        leader_name: row.get("leader_name")?,
        adviser_id: row.get("adviser_id")?,
        adviser_name: row.get("adviser_name")?,
        member_count: row.get("member_count")?,
        created_at: row.get("created_at")?,
    })
}

pub fn find_all(conn: &Connection) -> rusqlite::Result<Vec<GroupDisplay>> {
    let sql = format!("{SELECT_GROUP} ORDER BY g.name");
    let mut stmt = conn.prepare(&sql)?;
    let groups = stmt
        .query_map([], row_to_group)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(groups)
}

/// Groups the user belongs to (as member, leader, or adviser).
pub fn find_for_user(conn: &Connection, user_id: i64) -> rusqlite::Result<Vec<GroupDisplay>> {
    let sql = format!(
        "{SELECT_GROUP} \
         WHERE g.leader_id = ?1 OR g.adviser_id = ?1 \
            OR EXISTS (SELECT 1 FROM group_members gm WHERE gm.group_id = g.id AND gm.user_id = ?1) \
         ORDER BY g.name"
    );
    let mut stmt = conn.prepare(&sql)?;
    let groups = stmt
        .query_map(params![user_id], row_to_group)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(groups)
}

pub fn find_by_id(conn: &Connection, id: i64) -> rusqlite::Result<Option<GroupDisplay>> {
    let sql = format!("{SELECT_GROUP} WHERE g.id = ?1");
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query_map(params![id], row_to_group)?;
    match rows.next() {
        Some(row) => Ok(Some(row?)),
        None => Ok(None),
    }
}

pub fn find_members(conn: &Connection, group_id: i64) -> rusqlite::Result<Vec<GroupMember>> {
    let mut stmt = conn.prepare(
        "SELECT u.id AS user_id, u.username, u.display_name \
         FROM group_members gm JOIN users u ON gm.user_id = u.id \
         WHERE gm.group_id = ?1 ORDER BY u.display_name, u.username",
    )?;
    let members = stmt
        .query_map(params![group_id], |row| {
            Ok(GroupMember {
                user_id: row.get("user_id")?,
                username: row.get("username")?,
                display_name: row.get("display_name")?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(members)
}

/// Ids to notify for group events: members plus leader, deduplicated.
pub fn member_ids(conn: &Connection, group_id: i64) -> rusqlite::Result<Vec<i64>> {
    let mut stmt = conn.prepare(
        "SELECT user_id FROM group_members WHERE group_id = ?1 \
         UNION SELECT leader_id FROM thesis_groups WHERE id = ?1",
    )?;
    let ids = stmt
        .query_map(params![group_id], |row| row.get(0))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(ids)
}

pub fn is_member(conn: &Connection, group_id: i64, user_id: i64) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT EXISTS ( \
            SELECT 1 FROM group_members WHERE group_id = ?1 AND user_id = ?2 \
            UNION SELECT 1 FROM thesis_groups WHERE id = ?1 AND (leader_id = ?2 OR adviser_id = ?2))",
        params![group_id, user_id],
        |row| row.get(0),
    )
}

/// Gate for group-scoped pages: members, the group's adviser and leader pass,
/// as do reviewers and administrators.
pub fn require_access(
    conn: &Connection,
    group_id: i64,
    user_id: i64,
    permissions: &Permissions,
) -> Result<(), AppError> {
    if permissions.has("users.manage")
        || permissions.has("topics.review.moderator")
        || permissions.has("topics.review.head")
    {
        return Ok(());
    }
    if is_member(conn, group_id, user_id)? {
        return Ok(());
    }
    Err(AppError::PermissionDenied(format!("group:{group_id}")))
}

pub fn count(conn: &Connection) -> rusqlite::Result<i64> {
    conn.query_row("SELECT COUNT(*) FROM thesis_groups", [], |row| row.get(0))
}

pub struct NewGroup {
    pub name: String,
    pub program: String,
    pub leader_id: i64,
    pub adviser_id: Option<i64>,
}

pub fn create(conn: &Connection, new: &NewGroup) -> rusqlite::Result<i64> {
    conn.execute(
        "INSERT INTO thesis_groups (name, program, leader_id, adviser_id) VALUES (?1, ?2, ?3, ?4)",
        params![new.name, new.program, new.leader_id, new.adviser_id],
    )?;
    let group_id = conn.last_insert_rowid();
    // The leader is always a member.
    conn.execute(
        "INSERT INTO group_members (group_id, user_id) VALUES (?1, ?2) \
         ON CONFLICT(group_id, user_id) DO NOTHING",
        params![group_id, new.leader_id],
    )?;
    Ok(group_id)
}

pub fn update(
    conn: &Connection,
    id: i64,
    name: &str,
    program: &str,
    leader_id: i64,
    adviser_id: Option<i64>,
) -> rusqlite::Result<()> {
    conn.execute(
        "UPDATE thesis_groups SET name = ?1, program = ?2, leader_id = ?3, adviser_id = ?4, \
         updated_at = strftime('%Y-%m-%dT%H:%M:%S','now') WHERE id = ?5",
        params![name, program, leader_id, adviser_id, id],
    )?;
    conn.execute(
        "INSERT INTO group_members (group_id, user_id) VALUES (?1, ?2) \
         ON CONFLICT(group_id, user_id) DO NOTHING",
        params![id, leader_id],
    )?;
    Ok(())
}

pub fn delete(conn: &Connection, id: i64) -> rusqlite::Result<()> {
    conn.execute("DELETE FROM thesis_groups WHERE id = ?1", params![id])?;
    Ok(())
}

pub fn add_member(conn: &Connection, group_id: i64, user_id: i64) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO group_members (group_id, user_id) VALUES (?1, ?2) \
         ON CONFLICT(group_id, user_id) DO NOTHING",
        params![group_id, user_id],
    )?;
    Ok(())
}

pub fn remove_member(conn: &Connection, group_id: i64, user_id: i64) -> rusqlite::Result<()> {
    conn.execute(
        "DELETE FROM group_members WHERE group_id = ?1 AND user_id = ?2",
        params![group_id, user_id],
    )?;
    Ok(())
}

/// Form data from create/edit group forms.
#[derive(Debug, Deserialize)]
pub struct GroupForm {
    pub name: String,
    pub program: String,
    pub leader_id: String,
    #[serde(default)]
    pub adviser_id: String,
    pub csrf_token: String,
}
