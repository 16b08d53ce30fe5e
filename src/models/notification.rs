use rusqlite::{Connection, params};
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct Notification {
    pub id: i64,
    pub user_id: i64,
    pub kind: String,
    pub title: String,
    pub body: String,
    pub link: String,
    pub is_read: bool,
    pub created_at: String,
}

pub fn create(
    conn: &Connection,
    user_id: i64,
    kind: &str,
    title: &str,
    body: &str,
    link: &str,
) -> rusqlite::Result<i64> {
    conn.execute(
        "INSERT INTO notifications (user_id, kind, title, body, link) VALUES (?1, ?2, ?3, ?4, ?5)",
        params![user_id, kind, title, body, link],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn find_for_user(
    conn: &Connection,
    user_id: i64,
    limit: i64,
) -> rusqlite::Result<Vec<Notification>> {
    let mut stmt = conn.prepare(
        "SELECT id, user_id, kind, title, body, link, is_read, created_at \
         FROM notifications WHERE user_id = ?1 ORDER BY id DESC LIMIT ?2",
    )?;
    let items = stmt
        .query_map(params![user_id, limit], |row| {
            Ok(Notification {
                id: row.get("id")?,
                user_id: row.get("user_id")?,
                kind: row.get("kind")?,
                title: row.get("title")?,
                body: row.get("body")?,
                link: row.get("link")?,
                is_read: row.get("is_read")?,
                created_at: row.get("created_at")?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(items)
}

pub fn count_unread(conn: &Connection, user_id: i64) -> i64 {
    conn.query_row(
        "SELECT COUNT(*) FROM notifications WHERE user_id = ?1 AND is_read = 0",
        params![user_id],
        |row| row.get(0),
    )
    .unwrap_or(0)
}

/// Mark one notification read; scoped to the owner so a user cannot touch
/// another user's rows.
pub fn mark_read(conn: &Connection, user_id: i64, notification_id: i64) -> rusqlite::Result<()> {
    conn.execute(
        "UPDATE notifications SET is_read = 1 WHERE id = ?1 AND user_id = ?2",
        params![notification_id, user_id],
    )?;
    Ok(())
}

pub fn mark_all_read(conn: &Connection, user_id: i64) -> rusqlite::Result<()> {
    conn.execute(
        "UPDATE notifications SET is_read = 1 WHERE user_id = ?1 AND is_read = 0",
        params![user_id],
    )?;
    Ok(())
}
