use rusqlite::{Connection, params};
use serde::Deserialize;

use crate::auth::roles;

/// Internal user struct for authentication — includes password hash.
#[derive(Debug, Clone)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub password: String,
    pub email: String,
    pub display_name: String,
    pub role: String,
    pub created_at: String,
    pub updated_at: String,
}

/// Safe version for templates — no password hash.
#[derive(Debug, Clone)]
pub struct UserDisplay {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub display_name: String,
    pub role: String,
    pub role_label: &'static str,
    pub created_at: String,
}

const SELECT_USER: &str = "\
    SELECT id, username, password, email, display_name, role, created_at, updated_at \
    FROM users";

fn row_to_user(row: &rusqlite::Row) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get("id")?,
        username: row.get("username")?,
        password: row.get("password")?,
        email: row.get("email")?,
        display_name: row.get("display_name")?,
        role: row.get("role")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

impl User {
    pub fn display(&self) -> UserDisplay {
        UserDisplay {
            id: self.id,
            username: self.username.clone(),
            email: self.email.clone(),
            display_name: self.display_name.clone(),
            role: self.role.clone(),
            role_label: roles::role_label(&self.role),
            created_at: self.created_at.clone(),
        }
    }
}

/// Pagination metadata for the user list.
pub struct UserPage {
    pub users: Vec<UserDisplay>,
    pub page: i64,
    pub per_page: i64,
    pub total_count: i64,
    pub total_pages: i64,
}

/// Find users with pagination and optional username/display-name search.
pub fn find_paginated(
    conn: &Connection,
    page: i64,
    per_page: i64,
    search: Option<&str>,
) -> rusqlite::Result<UserPage> {
    let page = page.max(1);
    let per_page = per_page.clamp(1, 100);
    let offset = (page - 1) * per_page;

    let pattern = search
        .map(str::trim)
        .filter(|q| !q.is_empty())
        .map(|q| format!("%{q}%"));

    let total_count: i64 = match &pattern {
        Some(p) => conn.query_row(
            "SELECT COUNT(*) FROM users WHERE username LIKE ?1 OR display_name LIKE ?1",
            params![p],
            |row| row.get(0),
        )?,
        None => conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))?,
    };
    let total_pages = (total_count as f64 / per_page as f64).ceil() as i64;

    let users = match &pattern {
        Some(p) => {
            let sql = format!(
                "{SELECT_USER} WHERE username LIKE ?1 OR display_name LIKE ?1 \
                 ORDER BY id LIMIT ?2 OFFSET ?3"
            );
            let mut stmt = conn.prepare(&sql)?;
            stmt.query_map(params![p, per_page, offset], row_to_user)?
                .collect::<Result<Vec<_>, _>>()?
        }
        None => {
            let sql = format!("{SELECT_USER} ORDER BY id LIMIT ?1 OFFSET ?2");
            let mut stmt = conn.prepare(&sql)?;
            stmt.query_map(params![per_page, offset], row_to_user)?
                .collect::<Result<Vec<_>, _>>()?
        }
    };

    Ok(UserPage {
        users: users.iter().map(User::display).collect(),
        page,
        per_page,
        total_count,
        total_pages,
    })
}

pub fn find_by_id(conn: &Connection, id: i64) -> rusqlite::Result<Option<User>> {
    let sql = format!("{SELECT_USER} WHERE id = ?1");
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query_map(params![id], row_to_user)?;
    match rows.next() {
        Some(row) => Ok(Some(row?)),
        None => Ok(None),
    }
}

/// Find user by username for authentication. Returns internal User with password hash.
pub fn find_by_username(conn: &Connection, username: &str) -> rusqlite::Result<Option<User>> {
    let sql = format!("{SELECT_USER} WHERE username = ?1");
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query_map(params![username], row_to_user)?;
    match rows.next() {
        Some(row) => Ok(Some(row?)),
        None => Ok(None),
    }
}

pub fn count(conn: &Connection) -> rusqlite::Result<i64> {
    conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))
}

/// All user ids holding a role. Used by the notification dispatcher to fan
/// out to reviewer cohorts.
pub fn find_ids_by_role(conn: &Connection, role: &str) -> rusqlite::Result<Vec<i64>> {
    let mut stmt = conn.prepare("SELECT id FROM users WHERE role = ?1 ORDER BY id")?;
    let ids = stmt
        .query_map(params![role], |row| row.get(0))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(ids)
}

/// Users eligible for a select box, e.g. picking a group leader or adviser.
pub fn find_by_role_for_select(conn: &Connection, role: &str) -> rusqlite::Result<Vec<UserDisplay>> {
    let sql = format!("{SELECT_USER} WHERE role = ?1 ORDER BY display_name, username");
    let mut stmt = conn.prepare(&sql)?;
    let users = stmt
        .query_map(params![role], row_to_user)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(users.iter().map(User::display).collect())
}

pub struct NewUser {
    pub username: String,
    pub password: String,
    pub email: String,
    pub display_name: String,
    pub role: String,
}

pub fn create(conn: &Connection, new: &NewUser) -> rusqlite::Result<i64> {
    conn.execute(
        "INSERT INTO users (username, password, email, display_name, role) \
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![new.username, new.password, new.email, new.display_name, new.role],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Update a user; password only changes when one is provided.
pub fn update(
    conn: &Connection,
    id: i64,
    username: &str,
    password: Option<&str>,
    email: &str,
    display_name: &str,
    role: &str,
) -> rusqlite::Result<()> {
    conn.execute(
        "UPDATE users SET username = ?1, email = ?2, display_name = ?3, role = ?4, \
         updated_at = strftime('%Y-%m-%dT%H:%M:%S','now') WHERE id = ?5",
        params![username, email, display_name, role, id],
    )?;
    if let Some(pw) = password {
        update_password(conn, id, pw)?;
    }
    Ok(())
}

pub fn delete(conn: &Connection, id: i64) -> rusqlite::Result<()> {
    conn.execute("DELETE FROM users WHERE id = ?1", params![id])?;
    Ok(())
}

pub fn find_password_hash_by_id(conn: &Connection, id: i64) -> rusqlite::Result<Option<String>> {
    let mut stmt = conn.prepare("SELECT password FROM users WHERE id = ?1")?;
    let mut rows = stmt.query_map(params![id], |row| row.get::<_, String>(0))?;
    match rows.next() {
        Some(val) => Ok(Some(val?)),
        None => Ok(None),
    }
}

pub fn update_password(conn: &Connection, id: i64, password_hash: &str) -> rusqlite::Result<()> {
    conn.execute(
        "UPDATE users SET password = ?1, updated_at = strftime('%Y-%m-%dT%H:%M:%S','now') \
         WHERE id = ?2",
        params![password_hash, id],
    )?;
    Ok(())
}

/// Form data from create/edit user forms.
#[derive(Debug, Deserialize)]
pub struct UserForm {
    pub username: String,
    pub password: String,
    pub email: String,
    pub display_name: String,
    pub role: String,
    pub csrf_token: String,
}
