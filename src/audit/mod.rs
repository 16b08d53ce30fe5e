use rusqlite::{Connection, params};
use serde_json::Value;

use crate::models::setting;

#[derive(Debug, Clone)]
pub struct AuditEntry {
    pub id: i64,
    pub user_id: i64,
    pub username: String,
    pub action: String,
    pub target_type: String,
    pub target_id: i64,
    pub details: String,
    pub created_at: String,
}

pub struct AuditPage {
    pub entries: Vec<AuditEntry>,
    pub page: i64,
    pub per_page: i64,
    pub total_count: i64,
    pub total_pages: i64,
}

/// Write one audit entry. Callers treat this as best-effort: a failed audit
/// write is logged by the caller, never surfaced to the user.
pub fn log(
    conn: &Connection,
    user_id: i64,
    action: &str,
    target_type: &str,
    target_id: i64,
    details: Value,
) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO audit_log (user_id, action, target_type, target_id, details) \
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![user_id, action, target_type, target_id, details.to_string()],
    )?;
    Ok(())
}

/// Newest-first audit entries for the admin page.
pub fn find_paginated(conn: &Connection, page: i64, per_page: i64) -> rusqlite::Result<AuditPage> {
    let page = page.max(1);
    let per_page = per_page.clamp(1, 100);
    let offset = (page - 1) * per_page;

    let total_count: i64 = conn.query_row("SELECT COUNT(*) FROM audit_log", [], |row| row.get(0))?;
    let total_pages = (total_count as f64 / per_page as f64).ceil() as i64;

    let mut stmt = conn.prepare(
        "SELECT a.id, a.user_id, COALESCE(u.username, 'unknown') AS username, \
                a.action, a.target_type, a.target_id, a.details, a.created_at \
         FROM audit_log a LEFT JOIN users u ON a.user_id = u.id \
         ORDER BY a.id DESC LIMIT ?1 OFFSET ?2",
    )?;
    let entries = stmt
        .query_map(params![per_page, offset], |row| {
            Ok(AuditEntry {
                id: row.get("id")?,
                user_id: row.get("user_id")?,
                username: row.get("username")?,
                action: row.get("action")?,
                target_type: row.get("target_type")?,
                target_id: row.get("target_id")?,
                details: row.get("details")?,
                created_at: row.get("created_at")?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(AuditPage {
        entries,
        page,
        per_page,
        total_count,
        total_pages,
    })
}

/// Delete audit entries older than the configured retention window.
/// Runs once at startup.
pub fn cleanup_old_entries(conn: &Connection) {
    let retention_days: i64 = setting::get_value(conn, "audit.retention_days", "365")
        .parse()
        .unwrap_or(365);

    let result = conn.execute(
        "DELETE FROM audit_log \
         WHERE created_at < strftime('%Y-%m-%dT%H:%M:%S', 'now', ?1)",
        params![format!("-{retention_days} days")],
    );
    match result {
        Ok(n) if n > 0 => log::info!("Audit cleanup removed {n} entries older than {retention_days} days"),
        Ok(_) => {}
        Err(e) => log::error!("Audit cleanup failed: {e}"),
    }
}
