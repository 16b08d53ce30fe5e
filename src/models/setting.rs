use rusqlite::{Connection, params};

/// A setting for display and editing.
#[derive(Debug, Clone)]
pub struct SettingDisplay {
    pub id: i64,
    pub name: String,
    pub label: String,
    pub value: String,
    pub description: String,
    pub setting_type: String, // "text", "number", "boolean"
}

pub fn find_all(conn: &Connection) -> rusqlite::Result<Vec<SettingDisplay>> {
    let mut stmt = conn.prepare(
        "SELECT id, name, label, value, description, setting_type \
         FROM settings ORDER BY sort_order, id",
    )?;
    let settings = stmt
        .query_map([], |row| {
            Ok(SettingDisplay {
                id: row.get("id")?,
                name: row.get("name")?,
                label: row.get("label")?,
                value: row.get("value")?,
                description: row.get("description")?,
                setting_type: row.get("setting_type")?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(settings)
}

/// Get a single setting's value by name, returning a default if not found.
pub fn get_value(conn: &Connection, name: &str, default: &str) -> String {
    conn.query_row(
        "SELECT value FROM settings WHERE name = ?1",
        params![name],
        |row| row.get(0),
    )
    .unwrap_or_else(|_| default.to_string())
}

pub fn update_value(conn: &Connection, id: i64, value: &str) -> rusqlite::Result<()> {
    conn.execute(
        "UPDATE settings SET value = ?1 WHERE id = ?2",
        params![value, id],
    )?;
    Ok(())
}
