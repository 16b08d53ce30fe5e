//! Shared test infrastructure for model layer tests.
//!
//! `setup_test_db()` creates a temporary SQLite database with the embedded
//! schema applied; the fixture helpers build the users/groups most workflow
//! tests need. The TempDir must be kept alive for the Connection to remain
//! valid.

use rusqlite::Connection;
use tempfile::TempDir;

use thesisflow::db::MIGRATIONS;
use thesisflow::models::group::{self, NewGroup};
use thesisflow::models::topic::EntryContent;
use thesisflow::models::user::{self, NewUser};

pub fn setup_test_db() -> (TempDir, Connection) {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let db_path = dir.path().join("test.db");
    let conn = Connection::open(&db_path).expect("Failed to open test DB");

    conn.execute_batch("PRAGMA foreign_keys=ON; PRAGMA journal_mode=WAL;")
        .expect("Failed to set pragmas");
    conn.execute_batch(MIGRATIONS)
        .expect("Failed to run migrations");

    (dir, conn)
}

/// Create a user with the given role; the password hash is a fixed dummy
/// because these tests never authenticate through it.
#[allow(dead_code)]
pub fn create_user(conn: &Connection, username: &str, role: &str) -> i64 {
    user::create(
        conn,
        &NewUser {
            username: username.to_string(),
            password: "$argon2id$dummy".to_string(),
            email: format!("{username}@example.com"),
            display_name: username.to_string(),
            role: role.to_string(),
        },
    )
    .expect("Failed to create user")
}

/// Create a group led by `leader_id`, returning its id.
#[allow(dead_code)]
pub fn create_group(conn: &Connection, name: &str, leader_id: i64) -> i64 {
    group::create(
        conn,
        &NewGroup {
            name: name.to_string(),
            program: "BSCS".to_string(),
            leader_id,
            adviser_id: None,
        },
    )
    .expect("Failed to create group")
}

/// Minimal entry content for workflow tests.
#[allow(dead_code)]
pub fn entry_content(title: &str) -> EntryContent {
    EntryContent {
        title: title.to_string(),
        abstract_text: format!("Abstract for {title}"),
        problem_statement: None,
        expected_outcome: None,
        keywords: vec!["testing".to_string()],
    }
}
