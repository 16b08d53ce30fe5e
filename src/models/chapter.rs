//! Thesis chapters and their adviser review loop.
//!
//! Students edit while a chapter is `draft` or `needs_revision` and submit it
//! for review; the group's adviser either accepts or returns it. Guard
//! clauses reject out-of-order calls the same way the topic workflow does.

use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use rusqlite::{Connection, params};
use serde::{Deserialize, Serialize};

use crate::errors::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChapterStatus {
    Draft,
    Submitted,
    NeedsRevision,
    Accepted,
}

impl ChapterStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChapterStatus::Draft => "draft",
            ChapterStatus::Submitted => "submitted",
            ChapterStatus::NeedsRevision => "needs_revision",
            ChapterStatus::Accepted => "accepted",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "draft" => Some(ChapterStatus::Draft),
            "submitted" => Some(ChapterStatus::Submitted),
            "needs_revision" => Some(ChapterStatus::NeedsRevision),
            "accepted" => Some(ChapterStatus::Accepted),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ChapterStatus::Draft => "Draft",
            ChapterStatus::Submitted => "Submitted for review",
            ChapterStatus::NeedsRevision => "Needs revision",
            ChapterStatus::Accepted => "Accepted",
        }
    }

    /// Students may edit in these states.
    pub fn is_editable(&self) -> bool {
        matches!(self, ChapterStatus::Draft | ChapterStatus::NeedsRevision)
    }
}

impl FromSql for ChapterStatus {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let s = value.as_str()?;
        ChapterStatus::parse(s).ok_or(FromSqlError::InvalidType)
    }
}

impl ToSql for ChapterStatus {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(self.as_str().into())
    }
}

#[derive(Debug, Clone)]
pub struct Chapter {
    pub id: i64,
    pub group_id: i64,
    pub number: i64,
    pub title: String,
    pub body: String,
    pub status: ChapterStatus,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone)]
pub struct ChapterComment {
    pub id: i64,
    pub chapter_id: i64,
    pub author_id: i64,
    pub author_name: String,
    pub body: String,
    pub created_at: String,
}

const SELECT_CHAPTER: &str = "\
    SELECT id, group_id, number, title, body, status, created_at, updated_at FROM chapters";

fn row_to_chapter(row: &rusqlite::Row) -> rusqlite::Result<Chapter> {
    Ok(Chapter {
        id: row.get("id")?,
        group_id: row.get("group_id")?,
        number: row.get("number")?,
        title: row.get("title")?,
        body: row.get("body")?,
        status: row.get("status")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

pub fn find_by_group(conn: &Connection, group_id: i64) -> Result<Vec<Chapter>, AppError> {
    let sql = format!("{SELECT_CHAPTER} WHERE group_id = ?1 ORDER BY number");
    let mut stmt = conn.prepare(&sql)?;
    let chapters = stmt
        .query_map(params![group_id], row_to_chapter)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(chapters)
}

pub fn find_by_id(conn: &Connection, id: i64) -> Result<Option<Chapter>, AppError> {
    let sql = format!("{SELECT_CHAPTER} WHERE id = ?1");
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query_map(params![id], row_to_chapter)?;
    match rows.next() {
        Some(row) => Ok(Some(row?)),
        None => Ok(None),
    }
}

pub fn create(
    conn: &Connection,
    group_id: i64,
    number: i64,
    title: &str,
    body: &str,
) -> Result<i64, AppError> {
    let exists: bool = conn.query_row(
        "SELECT EXISTS (SELECT 1 FROM chapters WHERE group_id = ?1 AND number = ?2)",
        params![group_id, number],
        |row| row.get(0),
    )?;
    if exists {
        return Err(AppError::Validation(format!(
            "Chapter {number} already exists for this group"
        )));
    }
    conn.execute(
        "INSERT INTO chapters (group_id, number, title, body) VALUES (?1, ?2, ?3, ?4)",
        params![group_id, number, title, body],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Update content; only legal while the chapter is editable by students.
pub fn update_content(
    conn: &Connection,
    chapter_id: i64,
    title: &str,
    body: &str,
) -> Result<(), AppError> {
    let chapter = find_by_id(conn, chapter_id)?.ok_or(AppError::NotFound)?;
    if !chapter.status.is_editable() {
        return Err(AppError::InvalidTransition(format!(
            "chapter {} is {}, content changes require draft or needs_revision",
            chapter_id,
            chapter.status.as_str()
        )));
    }
    conn.execute(
        "UPDATE chapters SET title = ?1, body = ?2, \
         updated_at = strftime('%Y-%m-%dT%H:%M:%S','now') WHERE id = ?3",
        params![title, body, chapter_id],
    )?;
    Ok(())
}

fn set_status(conn: &Connection, chapter_id: i64, status: ChapterStatus) -> Result<(), AppError> {
    conn.execute(
        "UPDATE chapters SET status = ?1, \
         updated_at = strftime('%Y-%m-%dT%H:%M:%S','now') WHERE id = ?2",
        params![status, chapter_id],
    )?;
    Ok(())
}

/// Student hands the chapter to the adviser.
pub fn submit(conn: &Connection, chapter_id: i64) -> Result<Chapter, AppError> {
    let chapter = find_by_id(conn, chapter_id)?.ok_or(AppError::NotFound)?;
    if !chapter.status.is_editable() {
        return Err(AppError::InvalidTransition(format!(
            "chapter {} is {}, only draft or needs_revision chapters can be submitted",
            chapter_id,
            chapter.status.as_str()
        )));
    }
    set_status(conn, chapter_id, ChapterStatus::Submitted)?;
    find_by_id(conn, chapter_id)?.ok_or(AppError::NotFound)
}

/// Adviser verdict on a submitted chapter: accept, or send back for revision.
pub fn review(conn: &Connection, chapter_id: i64, accept: bool) -> Result<Chapter, AppError> {
    let chapter = find_by_id(conn, chapter_id)?.ok_or(AppError::NotFound)?;
    if chapter.status != ChapterStatus::Submitted {
        return Err(AppError::InvalidTransition(format!(
            "chapter {} is {}, reviews apply to submitted chapters",
            chapter_id,
            chapter.status.as_str()
        )));
    }
    let next = if accept {
        ChapterStatus::Accepted
    } else {
        ChapterStatus::NeedsRevision
    };
    set_status(conn, chapter_id, next)?;
    find_by_id(conn, chapter_id)?.ok_or(AppError::NotFound)
}

pub fn add_comment(
    conn: &Connection,
    chapter_id: i64,
    author_id: i64,
    body: &str,
) -> Result<i64, AppError> {
    conn.execute(
        "INSERT INTO chapter_comments (chapter_id, author_id, body) VALUES (?1, ?2, ?3)",
        params![chapter_id, author_id, body],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn find_comments(conn: &Connection, chapter_id: i64) -> Result<Vec<ChapterComment>, AppError> {
    let mut stmt = conn.prepare(
        "SELECT c.id, c.chapter_id, c.author_id, \
                COALESCE(u.display_name, u.username) AS author_name, c.body, c.created_at \
         FROM chapter_comments c JOIN users u ON c.author_id = u.id \
         WHERE c.chapter_id = ?1 ORDER BY c.id",
    )?;
    let comments = stmt
        .query_map(params![chapter_id], |row| {
            Ok(ChapterComment {
                id: row.get("id")?,
                chapter_id: row.get("chapter_id")?,
                author_id: row.get("author_id")?,
                author_name: row.get("author_name")?,
                body: row.get("body")?,
                created_at: row.get("created_at")?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(comments)
}

/// Submitted chapters across the groups a given adviser supervises.
pub fn count_pending_for_adviser(conn: &Connection, adviser_id: i64) -> i64 {
    conn.query_row(
        "SELECT COUNT(*) FROM chapters c \
         JOIN thesis_groups g ON c.group_id = g.id \
         WHERE g.adviser_id = ?1 AND c.status = 'submitted'",
        params![adviser_id],
        |row| row.get(0),
    )
    .unwrap_or(0)
}

/// Form data for create/edit chapter forms.
#[derive(Debug, Deserialize)]
pub struct ChapterForm {
    pub number: String,
    pub title: String,
    pub body: String,
    pub csrf_token: String,
}
