use chrono::Utc;
use rusqlite::{Connection, params};

use crate::errors::AppError;
use super::summary;
use super::types::*;

pub(crate) fn now() -> String {
    Utc::now().format("%Y-%m-%dT%H:%M:%S").to_string()
}

const SELECT_ENTRY: &str = "\
    SELECT id, set_id, title, abstract_text, problem_statement, expected_outcome, \
           keywords, proposed_by, status, \
           moderator_id, moderator_decision, moderator_notes, moderator_decided_at, \
           head_id, head_decision, head_notes, head_decided_at, \
           agenda, esg, sdg, created_at, updated_at \
    FROM topic_proposal_entries";

fn row_to_entry(row: &rusqlite::Row) -> rusqlite::Result<ProposalEntry> {
    let keywords_json: String = row.get("keywords")?;
    let keywords: Vec<String> = serde_json::from_str(&keywords_json).unwrap_or_default();

    let moderator_decision = match (
        row.get::<_, Option<i64>>("moderator_id")?,
        row.get::<_, Option<ReviewDecision>>("moderator_decision")?,
    ) {
        (Some(reviewer_id), Some(decision)) => Some(ReviewerDecision {
            reviewer_id,
            decision,
            notes: row.get("moderator_notes")?,
            decided_at: row
                .get::<_, Option<String>>("moderator_decided_at")?
                .unwrap_or_default(),
        }),
        _ => None,
    };
    let head_decision = match (
        row.get::<_, Option<i64>>("head_id")?,
        row.get::<_, Option<ReviewDecision>>("head_decision")?,
    ) {
        (Some(reviewer_id), Some(decision)) => Some(ReviewerDecision {
            reviewer_id,
            decision,
            notes: row.get("head_notes")?,
            decided_at: row
                .get::<_, Option<String>>("head_decided_at")?
                .unwrap_or_default(),
        }),
        _ => None,
    };

    Ok(ProposalEntry {
        id: row.get("id")?,
        set_id: row.get("set_id")?,
        title: row.get("title")?,
        abstract_text: row.get("abstract_text")?,
        problem_statement: row.get("problem_statement")?,
        expected_outcome: row.get("expected_outcome")?,
        keywords,
        proposed_by: row.get("proposed_by")?,
        status: row.get("status")?,
        moderator_decision,
        head_decision,
        agenda: row.get("agenda")?,
        esg: row.get("esg")?,
        sdg: row.get("sdg")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

pub fn find_entries_for_set(conn: &Connection, set_id: i64) -> Result<Vec<ProposalEntry>, AppError> {
    let sql = format!("{SELECT_ENTRY} WHERE set_id = ?1 ORDER BY id");
    let mut stmt = conn.prepare(&sql)?;
    let entries = stmt
        .query_map(params![set_id], row_to_entry)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(entries)
}

pub fn find_entry_in_set(
    conn: &Connection,
    set_id: i64,
    entry_id: i64,
) -> Result<Option<ProposalEntry>, AppError> {
    let sql = format!("{SELECT_ENTRY} WHERE set_id = ?1 AND id = ?2");
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query_map(params![set_id, entry_id], row_to_entry)?;
    match rows.next() {
        Some(row) => Ok(Some(row?)),
        None => Ok(None),
    }
}

fn row_to_set(row: &rusqlite::Row) -> rusqlite::Result<ProposalSet> {
    Ok(ProposalSet {
        id: row.get("id")?,
        group_id: row.get("group_id")?,
        created_by: row.get("created_by")?,
        cycle: row.get("cycle")?,
        entries: Vec::new(),
        locked_entry_id: row.get("locked_entry_id")?,
        used_by: row.get("used_by")?,
        used_as_thesis_at: row.get("used_as_thesis_at")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

const SELECT_SET: &str = "\
    SELECT id, group_id, created_by, cycle, locked_entry_id, used_by, \
           used_as_thesis_at, created_at, updated_at \
    FROM topic_proposal_sets";

/// All sets for a group, newest first, with entries loaded.
pub fn find_sets_by_group(conn: &Connection, group_id: i64) -> Result<Vec<ProposalSet>, AppError> {
    let sql = format!("{SELECT_SET} WHERE group_id = ?1 ORDER BY created_at DESC, id DESC");
    let mut stmt = conn.prepare(&sql)?;
    let mut sets = stmt
        .query_map(params![group_id], row_to_set)?
        .collect::<Result<Vec<_>, _>>()?;
    for set in &mut sets {
        set.entries = find_entries_for_set(conn, set.id)?;
    }
    Ok(sets)
}

pub fn find_set(conn: &Connection, set_id: i64) -> Result<ProposalSet, AppError> {
    let sql = format!("{SELECT_SET} WHERE id = ?1");
    let mut set = conn.query_row(&sql, params![set_id], row_to_set)?;
    set.entries = find_entries_for_set(conn, set_id)?;
    Ok(set)
}

pub fn find_history_for_set(
    conn: &Connection,
    set_id: i64,
) -> Result<Vec<ReviewHistoryEntry>, AppError> {
    let mut stmt = conn.prepare(
        "SELECT id, set_id, proposal_id, stage, decision, reviewer_id, notes, reviewed_at \
         FROM topic_review_history WHERE set_id = ?1 ORDER BY id",
    )?;
    let entries = stmt
        .query_map(params![set_id], |row| {
            Ok(ReviewHistoryEntry {
                id: row.get("id")?,
                set_id: row.get("set_id")?,
                proposal_id: row.get("proposal_id")?,
                stage: row.get("stage")?,
                decision: row.get("decision")?,
                reviewer_id: row.get("reviewer_id")?,
                notes: row.get("notes")?,
                reviewed_at: row.get("reviewed_at")?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(entries)
}

/// History rows joined with reviewer and entry names, oldest first.
pub fn find_history_display(
    conn: &Connection,
    set_id: i64,
) -> Result<Vec<HistoryDisplay>, AppError> {
    let mut stmt = conn.prepare(
        "SELECT e.title AS proposal_title, h.stage, h.decision, \
                COALESCE(u.display_name, u.username) AS reviewer_name, h.notes, h.reviewed_at \
         FROM topic_review_history h \
         JOIN topic_proposal_entries e ON h.proposal_id = e.id \
         JOIN users u ON h.reviewer_id = u.id \
         WHERE h.set_id = ?1 ORDER BY h.id",
    )?;
    let entries = stmt
        .query_map(params![set_id], |row| {
            Ok(HistoryDisplay {
                proposal_title: row.get("proposal_title")?,
                stage: row.get("stage")?,
                decision: row.get("decision")?,
                reviewer_name: row.get("reviewer_name")?,
                notes: row.get("notes")?,
                reviewed_at: row.get("reviewed_at")?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(entries)
}

pub(crate) fn append_history(
    conn: &Connection,
    set_id: i64,
    proposal_id: i64,
    stage: ReviewStage,
    decision: ReviewDecision,
    reviewer_id: i64,
    notes: Option<&str>,
) -> Result<(), AppError> {
    conn.execute(
        "INSERT INTO topic_review_history (set_id, proposal_id, stage, decision, reviewer_id, notes, reviewed_at) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![set_id, proposal_id, stage, decision, reviewer_id, notes, now()],
    )?;
    Ok(())
}

pub(crate) fn touch_set(conn: &Connection, set_id: i64) -> Result<(), AppError> {
    conn.execute(
        "UPDATE topic_proposal_sets SET updated_at = ?1 WHERE id = ?2",
        params![now(), set_id],
    )?;
    Ok(())
}

/// Start a new submission cycle for a group.
///
/// Refused while the group still has a non-archived set whose review
/// pipeline is not fully drained; the cycle number is assigned inside the
/// same transaction that inserts the row.
pub fn create_set(conn: &mut Connection, group_id: i64, created_by: i64) -> Result<i64, AppError> {
    let tx = conn.transaction()?;

    let sets = find_sets_by_group(&tx, group_id)?;
    if let Some(active) = summary::pick_active_set(&sets) {
        if !summary::is_set_archived(active) {
            let s = summary::summarize_entries(&active.entries);
            if !s.all_rejected || s.awaiting_moderator || s.awaiting_head {
                return Err(AppError::Validation(
                    "The group already has a proposal set in progress".to_string(),
                ));
            }
        }
    }

    let cycle: i64 = tx.query_row(
        "SELECT COALESCE(MAX(cycle), 0) + 1 FROM topic_proposal_sets WHERE group_id = ?1",
        params![group_id],
        |row| row.get(0),
    )?;
    let ts = now();
    tx.execute(
        "INSERT INTO topic_proposal_sets (group_id, created_by, cycle, created_at, updated_at) \
         VALUES (?1, ?2, ?3, ?4, ?4)",
        params![group_id, created_by, cycle, ts],
    )?;
    let set_id = tx.last_insert_rowid();
    tx.commit()?;
    Ok(set_id)
}

fn require_editable(set: &ProposalSet) -> Result<(), AppError> {
    if summary::is_set_archived(set) {
        return Err(AppError::Validation(
            "This proposal set has been adopted as a thesis topic and can no longer change"
                .to_string(),
        ));
    }
    if !summary::can_edit_set(set) {
        return Err(AppError::Validation(
            "Entries can only change while the whole set is still in draft".to_string(),
        ));
    }
    Ok(())
}

/// Add a draft entry to an editable set. Enforces the per-set bound.
pub fn add_entry(
    conn: &mut Connection,
    set_id: i64,
    proposed_by: i64,
    content: &EntryContent,
) -> Result<i64, AppError> {
    let tx = conn.transaction()?;
    let set = find_set(&tx, set_id)?;
    require_editable(&set)?;
    if set.entries.len() >= MAX_TOPIC_PROPOSALS {
        return Err(AppError::Validation(format!(
            "A proposal set holds at most {MAX_TOPIC_PROPOSALS} topics"
        )));
    }

    let keywords = serde_json::to_string(&content.keywords).unwrap_or_else(|_| "[]".to_string());
    let ts = now();
    tx.execute(
        "INSERT INTO topic_proposal_entries \
         (set_id, title, abstract_text, problem_statement, expected_outcome, keywords, \
          proposed_by, status, created_at, updated_at) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9)",
        params![
            set_id,
            content.title,
            content.abstract_text,
            content.problem_statement,
            content.expected_outcome,
            keywords,
            proposed_by,
            EntryStatus::Draft,
            ts,
        ],
    )?;
    let entry_id = tx.last_insert_rowid();
    touch_set(&tx, set_id)?;
    tx.commit()?;
    Ok(entry_id)
}

/// Replace the content of a draft entry.
pub fn update_entry(
    conn: &mut Connection,
    set_id: i64,
    entry_id: i64,
    content: &EntryContent,
) -> Result<(), AppError> {
    let tx = conn.transaction()?;
    let set = find_set(&tx, set_id)?;
    require_editable(&set)?;
    if !set.entries.iter().any(|e| e.id == entry_id) {
        return Err(AppError::NotFound);
    }

    let keywords = serde_json::to_string(&content.keywords).unwrap_or_else(|_| "[]".to_string());
    tx.execute(
        "UPDATE topic_proposal_entries \
         SET title = ?1, abstract_text = ?2, problem_statement = ?3, expected_outcome = ?4, \
             keywords = ?5, updated_at = ?6 \
         WHERE id = ?7",
        params![
            content.title,
            content.abstract_text,
            content.problem_statement,
            content.expected_outcome,
            keywords,
            now(),
            entry_id,
        ],
    )?;
    touch_set(&tx, set_id)?;
    tx.commit()?;
    Ok(())
}

pub fn remove_entry(conn: &mut Connection, set_id: i64, entry_id: i64) -> Result<(), AppError> {
    let tx = conn.transaction()?;
    let set = find_set(&tx, set_id)?;
    require_editable(&set)?;
    let removed = tx.execute(
        "DELETE FROM topic_proposal_entries WHERE id = ?1 AND set_id = ?2",
        params![entry_id, set_id],
    )?;
    if removed == 0 {
        return Err(AppError::NotFound);
    }
    touch_set(&tx, set_id)?;
    tx.commit()?;
    Ok(())
}

/// Submit the whole set for moderation: every entry flips from `draft` to
/// `submitted` in one transaction, so a reader never observes a partial
/// submission.
pub fn submit_set(conn: &mut Connection, set_id: i64) -> Result<(), AppError> {
    let tx = conn.transaction()?;
    let set = find_set(&tx, set_id)?;
    if summary::is_set_archived(&set) {
        return Err(AppError::Validation(
            "This proposal set is archived".to_string(),
        ));
    }
    if set.entries.is_empty() {
        return Err(AppError::Validation(
            "Add at least one topic before submitting".to_string(),
        ));
    }
    if let Some(stuck) = set.entries.iter().find(|e| e.status != EntryStatus::Draft) {
        return Err(AppError::InvalidTransition(format!(
            "entry {} is {}, only draft sets can be submitted",
            stuck.id,
            stuck.status.as_str()
        )));
    }

    tx.execute(
        "UPDATE topic_proposal_entries SET status = ?1, updated_at = ?2 WHERE set_id = ?3",
        params![EntryStatus::Submitted, now(), set_id],
    )?;
    touch_set(&tx, set_id)?;
    tx.commit()?;
    Ok(())
}

/// Adopt a head-approved entry as the group's official thesis topic.
///
/// The lock is an atomic conditional write: it only succeeds while the set
/// carries no lock yet, and a lost race surfaces as `Conflict` instead of a
/// silent overwrite. The three archival markers are written together so the
/// archival predicate can never see them disagree.
pub fn mark_as_thesis(
    conn: &mut Connection,
    set_id: i64,
    proposal_id: i64,
    requested_by: i64,
) -> Result<(), AppError> {
    let tx = conn.transaction()?;
    let entry = find_entry_in_set(&tx, set_id, proposal_id)?.ok_or(AppError::NotFound)?;
    if entry.status != EntryStatus::HeadApproved {
        return Err(AppError::InvalidTransition(format!(
            "entry {} is {}, only head-approved topics can be adopted",
            proposal_id,
            entry.status.as_str()
        )));
    }

    let changed = tx.execute(
        "UPDATE topic_proposal_sets \
         SET locked_entry_id = ?1, used_by = ?2, used_as_thesis_at = ?3, updated_at = ?3 \
         WHERE id = ?4 AND locked_entry_id IS NULL \
           AND used_by IS NULL AND used_as_thesis_at IS NULL",
        params![proposal_id, requested_by, now(), set_id],
    )?;
    if changed == 0 {
        return Err(AppError::Conflict(
            "This proposal set already has an adopted topic".to_string(),
        ));
    }
    tx.commit()?;
    Ok(())
}

const SELECT_QUEUE: &str = "\
    SELECT e.set_id, e.id AS proposal_id, s.group_id, g.name AS group_name, s.cycle, \
           e.title, e.abstract_text, e.keywords, \
           COALESCE(u.display_name, u.username) AS proposed_by_name, e.updated_at \
    FROM topic_proposal_entries e \
    JOIN topic_proposal_sets s ON e.set_id = s.id \
    JOIN thesis_groups g ON s.group_id = g.id \
    JOIN users u ON e.proposed_by = u.id \
    WHERE e.status = ?1 \
    ORDER BY e.updated_at, e.id";

fn find_queue(conn: &Connection, status: EntryStatus) -> Result<Vec<ReviewQueueItem>, AppError> {
    let mut stmt = conn.prepare(SELECT_QUEUE)?;
    let items = stmt
        .query_map(params![status], |row| {
            let keywords_json: String = row.get("keywords")?;
            Ok(ReviewQueueItem {
                set_id: row.get("set_id")?,
                proposal_id: row.get("proposal_id")?,
                group_id: row.get("group_id")?,
                group_name: row.get("group_name")?,
                cycle: row.get("cycle")?,
                title: row.get("title")?,
                abstract_text: row.get("abstract_text")?,
                keywords: serde_json::from_str(&keywords_json).unwrap_or_default(),
                proposed_by_name: row.get("proposed_by_name")?,
                updated_at: row.get("updated_at")?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(items)
}

/// Entries waiting for a moderator verdict, across all groups.
pub fn find_pending_moderation(conn: &Connection) -> Result<Vec<ReviewQueueItem>, AppError> {
    find_queue(conn, EntryStatus::Submitted)
}

/// Entries waiting for a head verdict, across all groups.
pub fn find_pending_head(conn: &Connection) -> Result<Vec<ReviewQueueItem>, AppError> {
    find_queue(conn, EntryStatus::HeadReview)
}

pub fn count_by_status(conn: &Connection, status: EntryStatus) -> i64 {
    conn.query_row(
        "SELECT COUNT(*) FROM topic_proposal_entries WHERE status = ?1",
        params![status],
        |row| row.get(0),
    )
    .unwrap_or(0)
}
