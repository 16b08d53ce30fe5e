//! Reviewer decision recording.
//!
//! Each call applies one reviewer's verdict to exactly one entry inside
//! exactly one set, guarded so the moderator stage always precedes the head
//! stage. The status change and the history row commit in one transaction;
//! notification dispatch happens afterwards at the call site and never rolls
//! a committed decision back.

use rusqlite::{Connection, params};

use crate::errors::AppError;
use super::queries::{append_history, find_entry_in_set, now, touch_set};
use super::types::*;

#[derive(Debug, Clone)]
pub struct ModeratorDecisionInput {
    pub set_id: i64,
    pub proposal_id: i64,
    pub reviewer_id: i64,
    pub decision: ReviewDecision,
    pub notes: Option<String>,
}

#[derive(Debug, Clone)]
pub struct HeadDecisionInput {
    pub set_id: i64,
    pub proposal_id: i64,
    pub reviewer_id: i64,
    pub decision: ReviewDecision,
    pub notes: Option<String>,
    pub agenda: Option<String>,
    pub esg: Option<String>,
    pub sdg: Option<String>,
}

/// Record a moderator verdict on a `submitted` entry.
///
/// Approval parks the entry at `head_review`; rejection is terminal.
pub fn record_moderator_decision(
    conn: &mut Connection,
    input: &ModeratorDecisionInput,
) -> Result<ProposalEntry, AppError> {
    let tx = conn.transaction()?;

    let entry = find_entry_in_set(&tx, input.set_id, input.proposal_id)?.ok_or(AppError::NotFound)?;
    if entry.status != EntryStatus::Submitted {
        return Err(AppError::InvalidTransition(format!(
            "entry {} is {}, moderator decisions apply to submitted entries",
            entry.id,
            entry.status.as_str()
        )));
    }

    let new_status = match input.decision {
        ReviewDecision::Approved => EntryStatus::HeadReview,
        ReviewDecision::Rejected => EntryStatus::ModeratorRejected,
    };
    let ts = now();
    tx.execute(
        "UPDATE topic_proposal_entries \
         SET status = ?1, moderator_id = ?2, moderator_decision = ?3, \
             moderator_notes = ?4, moderator_decided_at = ?5, updated_at = ?5 \
         WHERE id = ?6",
        params![
            new_status,
            input.reviewer_id,
            input.decision,
            input.notes,
            ts,
            entry.id,
        ],
    )?;
    append_history(
        &tx,
        input.set_id,
        input.proposal_id,
        ReviewStage::Moderator,
        input.decision,
        input.reviewer_id,
        input.notes.as_deref(),
    )?;
    touch_set(&tx, input.set_id)?;

    let updated = find_entry_in_set(&tx, input.set_id, input.proposal_id)?.ok_or(AppError::NotFound)?;
    tx.commit()?;
    Ok(updated)
}

/// Record a head verdict on a `head_review` entry.
///
/// Approval is terminal and attaches the optional classification fields;
/// rejection is terminal too.
pub fn record_head_decision(
    conn: &mut Connection,
    input: &HeadDecisionInput,
) -> Result<ProposalEntry, AppError> {
    let tx = conn.transaction()?;

    let entry = find_entry_in_set(&tx, input.set_id, input.proposal_id)?.ok_or(AppError::NotFound)?;
    if entry.status != EntryStatus::HeadReview {
        return Err(AppError::InvalidTransition(format!(
            "entry {} is {}, head decisions apply to entries under head review",
            entry.id,
            entry.status.as_str()
        )));
    }

    let new_status = match input.decision {
        ReviewDecision::Approved => EntryStatus::HeadApproved,
        ReviewDecision::Rejected => EntryStatus::HeadRejected,
    };
    // Classification only accompanies an approval.
    let (agenda, esg, sdg) = match input.decision {
        ReviewDecision::Approved => (
            input.agenda.as_deref(),
            input.esg.as_deref(),
            input.sdg.as_deref(),
        ),
        ReviewDecision::Rejected => (None, None, None),
    };
    let ts = now();
    tx.execute(
        "UPDATE topic_proposal_entries \
         SET status = ?1, head_id = ?2, head_decision = ?3, head_notes = ?4, \
             head_decided_at = ?5, agenda = ?6, esg = ?7, sdg = ?8, updated_at = ?5 \
         WHERE id = ?9",
        params![
            new_status,
            input.reviewer_id,
            input.decision,
            input.notes,
            ts,
            agenda,
            esg,
            sdg,
            entry.id,
        ],
    )?;
    append_history(
        &tx,
        input.set_id,
        input.proposal_id,
        ReviewStage::Head,
        input.decision,
        input.reviewer_id,
        input.notes.as_deref(),
    )?;
    touch_set(&tx, input.set_id)?;

    let updated = find_entry_in_set(&tx, input.set_id, input.proposal_id)?.ok_or(AppError::NotFound)?;
    tx.commit()?;
    Ok(updated)
}
