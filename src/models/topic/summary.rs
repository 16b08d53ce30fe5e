//! Pure derivation of aggregate workflow state from a set's entries.
//!
//! Nothing here touches the database; the handlers and queries feed entry
//! lists in and gate UI actions on what comes out.

use serde::{Deserialize, Serialize};

use super::types::{EntryStatus, ProposalEntry, ProposalSet};

/// Derived aggregate state of a proposal set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SetState {
    Draft,
    UnderReview,
    Approved,
    Rejected,
}

impl SetState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SetState::Draft => "draft",
            SetState::UnderReview => "under_review",
            SetState::Approved => "approved",
            SetState::Rejected => "rejected",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            SetState::Draft => "Draft",
            SetState::UnderReview => "Under review",
            SetState::Approved => "Approved",
            SetState::Rejected => "Rejected",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowSummary {
    pub awaiting_moderator: bool,
    pub awaiting_head: bool,
    pub has_approved: bool,
    pub all_rejected: bool,
    pub state: SetState,
}

/// Derive the aggregate flags and state for a list of entries.
///
/// Precedence is `approved > rejected > under_review > draft`; it resolves
/// the mixed case where one entry is approved while another was rejected.
pub fn summarize_entries(entries: &[ProposalEntry]) -> WorkflowSummary {
    let awaiting_moderator = entries.iter().any(|e| e.status == EntryStatus::Submitted);
    let awaiting_head = entries.iter().any(|e| e.status == EntryStatus::HeadReview);
    let has_approved = entries.iter().any(|e| e.status == EntryStatus::HeadApproved);
    let all_rejected = are_all_rejected(entries);

    let state = if has_approved {
        SetState::Approved
    } else if all_rejected {
        SetState::Rejected
    } else if awaiting_moderator || awaiting_head {
        SetState::UnderReview
    } else {
        SetState::Draft
    };

    WorkflowSummary {
        awaiting_moderator,
        awaiting_head,
        has_approved,
        all_rejected,
        state,
    }
}

/// Every entry is terminally rejected. False for an empty list.
pub fn are_all_rejected(entries: &[ProposalEntry]) -> bool {
    !entries.is_empty() && entries.iter().all(|e| e.status.is_rejected())
}

/// A set is archived once its topic has been adopted. The adopt writer sets
/// `locked_entry_id`, `used_by` and `used_as_thesis_at` in one transaction;
/// any of them present means archived, so the three can never disagree with
/// this predicate.
pub fn is_set_archived(set: &ProposalSet) -> bool {
    set.used_as_thesis_at.is_some() || set.used_by.is_some() || set.locked_entry_id.is_some()
}

/// Draft entries may still be edited; once any entry leaves `draft` the set
/// is frozen for students.
pub fn can_edit_set(set: &ProposalSet) -> bool {
    !is_set_archived(set) && set.entries.iter().all(|e| e.status == EntryStatus::Draft)
}

/// A set may be submitted while it has at least one entry and every entry is
/// still `draft`.
pub fn can_submit_set(set: &ProposalSet) -> bool {
    !set.entries.is_empty() && can_edit_set(set)
}

/// Resolve the one set the group is currently working with: newest first,
/// skipping archived sets, falling back to the newest overall when every
/// cycle is archived.
pub fn pick_active_set(sets: &[ProposalSet]) -> Option<&ProposalSet> {
    let mut ordered: Vec<&ProposalSet> = sets.iter().collect();
    ordered.sort_by(|a, b| {
        b.created_at
            .cmp(&a.created_at)
            .then_with(|| b.id.cmp(&a.id))
    });
    ordered
        .iter()
        .find(|s| !is_set_archived(s))
        .copied()
        .or_else(|| ordered.first().copied())
}

/// A new cycle may begin only for the group leader, once every entry of the
/// active set is rejected and the review pipeline is fully drained.
pub fn can_start_new_cycle(set: &ProposalSet, is_leader: bool) -> bool {
    let summary = summarize_entries(&set.entries);
    is_leader && summary.all_rejected && !summary.awaiting_moderator && !summary.awaiting_head
}
