use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};

/// Upper bound on entries per proposal set.
pub const MAX_TOPIC_PROPOSALS: usize = 3;

/// Review lifecycle of one candidate topic.
///
/// The three `Head*` statuses are only reachable after a recorded moderator
/// approval. `ModeratorRejected`, `HeadApproved` and `HeadRejected` are
/// terminal for the entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryStatus {
    Draft,
    Submitted,
    HeadReview,
    HeadApproved,
    HeadRejected,
    ModeratorRejected,
}

impl EntryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryStatus::Draft => "draft",
            EntryStatus::Submitted => "submitted",
            EntryStatus::HeadReview => "head_review",
            EntryStatus::HeadApproved => "head_approved",
            EntryStatus::HeadRejected => "head_rejected",
            EntryStatus::ModeratorRejected => "moderator_rejected",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "draft" => Some(EntryStatus::Draft),
            "submitted" => Some(EntryStatus::Submitted),
            "head_review" => Some(EntryStatus::HeadReview),
            "head_approved" => Some(EntryStatus::HeadApproved),
            "head_rejected" => Some(EntryStatus::HeadRejected),
            "moderator_rejected" => Some(EntryStatus::ModeratorRejected),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            EntryStatus::Draft => "Draft",
            EntryStatus::Submitted => "Awaiting moderator",
            EntryStatus::HeadReview => "Awaiting head",
            EntryStatus::HeadApproved => "Approved",
            EntryStatus::HeadRejected => "Rejected by head",
            EntryStatus::ModeratorRejected => "Rejected by moderator",
        }
    }

    pub fn is_rejected(&self) -> bool {
        matches!(self, EntryStatus::ModeratorRejected | EntryStatus::HeadRejected)
    }
}

impl FromSql for EntryStatus {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let s = value.as_str()?;
        EntryStatus::parse(s).ok_or(FromSqlError::InvalidType)
    }
}

impl ToSql for EntryStatus {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(self.as_str().into())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewStage {
    Moderator,
    Head,
}

impl ReviewStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReviewStage::Moderator => "moderator",
            ReviewStage::Head => "head",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "moderator" => Some(ReviewStage::Moderator),
            "head" => Some(ReviewStage::Head),
            _ => None,
        }
    }
}

impl FromSql for ReviewStage {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let s = value.as_str()?;
        ReviewStage::parse(s).ok_or(FromSqlError::InvalidType)
    }
}

impl ToSql for ReviewStage {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(self.as_str().into())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewDecision {
    Approved,
    Rejected,
}

impl ReviewDecision {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReviewDecision::Approved => "approved",
            ReviewDecision::Rejected => "rejected",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "approved" => Some(ReviewDecision::Approved),
            "rejected" => Some(ReviewDecision::Rejected),
            _ => None,
        }
    }
}

impl FromSql for ReviewDecision {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let s = value.as_str()?;
        ReviewDecision::parse(s).ok_or(FromSqlError::InvalidType)
    }
}

impl ToSql for ReviewDecision {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(self.as_str().into())
    }
}

/// One recorded reviewer verdict on an entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewerDecision {
    pub reviewer_id: i64,
    pub decision: ReviewDecision,
    pub notes: Option<String>,
    pub decided_at: String,
}

/// One candidate thesis topic inside a proposal set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProposalEntry {
    pub id: i64,
    pub set_id: i64,
    pub title: String,
    pub abstract_text: String,
    pub problem_statement: Option<String>,
    pub expected_outcome: Option<String>,
    pub keywords: Vec<String>,
    pub proposed_by: i64,
    pub status: EntryStatus,
    pub moderator_decision: Option<ReviewerDecision>,
    pub head_decision: Option<ReviewerDecision>,
    pub agenda: Option<String>,
    pub esg: Option<String>,
    pub sdg: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// One submission cycle of up to [`MAX_TOPIC_PROPOSALS`] candidate topics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProposalSet {
    pub id: i64,
    pub group_id: i64,
    pub created_by: i64,
    pub cycle: i64,
    pub entries: Vec<ProposalEntry>,
    pub locked_entry_id: Option<i64>,
    pub used_by: Option<i64>,
    pub used_as_thesis_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Append-only review trail row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewHistoryEntry {
    pub id: i64,
    pub set_id: i64,
    pub proposal_id: i64,
    pub stage: ReviewStage,
    pub decision: ReviewDecision,
    pub reviewer_id: i64,
    pub notes: Option<String>,
    pub reviewed_at: String,
}

/// Content fields for creating or editing a draft entry.
#[derive(Debug, Clone)]
pub struct EntryContent {
    pub title: String,
    pub abstract_text: String,
    pub problem_statement: Option<String>,
    pub expected_outcome: Option<String>,
    pub keywords: Vec<String>,
}

/// History row joined with the reviewer's name for display.
#[derive(Debug, Clone)]
pub struct HistoryDisplay {
    pub proposal_title: String,
    pub stage: ReviewStage,
    pub decision: ReviewDecision,
    pub reviewer_name: String,
    pub notes: Option<String>,
    pub reviewed_at: String,
}

/// Entry sitting in a reviewer queue, joined with its group for display.
#[derive(Debug, Clone)]
pub struct ReviewQueueItem {
    pub set_id: i64,
    pub proposal_id: i64,
    pub group_id: i64,
    pub group_name: String,
    pub cycle: i64,
    pub title: String,
    pub abstract_text: String,
    pub keywords: Vec<String>,
    pub proposed_by_name: String,
    pub updated_at: String,
}
