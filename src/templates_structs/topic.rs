use askama::Template;

use super::PageContext;
use crate::models::group::GroupDisplay;
use crate::models::topic::summary;
use crate::models::topic::{
    HistoryDisplay, MAX_TOPIC_PROPOSALS, ProposalEntry, ProposalSet, ReviewerDecision,
};

/// One reviewer verdict rendered on an entry card.
pub struct DecisionView {
    pub decision: &'static str,
    pub notes: Option<String>,
    pub decided_at: String,
}

impl DecisionView {
    fn from(decision: &ReviewerDecision) -> Self {
        Self {
            decision: decision.decision.as_str(),
            notes: decision.notes.clone(),
            decided_at: decision.decided_at.clone(),
        }
    }
}

pub struct EntryView {
    pub id: i64,
    pub title: String,
    pub abstract_text: String,
    pub problem_statement: Option<String>,
    pub expected_outcome: Option<String>,
    pub keywords_csv: String,
    pub status_code: &'static str,
    pub status_label: &'static str,
    pub moderator_decision: Option<DecisionView>,
    pub head_decision: Option<DecisionView>,
    pub agenda: Option<String>,
    pub esg: Option<String>,
    pub sdg: Option<String>,
    pub is_locked: bool,
    pub can_adopt: bool,
}

impl EntryView {
    pub fn build(entry: &ProposalEntry, set: &ProposalSet, is_leader: bool) -> Self {
        let archived = summary::is_set_archived(set);
        Self {
            id: entry.id,
            title: entry.title.clone(),
            abstract_text: entry.abstract_text.clone(),
            problem_statement: entry.problem_statement.clone(),
            expected_outcome: entry.expected_outcome.clone(),
            keywords_csv: entry.keywords.join(", "),
            status_code: entry.status.as_str(),
            status_label: entry.status.label(),
            moderator_decision: entry.moderator_decision.as_ref().map(DecisionView::from),
            head_decision: entry.head_decision.as_ref().map(DecisionView::from),
            agenda: entry.agenda.clone(),
            esg: entry.esg.clone(),
            sdg: entry.sdg.clone(),
            is_locked: set.locked_entry_id == Some(entry.id),
            can_adopt: is_leader
                && !archived
                && entry.status == crate::models::topic::EntryStatus::HeadApproved,
        }
    }
}

pub struct SetView {
    pub id: i64,
    pub cycle: i64,
    pub state_code: &'static str,
    pub state_label: &'static str,
    pub archived: bool,
    pub awaiting_moderator: bool,
    pub awaiting_head: bool,
    pub can_edit: bool,
    pub can_submit: bool,
    pub can_add_entry: bool,
    pub can_start_new_cycle: bool,
    pub entries: Vec<EntryView>,
    pub history: Vec<HistoryDisplay>,
}

impl SetView {
    pub fn build(set: &ProposalSet, history: Vec<HistoryDisplay>, is_leader: bool) -> Self {
        let s = summary::summarize_entries(&set.entries);
        let archived = summary::is_set_archived(set);
        let editable = is_leader && summary::can_edit_set(set);
        Self {
            id: set.id,
            cycle: set.cycle,
            state_code: if archived { "archived" } else { s.state.as_str() },
            state_label: if archived { "Archived" } else { s.state.label() },
            archived,
            awaiting_moderator: s.awaiting_moderator,
            awaiting_head: s.awaiting_head,
            can_edit: editable,
            can_submit: is_leader && summary::can_submit_set(set),
            can_add_entry: editable && set.entries.len() < MAX_TOPIC_PROPOSALS,
            can_start_new_cycle: summary::can_start_new_cycle(set, is_leader),
            entries: set
                .entries
                .iter()
                .map(|e| EntryView::build(e, set, is_leader))
                .collect(),
            history,
        }
    }

}

#[derive(Template)]
#[template(path = "topics/workspace.html")]
pub struct TopicWorkspaceTemplate {
    pub ctx: PageContext,
    pub group: GroupDisplay,
    pub active: Option<SetView>,
    pub previous: Vec<SetView>,
    pub is_leader: bool,
    pub can_create_set: bool,
}

#[derive(Template)]
#[template(path = "topics/entry_form.html")]
pub struct EntryFormTemplate {
    pub ctx: PageContext,
    pub group: GroupDisplay,
    pub set_id: i64,
    pub editing: Option<EntryView>,
    pub errors: Vec<String>,
}
