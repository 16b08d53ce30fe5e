use actix_session::Session;
use actix_web::{HttpResponse, web};
use serde::Deserialize;
use serde_json::json;

use crate::audit;
use crate::auth::csrf;
use crate::auth::session::{require_permission, require_user_id, set_flash};
use crate::db::DbPool;
use crate::errors::{AppError, render};
use crate::models::group;
use crate::models::topic::decisions::{
    HeadDecisionInput, ModeratorDecisionInput, record_head_decision, record_moderator_decision,
};
use crate::models::topic::queries as topic_queries;
use crate::models::topic::{ProposalEntry, ReviewDecision};
use crate::notify;
use crate::realtime::WsHub;
use crate::templates_structs::{HeadQueueTemplate, ModerationQueueTemplate, PageContext};

pub async fn moderation_queue(
    pool: web::Data<DbPool>,
    session: Session,
) -> Result<HttpResponse, AppError> {
    require_permission(&session, "topics.review.moderator")?;
    let conn = pool.get()?;
    let ctx = PageContext::build(&session, &conn, "/review/moderation")?;
    let items = topic_queries::find_pending_moderation(&conn)?;
    render(ModerationQueueTemplate { ctx, items })
}

pub async fn head_queue(
    pool: web::Data<DbPool>,
    session: Session,
) -> Result<HttpResponse, AppError> {
    require_permission(&session, "topics.review.head")?;
    let conn = pool.get()?;
    let ctx = PageContext::build(&session, &conn, "/review/head")?;
    let items = topic_queries::find_pending_head(&conn)?;
    render(HeadQueueTemplate { ctx, items })
}

#[derive(Deserialize)]
pub struct DecisionForm {
    pub set_id: i64,
    pub proposal_id: i64,
    pub decision: String,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub agenda: String,
    #[serde(default)]
    pub esg: String,
    #[serde(default)]
    pub sdg: String,
    pub csrf_token: String,
}

fn parse_decision(raw: &str) -> Result<ReviewDecision, AppError> {
    ReviewDecision::parse(raw)
        .ok_or_else(|| AppError::Validation("Decision must be approved or rejected".to_string()))
}

fn optional(raw: &str) -> Option<String> {
    let t = raw.trim();
    (!t.is_empty()).then(|| t.to_string())
}

fn redirect(location: &str) -> HttpResponse {
    HttpResponse::SeeOther()
        .insert_header(("Location", location))
        .finish()
}

/// Flash recoverable decision failures back onto the queue page.
fn recover(session: &Session, location: &str, err: AppError) -> Result<HttpResponse, AppError> {
    match &err {
        AppError::Validation(_) | AppError::InvalidTransition(_) | AppError::Conflict(_) => {
            set_flash(session, &err.to_string());
            Ok(redirect(location))
        }
        _ => Err(err),
    }
}

/// Post-commit side effects shared by both stages: audit trail, group
/// stream refresh. Failures are logged, never surfaced — the decision
/// already committed.
fn after_decision(
    conn: &rusqlite::Connection,
    hub: &WsHub,
    reviewer_id: i64,
    action: &str,
    entry: &ProposalEntry,
    group_id: i64,
) {
    if let Err(e) = audit::log(conn, reviewer_id, action, "topic_entry", entry.id,
        json!({"set_id": entry.set_id, "title": entry.title, "status": entry.status.as_str()}))
    {
        log::warn!("Audit write failed: {e}");
    }
    if let Err(e) = notify::push_group_topics(conn, hub, group_id) {
        log::warn!("Topic stream push failed: {e}");
    }
}

pub async fn moderator_decide(
    pool: web::Data<DbPool>,
    session: Session,
    hub: web::Data<WsHub>,
    form: web::Form<DecisionForm>,
) -> Result<HttpResponse, AppError> {
    require_permission(&session, "topics.review.moderator")?;
    csrf::validate_csrf(&session, &form.csrf_token)?;
    let reviewer_id = require_user_id(&session)?;
    let back = "/review/moderation";
    let mut conn = pool.get()?;

    let result = parse_decision(&form.decision).and_then(|decision| {
        record_moderator_decision(
            &mut conn,
            &ModeratorDecisionInput {
                set_id: form.set_id,
                proposal_id: form.proposal_id,
                reviewer_id,
                decision,
                notes: optional(&form.notes),
            },
        )
    });

    match result {
        Ok(entry) => {
            let set = topic_queries::find_set(&conn, form.set_id)?;
            let g = group::find_by_id(&conn, set.group_id)?.ok_or(AppError::NotFound)?;
            let approved = entry.moderator_decision.as_ref()
                .is_some_and(|d| d.decision == ReviewDecision::Approved);
            let action = if approved {
                "topic.moderator_approved"
            } else {
                "topic.moderator_rejected"
            };
            after_decision(&conn, &hub, reviewer_id, action, &entry, set.group_id);
            let dispatch = if approved {
                notify::moderator_approved_for_head(&conn, &hub, set.group_id, &g.name, &entry.title)
            } else {
                notify::moderator_rejected(&conn, &hub, set.group_id, &entry.title)
            };
            if let Err(e) = dispatch {
                log::warn!("Notification dispatch failed: {e}");
            }
            set_flash(&session, "Decision recorded");
            Ok(redirect(back))
        }
        Err(err) => recover(&session, back, err),
    }
}

pub async fn head_decide(
    pool: web::Data<DbPool>,
    session: Session,
    hub: web::Data<WsHub>,
    form: web::Form<DecisionForm>,
) -> Result<HttpResponse, AppError> {
    require_permission(&session, "topics.review.head")?;
    csrf::validate_csrf(&session, &form.csrf_token)?;
    let reviewer_id = require_user_id(&session)?;
    let back = "/review/head";
    let mut conn = pool.get()?;

    let result = parse_decision(&form.decision).and_then(|decision| {
        record_head_decision(
            &mut conn,
            &HeadDecisionInput {
                set_id: form.set_id,
                proposal_id: form.proposal_id,
                reviewer_id,
                decision,
                notes: optional(&form.notes),
                agenda: optional(&form.agenda),
                esg: optional(&form.esg),
                sdg: optional(&form.sdg),
            },
        )
    });

    match result {
        Ok(entry) => {
            let set = topic_queries::find_set(&conn, form.set_id)?;
            let approved = entry.head_decision.as_ref()
                .is_some_and(|d| d.decision == ReviewDecision::Approved);
            let action = if approved {
                "topic.head_approved"
            } else {
                "topic.head_rejected"
            };
            after_decision(&conn, &hub, reviewer_id, action, &entry, set.group_id);
            if let Err(e) = notify::head_decided(&conn, &hub, set.group_id, &entry.title, approved) {
                log::warn!("Notification dispatch failed: {e}");
            }
            set_flash(&session, "Decision recorded");
            Ok(redirect(back))
        }
        Err(err) => recover(&session, back, err),
    }
}
