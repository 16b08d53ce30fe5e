use actix_session::Session;
use actix_web::{HttpResponse, web};
use serde::Deserialize;
use serde_json::json;

use crate::audit;
use crate::auth::csrf;
use crate::auth::session::{require_permission, require_user_id, set_flash};
use crate::db::DbPool;
use crate::errors::{AppError, render};
use crate::models::group::{self, GroupDisplay};
use crate::models::topic::queries as topic_queries;
use crate::models::topic::{EntryContent, summary};
use crate::notify;
use crate::realtime::WsHub;
use crate::templates_structs::{EntryFormTemplate, PageContext, SetView, TopicWorkspaceTemplate};

fn redirect(location: &str) -> HttpResponse {
    HttpResponse::SeeOther()
        .insert_header(("Location", location))
        .finish()
}

/// Turn recoverable workflow failures into a flash message so the page stays
/// usable for a retry; everything else propagates.
fn recover(session: &Session, location: &str, err: AppError) -> Result<HttpResponse, AppError> {
    match &err {
        AppError::Validation(_) | AppError::InvalidTransition(_) | AppError::Conflict(_) => {
            set_flash(session, &err.to_string());
            Ok(redirect(location))
        }
        _ => Err(err),
    }
}

fn load_group(
    conn: &rusqlite::Connection,
    group_id: i64,
) -> Result<GroupDisplay, AppError> {
    group::find_by_id(conn, group_id)?.ok_or(AppError::NotFound)
}

/// Leader gate for the mutating student actions.
fn require_leader(group: &GroupDisplay, user_id: i64) -> Result<(), AppError> {
    if group.leader_id != user_id {
        return Err(AppError::PermissionDenied("group leader only".to_string()));
    }
    Ok(())
}

pub async fn workspace(
    pool: web::Data<DbPool>,
    session: Session,
    path: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    require_permission(&session, "topics.view")?;
    let user_id = require_user_id(&session)?;
    let group_id = path.into_inner();
    let conn = pool.get()?;
    let ctx = PageContext::build(&session, &conn, &format!("/groups/{group_id}/topics"))?;
    group::require_access(&conn, group_id, user_id, &ctx.permissions)?;

    let g = load_group(&conn, group_id)?;
    let is_leader = g.leader_id == user_id;

    let sets = topic_queries::find_sets_by_group(&conn, group_id)?;
    let active_id = summary::pick_active_set(&sets).map(|s| s.id);

    let mut active = None;
    let mut previous = Vec::new();
    for set in &sets {
        let history = topic_queries::find_history_display(&conn, set.id)?;
        let view = SetView::build(set, history, is_leader);
        if Some(set.id) == active_id {
            active = Some(view);
        } else {
            previous.push(view);
        }
    }

    // A brand-new cycle can start when there is no set yet, when every prior
    // cycle is archived, or when the active set is drained and fully
    // rejected.
    let can_create_set = is_leader
        && match summary::pick_active_set(&sets) {
            None => true,
            Some(set) if summary::is_set_archived(set) => false,
            Some(set) => summary::can_start_new_cycle(set, is_leader),
        };

    let tmpl = TopicWorkspaceTemplate {
        ctx,
        group: g,
        active,
        previous,
        is_leader,
        can_create_set,
    };
    render(tmpl)
}

pub async fn create_set(
    pool: web::Data<DbPool>,
    session: Session,
    hub: web::Data<WsHub>,
    path: web::Path<i64>,
    form: web::Form<super::auth_handlers::CsrfOnly>,
) -> Result<HttpResponse, AppError> {
    require_permission(&session, "topics.edit")?;
    csrf::validate_csrf(&session, &form.csrf_token)?;
    let user_id = require_user_id(&session)?;
    let group_id = path.into_inner();
    let back = format!("/groups/{group_id}/topics");
    let mut conn = pool.get()?;

    let g = load_group(&conn, group_id)?;
    require_leader(&g, user_id)?;

    match topic_queries::create_set(&mut conn, group_id, user_id) {
        Ok(set_id) => {
            if let Err(e) = audit::log(&conn, user_id, "topic.cycle_started", "topic_set", set_id,
                json!({"group_id": group_id}))
            {
                log::warn!("Audit write failed: {e}");
            }
            if let Err(e) = notify::push_group_topics(&conn, &hub, group_id) {
                log::warn!("Topic stream push failed: {e}");
            }
            set_flash(&session, "New proposal cycle started");
            Ok(redirect(&back))
        }
        Err(err) => recover(&session, &back, err),
    }
}

#[derive(Deserialize)]
pub struct EntryForm {
    pub title: String,
    pub abstract_text: String,
    #[serde(default)]
    pub problem_statement: String,
    #[serde(default)]
    pub expected_outcome: String,
    #[serde(default)]
    pub keywords: String,
    pub csrf_token: String,
}

fn entry_content(form: &EntryForm) -> Result<EntryContent, AppError> {
    if form.title.trim().is_empty() {
        return Err(AppError::Validation("A topic title is required".to_string()));
    }
    if form.abstract_text.trim().is_empty() {
        return Err(AppError::Validation("An abstract is required".to_string()));
    }
    let optional = |s: &str| {
        let t = s.trim();
        (!t.is_empty()).then(|| t.to_string())
    };
    Ok(EntryContent {
        title: form.title.trim().to_string(),
        abstract_text: form.abstract_text.trim().to_string(),
        problem_statement: optional(&form.problem_statement),
        expected_outcome: optional(&form.expected_outcome),
        keywords: form
            .keywords
            .split(',')
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .map(String::from)
            .collect(),
    })
}

pub async fn entry_new_form(
    pool: web::Data<DbPool>,
    session: Session,
    path: web::Path<(i64, i64)>,
) -> Result<HttpResponse, AppError> {
    require_permission(&session, "topics.edit")?;
    let user_id = require_user_id(&session)?;
    let (group_id, set_id) = path.into_inner();
    let conn = pool.get()?;
    let ctx = PageContext::build(&session, &conn, &format!("/groups/{group_id}/topics"))?;

    let g = load_group(&conn, group_id)?;
    require_leader(&g, user_id)?;

    let tmpl = EntryFormTemplate {
        ctx,
        group: g,
        set_id,
        editing: None,
        errors: vec![],
    };
    render(tmpl)
}

pub async fn entry_create(
    pool: web::Data<DbPool>,
    session: Session,
    hub: web::Data<WsHub>,
    path: web::Path<(i64, i64)>,
    form: web::Form<EntryForm>,
) -> Result<HttpResponse, AppError> {
    require_permission(&session, "topics.edit")?;
    csrf::validate_csrf(&session, &form.csrf_token)?;
    let user_id = require_user_id(&session)?;
    let (group_id, set_id) = path.into_inner();
    let back = format!("/groups/{group_id}/topics");
    let mut conn = pool.get()?;

    let g = load_group(&conn, group_id)?;
    require_leader(&g, user_id)?;

    let result = entry_content(&form)
        .and_then(|content| topic_queries::add_entry(&mut conn, set_id, user_id, &content));
    match result {
        Ok(entry_id) => {
            if let Err(e) = audit::log(&conn, user_id, "topic.entry_added", "topic_entry", entry_id,
                json!({"set_id": set_id}))
            {
                log::warn!("Audit write failed: {e}");
            }
            if let Err(e) = notify::push_group_topics(&conn, &hub, group_id) {
                log::warn!("Topic stream push failed: {e}");
            }
            set_flash(&session, "Topic added to the proposal set");
            Ok(redirect(&back))
        }
        Err(err) => recover(&session, &back, err),
    }
}

pub async fn entry_edit_form(
    pool: web::Data<DbPool>,
    session: Session,
    path: web::Path<(i64, i64, i64)>,
) -> Result<HttpResponse, AppError> {
    require_permission(&session, "topics.edit")?;
    let user_id = require_user_id(&session)?;
    let (group_id, set_id, entry_id) = path.into_inner();
    let conn = pool.get()?;
    let ctx = PageContext::build(&session, &conn, &format!("/groups/{group_id}/topics"))?;

    let g = load_group(&conn, group_id)?;
    require_leader(&g, user_id)?;

    let set = topic_queries::find_set(&conn, set_id)?;
    if set.group_id != group_id {
        return Err(AppError::NotFound);
    }
    let entry = set
        .entries
        .iter()
        .find(|e| e.id == entry_id)
        .ok_or(AppError::NotFound)?;
    let view = crate::templates_structs::EntryView::build(entry, &set, true);

    let tmpl = EntryFormTemplate {
        ctx,
        group: g,
        set_id,
        editing: Some(view),
        errors: vec![],
    };
    render(tmpl)
}

pub async fn entry_update(
    pool: web::Data<DbPool>,
    session: Session,
    hub: web::Data<WsHub>,
    path: web::Path<(i64, i64, i64)>,
    form: web::Form<EntryForm>,
) -> Result<HttpResponse, AppError> {
    require_permission(&session, "topics.edit")?;
    csrf::validate_csrf(&session, &form.csrf_token)?;
    let user_id = require_user_id(&session)?;
    let (group_id, set_id, entry_id) = path.into_inner();
    let back = format!("/groups/{group_id}/topics");
    let mut conn = pool.get()?;

    let g = load_group(&conn, group_id)?;
    require_leader(&g, user_id)?;

    let result = entry_content(&form)
        .and_then(|content| topic_queries::update_entry(&mut conn, set_id, entry_id, &content));
    match result {
        Ok(()) => {
            if let Err(e) = notify::push_group_topics(&conn, &hub, group_id) {
                log::warn!("Topic stream push failed: {e}");
            }
            set_flash(&session, "Topic updated");
            Ok(redirect(&back))
        }
        Err(err) => recover(&session, &back, err),
    }
}

pub async fn entry_remove(
    pool: web::Data<DbPool>,
    session: Session,
    hub: web::Data<WsHub>,
    path: web::Path<(i64, i64, i64)>,
    form: web::Form<super::auth_handlers::CsrfOnly>,
) -> Result<HttpResponse, AppError> {
    require_permission(&session, "topics.edit")?;
    csrf::validate_csrf(&session, &form.csrf_token)?;
    let user_id = require_user_id(&session)?;
    let (group_id, set_id, entry_id) = path.into_inner();
    let back = format!("/groups/{group_id}/topics");
    let mut conn = pool.get()?;

    let g = load_group(&conn, group_id)?;
    require_leader(&g, user_id)?;

    match topic_queries::remove_entry(&mut conn, set_id, entry_id) {
        Ok(()) => {
            if let Err(e) = notify::push_group_topics(&conn, &hub, group_id) {
                log::warn!("Topic stream push failed: {e}");
            }
            set_flash(&session, "Topic removed");
            Ok(redirect(&back))
        }
        Err(err) => recover(&session, &back, err),
    }
}

pub async fn submit_set(
    pool: web::Data<DbPool>,
    session: Session,
    hub: web::Data<WsHub>,
    path: web::Path<(i64, i64)>,
    form: web::Form<super::auth_handlers::CsrfOnly>,
) -> Result<HttpResponse, AppError> {
    require_permission(&session, "topics.edit")?;
    csrf::validate_csrf(&session, &form.csrf_token)?;
    let user_id = require_user_id(&session)?;
    let (group_id, set_id) = path.into_inner();
    let back = format!("/groups/{group_id}/topics");
    let mut conn = pool.get()?;

    let g = load_group(&conn, group_id)?;
    require_leader(&g, user_id)?;

    match topic_queries::submit_set(&mut conn, set_id) {
        Ok(()) => {
            let set = topic_queries::find_set(&conn, set_id)?;
            if let Err(e) = audit::log(&conn, user_id, "topic.set_submitted", "topic_set", set_id,
                json!({"group_id": group_id, "cycle": set.cycle, "entries": set.entries.len()}))
            {
                log::warn!("Audit write failed: {e}");
            }
            if let Err(e) = notify::set_submitted(&conn, &hub, &g.name, set.cycle) {
                log::warn!("Notification dispatch failed: {e}");
            }
            if let Err(e) = notify::push_group_topics(&conn, &hub, group_id) {
                log::warn!("Topic stream push failed: {e}");
            }
            set_flash(&session, "Proposal set submitted for moderation");
            Ok(redirect(&back))
        }
        Err(err) => recover(&session, &back, err),
    }
}

#[derive(Deserialize)]
pub struct AdoptForm {
    pub set_id: i64,
    pub proposal_id: i64,
    pub csrf_token: String,
}

/// Lock a head-approved entry in as the group's official thesis topic.
pub async fn adopt(
    pool: web::Data<DbPool>,
    session: Session,
    hub: web::Data<WsHub>,
    path: web::Path<i64>,
    form: web::Form<AdoptForm>,
) -> Result<HttpResponse, AppError> {
    require_permission(&session, "topics.edit")?;
    csrf::validate_csrf(&session, &form.csrf_token)?;
    let user_id = require_user_id(&session)?;
    let group_id = path.into_inner();
    let back = format!("/groups/{group_id}/topics");
    let mut conn = pool.get()?;

    let g = load_group(&conn, group_id)?;
    require_leader(&g, user_id)?;

    match topic_queries::mark_as_thesis(&mut conn, form.set_id, form.proposal_id, user_id) {
        Ok(()) => {
            let entry = topic_queries::find_entry_in_set(&conn, form.set_id, form.proposal_id)?
                .ok_or(AppError::NotFound)?;
            if let Err(e) = audit::log(&conn, user_id, "topic.adopted", "topic_entry",
                form.proposal_id, json!({"set_id": form.set_id, "title": entry.title}))
            {
                log::warn!("Audit write failed: {e}");
            }
            if let Err(e) = notify::topic_adopted(&conn, &hub, group_id, &entry.title) {
                log::warn!("Notification dispatch failed: {e}");
            }
            if let Err(e) = notify::push_group_topics(&conn, &hub, group_id) {
                log::warn!("Topic stream push failed: {e}");
            }
            set_flash(&session, "Thesis topic locked in");
            Ok(redirect(&back))
        }
        Err(err) => recover(&session, &back, err),
    }
}
