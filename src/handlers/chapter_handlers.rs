use actix_session::Session;
use actix_web::{HttpResponse, web};
use serde::Deserialize;
use serde_json::json;

use crate::audit;
use crate::auth::csrf;
use crate::auth::session::{require_permission, require_user_id, set_flash};
use crate::auth::validate;
use crate::db::DbPool;
use crate::errors::{AppError, render};
use crate::models::group::{self, GroupDisplay};
use crate::models::{chapter, chapter::ChapterForm};
use crate::notify;
use crate::realtime::WsHub;
use crate::templates_structs::{
    ChapterDetailTemplate, ChapterFormTemplate, ChapterListTemplate, PageContext,
};

fn redirect(location: &str) -> HttpResponse {
    HttpResponse::SeeOther()
        .insert_header(("Location", location))
        .finish()
}

fn recover(session: &Session, location: &str, err: AppError) -> Result<HttpResponse, AppError> {
    match &err {
        AppError::Validation(_) | AppError::InvalidTransition(_) => {
            set_flash(session, &err.to_string());
            Ok(redirect(location))
        }
        _ => Err(err),
    }
}

fn load_group(conn: &rusqlite::Connection, group_id: i64) -> Result<GroupDisplay, AppError> {
    group::find_by_id(conn, group_id)?.ok_or(AppError::NotFound)
}

/// Chapter content edits are open to any member of the owning group.
fn require_member(
    conn: &rusqlite::Connection,
    group_id: i64,
    user_id: i64,
) -> Result<(), AppError> {
    if group::is_member(conn, group_id, user_id)? {
        Ok(())
    } else {
        Err(AppError::PermissionDenied(format!("group:{group_id}")))
    }
}

pub async fn list(
    pool: web::Data<DbPool>,
    session: Session,
    path: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    require_permission(&session, "chapters.view")?;
    let user_id = require_user_id(&session)?;
    let group_id = path.into_inner();
    let conn = pool.get()?;
    let ctx = PageContext::build(&session, &conn, "/groups")?;
    group::require_access(&conn, group_id, user_id, &ctx.permissions)?;

    let g = load_group(&conn, group_id)?;
    let chapters = chapter::find_by_group(&conn, group_id)?;
    let can_edit = ctx.permissions.has("chapters.edit")
        && group::is_member(&conn, group_id, user_id)?;

    render(ChapterListTemplate { ctx, group: g, chapters, can_edit })
}

pub async fn detail(
    pool: web::Data<DbPool>,
    session: Session,
    path: web::Path<(i64, i64)>,
) -> Result<HttpResponse, AppError> {
    require_permission(&session, "chapters.view")?;
    let user_id = require_user_id(&session)?;
    let (group_id, chapter_id) = path.into_inner();
    let conn = pool.get()?;
    let ctx = PageContext::build(&session, &conn, "/groups")?;
    group::require_access(&conn, group_id, user_id, &ctx.permissions)?;

    let g = load_group(&conn, group_id)?;
    let ch = chapter::find_by_id(&conn, chapter_id)?.ok_or(AppError::NotFound)?;
    if ch.group_id != group_id {
        return Err(AppError::NotFound);
    }
    let comments = chapter::find_comments(&conn, chapter_id)?;
    let can_edit = ctx.permissions.has("chapters.edit")
        && group::is_member(&conn, group_id, user_id)?
        && ch.status.is_editable();
    let can_review = ctx.permissions.has("chapters.review") && g.adviser_id == Some(user_id);

    render(ChapterDetailTemplate { ctx, group: g, chapter: ch, comments, can_edit, can_review })
}

pub async fn new_form(
    pool: web::Data<DbPool>,
    session: Session,
    path: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    require_permission(&session, "chapters.edit")?;
    let user_id = require_user_id(&session)?;
    let group_id = path.into_inner();
    let conn = pool.get()?;
    let ctx = PageContext::build(&session, &conn, "/groups")?;
    require_member(&conn, group_id, user_id)?;

    let g = load_group(&conn, group_id)?;
    render(ChapterFormTemplate { ctx, group: g, editing: None, errors: vec![] })
}

fn validate_chapter_form(form: &ChapterForm) -> (Vec<String>, i64) {
    let mut errors = Vec::new();
    errors.extend(validate::validate_required(&form.title, "Title", 200));
    let number = match form.number.trim().parse::<i64>() {
        Ok(n) if n > 0 => n,
        _ => {
            errors.push("Chapter number must be a positive integer".to_string());
            0
        }
    };
    (errors, number)
}

pub async fn create(
    pool: web::Data<DbPool>,
    session: Session,
    path: web::Path<i64>,
    form: web::Form<ChapterForm>,
) -> Result<HttpResponse, AppError> {
    require_permission(&session, "chapters.edit")?;
    csrf::validate_csrf(&session, &form.csrf_token)?;
    let user_id = require_user_id(&session)?;
    let group_id = path.into_inner();
    let back = format!("/groups/{group_id}/chapters");
    let conn = pool.get()?;
    require_member(&conn, group_id, user_id)?;
    let g = load_group(&conn, group_id)?;

    let (errors, number) = validate_chapter_form(&form);
    if !errors.is_empty() {
        let ctx = PageContext::build(&session, &conn, "/groups")?;
        let tmpl = ChapterFormTemplate { ctx, group: g, editing: None, errors };
        return render(tmpl);
    }

    match chapter::create(&conn, group_id, number, form.title.trim(), &form.body) {
        Ok(chapter_id) => {
            if let Err(e) = audit::log(&conn, user_id, "chapter.created", "chapter", chapter_id,
                json!({"group_id": group_id, "number": number}))
            {
                log::warn!("Audit write failed: {e}");
            }
            set_flash(&session, "Chapter created");
            Ok(redirect(&back))
        }
        Err(err) => recover(&session, &back, err),
    }
}

pub async fn edit_form(
    pool: web::Data<DbPool>,
    session: Session,
    path: web::Path<(i64, i64)>,
) -> Result<HttpResponse, AppError> {
    require_permission(&session, "chapters.edit")?;
    let user_id = require_user_id(&session)?;
    let (group_id, chapter_id) = path.into_inner();
    let conn = pool.get()?;
    let ctx = PageContext::build(&session, &conn, "/groups")?;
    require_member(&conn, group_id, user_id)?;

    let g = load_group(&conn, group_id)?;
    let ch = chapter::find_by_id(&conn, chapter_id)?.ok_or(AppError::NotFound)?;
    if ch.group_id != group_id {
        return Err(AppError::NotFound);
    }
    render(ChapterFormTemplate { ctx, group: g, editing: Some(ch), errors: vec![] })
}

pub async fn update(
    pool: web::Data<DbPool>,
    session: Session,
    path: web::Path<(i64, i64)>,
    form: web::Form<ChapterForm>,
) -> Result<HttpResponse, AppError> {
    require_permission(&session, "chapters.edit")?;
    csrf::validate_csrf(&session, &form.csrf_token)?;
    let user_id = require_user_id(&session)?;
    let (group_id, chapter_id) = path.into_inner();
    let back = format!("/groups/{group_id}/chapters/{chapter_id}");
    let conn = pool.get()?;
    require_member(&conn, group_id, user_id)?;

    match chapter::update_content(&conn, chapter_id, form.title.trim(), &form.body) {
        Ok(()) => {
            set_flash(&session, "Chapter saved");
            Ok(redirect(&back))
        }
        Err(err) => recover(&session, &back, err),
    }
}

pub async fn submit(
    pool: web::Data<DbPool>,
    session: Session,
    hub: web::Data<WsHub>,
    path: web::Path<(i64, i64)>,
    form: web::Form<super::auth_handlers::CsrfOnly>,
) -> Result<HttpResponse, AppError> {
    require_permission(&session, "chapters.edit")?;
    csrf::validate_csrf(&session, &form.csrf_token)?;
    let user_id = require_user_id(&session)?;
    let (group_id, chapter_id) = path.into_inner();
    let back = format!("/groups/{group_id}/chapters/{chapter_id}");
    let conn = pool.get()?;
    require_member(&conn, group_id, user_id)?;
    let g = load_group(&conn, group_id)?;

    match chapter::submit(&conn, chapter_id) {
        Ok(ch) => {
            if let Err(e) = audit::log(&conn, user_id, "chapter.submitted", "chapter", chapter_id,
                json!({"group_id": group_id, "number": ch.number}))
            {
                log::warn!("Audit write failed: {e}");
            }
            if let Err(e) = notify::chapter_submitted(&conn, &hub, group_id, g.adviser_id, &ch.title) {
                log::warn!("Notification dispatch failed: {e}");
            }
            set_flash(&session, "Chapter submitted for review");
            Ok(redirect(&back))
        }
        Err(err) => recover(&session, &back, err),
    }
}

#[derive(Deserialize)]
pub struct ReviewForm {
    pub decision: String, // "accept" or "revise"
    pub csrf_token: String,
}

pub async fn review(
    pool: web::Data<DbPool>,
    session: Session,
    hub: web::Data<WsHub>,
    path: web::Path<(i64, i64)>,
    form: web::Form<ReviewForm>,
) -> Result<HttpResponse, AppError> {
    require_permission(&session, "chapters.review")?;
    csrf::validate_csrf(&session, &form.csrf_token)?;
    let user_id = require_user_id(&session)?;
    let (group_id, chapter_id) = path.into_inner();
    let back = format!("/groups/{group_id}/chapters/{chapter_id}");
    let conn = pool.get()?;

    let g = load_group(&conn, group_id)?;
    if g.adviser_id != Some(user_id) {
        return Err(AppError::PermissionDenied("group adviser only".to_string()));
    }

    let accept = match form.decision.as_str() {
        "accept" => true,
        "revise" => false,
        _ => {
            return Err(AppError::Validation(
                "Decision must be accept or revise".to_string(),
            ));
        }
    };

    match chapter::review(&conn, chapter_id, accept) {
        Ok(ch) => {
            let action = if accept { "chapter.accepted" } else { "chapter.needs_revision" };
            if let Err(e) = audit::log(&conn, user_id, action, "chapter", chapter_id,
                json!({"group_id": group_id, "number": ch.number}))
            {
                log::warn!("Audit write failed: {e}");
            }
            if let Err(e) = notify::chapter_reviewed(&conn, &hub, group_id, &ch.title, accept) {
                log::warn!("Notification dispatch failed: {e}");
            }
            set_flash(&session, "Review recorded");
            Ok(redirect(&back))
        }
        Err(err) => recover(&session, &back, err),
    }
}

#[derive(Deserialize)]
pub struct CommentForm {
    pub body: String,
    pub csrf_token: String,
}

pub async fn comment(
    pool: web::Data<DbPool>,
    session: Session,
    path: web::Path<(i64, i64)>,
    form: web::Form<CommentForm>,
) -> Result<HttpResponse, AppError> {
    require_permission(&session, "chapters.view")?;
    csrf::validate_csrf(&session, &form.csrf_token)?;
    let user_id = require_user_id(&session)?;
    let (group_id, chapter_id) = path.into_inner();
    let back = format!("/groups/{group_id}/chapters/{chapter_id}");
    let conn = pool.get()?;

    // Comments are open to the group and its adviser while the chapter exists.
    if !group::is_member(&conn, group_id, user_id)? {
        return Err(AppError::PermissionDenied(format!("group:{group_id}")));
    }
    let ch = chapter::find_by_id(&conn, chapter_id)?.ok_or(AppError::NotFound)?;
    if ch.group_id != group_id {
        return Err(AppError::NotFound);
    }
    if form.body.trim().is_empty() {
        set_flash(&session, "Comment cannot be empty");
        return Ok(redirect(&back));
    }

    chapter::add_comment(&conn, chapter_id, user_id, form.body.trim())?;
    Ok(redirect(&back))
}
