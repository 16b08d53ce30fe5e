use actix_session::Session;
use actix_web::{HttpResponse, web};
use serde::Deserialize;
use serde_json::json;

use crate::audit;
use crate::auth::session::{require_permission, require_user_id};
use crate::auth::{csrf, roles, validate};
use crate::db::DbPool;
use crate::errors::{AppError, render};
use crate::models::group::{self, GroupForm, NewGroup};
use crate::models::user;
use crate::templates_structs::{
    GroupDetailTemplate, GroupFormTemplate, GroupListTemplate, PageContext,
};

/// Students see their own groups; staff see every group.
pub async fn list(pool: web::Data<DbPool>, session: Session) -> Result<HttpResponse, AppError> {
    let user_id = require_user_id(&session)?;
    let conn = pool.get()?;
    let ctx = PageContext::build(&session, &conn, "/groups")?;

    let can_manage = ctx.permissions.has("groups.manage");
    let sees_all = can_manage
        || ctx.permissions.has("topics.review.moderator")
        || ctx.permissions.has("topics.review.head");
    let groups = if sees_all {
        group::find_all(&conn)?
    } else {
        group::find_for_user(&conn, user_id)?
    };

    let tmpl = GroupListTemplate { ctx, groups, can_manage };
    render(tmpl)
}

pub async fn detail(
    pool: web::Data<DbPool>,
    session: Session,
    path: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    let user_id = require_user_id(&session)?;
    let group_id = path.into_inner();
    let conn = pool.get()?;
    let ctx = PageContext::build(&session, &conn, "/groups")?;
    group::require_access(&conn, group_id, user_id, &ctx.permissions)?;

    let g = group::find_by_id(&conn, group_id)?.ok_or(AppError::NotFound)?;
    let members = group::find_members(&conn, group_id)?;
    let can_manage = ctx.permissions.has("groups.manage");
    let students = if can_manage {
        user::find_by_role_for_select(&conn, roles::STUDENT)?
    } else {
        vec![]
    };

    let tmpl = GroupDetailTemplate { ctx, group: g, members, students, can_manage };
    render(tmpl)
}

pub async fn new_form(pool: web::Data<DbPool>, session: Session) -> Result<HttpResponse, AppError> {
    require_permission(&session, "groups.manage")?;
    let conn = pool.get()?;
    let ctx = PageContext::build(&session, &conn, "/groups")?;
    let tmpl = GroupFormTemplate {
        ctx,
        editing: None,
        students: user::find_by_role_for_select(&conn, roles::STUDENT)?,
        advisers: user::find_by_role_for_select(&conn, roles::ADVISER)?,
        errors: vec![],
    };
    render(tmpl)
}

fn parse_adviser(form: &GroupForm) -> Option<i64> {
    form.adviser_id.parse::<i64>().ok().filter(|id| *id > 0)
}

pub async fn create(
    pool: web::Data<DbPool>,
    session: Session,
    form: web::Form<GroupForm>,
) -> Result<HttpResponse, AppError> {
    require_permission(&session, "groups.manage")?;
    csrf::validate_csrf(&session, &form.csrf_token)?;
    let actor = require_user_id(&session)?;
    let conn = pool.get()?;

    let mut errors = Vec::new();
    errors.extend(validate::validate_required(&form.name, "Group name", 100));
    errors.extend(validate::validate_optional(&form.program, "Program", 100));
    let leader_id = match form.leader_id.parse::<i64>() {
        Ok(id) if id > 0 => id,
        _ => {
            errors.push("A group leader is required".to_string());
            0
        }
    };
    if !errors.is_empty() {
        let ctx = PageContext::build(&session, &conn, "/groups")?;
        let tmpl = GroupFormTemplate {
            ctx,
            editing: None,
            students: user::find_by_role_for_select(&conn, roles::STUDENT)?,
            advisers: user::find_by_role_for_select(&conn, roles::ADVISER)?,
            errors,
        };
        return render(tmpl);
    }

    let new = NewGroup {
        name: form.name.trim().to_string(),
        program: form.program.trim().to_string(),
        leader_id,
        adviser_id: parse_adviser(&form),
    };
    let group_id = group::create(&conn, &new)?;
    if let Err(e) = audit::log(&conn, actor, "group.created", "group", group_id,
        json!({"name": new.name}))
    {
        log::warn!("Audit write failed: {e}");
    }

    let _ = session.insert("flash", "Group created");
    Ok(HttpResponse::SeeOther()
        .insert_header(("Location", "/groups"))
        .finish())
}

pub async fn edit_form(
    pool: web::Data<DbPool>,
    session: Session,
    path: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    require_permission(&session, "groups.manage")?;
    let conn = pool.get()?;
    let ctx = PageContext::build(&session, &conn, "/groups")?;
    let g = group::find_by_id(&conn, path.into_inner())?.ok_or(AppError::NotFound)?;
    let tmpl = GroupFormTemplate {
        ctx,
        editing: Some(g),
        students: user::find_by_role_for_select(&conn, roles::STUDENT)?,
        advisers: user::find_by_role_for_select(&conn, roles::ADVISER)?,
        errors: vec![],
    };
    render(tmpl)
}

pub async fn update(
    pool: web::Data<DbPool>,
    session: Session,
    path: web::Path<i64>,
    form: web::Form<GroupForm>,
) -> Result<HttpResponse, AppError> {
    require_permission(&session, "groups.manage")?;
    csrf::validate_csrf(&session, &form.csrf_token)?;
    let actor = require_user_id(&session)?;
    let id = path.into_inner();
    let conn = pool.get()?;
    group::find_by_id(&conn, id)?.ok_or(AppError::NotFound)?;

    let leader_id = form
        .leader_id
        .parse::<i64>()
        .map_err(|_| AppError::Validation("A group leader is required".to_string()))?;
    group::update(
        &conn,
        id,
        form.name.trim(),
        form.program.trim(),
        leader_id,
        parse_adviser(&form),
    )?;
    if let Err(e) = audit::log(&conn, actor, "group.updated", "group", id,
        json!({"name": form.name.trim()}))
    {
        log::warn!("Audit write failed: {e}");
    }

    let _ = session.insert("flash", "Group updated");
    Ok(HttpResponse::SeeOther()
        .insert_header(("Location", "/groups"))
        .finish())
}

pub async fn delete(
    pool: web::Data<DbPool>,
    session: Session,
    path: web::Path<i64>,
    form: web::Form<super::auth_handlers::CsrfOnly>,
) -> Result<HttpResponse, AppError> {
    require_permission(&session, "groups.manage")?;
    csrf::validate_csrf(&session, &form.csrf_token)?;
    let actor = require_user_id(&session)?;
    let id = path.into_inner();
    let conn = pool.get()?;
    let g = group::find_by_id(&conn, id)?.ok_or(AppError::NotFound)?;
    group::delete(&conn, id)?;
    if let Err(e) = audit::log(&conn, actor, "group.deleted", "group", id,
        json!({"name": g.name}))
    {
        log::warn!("Audit write failed: {e}");
    }

    let _ = session.insert("flash", "Group deleted");
    Ok(HttpResponse::SeeOther()
        .insert_header(("Location", "/groups"))
        .finish())
}

#[derive(Deserialize)]
pub struct MemberForm {
    pub user_id: String,
    pub csrf_token: String,
}

pub async fn add_member(
    pool: web::Data<DbPool>,
    session: Session,
    path: web::Path<i64>,
    form: web::Form<MemberForm>,
) -> Result<HttpResponse, AppError> {
    require_permission(&session, "groups.manage")?;
    csrf::validate_csrf(&session, &form.csrf_token)?;
    let group_id = path.into_inner();
    let user_id = form
        .user_id
        .parse::<i64>()
        .map_err(|_| AppError::Validation("Pick a student to add".to_string()))?;
    let conn = pool.get()?;
    group::find_by_id(&conn, group_id)?.ok_or(AppError::NotFound)?;
    group::add_member(&conn, group_id, user_id)?;

    let _ = session.insert("flash", "Member added");
    Ok(HttpResponse::SeeOther()
        .insert_header(("Location", format!("/groups/{group_id}")))
        .finish())
}

pub async fn remove_member(
    pool: web::Data<DbPool>,
    session: Session,
    path: web::Path<(i64, i64)>,
    form: web::Form<super::auth_handlers::CsrfOnly>,
) -> Result<HttpResponse, AppError> {
    require_permission(&session, "groups.manage")?;
    csrf::validate_csrf(&session, &form.csrf_token)?;
    let (group_id, user_id) = path.into_inner();
    let conn = pool.get()?;
    group::remove_member(&conn, group_id, user_id)?;

    let _ = session.insert("flash", "Member removed");
    Ok(HttpResponse::SeeOther()
        .insert_header(("Location", format!("/groups/{group_id}")))
        .finish())
}
