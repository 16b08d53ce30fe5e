use actix_session::Session;
use actix_web::{HttpResponse, web};
use serde::Deserialize;
use serde_json::json;

use crate::audit;
use crate::auth::session::{require_permission, require_user_id};
use crate::auth::{csrf, password, roles, validate};
use crate::db::DbPool;
use crate::errors::{AppError, render};
use crate::models::user::{self, NewUser, UserForm};
use crate::templates_structs::{PageContext, UserFormTemplate, UserListTemplate, role_options};

#[derive(Deserialize)]
pub struct ListQuery {
    pub page: Option<i64>,
    pub q: Option<String>,
}

pub async fn list(
    pool: web::Data<DbPool>,
    session: Session,
    query: web::Query<ListQuery>,
) -> Result<HttpResponse, AppError> {
    require_permission(&session, "users.manage")?;
    let conn = pool.get()?;
    let ctx = PageContext::build(&session, &conn, "/users")?;
    let page = user::find_paginated(
        &conn,
        query.page.unwrap_or(1),
        20,
        query.q.as_deref(),
    )?;
    let tmpl = UserListTemplate {
        ctx,
        page,
        search: query.q.clone().unwrap_or_default(),
    };
    render(tmpl)
}

pub async fn new_form(pool: web::Data<DbPool>, session: Session) -> Result<HttpResponse, AppError> {
    require_permission(&session, "users.manage")?;
    let conn = pool.get()?;
    let ctx = PageContext::build(&session, &conn, "/users")?;
    let tmpl = UserFormTemplate {
        ctx,
        editing: None,
        roles: role_options(None),
        errors: vec![],
    };
    render(tmpl)
}

fn validate_user_form(form: &UserForm, require_password: bool) -> Vec<String> {
    let mut errors = Vec::new();
    errors.extend(validate::validate_username(&form.username));
    errors.extend(validate::validate_email(&form.email));
    errors.extend(validate::validate_required(&form.display_name, "Display name", 100));
    if require_password || !form.password.is_empty() {
        errors.extend(validate::validate_password(&form.password));
    }
    if !roles::is_valid_role(&form.role) {
        errors.push("Unknown role".to_string());
    }
    errors
}

pub async fn create(
    pool: web::Data<DbPool>,
    session: Session,
    form: web::Form<UserForm>,
) -> Result<HttpResponse, AppError> {
    require_permission(&session, "users.manage")?;
    csrf::validate_csrf(&session, &form.csrf_token)?;
    let actor = require_user_id(&session)?;
    let conn = pool.get()?;

    let mut errors = validate_user_form(&form, true);
    if errors.is_empty() && user::find_by_username(&conn, form.username.trim())?.is_some() {
        errors.push("Username is already taken".to_string());
    }
    if !errors.is_empty() {
        let ctx = PageContext::build(&session, &conn, "/users")?;
        let tmpl = UserFormTemplate { ctx, editing: None, roles: role_options(Some(&form.role)), errors };
        return render(tmpl);
    }

    let hash = password::hash_password(&form.password).map_err(AppError::Hash)?;
    let new = NewUser {
        username: form.username.trim().to_string(),
        password: hash,
        email: form.email.trim().to_string(),
        display_name: form.display_name.trim().to_string(),
        role: form.role.clone(),
    };
    let user_id = user::create(&conn, &new)?;
    if let Err(e) = audit::log(&conn, actor, "user.created", "user", user_id,
        json!({"username": new.username, "role": new.role}))
    {
        log::warn!("Audit write failed: {e}");
    }

    let _ = session.insert("flash", "User created");
    Ok(HttpResponse::SeeOther()
        .insert_header(("Location", "/users"))
        .finish())
}

pub async fn edit_form(
    pool: web::Data<DbPool>,
    session: Session,
    path: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    require_permission(&session, "users.manage")?;
    let conn = pool.get()?;
    let ctx = PageContext::build(&session, &conn, "/users")?;
    let user = user::find_by_id(&conn, path.into_inner())?.ok_or(AppError::NotFound)?;
    let role = user.role.clone();
    let tmpl = UserFormTemplate {
        ctx,
        editing: Some(user.display()),
        roles: role_options(Some(&role)),
        errors: vec![],
    };
    render(tmpl)
}

pub async fn update(
    pool: web::Data<DbPool>,
    session: Session,
    path: web::Path<i64>,
    form: web::Form<UserForm>,
) -> Result<HttpResponse, AppError> {
    require_permission(&session, "users.manage")?;
    csrf::validate_csrf(&session, &form.csrf_token)?;
    let actor = require_user_id(&session)?;
    let id = path.into_inner();
    let conn = pool.get()?;
    let existing = user::find_by_id(&conn, id)?.ok_or(AppError::NotFound)?;

    let mut errors = validate_user_form(&form, false);
    if errors.is_empty() && form.username.trim() != existing.username {
        if user::find_by_username(&conn, form.username.trim())?.is_some() {
            errors.push("Username is already taken".to_string());
        }
    }
    if !errors.is_empty() {
        let ctx = PageContext::build(&session, &conn, "/users")?;
        let tmpl = UserFormTemplate {
            ctx,
            editing: Some(existing.display()),
            roles: role_options(Some(&form.role)),
            errors,
        };
        return render(tmpl);
    }

    let new_hash = if form.password.is_empty() {
        None
    } else {
        Some(password::hash_password(&form.password).map_err(AppError::Hash)?)
    };
    user::update(
        &conn,
        id,
        form.username.trim(),
        new_hash.as_deref(),
        form.email.trim(),
        form.display_name.trim(),
        &form.role,
    )?;
    if let Err(e) = audit::log(&conn, actor, "user.updated", "user", id,
        json!({"username": form.username.trim(), "role": form.role}))
    {
        log::warn!("Audit write failed: {e}");
    }

    let _ = session.insert("flash", "User updated");
    Ok(HttpResponse::SeeOther()
        .insert_header(("Location", "/users"))
        .finish())
}

pub async fn delete(
    pool: web::Data<DbPool>,
    session: Session,
    path: web::Path<i64>,
    form: web::Form<super::auth_handlers::CsrfOnly>,
) -> Result<HttpResponse, AppError> {
    require_permission(&session, "users.manage")?;
    csrf::validate_csrf(&session, &form.csrf_token)?;
    let actor = require_user_id(&session)?;
    let id = path.into_inner();

    if id == actor {
        let _ = session.insert("flash", "You cannot delete your own account");
        return Ok(HttpResponse::SeeOther()
            .insert_header(("Location", "/users"))
            .finish());
    }

    let conn = pool.get()?;
    let existing = user::find_by_id(&conn, id)?.ok_or(AppError::NotFound)?;
    user::delete(&conn, id)?;
    if let Err(e) = audit::log(&conn, actor, "user.deleted", "user", id,
        json!({"username": existing.username}))
    {
        log::warn!("Audit write failed: {e}");
    }

    let _ = session.insert("flash", "User deleted");
    Ok(HttpResponse::SeeOther()
        .insert_header(("Location", "/users"))
        .finish())
}
