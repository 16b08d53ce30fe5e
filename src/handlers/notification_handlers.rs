use actix_session::Session;
use actix_web::{HttpResponse, web};
use serde::Deserialize;

use crate::auth::csrf;
use crate::auth::session::{require_permission, require_user_id};
use crate::db::DbPool;
use crate::errors::{AppError, render};
use crate::models::notification;
use crate::notify;
use crate::realtime::WsHub;
use crate::templates_structs::{NotificationListTemplate, PageContext};

pub async fn list(pool: web::Data<DbPool>, session: Session) -> Result<HttpResponse, AppError> {
    require_permission(&session, "notifications.view")?;
    let user_id = require_user_id(&session)?;
    let conn = pool.get()?;
    let ctx = PageContext::build(&session, &conn, "/notifications")?;
    let notifications = notification::find_for_user(&conn, user_id, 100)?;
    render(NotificationListTemplate { ctx, notifications })
}

#[derive(Deserialize)]
pub struct MarkReadForm {
    pub notification_id: i64,
    pub csrf_token: String,
}

pub async fn mark_read(
    pool: web::Data<DbPool>,
    session: Session,
    hub: web::Data<WsHub>,
    form: web::Form<MarkReadForm>,
) -> Result<HttpResponse, AppError> {
    require_permission(&session, "notifications.view")?;
    csrf::validate_csrf(&session, &form.csrf_token)?;
    let user_id = require_user_id(&session)?;
    let conn = pool.get()?;
    notification::mark_read(&conn, user_id, form.notification_id)?;
    notify::push_unread_count(&conn, &hub, user_id);
    Ok(HttpResponse::SeeOther()
        .insert_header(("Location", "/notifications"))
        .finish())
}

pub async fn mark_all_read(
    pool: web::Data<DbPool>,
    session: Session,
    hub: web::Data<WsHub>,
    form: web::Form<super::auth_handlers::CsrfOnly>,
) -> Result<HttpResponse, AppError> {
    require_permission(&session, "notifications.view")?;
    csrf::validate_csrf(&session, &form.csrf_token)?;
    let user_id = require_user_id(&session)?;
    let conn = pool.get()?;
    notification::mark_all_read(&conn, user_id)?;
    notify::push_unread_count(&conn, &hub, user_id);
    Ok(HttpResponse::SeeOther()
        .insert_header(("Location", "/notifications"))
        .finish())
}
