use actix_session::Session;
use actix_web::{HttpResponse, web};
use serde::Deserialize;

use crate::audit;
use crate::auth::session::require_permission;
use crate::db::DbPool;
use crate::errors::{AppError, render};
use crate::templates_structs::{AuditListTemplate, PageContext};

#[derive(Deserialize)]
pub struct ListQuery {
    pub page: Option<i64>,
}

pub async fn list(
    pool: web::Data<DbPool>,
    session: Session,
    query: web::Query<ListQuery>,
) -> Result<HttpResponse, AppError> {
    require_permission(&session, "audit.view")?;
    let conn = pool.get()?;
    let ctx = PageContext::build(&session, &conn, "/audit")?;
    let page = audit::find_paginated(&conn, query.page.unwrap_or(1), 50)?;
    render(AuditListTemplate { ctx, page })
}
