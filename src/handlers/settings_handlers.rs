use actix_session::Session;
use actix_web::{HttpResponse, web};
use std::collections::HashMap;

use crate::auth::csrf;
use crate::auth::session::require_permission;
use crate::db::DbPool;
use crate::errors::{AppError, render};
use crate::models::setting;
use crate::templates_structs::{PageContext, SettingsTemplate};

pub async fn list(pool: web::Data<DbPool>, session: Session) -> Result<HttpResponse, AppError> {
    require_permission(&session, "settings.manage")?;
    let conn = pool.get()?;
    let ctx = PageContext::build(&session, &conn, "/settings")?;
    let settings = setting::find_all(&conn)?;
    render(SettingsTemplate { ctx, settings })
}

/// Form fields arrive as `setting_<id>`; anything else is ignored.
pub async fn save(
    pool: web::Data<DbPool>,
    session: Session,
    form: web::Form<HashMap<String, String>>,
) -> Result<HttpResponse, AppError> {
    require_permission(&session, "settings.manage")?;
    let token = form.get("csrf_token").map(String::as_str).unwrap_or("");
    csrf::validate_csrf(&session, token)?;
    let conn = pool.get()?;

    for (key, value) in form.iter() {
        if let Some(id_str) = key.strip_prefix("setting_") {
            if let Ok(id) = id_str.parse::<i64>() {
                setting::update_value(&conn, id, value.trim())?;
            }
        }
    }

    let _ = session.insert("flash", "Settings saved");
    Ok(HttpResponse::SeeOther()
        .insert_header(("Location", "/settings"))
        .finish())
}
