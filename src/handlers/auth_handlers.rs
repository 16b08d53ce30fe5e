use actix_session::Session;
use actix_web::{HttpRequest, HttpResponse, web};
use serde::Deserialize;

use crate::auth::rate_limit::RateLimiter;
use crate::auth::{csrf, password, roles};
use crate::db::DbPool;
use crate::errors::{AppError, render};
use crate::models::{setting, user};
use crate::templates_structs::LoginTemplate;

#[derive(Deserialize)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
    pub csrf_token: String,
}

#[derive(Deserialize)]
pub struct CsrfOnly {
    pub csrf_token: String,
}

pub async fn login_page(
    pool: web::Data<DbPool>,
    session: Session,
) -> Result<HttpResponse, AppError> {
    // If already logged in, redirect to dashboard
    if session.get::<i64>("user_id").unwrap_or(None).is_some() {
        return Ok(HttpResponse::SeeOther()
            .insert_header(("Location", "/dashboard"))
            .finish());
    }

    let conn = pool.get()?;
    let app_name = setting::get_value(&conn, "app.name", "ThesisFlow");
    let csrf_token = csrf::get_or_create_token(&session);
    let tmpl = LoginTemplate { error: None, app_name, csrf_token };
    render(tmpl)
}

fn login_error(
    session: &Session,
    app_name: String,
    message: &str,
) -> Result<HttpResponse, AppError> {
    let csrf_token = csrf::get_or_create_token(session);
    let tmpl = LoginTemplate {
        error: Some(message.to_string()),
        app_name,
        csrf_token,
    };
    render(tmpl)
}

pub async fn login_submit(
    req: HttpRequest,
    pool: web::Data<DbPool>,
    session: Session,
    form: web::Form<LoginForm>,
    limiter: web::Data<RateLimiter>,
) -> Result<HttpResponse, AppError> {
    csrf::validate_csrf(&session, &form.csrf_token)?;

    // Rate-limit check BEFORE any database access
    let ip = req
        .peer_addr()
        .map(|addr| addr.ip())
        .unwrap_or_else(|| std::net::IpAddr::V4(std::net::Ipv4Addr::UNSPECIFIED));

    let conn = pool.get()?;
    let app_name = setting::get_value(&conn, "app.name", "ThesisFlow");

    if limiter.is_blocked(ip) {
        return login_error(
            &session,
            app_name,
            "Too many failed login attempts. Please try again later.",
        );
    }

    let found = user::find_by_username(&conn, &form.username)?;

    match found {
        Some(u) if password::verify_password(&form.password, &u.password).unwrap_or(false) => {
            limiter.clear(ip);

            // Permissions are resolved once from the static role table and
            // cached in the session as a CSV.
            let perms_csv = roles::permission_codes(&u.role).join(",");
            let _ = session.insert("user_id", u.id);
            let _ = session.insert("username", &u.username);
            let _ = session.insert("role", &u.role);
            let _ = session.insert("permissions", &perms_csv);
            Ok(HttpResponse::SeeOther()
                .insert_header(("Location", "/dashboard"))
                .finish())
        }
        _ => {
            limiter.record_failure(ip);
            login_error(&session, app_name, "Invalid username or password")
        }
    }
}

pub async fn logout(session: Session, form: web::Form<CsrfOnly>) -> Result<HttpResponse, AppError> {
    csrf::validate_csrf(&session, &form.csrf_token)?;
    session.purge();
    Ok(HttpResponse::SeeOther()
        .insert_header(("Location", "/login"))
        .finish())
}
