//! Template context structures for Askama templates, organized by domain.
//! All types are re-exported so handlers can `use crate::templates_structs::*`.

use actix_session::Session;
use askama::Template;
use rusqlite::Connection;

use crate::auth::csrf;
use crate::auth::session::{Permissions, get_permissions, get_username, take_flash};
use crate::errors::AppError;
use crate::models::{notification, setting};
use crate::nav::{self, NavItem};

pub mod account;
pub mod admin;
pub mod chapter;
pub mod dashboard;
pub mod notification_page;
pub mod review;
pub mod topic;

pub use account::*;
pub use admin::*;
pub use chapter::*;
pub use dashboard::*;
pub use notification_page::*;
pub use review::*;
pub use topic::*;

/// Common context shared by all authenticated pages.
/// Templates access these as `ctx.username`, `ctx.nav_items`, etc.
pub struct PageContext {
    pub username: String,
    pub avatar_initial: String,
    pub permissions: Permissions,
    pub flash: Option<String>,
    pub nav_items: Vec<NavItem>,
    pub app_name: String,
    pub csrf_token: String,
    pub unread_count: i64,
}

impl PageContext {
    pub fn build(session: &Session, conn: &Connection, current_path: &str) -> Result<Self, AppError> {
        let username = get_username(session)
            .map_err(|e| AppError::Session(format!("Failed to get username: {}", e)))?;
        let permissions = get_permissions(session)
            .map_err(|e| AppError::Session(format!("Failed to get permissions: {}", e)))?;
        let flash = take_flash(session);
        let nav_items = nav::build_nav(&permissions, current_path);
        let app_name = setting::get_value(conn, "app.name", "ThesisFlow");
        let csrf_token = csrf::get_or_create_token(session);
        let avatar_initial = username.chars().next().unwrap_or('?').to_uppercase().to_string();
        let user_id = crate::auth::session::get_user_id(session).unwrap_or(0);
        let unread_count = notification::count_unread(conn, user_id);
        Ok(Self {
            username,
            avatar_initial,
            permissions,
            flash,
            nav_items,
            app_name,
            csrf_token,
            unread_count,
        })
    }
}

#[derive(Template)]
#[template(path = "login.html")]
pub struct LoginTemplate {
    pub error: Option<String>,
    pub app_name: String,
    pub csrf_token: String,
}
