use actix_session::Session;
use actix_web::{HttpResponse, web};

use crate::auth::roles;
use crate::auth::session::{get_role, require_user_id};
use crate::db::DbPool;
use crate::errors::{AppError, render};
use crate::models::topic::EntryStatus;
use crate::models::topic::queries as topic_queries;
use crate::models::{chapter, group, notification, user};
use crate::templates_structs::{DashboardTemplate, DashboardTile, PageContext};

pub async fn index(pool: web::Data<DbPool>, session: Session) -> Result<HttpResponse, AppError> {
    let user_id = require_user_id(&session)?;
    let role = get_role(&session).unwrap_or_default();
    let conn = pool.get()?;
    let ctx = PageContext::build(&session, &conn, "/dashboard")?;

    let mut tiles = Vec::new();
    if ctx.permissions.has("topics.review.moderator") {
        tiles.push(DashboardTile {
            label: "Topics awaiting moderation",
            value: topic_queries::count_by_status(&conn, EntryStatus::Submitted),
            link: "/review/moderation",
        });
    }
    if ctx.permissions.has("topics.review.head") {
        tiles.push(DashboardTile {
            label: "Topics awaiting head review",
            value: topic_queries::count_by_status(&conn, EntryStatus::HeadReview),
            link: "/review/head",
        });
    }
    if ctx.permissions.has("chapters.review") {
        tiles.push(DashboardTile {
            label: "Chapters to review",
            value: chapter::count_pending_for_adviser(&conn, user_id),
            link: "/groups",
        });
    }
    if ctx.permissions.has("users.manage") {
        tiles.push(DashboardTile {
            label: "Users",
            value: user::count(&conn)?,
            link: "/users",
        });
        tiles.push(DashboardTile {
            label: "Groups",
            value: group::count(&conn)?,
            link: "/groups",
        });
    }
    tiles.push(DashboardTile {
        label: "Unread notifications",
        value: notification::count_unread(&conn, user_id),
        link: "/notifications",
    });

    let my_groups = group::find_for_user(&conn, user_id)?;

    let tmpl = DashboardTemplate {
        ctx,
        role_label: roles::role_label(&role),
        tiles,
        my_groups,
    };
    render(tmpl)
}
