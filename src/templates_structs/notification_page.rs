use askama::Template;

use super::PageContext;
use crate::models::notification::Notification;

#[derive(Template)]
#[template(path = "notifications/list.html")]
pub struct NotificationListTemplate {
    pub ctx: PageContext,
    pub notifications: Vec<Notification>,
}
