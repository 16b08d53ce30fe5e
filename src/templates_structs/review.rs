use askama::Template;

use super::PageContext;
use crate::models::topic::ReviewQueueItem;

#[derive(Template)]
#[template(path = "review/moderation.html")]
pub struct ModerationQueueTemplate {
    pub ctx: PageContext,
    pub items: Vec<ReviewQueueItem>,
}

#[derive(Template)]
#[template(path = "review/head.html")]
pub struct HeadQueueTemplate {
    pub ctx: PageContext,
    pub items: Vec<ReviewQueueItem>,
}
