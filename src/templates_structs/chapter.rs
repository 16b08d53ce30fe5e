use askama::Template;

use super::PageContext;
use crate::models::chapter::{Chapter, ChapterComment};
use crate::models::group::GroupDisplay;

#[derive(Template)]
#[template(path = "chapters/list.html")]
pub struct ChapterListTemplate {
    pub ctx: PageContext,
    pub group: GroupDisplay,
    pub chapters: Vec<Chapter>,
    pub can_edit: bool,
}

#[derive(Template)]
#[template(path = "chapters/form.html")]
pub struct ChapterFormTemplate {
    pub ctx: PageContext,
    pub group: GroupDisplay,
    pub editing: Option<Chapter>,
    pub errors: Vec<String>,
}

#[derive(Template)]
#[template(path = "chapters/detail.html")]
pub struct ChapterDetailTemplate {
    pub ctx: PageContext,
    pub group: GroupDisplay,
    pub chapter: Chapter,
    pub comments: Vec<ChapterComment>,
    pub can_edit: bool,
    pub can_review: bool,
}
