use askama::Template;

use super::PageContext;
use crate::models::group::GroupDisplay;

/// One role-aware counter tile.
pub struct DashboardTile {
    pub label: &'static str,
    pub value: i64,
    pub link: &'static str,
}

#[derive(Template)]
#[template(path = "dashboard.html")]
pub struct DashboardTemplate {
    pub ctx: PageContext,
    pub role_label: &'static str,
    pub tiles: Vec<DashboardTile>,
    pub my_groups: Vec<GroupDisplay>,
}
