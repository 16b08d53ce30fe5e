use askama::Template;

use super::PageContext;
use crate::audit::AuditPage;
use crate::models::group::{GroupDisplay, GroupMember};
use crate::models::setting::SettingDisplay;
use crate::models::user::{UserDisplay, UserPage};

#[derive(Template)]
#[template(path = "users/list.html")]
pub struct UserListTemplate {
    pub ctx: PageContext,
    pub page: UserPage,
    pub search: String,
}

pub struct RoleOption {
    pub code: &'static str,
    pub label: &'static str,
    pub selected: bool,
}

/// Role select options with the current role pre-selected.
pub fn role_options(current: Option<&str>) -> Vec<RoleOption> {
    crate::auth::roles::ROLES
        .iter()
        .map(|&(code, label)| RoleOption {
            code,
            label,
            selected: current == Some(code),
        })
        .collect()
}

#[derive(Template)]
#[template(path = "users/form.html")]
pub struct UserFormTemplate {
    pub ctx: PageContext,
    pub editing: Option<UserDisplay>,
    pub roles: Vec<RoleOption>,
    pub errors: Vec<String>,
}

#[derive(Template)]
#[template(path = "groups/list.html")]
pub struct GroupListTemplate {
    pub ctx: PageContext,
    pub groups: Vec<GroupDisplay>,
    pub can_manage: bool,
}

#[derive(Template)]
#[template(path = "groups/form.html")]
pub struct GroupFormTemplate {
    pub ctx: PageContext,
    pub editing: Option<GroupDisplay>,
    pub students: Vec<UserDisplay>,
    pub advisers: Vec<UserDisplay>,
    pub errors: Vec<String>,
}

#[derive(Template)]
#[template(path = "groups/detail.html")]
pub struct GroupDetailTemplate {
    pub ctx: PageContext,
    pub group: GroupDisplay,
    pub members: Vec<GroupMember>,
    pub students: Vec<UserDisplay>,
    pub can_manage: bool,
}

#[derive(Template)]
#[template(path = "audit/list.html")]
pub struct AuditListTemplate {
    pub ctx: PageContext,
    pub page: AuditPage,
}

#[derive(Template)]
#[template(path = "settings.html")]
pub struct SettingsTemplate {
    pub ctx: PageContext,
    pub settings: Vec<SettingDisplay>,
}
