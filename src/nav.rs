//! Static navigation registry.
//!
//! Every page is registered here as ordinary code and filtered per request
//! by the session's permission codes. There is no runtime discovery and no
//! mutable registry.

use crate::auth::session::Permissions;

pub struct NavEntry {
    pub path: &'static str,
    pub label: &'static str,
    pub permission: &'static str,
}

pub const NAV: &[NavEntry] = &[
    NavEntry { path: "/dashboard", label: "Dashboard", permission: "dashboard.view" },
    NavEntry { path: "/groups", label: "Groups", permission: "topics.view" },
    NavEntry { path: "/review/moderation", label: "Moderation Queue", permission: "topics.review.moderator" },
    NavEntry { path: "/review/head", label: "Head Review", permission: "topics.review.head" },
    NavEntry { path: "/notifications", label: "Notifications", permission: "notifications.view" },
    NavEntry { path: "/users", label: "Users", permission: "users.manage" },
    NavEntry { path: "/audit", label: "Audit Log", permission: "audit.view" },
    NavEntry { path: "/settings", label: "Settings", permission: "settings.manage" },
];

/// One rendered navigation link.
pub struct NavItem {
    pub path: &'static str,
    pub label: &'static str,
    pub active: bool,
}

/// Filter the registry down to what the session may see.
pub fn build_nav(permissions: &Permissions, current_path: &str) -> Vec<NavItem> {
    NAV.iter()
        .filter(|entry| permissions.has(entry.permission))
        .map(|entry| NavItem {
            path: entry.path,
            label: entry.label,
            active: current_path == entry.path
                || (entry.path != "/dashboard" && current_path.starts_with(entry.path)),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nav_is_filtered_by_permissions() {
        let perms = Permissions::from_csv("dashboard.view,notifications.view");
        let items = build_nav(&perms, "/dashboard");
        let labels: Vec<&str> = items.iter().map(|i| i.label).collect();
        assert_eq!(labels, vec!["Dashboard", "Notifications"]);
        assert!(items[0].active);
        assert!(!items[1].active);
    }

    #[test]
    fn nav_marks_prefix_routes_active() {
        let perms = Permissions::from_csv("topics.view");
        let items = build_nav(&perms, "/groups/4/topics");
        assert_eq!(items.len(), 1);
        assert!(items[0].active);
    }
}
