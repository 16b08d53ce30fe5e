//! Static role and permission registry.
//!
//! Roles and their permission codes are an explicit compile-time table rather
//! than database rows; the session caches the resolved codes as a CSV at
//! login.

pub const STUDENT: &str = "student";
pub const ADVISER: &str = "adviser";
pub const MODERATOR: &str = "moderator";
pub const HEAD: &str = "head";
pub const ADMIN: &str = "admin";

/// (role code, display label), in the order shown in admin forms.
pub const ROLES: &[(&str, &str)] = &[
    (STUDENT, "Student"),
    (ADVISER, "Adviser"),
    (MODERATOR, "Moderator"),
    (HEAD, "Department Head"),
    (ADMIN, "Administrator"),
];

const STUDENT_PERMS: &[&str] = &[
    "dashboard.view",
    "topics.view",
    "topics.edit",
    "chapters.view",
    "chapters.edit",
    "notifications.view",
];

const ADVISER_PERMS: &[&str] = &[
    "dashboard.view",
    "topics.view",
    "chapters.view",
    "chapters.review",
    "notifications.view",
];

const MODERATOR_PERMS: &[&str] = &[
    "dashboard.view",
    "topics.view",
    "topics.review.moderator",
    "notifications.view",
];

const HEAD_PERMS: &[&str] = &[
    "dashboard.view",
    "topics.view",
    "topics.review.head",
    "notifications.view",
];

const ADMIN_PERMS: &[&str] = &[
    "dashboard.view",
    "topics.view",
    "chapters.view",
    "notifications.view",
    "users.manage",
    "groups.manage",
    "audit.view",
    "settings.manage",
];

/// Permission codes granted by a role. Unknown roles get nothing.
pub fn permission_codes(role: &str) -> &'static [&'static str] {
    match role {
        STUDENT => STUDENT_PERMS,
        ADVISER => ADVISER_PERMS,
        MODERATOR => MODERATOR_PERMS,
        HEAD => HEAD_PERMS,
        ADMIN => ADMIN_PERMS,
        _ => &[],
    }
}

pub fn is_valid_role(role: &str) -> bool {
    ROLES.iter().any(|(code, _)| *code == role)
}

pub fn role_label(role: &str) -> &'static str {
    ROLES
        .iter()
        .find(|(code, _)| *code == role)
        .map(|(_, label)| *label)
        .unwrap_or("Unknown")
}
