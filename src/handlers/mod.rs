pub mod account_handlers;
pub mod audit_handlers;
pub mod auth_handlers;
pub mod chapter_handlers;
pub mod dashboard;
pub mod group_handlers;
pub mod notification_handlers;
pub mod review_handlers;
pub mod settings_handlers;
pub mod topic_handlers;
pub mod user_handlers;
pub mod ws_handlers;
