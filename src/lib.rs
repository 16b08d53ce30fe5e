pub mod audit;
pub mod auth;
pub mod db;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod nav;
pub mod notify;
pub mod realtime;
pub mod templates_structs;
