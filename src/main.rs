use actix_session::{SessionMiddleware, storage::CookieSessionStore};
use actix_web::{App, HttpServer, cookie::Key, middleware, web};

use thesisflow::auth::{self, rate_limit::RateLimiter};
use thesisflow::realtime::WsHub;
use thesisflow::{audit, db, handlers};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenvy::dotenv().ok();
    env_logger::init();

    let database_path =
        std::env::var("DATABASE_PATH").unwrap_or_else(|_| "data/thesisflow.db".to_string());
    if let Some(parent) = std::path::Path::new(&database_path).parent() {
        std::fs::create_dir_all(parent).expect("Failed to create data directory");
    }

    let pool = db::init_pool(&database_path);
    db::run_migrations(&pool);

    let admin_hash = auth::password::hash_password(
        &std::env::var("ADMIN_PASSWORD").unwrap_or_else(|_| "admin123".to_string()),
    )
    .expect("Failed to hash default password");
    db::seed(&pool, &admin_hash);

    // Clean up old audit entries based on retention policy
    {
        let conn = pool.get().expect("Failed to get connection for audit cleanup");
        audit::cleanup_old_entries(&conn);
    }

    // Session encryption key — load from SESSION_KEY env var for persistent sessions across restarts
    let secret_key = match std::env::var("SESSION_KEY") {
        Ok(val) if val.len() >= 64 => {
            log::info!("Using SESSION_KEY from environment");
            Key::from(val.as_bytes())
        }
        Ok(val) => {
            log::warn!(
                "SESSION_KEY too short ({} bytes, need 64+) — generating random key",
                val.len()
            );
            Key::generate()
        }
        Err(_) => {
            log::warn!("No SESSION_KEY set — generating random key (sessions lost on restart)");
            Key::generate()
        }
    };

    let limiter = RateLimiter::new();
    let hub = WsHub::new();

    let bind_addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "127.0.0.1:8080".to_string());
    log::info!("Starting server at http://{bind_addr}");

    HttpServer::new(move || {
        let session_mw =
            SessionMiddleware::builder(CookieSessionStore::default(), secret_key.clone())
                .cookie_secure(false)
                .cookie_http_only(true)
                .build();

        App::new()
            .wrap(session_mw)
            .wrap(middleware::Logger::default())
            .app_data(web::Data::new(pool.clone()))
            .app_data(web::Data::new(limiter.clone()))
            .app_data(web::Data::new(hub.clone()))
            // Static files
            .service(actix_files::Files::new("/static", "./static"))
            // Public routes
            .route("/login", web::get().to(handlers::auth_handlers::login_page))
            .route("/login", web::post().to(handlers::auth_handlers::login_submit))
            // Root redirect
            .route("/", web::get().to(|| async {
                actix_web::HttpResponse::SeeOther()
                    .insert_header(("Location", "/dashboard"))
                    .finish()
            }))
            // Protected routes
            .service(
                web::scope("")
                    .wrap(actix_web::middleware::from_fn(auth::middleware::require_auth))
                    .route("/dashboard", web::get().to(handlers::dashboard::index))
                    .route("/logout", web::post().to(handlers::auth_handlers::logout))
                    // User CRUD — /users/new BEFORE /users/{id} to avoid routing conflict
                    .route("/users", web::get().to(handlers::user_handlers::list))
                    .route("/users/new", web::get().to(handlers::user_handlers::new_form))
                    .route("/users", web::post().to(handlers::user_handlers::create))
                    .route("/users/{id}/edit", web::get().to(handlers::user_handlers::edit_form))
                    .route("/users/{id}", web::post().to(handlers::user_handlers::update))
                    .route("/users/{id}/delete", web::post().to(handlers::user_handlers::delete))
                    // Account
                    .route("/account", web::get().to(handlers::account_handlers::form))
                    .route("/account", web::post().to(handlers::account_handlers::submit))
                    // Groups — /groups/new BEFORE /groups/{id}
                    .route("/groups", web::get().to(handlers::group_handlers::list))
                    .route("/groups/new", web::get().to(handlers::group_handlers::new_form))
                    .route("/groups", web::post().to(handlers::group_handlers::create))
                    .route("/groups/{id}", web::get().to(handlers::group_handlers::detail))
                    .route("/groups/{id}/edit", web::get().to(handlers::group_handlers::edit_form))
                    .route("/groups/{id}", web::post().to(handlers::group_handlers::update))
                    .route("/groups/{id}/delete", web::post().to(handlers::group_handlers::delete))
                    .route("/groups/{id}/members", web::post().to(handlers::group_handlers::add_member))
                    .route(
                        "/groups/{id}/members/{user_id}/remove",
                        web::post().to(handlers::group_handlers::remove_member),
                    )
                    // Topic proposal workflow
                    .route("/groups/{id}/topics", web::get().to(handlers::topic_handlers::workspace))
                    .route(
                        "/groups/{id}/topics/new-set",
                        web::post().to(handlers::topic_handlers::create_set),
                    )
                    .route(
                        "/groups/{id}/topics/{set_id}/entries/new",
                        web::get().to(handlers::topic_handlers::entry_new_form),
                    )
                    .route(
                        "/groups/{id}/topics/{set_id}/entries",
                        web::post().to(handlers::topic_handlers::entry_create),
                    )
                    .route(
                        "/groups/{id}/topics/{set_id}/entries/{entry_id}/edit",
                        web::get().to(handlers::topic_handlers::entry_edit_form),
                    )
                    .route(
                        "/groups/{id}/topics/{set_id}/entries/{entry_id}",
                        web::post().to(handlers::topic_handlers::entry_update),
                    )
                    .route(
                        "/groups/{id}/topics/{set_id}/entries/{entry_id}/delete",
                        web::post().to(handlers::topic_handlers::entry_remove),
                    )
                    .route(
                        "/groups/{id}/topics/{set_id}/submit",
                        web::post().to(handlers::topic_handlers::submit_set),
                    )
                    .route("/groups/{id}/topics/adopt", web::post().to(handlers::topic_handlers::adopt))
                    .route("/groups/{id}/topics/ws", web::get().to(handlers::ws_handlers::topics_connect))
                    // Review queues
                    .route("/review/moderation", web::get().to(handlers::review_handlers::moderation_queue))
                    .route(
                        "/review/moderation/decide",
                        web::post().to(handlers::review_handlers::moderator_decide),
                    )
                    .route("/review/head", web::get().to(handlers::review_handlers::head_queue))
                    .route("/review/head/decide", web::post().to(handlers::review_handlers::head_decide))
                    // Chapters
                    .route("/groups/{id}/chapters", web::get().to(handlers::chapter_handlers::list))
                    .route("/groups/{id}/chapters/new", web::get().to(handlers::chapter_handlers::new_form))
                    .route("/groups/{id}/chapters", web::post().to(handlers::chapter_handlers::create))
                    .route(
                        "/groups/{id}/chapters/{chapter_id}",
                        web::get().to(handlers::chapter_handlers::detail),
                    )
                    .route(
                        "/groups/{id}/chapters/{chapter_id}/edit",
                        web::get().to(handlers::chapter_handlers::edit_form),
                    )
                    .route(
                        "/groups/{id}/chapters/{chapter_id}",
                        web::post().to(handlers::chapter_handlers::update),
                    )
                    .route(
                        "/groups/{id}/chapters/{chapter_id}/submit",
                        web::post().to(handlers::chapter_handlers::submit),
                    )
                    .route(
                        "/groups/{id}/chapters/{chapter_id}/review",
                        web::post().to(handlers::chapter_handlers::review),
                    )
                    .route(
                        "/groups/{id}/chapters/{chapter_id}/comments",
                        web::post().to(handlers::chapter_handlers::comment),
                    )
                    // Notifications
                    .route("/notifications", web::get().to(handlers::notification_handlers::list))
                    .route(
                        "/notifications/read",
                        web::post().to(handlers::notification_handlers::mark_read),
                    )
                    .route(
                        "/notifications/read-all",
                        web::post().to(handlers::notification_handlers::mark_all_read),
                    )
                    .route("/ws/notifications", web::get().to(handlers::ws_handlers::notifications_connect))
                    // Audit log
                    .route("/audit", web::get().to(handlers::audit_handlers::list))
                    // Settings
                    .route("/settings", web::get().to(handlers::settings_handlers::list))
                    .route("/settings", web::post().to(handlers::settings_handlers::save)),
            )
            // Default 404 handler (must be registered last)
            .default_service(web::to(|| async {
                let html = include_str!("../templates/errors/404.html");
                actix_web::HttpResponse::NotFound()
                    .content_type("text/html; charset=utf-8")
                    .body(html)
            }))
    })
    .bind(bind_addr)?
    .run()
    .await
}
